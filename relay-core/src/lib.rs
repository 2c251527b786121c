//! Core library for the weather relay.
//!
//! This crate defines:
//! - Layered configuration (TOML file + environment)
//! - The OpenWeather client behind the `WeatherProvider` abstraction
//! - Message formatting for chat platforms
//! - The webhook receiver (HTTP server) and the webhook poller (timer loop)
//!
//! It is used by the `weather-relay` binary, but the services can be embedded elsewhere.

pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod poller;
pub mod provider;
pub mod receiver;

pub use config::{Config, PollerConfig, ProviderSettings, ReceiverConfig};
pub use error::{ConfigError, CycleError, DeliveryError, WeatherFetchError};
pub use format::{format_message, format_message_at};
pub use model::{ChatEvent, Location, OutboundNotification, WeatherReport, WeatherSnapshot};
pub use poller::{Notifier, Poller, WebhookNotifier};
pub use provider::{WeatherProvider, provider_from_settings};
