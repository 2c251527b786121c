use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use std::path::{Path, PathBuf};
use weather_relay_core::{
    Config, ConfigError, Poller, PollerConfig, ReceiverConfig, format_message,
    provider_from_settings, receiver,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-relay", version, about = "Relay current weather to chat platforms")]
pub struct Cli {
    /// Config file to read instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the webhook endpoints for the chat platform.
    Serve {
        /// Listen port; overrides PORT and the config file.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Push a weather update to WEBHOOK_URL now and on every interval.
    Poll {
        /// Interval between updates in milliseconds; overrides POLL_INTERVAL_MS.
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Fetch the current weather once and print the formatted message.
    Show,

    /// Interactively write the config file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve { port } => {
                let mut cfg = load_config(self.config.as_deref())?;
                if port.is_some() {
                    cfg.port = port;
                }
                serve(&cfg).await
            }
            Command::Poll { interval_ms } => {
                let mut cfg = load_config(self.config.as_deref())?;
                if interval_ms.is_some() {
                    cfg.poll_interval_ms = interval_ms;
                }
                poll(&cfg).await
            }
            Command::Show => {
                let cfg = load_config(self.config.as_deref())?;
                show(&cfg).await
            }
            Command::Configure => configure(self.config.as_deref()),
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut cfg = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cfg.apply_env().map_err(fatal)?;
    Ok(cfg)
}

/// Log each configuration problem before the process exits non-zero.
fn fatal(err: ConfigError) -> anyhow::Error {
    match &err {
        ConfigError::Missing(vars) => {
            log::error!("Configuration errors:");
            for var in vars {
                log::error!("  - {var} is not set");
            }
            log::error!("Set them in the environment or run `weather-relay configure`.");
        }
        ConfigError::Invalid { .. } => log::error!("Configuration error: {err}"),
    }
    err.into()
}

async fn serve(cfg: &Config) -> anyhow::Result<()> {
    let config = ReceiverConfig::resolve(cfg).map_err(fatal)?;
    log::info!("Weather webhook service starting");
    log::info!("City: {}", config.provider.location);
    log::info!("Port: {}", config.port);

    let provider = provider_from_settings(&config.provider)?;
    receiver::serve(&config, provider, shutdown_signal())
        .await
        .with_context(|| format!("Webhook server on port {} failed", config.port))
}

async fn poll(cfg: &Config) -> anyhow::Result<()> {
    let config = PollerConfig::resolve(cfg).map_err(fatal)?;
    log::info!("Weather webhook poller starting");

    let provider = provider_from_settings(&config.provider)?;
    let poller = Poller::from_config(&config, provider)?;
    poller.run_until(shutdown_signal()).await;
    Ok(())
}

async fn show(cfg: &Config) -> anyhow::Result<()> {
    let config = ReceiverConfig::resolve(cfg).map_err(fatal)?;
    let provider = provider_from_settings(&config.provider)?;
    let report = provider.current_weather(&config.provider.location).await?;
    println!("{}", format_message(&report.snapshot));
    Ok(())
}

fn configure(path: Option<&Path>) -> anyhow::Result<()> {
    let mut cfg = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !api_key.trim().is_empty() {
        cfg.api_key = Some(api_key.trim().to_string());
    }

    let city = Text::new("City:")
        .with_default(cfg.city.as_deref().unwrap_or(weather_relay_core::config::DEFAULT_CITY))
        .prompt()?;
    cfg.city = Some(city);

    let country = Text::new("Country code:")
        .with_default(
            cfg.country_code.as_deref().unwrap_or(weather_relay_core::config::DEFAULT_COUNTRY_CODE),
        )
        .prompt()?;
    cfg.country_code = Some(country);

    let secret = Password::new("Webhook secret (bearer token):")
        .without_confirmation()
        .with_help_message("Leave empty to disable authentication")
        .prompt()?;
    cfg.webhook_secret = Some(secret.trim().to_string()).filter(|s| !s.is_empty());

    let url = Text::new("Outbound webhook URL (poll mode):")
        .with_initial_value(cfg.webhook_url.as_deref().unwrap_or_default())
        .prompt_skippable()?;
    cfg.webhook_url = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());

    let saved_to = match path {
        Some(path) => {
            cfg.save_to(path)?;
            path.to_path_buf()
        }
        None => cfg.save()?,
    };
    println!("Configuration saved to {}", saved_to.display());
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutting down");
}
