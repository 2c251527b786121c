//! Timer-driven relay: fetch, format and post to an outbound webhook.

use async_trait::async_trait;
use reqwest::Client;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::{MissedTickBehavior, interval};

use crate::{
    config::PollerConfig,
    error::{CycleError, DeliveryError},
    format::format_message,
    model::{Location, OutboundNotification},
    provider::WeatherProvider,
};

/// Destination for formatted weather messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &OutboundNotification) -> Result<(), DeliveryError>;
}

/// Posts `{"message": ...}` to a fixed URL.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    http: Client,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            DeliveryError(format!("Failed to build webhook HTTP client: {}", e.without_url()))
        })?;
        Ok(Self { url, http })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &OutboundNotification) -> Result<(), DeliveryError> {
        // Errors are rendered without the URL, which may carry a token.
        let res = self
            .http
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| DeliveryError(format!("Failed to post to webhook: {}", e.without_url())))?;

        let status = res.status();
        if !status.is_success() {
            return Err(DeliveryError(format!("Webhook responded with status {status}")));
        }
        Ok(())
    }
}

pub struct Poller {
    provider: Arc<dyn WeatherProvider>,
    notifier: Arc<dyn Notifier>,
    location: Location,
    interval: Duration,
}

impl Poller {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        notifier: Arc<dyn Notifier>,
        location: Location,
        interval: Duration,
    ) -> Self {
        Self { provider, notifier, location, interval }
    }

    /// Wire a poller from resolved configuration, posting through [`WebhookNotifier`].
    pub fn from_config(
        config: &PollerConfig,
        provider: Arc<dyn WeatherProvider>,
    ) -> Result<Self, DeliveryError> {
        let notifier =
            WebhookNotifier::new(config.webhook_url.clone(), config.provider.http_timeout)?;
        Ok(Self::new(
            provider,
            Arc::new(notifier),
            config.provider.location.clone(),
            config.interval,
        ))
    }

    /// One fetch-format-post cycle.
    pub async fn run_cycle(&self) -> Result<(), CycleError> {
        let report = self.provider.current_weather(&self.location).await?;
        let message = format_message(&report.snapshot);
        self.notifier.notify(&OutboundNotification { message }).await?;
        Ok(())
    }

    /// Run a cycle now and then on every tick until `shutdown` resolves.
    ///
    /// Cycles never overlap: the next tick is awaited only after the current
    /// cycle finishes, and ticks missed meanwhile are skipped. A failed cycle
    /// is logged and the loop carries on.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        log::info!(
            "Polling weather for {} every {} ms",
            self.location,
            self.interval.as_millis()
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                result = self.run_cycle() => match result {
                    Ok(()) => log::info!("Weather update delivered"),
                    Err(e) => log::warn!("Weather cycle failed: {e}"),
                },
            }
        }

        log::info!("Poller stopped");
    }
}
