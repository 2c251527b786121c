use thiserror::Error;

/// Required startup configuration is missing or unusable. Always fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Any failure to obtain a usable snapshot from the weather provider.
///
/// Transport, status and payload problems share this type; only the message differs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct WeatherFetchError(pub String);

/// Posting to the outbound webhook failed (transport error or non-2xx status).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DeliveryError(pub String);

/// One poller cycle failed at either step.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("weather fetch failed: {0}")]
    Fetch(#[from] WeatherFetchError),

    #[error("webhook delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}
