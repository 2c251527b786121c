use crate::{
    config::ProviderSettings,
    error::WeatherFetchError,
    model::{Location, WeatherReport},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Source of current weather conditions.
///
/// One call is one outbound request: no caching, no retry.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(&self, location: &Location)
    -> Result<WeatherReport, WeatherFetchError>;
}

/// Construct the OpenWeather provider from resolved settings.
pub fn provider_from_settings(
    settings: &ProviderSettings,
) -> Result<Arc<dyn WeatherProvider>, WeatherFetchError> {
    let provider = OpenWeatherProvider::new(settings.api_key.clone(), settings.http_timeout)?;
    Ok(Arc::new(provider))
}
