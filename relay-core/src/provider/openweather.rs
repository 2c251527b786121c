use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::{
    error::WeatherFetchError,
    model::{Location, WeatherReport, WeatherSnapshot},
};

use super::WeatherProvider;

pub const OPENWEATHER_CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Sentinel used when the provider sends no condition description.
pub const UNKNOWN_CONDITION: &str = "N/A";

#[derive(Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl std::fmt::Debug for OpenWeatherProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, WeatherFetchError> {
        Self::with_base_url(api_key, OPENWEATHER_CURRENT_URL.to_string(), timeout)
    }

    /// Point the provider at a different current-weather endpoint (proxies, tests).
    pub fn with_base_url(
        api_key: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, WeatherFetchError> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            WeatherFetchError(format!("Failed to build OpenWeather HTTP client: {}", e.without_url()))
        })?;

        Ok(Self { api_key, base_url, http })
    }

    async fn fetch_current(&self, location: &Location) -> Result<WeatherReport, WeatherFetchError> {
        let query = location.query();

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", query.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
                ("lang", "pt_br"),
            ])
            .send()
            .await
            .map_err(|e| {
                // The request URL carries `appid`; never let it reach the message.
                WeatherFetchError(format!(
                    "Failed to send request to OpenWeather: {}",
                    e.without_url()
                ))
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            WeatherFetchError(format!(
                "Failed to read OpenWeather response body: {}",
                e.without_url()
            ))
        })?;

        if !status.is_success() {
            return Err(WeatherFetchError(format!(
                "OpenWeather request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        parse_current(&body)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_weather(
        &self,
        location: &Location,
    ) -> Result<WeatherReport, WeatherFetchError> {
        self.fetch_current(location).await
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    #[serde(default)]
    dt: Option<i64>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
}

/// Build a report from a current-weather body, failing on any missing mandatory field.
pub fn parse_current(body: &str) -> Result<WeatherReport, WeatherFetchError> {
    let raw: Value = serde_json::from_str(body)
        .map_err(|e| WeatherFetchError(format!("Failed to parse OpenWeather JSON: {e}")))?;

    let parsed = OwCurrentResponse::deserialize(&raw).map_err(|e| {
        WeatherFetchError(format!("OpenWeather response is missing required data: {e}"))
    })?;

    let observed_at = parsed
        .dt
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    let condition = parsed
        .weather
        .into_iter()
        .next()
        .and_then(|w| w.description)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| UNKNOWN_CONDITION.to_string());

    let snapshot = WeatherSnapshot {
        city: parsed.name,
        temperature_c: parsed.main.temp,
        feels_like_c: parsed.main.feels_like,
        condition,
        humidity_pct: parsed.main.humidity,
        wind_speed_mps: parsed.wind.speed,
        observed_at,
    };

    Ok(WeatherReport { snapshot, raw })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
