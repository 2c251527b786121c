//! HTTP surface called by the chat-automation platform.
//!
//! Every request fetches fresh weather; handlers share nothing but read-only state.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::{future::Future, net::SocketAddr, sync::Arc};

use crate::{
    config::ReceiverConfig,
    format::{format_message, round_celsius},
    model::{ChatEvent, Location, WeatherSnapshot},
    provider::WeatherProvider,
};

pub const SERVICE_NAME: &str = "weather-webhook";

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn WeatherProvider>,
    pub location: Location,
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        location: Location,
        webhook_secret: Option<String>,
    ) -> Self {
        Self { provider, location, webhook_secret: webhook_secret.map(Arc::from) }
    }

    /// With no secret configured every request passes.
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(secret) = self.webhook_secret.as_deref() else {
            return true;
        };
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| constant_time_eq(token.as_bytes(), secret.as_bytes()))
    }
}

/// Byte comparison whose running time does not depend on where the inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    service: &'static str,
}

#[derive(Serialize)]
struct WeatherResponse {
    success: bool,
    message: String,
    data: Value,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WeatherData {
    temperature: f64,
    feels_like: f64,
    description: String,
    humidity: u8,
    wind_speed: f64,
    city: String,
}

impl From<&WeatherSnapshot> for WeatherData {
    fn from(s: &WeatherSnapshot) -> Self {
        Self {
            temperature: s.temperature_c,
            feels_like: s.feels_like_c,
            description: s.condition.clone(),
            humidity: s.humidity_pct,
            wind_speed: s.wind_speed_mps,
            city: s.city.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<Value>,
    timestamp: String,
    weather_data: WeatherData,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoResponse {
    success: bool,
    additional_info: AdditionalInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdditionalInfo {
    current_weather: CurrentWeather,
    timestamp: String,
}

#[derive(Serialize)]
struct CurrentWeather {
    temperature: String,
    condition: String,
    city: String,
}

#[derive(Serialize)]
struct FailureResponse {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl FailureResponse {
    fn new(error: impl ToString) -> Self {
        Self { success: false, error: error.to_string(), timestamp: Some(now_iso()) }
    }

    fn without_timestamp(error: impl ToString) -> Self {
        Self { success: false, error: error.to_string(), timestamp: None }
    }
}

#[derive(Serialize)]
struct UnauthorizedResponse {
    error: &'static str,
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(UnauthorizedResponse { error: "Unauthorized" })).into_response()
}

fn internal_error(body: FailureResponse) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// GET /health - Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", timestamp: now_iso(), service: SERVICE_NAME })
}

/// GET /weather - Current weather, formatted message plus the raw provider payload
async fn current_weather(State(state): State<AppState>) -> Response {
    match state.provider.current_weather(&state.location).await {
        Ok(report) => Json(WeatherResponse {
            success: true,
            message: format_message(&report.snapshot),
            data: report.raw,
            timestamp: now_iso(),
        })
        .into_response(),
        Err(e) => {
            log::error!("Error fetching weather: {e}");
            internal_error(FailureResponse::new(e))
        }
    }
}

/// POST /webhook - Chat platform event, answered with a weather message
async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    log::info!("Webhook received");

    if !state.authorized(&headers) {
        log::warn!("Rejected webhook: invalid authentication");
        return unauthorized();
    }

    let event = ChatEvent::from_body_lenient(&body);
    log::info!(
        "Event type: {:?}, conversation: {:?}, user message: {:?}",
        event.event_type,
        event.conversation_id,
        event.user_message
    );

    let report = match state.provider.current_weather(&state.location).await {
        Ok(report) => report,
        Err(e) => {
            log::error!("Error processing webhook: {e}");
            return internal_error(FailureResponse::new(e));
        }
    };

    let message = format_message(&report.snapshot);
    log::debug!("Weather message prepared:\n{message}");

    let response = WebhookResponse {
        success: true,
        message,
        event_type: event.event_type,
        conversation_id: event.conversation_id,
        timestamp: now_iso(),
        weather_data: WeatherData::from(&report.snapshot),
    };
    log::info!("Webhook response sent");
    Json(response).into_response()
}

/// POST /user-info - Current weather as additional user context
async fn user_info(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    log::info!("User info request received");

    if !state.authorized(&headers) {
        log::warn!("Rejected user info request: invalid authentication");
        return unauthorized();
    }

    let event = ChatEvent::from_body_lenient(&body);
    log::debug!("User info requested for conversation {:?}", event.conversation_id);

    match state.provider.current_weather(&state.location).await {
        Ok(report) => {
            let s = report.snapshot;
            Json(UserInfoResponse {
                success: true,
                additional_info: AdditionalInfo {
                    current_weather: CurrentWeather {
                        temperature: format!("{}°C", round_celsius(s.temperature_c)),
                        condition: s.condition,
                        city: s.city,
                    },
                    timestamp: now_iso(),
                },
            })
            .into_response()
        }
        Err(e) => {
            log::error!("Error fetching user info: {e}");
            internal_error(FailureResponse::without_timestamp(e))
        }
    }
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/weather", get(current_weather))
        .route("/webhook", post(webhook))
        .route("/user-info", post(user_info))
        .with_state(state)
}

/// Bind `0.0.0.0:<port>` and serve until `shutdown` resolves.
pub async fn serve<F>(
    config: &ReceiverConfig,
    provider: Arc<dyn WeatherProvider>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::new(
        provider,
        config.provider.location.clone(),
        config.webhook_secret.clone(),
    );
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Webhook server listening on {addr}");
    log::info!("  POST http://localhost:{}/webhook - receive chat platform events", config.port);
    log::info!("  POST http://localhost:{}/user-info - fetch user information", config.port);
    log::info!("  GET  http://localhost:{}/weather - current weather", config.port);
    log::info!("  GET  http://localhost:{}/health - health check", config.port);
    if config.webhook_secret.is_some() {
        log::info!("Bearer authentication enabled for /webhook and /user-info");
    }

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    log::info!("Webhook server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::WeatherFetchError, model::WeatherReport, provider::openweather::OpenWeatherProvider,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    #[derive(Debug, Default)]
    struct StubProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubProvider {
        fn failing() -> Self {
            Self { calls: AtomicUsize::new(0), fail: true }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherProvider for StubProvider {
        async fn current_weather(
            &self,
            _location: &Location,
        ) -> Result<WeatherReport, WeatherFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(WeatherFetchError("stub failure".into()));
            }
            Ok(WeatherReport {
                snapshot: WeatherSnapshot {
                    city: "São Paulo".into(),
                    temperature_c: 25.5,
                    feels_like_c: 27.3,
                    condition: "céu limpo".into(),
                    humidity_pct: 65,
                    wind_speed_mps: 3.5,
                    observed_at: Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
                },
                raw: json!({ "name": "São Paulo", "main": { "temp": 25.5 } }),
            })
        }
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn spawn_receiver(provider: Arc<dyn WeatherProvider>, secret: Option<&str>) -> String {
        let state = AppState::new(
            provider,
            Location::new("Sao Paulo", "BR"),
            secret.map(str::to_owned),
        );
        spawn(create_router(state)).await
    }

    fn event() -> Value {
        json!({
            "eventType": "AGENT_USER_MESSAGE",
            "conversationId": "conv-abc123",
            "agentId": "agent-456",
            "userMessage": "Qual o clima hoje?",
            "channel": "whatsapp"
        })
    }

    #[tokio::test]
    async fn health_reports_service_identity() {
        let base = spawn_receiver(Arc::new(StubProvider::default()), None).await;

        let res = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], SERVICE_NAME);
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn weather_returns_message_and_raw_payload() {
        let base = spawn_receiver(Arc::new(StubProvider::default()), None).await;

        let res = reqwest::get(format!("{base}/weather")).await.unwrap();
        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert!(body["message"].as_str().unwrap().contains("Clima em São Paulo"));
        assert_eq!(body["data"]["main"]["temp"], 25.5);
    }

    #[tokio::test]
    async fn webhook_without_token_is_rejected_before_fetching() {
        let stub = Arc::new(StubProvider::default());
        let base = spawn_receiver(stub.clone(), Some("s3cret")).await;

        let res = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .json(&event())
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 401);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, json!({ "error": "Unauthorized" }));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn webhook_with_wrong_token_is_rejected() {
        let stub = Arc::new(StubProvider::default());
        let base = spawn_receiver(stub.clone(), Some("s3cret")).await;

        let res = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .bearer_auth("nope")
            .json(&event())
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 401);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn webhook_with_token_echoes_event_and_weather() {
        let stub = Arc::new(StubProvider::default());
        let base = spawn_receiver(stub.clone(), Some("s3cret")).await;

        let res = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .bearer_auth("s3cret")
            .json(&event())
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["eventType"], "AGENT_USER_MESSAGE");
        assert_eq!(body["conversationId"], "conv-abc123");
        assert_eq!(body["weatherData"]["city"], "São Paulo");
        assert_eq!(body["weatherData"]["temperature"], 25.5);
        assert_eq!(body["weatherData"]["feelsLike"], 27.3);
        assert_eq!(body["weatherData"]["description"], "céu limpo");
        assert_eq!(body["weatherData"]["humidity"], 65);
        assert_eq!(body["weatherData"]["windSpeed"], 3.5);
        assert!(body["message"].as_str().unwrap().contains("26°C"));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn webhook_tolerates_malformed_body() {
        let base = spawn_receiver(Arc::new(StubProvider::default()), None).await;

        let res = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .header("content-type", "text/plain")
            .body("definitely not json")
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert!(body.get("eventType").is_none());
        assert!(body.get("conversationId").is_none());
    }

    #[tokio::test]
    async fn webhook_echoes_non_string_identifiers_verbatim() {
        let base = spawn_receiver(Arc::new(StubProvider::default()), None).await;

        let res = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .json(&json!({
                "eventType": "AGENT_USER_MESSAGE",
                "conversationId": 12345,
                "userMessage": "oi"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["eventType"], "AGENT_USER_MESSAGE");
        assert_eq!(body["conversationId"], 12345);
    }

    #[tokio::test]
    async fn user_info_renders_rounded_temperature() {
        let base = spawn_receiver(Arc::new(StubProvider::default()), None).await;

        let res = reqwest::Client::new()
            .post(format!("{base}/user-info"))
            .json(&event())
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], true);
        let current = &body["additionalInfo"]["currentWeather"];
        assert_eq!(current["temperature"], "26°C");
        assert_eq!(current["condition"], "céu limpo");
        assert_eq!(current["city"], "São Paulo");
        assert!(body["additionalInfo"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn user_info_requires_token_when_secret_is_set() {
        let stub = Arc::new(StubProvider::default());
        let base = spawn_receiver(stub.clone(), Some("s3cret")).await;

        let res = reqwest::Client::new()
            .post(format!("{base}/user-info"))
            .json(&event())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 401);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn fetch_failures_surface_as_500() {
        let stub = Arc::new(StubProvider::failing());
        let base = spawn_receiver(stub.clone(), None).await;
        let client = reqwest::Client::new();

        let res = client.get(format!("{base}/weather")).send().await.unwrap();
        assert_eq!(res.status(), 500);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "stub failure");
        assert!(body["timestamp"].is_string());

        let res = client.post(format!("{base}/user-info")).json(&event()).send().await.unwrap();
        assert_eq!(res.status(), 500);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, json!({ "success": false, "error": "stub failure" }));
    }

    #[tokio::test]
    async fn provider_error_status_gives_500_on_weather_and_webhook() {
        let fake_provider = Router::new().route(
            "/data/2.5/weather",
            get(|| async {
                (StatusCode::UNAUTHORIZED, Json(json!({ "cod": 401, "message": "Invalid API key." })))
            }),
        );
        let provider_base = spawn(fake_provider).await;
        let provider = OpenWeatherProvider::with_base_url(
            "BAD_KEY".into(),
            format!("{provider_base}/data/2.5/weather"),
            Duration::from_secs(5),
        )
        .unwrap();
        let base = spawn_receiver(Arc::new(provider), None).await;
        let client = reqwest::Client::new();

        let res = client.get(format!("{base}/weather")).send().await.unwrap();
        assert_eq!(res.status(), 500);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("401"));
        assert!(!body["error"].as_str().unwrap().contains("BAD_KEY"));

        let res = client.post(format!("{base}/webhook")).json(&event()).send().await.unwrap();
        assert_eq!(res.status(), 500);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn authorization_must_match_exactly() {
        let state = AppState::new(
            Arc::new(StubProvider::default()),
            Location::new("Sao Paulo", "BR"),
            Some("s3cret".into()),
        );

        let mut headers = HeaderMap::new();
        assert!(!state.authorized(&headers));

        headers.insert(AUTHORIZATION, "Bearer s3cret".parse().unwrap());
        assert!(state.authorized(&headers));

        headers.insert(AUTHORIZATION, "bearer s3cret".parse().unwrap());
        assert!(!state.authorized(&headers));

        headers.insert(AUTHORIZATION, "Bearer s3cret ".parse().unwrap());
        assert!(!state.authorized(&headers));

        headers.insert(AUTHORIZATION, "Bearer s3creT".parse().unwrap());
        assert!(!state.authorized(&headers));
    }

    #[test]
    fn constant_time_eq_compares_whole_input() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cret-longer"));
        assert!(constant_time_eq(b"", b""));
    }
}
