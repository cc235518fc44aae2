//! REST client for the GridLink operations API.
//!
//! Every call is bounded per attempt by the configured timeout, retried with
//! exponential backoff, and resolved to a `Result`; nothing panics across
//! the public boundary. Each attempt resolution updates the shared
//! [`ConnectionHealth`] and successes/exhaustions are announced on the bus as
//! connection-status events.
//!
//! [`ConnectionHealth`]: crate::status::ConnectionHealth

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::bus::EventBus;
use crate::config::Config;
use crate::events::ClientEvent;
use crate::retry::{retry_async, RetryPolicy};
use crate::status::StatusHandle;
use crate::stream::proto::{AlertMsg, SystemStatusMsg, TelemetryMsg};

const ERROR_BODY_SNIPPET_LEN: usize = 220;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Registered plant as returned by the fleet endpoints.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Plant {
    pub id: String,
    pub name: String,
    pub capacity_kw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub online: bool,
}

/// Mutable per-plant settings accepted by the settings endpoint.
///
/// Unset fields are omitted from the request and left unchanged server-side.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PlantSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_output_kw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_threshold_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_mode: Option<bool>,
}

/// Errors produced by REST transport and response handling.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request never produced a response (connect failure, timeout, ...).
    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    /// Server answered with a non-2xx status.
    #[error("http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    /// Response body did not match the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ApiError {
    /// Transport failures and rejected statuses follow the same retry path;
    /// a body that decoded wrong will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::HttpStatus { .. } => true,
            Self::Parse(_) => false,
        }
    }
}

/// Cloneable executor for GridLink REST calls.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    attempt_timeout: Duration,
    retry_policy: RetryPolicy,
    bus: Arc<EventBus<ClientEvent>>,
    status: StatusHandle,
}

impl ApiClient {
    pub(crate) fn new(
        config: &Config,
        bus: Arc<EventBus<ClientEvent>>,
        status: StatusHandle,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .no_proxy()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            attempt_timeout: config.attempt_timeout,
            retry_policy: RetryPolicy::steady(config.retry_attempts, config.backoff_base),
            bus,
            status,
        })
    }

    /// Lists all registered plants.
    pub async fn plants(&self) -> Result<Vec<Plant>, ApiError> {
        self.execute(Method::GET, "/api/v1/plants", None).await
    }

    /// Latest telemetry snapshot for one plant.
    pub async fn plant_telemetry(&self, plant_id: &str) -> Result<TelemetryMsg, ApiError> {
        self.execute(
            Method::GET,
            &format!("/api/v1/plants/{plant_id}/telemetry"),
            None,
        )
        .await
    }

    /// Aggregated fleet health.
    pub async fn system_health(&self) -> Result<SystemStatusMsg, ApiError> {
        self.execute(Method::GET, "/api/v1/system/health", None)
            .await
    }

    /// Alerts, optionally filtered by acknowledgement state.
    pub async fn alerts(&self, acknowledged: Option<bool>) -> Result<Vec<AlertMsg>, ApiError> {
        let path = match acknowledged {
            Some(value) => format!("/api/v1/alerts?acknowledged={value}"),
            None => "/api/v1/alerts".to_string(),
        };
        self.execute(Method::GET, &path, None).await
    }

    /// Marks an alert as acknowledged and returns the updated alert.
    pub async fn acknowledge_alert(&self, alert_id: &str) -> Result<AlertMsg, ApiError> {
        self.execute(
            Method::PATCH,
            &format!("/api/v1/alerts/{alert_id}/acknowledge"),
            None,
        )
        .await
    }

    /// Replaces a plant's settings and returns the updated plant.
    pub async fn update_plant_settings(
        &self,
        plant_id: &str,
        settings: &PlantSettings,
    ) -> Result<Plant, ApiError> {
        let body = serde_json::to_value(settings).map_err(|err| ApiError::Parse(err.to_string()))?;
        self.execute(
            Method::PUT,
            &format!("/api/v1/plants/{plant_id}/settings"),
            Some(body),
        )
        .await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let endpoint = self.endpoint(path);
        let policy = self.retry_policy.clone();

        let result = retry_async(
            &policy,
            |_| {
                let method = method.clone();
                let endpoint = endpoint.clone();
                let body = body.clone();
                async move { self.send_attempt(method, &endpoint, body).await }
            },
            |error: &ApiError| error.is_retryable(),
        )
        .await;

        if result.is_err() {
            let health = self.status.mark_offline();
            self.bus.emit(ClientEvent::ConnectionStatus(health));
        }
        result
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_attempt<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let started = Instant::now();

        let mut builder = self
            .http
            .request(method, endpoint)
            .timeout(self.attempt_timeout);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let outcome = async {
            let response = builder.send().await.map_err(ApiError::Transport)?;
            let status = response.status();
            let text = response.text().await.map_err(ApiError::Transport)?;

            if !status.is_success() {
                return Err(ApiError::HttpStatus {
                    status,
                    body: summarize_error_body(&text),
                });
            }

            serde_json::from_str(&text).map_err(|err| ApiError::Parse(err.to_string()))
        }
        .await;

        match &outcome {
            Ok(_) => {
                let health = self.status.record_success(started.elapsed());
                self.bus.emit(ClientEvent::ConnectionStatus(health));
            }
            Err(_) => {
                self.status.record_attempt_failure();
            }
        }
        outcome
    }
}

fn summarize_error_body(body: &str) -> String {
    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.error.or(parsed.message).or(parsed.reason) {
            return message;
        }
    }

    body.chars().take(ERROR_BODY_SNIPPET_LEN).collect()
}
