use bon::Builder;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_WEBHOOK_ENDPOINT: &str = "https://kilo-webhook.example.com/alerts";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const CLOUDWATCH_ALARM_SOURCE: &str = "aws-cloudwatch-alarm";

#[derive(Builder, Debug, Clone)]
#[builder(on(String, into))]
pub struct RelayConfig {
    #[builder(default = DEFAULT_WEBHOOK_ENDPOINT.to_string())]
    pub endpoint: String,

    #[builder(default = Duration::from_millis(DEFAULT_TIMEOUT_MS))]
    pub timeout: Duration,
}

impl RelayConfig {
    /// Reads `WEBHOOK_ENDPOINT` and `TIMEOUT_MS`; both fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("WEBHOOK_ENDPOINT")
            .filter(|endpoint| !endpoint.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WEBHOOK_ENDPOINT.to_string());

        let timeout_ms = match lookup("TIMEOUT_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    warn!("Ignoring invalid TIMEOUT_MS {:?}", raw);
                    DEFAULT_TIMEOUT_MS
                }
            },
            None => DEFAULT_TIMEOUT_MS,
        };

        Self::builder()
            .endpoint(endpoint)
            .timeout(Duration::from_millis(timeout_ms))
            .build()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request timeout after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Unwraps `Records[0].Sns.Message` when present, otherwise returns the
/// event itself.
pub fn parse_event_payload(event: &Value) -> Value {
    let Some(message) = event.pointer("/Records/0/Sns/Message") else {
        return event.clone();
    };

    match message {
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!("Failed to parse SNS message: {}", e);
            Value::Object(Map::new())
        }),
        other => other.clone(),
    }
}

/// Returns a warning for payloads that look incomplete. Never blocks
/// processing.
pub fn validate_payload(payload: &Value) -> Option<String> {
    if payload.is_null() {
        return Some("Payload is undefined or null".to_string());
    }

    let source = payload.get("source").and_then(Value::as_str);
    if source == Some(CLOUDWATCH_ALARM_SOURCE) && text_field(payload, "alarm_name").is_none() {
        return Some("Missing required field: alarm_name".to_string());
    }

    None
}

fn text_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Null | Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AlarmData {
    pub source: String,
    pub alarm_name: String,
    pub alarm_description: String,
    pub aws_account_id: String,
    pub region: String,
    pub state: String,
    pub state_reason: String,
    pub state_change_time: String,
    pub trigger: Value,
    pub log_group: String,
    pub error_logs: String,
    pub timestamp: String,
}

impl AlarmData {
    /// Fills every missing or empty field with its default.
    pub fn normalize(payload: &Value, now: DateTime<Utc>) -> Self {
        let now = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let or = |key: &str, default: &str| {
            text_field(payload, key).unwrap_or_else(|| default.to_string())
        };

        let trigger = match payload.get("trigger") {
            Some(trigger @ Value::Object(_)) => trigger.clone(),
            _ => json!({}),
        };

        Self {
            source: or("source", CLOUDWATCH_ALARM_SOURCE),
            alarm_name: or("alarm_name", "unknown-alarm"),
            alarm_description: or("alarm_description", ""),
            aws_account_id: or("aws_account_id", "unknown"),
            region: or("region", "unknown"),
            state: or("state", "UNKNOWN"),
            state_reason: or("state_reason", ""),
            state_change_time: or("state_change_time", &now),
            trigger,
            log_group: or("log_group", ""),
            error_logs: or("error_logs", ""),
            timestamp: now,
        }
    }
}

/// What the webhook answered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RelayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

pub struct AlertRelay {
    client: Client,
    config: RelayConfig,
}

impl AlertRelay {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RelayError::Client)?;

        Ok(Self { client, config })
    }

    pub async fn post(&self, data: &AlarmData) -> Result<DeliveryReceipt, RelayError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                RelayError::Timeout(self.config.timeout)
            } else {
                RelayError::Transport(e)
            }
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(data)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response.text().await.map_err(classify)?;

        if status.is_success() {
            return Ok(DeliveryReceipt {
                status_code: status.as_u16(),
                body,
                warning: None,
            });
        }

        warn!(
            "Webhook returned non-success status {}: {}",
            status.as_u16(),
            body
        );
        Ok(DeliveryReceipt {
            status_code: status.as_u16(),
            body,
            warning: Some("Non-success status received".to_string()),
        })
    }

    /// Normalizes and forwards one alert. Failures are reported in the
    /// response body rather than failing the invocation.
    pub async fn relay(&self, event: &Value) -> RelayResponse {
        debug!("Received event: {}", event);

        let payload = parse_event_payload(event);
        if let Some(warning) = validate_payload(&payload) {
            warn!("Payload validation warning: {}", warning);
        }

        let data = AlarmData::normalize(&payload, Utc::now());
        match self.post(&data).await {
            Ok(receipt) => {
                info!(
                    alarm_name = %data.alarm_name,
                    status = receipt.status_code,
                    "Alert processed successfully"
                );
                RelayResponse {
                    status_code: 200,
                    body: json!({
                        "message": "Alert processed successfully",
                        "result": receipt,
                    })
                    .to_string(),
                }
            }
            Err(e) => {
                error!("Error processing alert: {}", e);
                RelayResponse {
                    status_code: 500,
                    body: json!({
                        "message": "Alert processing failed",
                        "error": e.to_string(),
                        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    })
                    .to_string(),
                }
            }
        }
    }
}
