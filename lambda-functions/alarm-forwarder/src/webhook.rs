use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::alarm::AlarmMessage;
use crate::config::ForwarderConfig;
use crate::logs::LogExcerpt;

/// Body POSTed to the webhook. Every field is always present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WebhookPayload {
    pub source: String,
    pub alarm_name: String,
    pub alarm_description: String,
    pub aws_account_id: String,
    pub region: String,
    pub state: String,
    pub state_reason: String,
    pub state_change_time: String,
    pub trigger: TriggerPayload,
    pub log_group: String,
    pub error_logs: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TriggerPayload {
    pub metric_name: String,
    pub namespace: String,
    pub dimensions: Vec<DimensionPayload>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DimensionPayload {
    pub name: String,
    pub value: String,
}

impl WebhookPayload {
    pub fn build(
        source: &str,
        alarm: &AlarmMessage,
        log_group: Option<&str>,
        excerpt: LogExcerpt,
    ) -> Self {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        let trigger = alarm.trigger.clone().unwrap_or_default();

        Self {
            source: source.to_string(),
            alarm_name: text(&alarm.alarm_name),
            alarm_description: text(&alarm.alarm_description),
            aws_account_id: text(&alarm.aws_account_id),
            region: text(&alarm.region),
            state: text(&alarm.new_state_value),
            state_reason: text(&alarm.new_state_reason),
            state_change_time: text(&alarm.state_change_time),
            trigger: TriggerPayload {
                metric_name: text(&trigger.metric_name),
                namespace: text(&trigger.namespace),
                dimensions: alarm
                    .dimensions()
                    .iter()
                    .map(|dimension| DimensionPayload {
                        name: text(&dimension.name),
                        value: text(&dimension.value),
                    })
                    .collect(),
            },
            log_group: log_group.unwrap_or_default().to_string(),
            error_logs: excerpt.into_text(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to build webhook client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("webhook did not respond within {0:?}")]
    Timeout(Duration),
    #[error("webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

#[async_trait]
pub trait WebhookSink: Send + Sync {
    /// POSTs the payload and returns the HTTP status code.
    ///
    /// A non-2xx status is not an error; only transport failures are.
    async fn deliver(&self, payload: &WebhookPayload) -> Result<u16, DeliveryError>;
}

pub struct HttpWebhook {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpWebhook {
    pub fn new(config: &ForwarderConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(config.webhook_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(DeliveryError::Client)?;

        Ok(Self {
            client,
            url: config.webhook_url.clone(),
            timeout: config.webhook_timeout,
        })
    }
}

#[async_trait]
impl WebhookSink for HttpWebhook {
    async fn deliver(&self, payload: &WebhookPayload) -> Result<u16, DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Transport(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            info!("Webhook responded {}", status.as_u16());
        } else {
            warn!("Webhook responded with non-success status {}", status.as_u16());
        }

        Ok(status.as_u16())
    }
}
