pub mod alarm;
pub mod config;
pub mod logs;
pub mod webhook;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub use alarm::{AlarmMessage, AlarmState, Dimension, NotificationEnvelope, QueryWindow, Trigger};
pub use config::ForwarderConfig;
pub use logs::{fetch_excerpt, CloudWatchLogStore, LogExcerpt, LogQuery, LogStore, LogStoreError};
pub use webhook::{DeliveryError, HttpWebhook, WebhookPayload, WebhookSink};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ignored,
    Forwarded,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InvocationOutcome {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: Outcome,
}

impl InvocationOutcome {
    pub fn ignored() -> Self {
        Self {
            status_code: 200,
            body: Outcome::Ignored,
        }
    }

    pub fn forwarded() -> Self {
        Self {
            status_code: 200,
            body: Outcome::Forwarded,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("alarm message is not valid JSON: {0}")]
    InvalidMessage(#[from] serde_json::Error),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Filters CloudWatch alarm notifications, attaches recent Lambda logs and
/// relays them to a webhook.
pub struct AlarmForwarder<L, W> {
    config: ForwarderConfig,
    log_store: L,
    webhook: W,
}

impl<L, W> AlarmForwarder<L, W>
where
    L: LogStore,
    W: WebhookSink,
{
    pub fn new(config: ForwarderConfig, log_store: L, webhook: W) -> Self {
        Self {
            config,
            log_store,
            webhook,
        }
    }

    pub async fn handle(
        &self,
        envelope: NotificationEnvelope,
    ) -> Result<InvocationOutcome, ForwarderError> {
        let alarm = envelope.alarm_message()?;
        self.handle_alarm(&alarm).await
    }

    pub async fn handle_alarm(
        &self,
        alarm: &AlarmMessage,
    ) -> Result<InvocationOutcome, ForwarderError> {
        let state = alarm.state();
        if state != AlarmState::Alarm {
            info!("Ignoring non-ALARM state: {}", state);
            return Ok(InvocationOutcome::ignored());
        }

        let log_group = alarm.log_group();
        let excerpt = match &log_group {
            Some(group) => {
                let window = alarm.query_window(Utc::now(), self.config.log_lookback);
                let query = window.query(group, self.config.log_limit);
                fetch_excerpt(&self.log_store, &query).await
            }
            None => LogExcerpt::Unavailable,
        };

        let payload =
            WebhookPayload::build(&self.config.source, alarm, log_group.as_deref(), excerpt);

        info!(
            alarm_name = %payload.alarm_name,
            log_group = %payload.log_group,
            "Forwarding alarm to webhook"
        );

        if let Err(e) = self.webhook.deliver(&payload).await {
            error!("Failed to POST to webhook: {}", e);
            return Err(e.into());
        }

        Ok(InvocationOutcome::forwarded())
    }
}
