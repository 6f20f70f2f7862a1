use anyhow::{bail, Context};
use bon::Builder;
use std::time::Duration;

use crate::logs::DEFAULT_LOG_LIMIT;

pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_USER_AGENT: &str = "AutoRemediationBot/1.0";
pub const DEFAULT_SOURCE: &str = "aws-cloudwatch-alarm";
pub const DEFAULT_LOOKBACK_MINUTES: i64 = 5;

/// Settings shared by every invocation, loaded once at cold start.
#[derive(Builder, Debug, Clone)]
#[builder(on(String, into))]
pub struct ForwarderConfig {
    pub webhook_url: String,

    #[builder(default = DEFAULT_WEBHOOK_TIMEOUT)]
    pub webhook_timeout: Duration,

    #[builder(default = DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,

    #[builder(default = DEFAULT_SOURCE.to_string())]
    pub source: String,

    #[builder(default = chrono::Duration::minutes(DEFAULT_LOOKBACK_MINUTES))]
    pub log_lookback: chrono::Duration,

    #[builder(default = DEFAULT_LOG_LIMIT)]
    pub log_limit: i32,
}

impl ForwarderConfig {
    /// Reads `WEBHOOK_URL` (required) and `WEBHOOK_TIMEOUT_SECS` (optional).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let webhook_url = lookup("WEBHOOK_URL").context("WEBHOOK_URL must be set")?;
        if webhook_url.trim().is_empty() {
            bail!("WEBHOOK_URL must not be empty");
        }

        let webhook_timeout = match lookup("WEBHOOK_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("invalid WEBHOOK_TIMEOUT_SECS: {raw:?}"))?,
            ),
            None => DEFAULT_WEBHOOK_TIMEOUT,
        };

        Ok(Self::builder()
            .webhook_url(webhook_url)
            .webhook_timeout(webhook_timeout)
            .build())
    }
}
