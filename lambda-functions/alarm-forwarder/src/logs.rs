use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::{error::DisplayErrorContext, Client as LogsClient};
use tracing::{error, info};

pub const DEFAULT_LOG_LIMIT: i32 = 20;

/// A `FilterLogEvents` request: one log group, an inclusive window in epoch
/// milliseconds and a maximum event count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub log_group: String,
    pub start_time: i64,
    pub end_time: i64,
    pub limit: i32,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to fetch logs from {log_group}: {message}")]
pub struct LogStoreError {
    pub log_group: String,
    pub message: String,
}

impl LogStoreError {
    pub fn new(log_group: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            log_group: log_group.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Returns the message bodies of the matching events, in store order.
    async fn filter_messages(&self, query: &LogQuery) -> Result<Vec<String>, LogStoreError>;
}

pub struct CloudWatchLogStore {
    client: LogsClient,
}

impl CloudWatchLogStore {
    pub fn new(client: LogsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogStore for CloudWatchLogStore {
    async fn filter_messages(&self, query: &LogQuery) -> Result<Vec<String>, LogStoreError> {
        let output = self
            .client
            .filter_log_events()
            .log_group_name(&query.log_group)
            .start_time(query.start_time)
            .end_time(query.end_time)
            .limit(query.limit)
            .send()
            .await
            .map_err(|e| {
                LogStoreError::new(&query.log_group, DisplayErrorContext(&e).to_string())
            })?;

        Ok(output
            .events()
            .iter()
            .map(|event| event.message().unwrap_or_default().to_string())
            .collect())
    }
}

/// Outcome of the best-effort log lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogExcerpt {
    Retrieved(String),
    Unavailable,
}

impl LogExcerpt {
    pub fn from_messages(messages: &[String]) -> Self {
        Self::Retrieved(messages.join("\n"))
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Retrieved(text) => text,
            Self::Unavailable => String::new(),
        }
    }
}

/// Runs the query and joins the messages; never fails.
pub async fn fetch_excerpt<L>(store: &L, query: &LogQuery) -> LogExcerpt
where
    L: LogStore + ?Sized,
{
    match store.filter_messages(query).await {
        Ok(mut messages) => {
            messages.truncate(usize::try_from(query.limit).unwrap_or_default());
            info!(
                log_group = %query.log_group,
                events = messages.len(),
                "Fetched recent log events"
            );
            LogExcerpt::from_messages(&messages)
        }
        Err(e) => {
            error!("Failed to fetch logs from {}: {}", query.log_group, e);
            LogExcerpt::Unavailable
        }
    }
}
