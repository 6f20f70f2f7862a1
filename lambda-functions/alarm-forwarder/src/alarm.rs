use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::logs::LogQuery;

pub const FUNCTION_NAME_DIMENSION: &str = "FunctionName";
pub const LAMBDA_LOG_GROUP_PREFIX: &str = "/aws/lambda/";

/// SNS delivery wrapper around a CloudWatch alarm message.
///
/// Only `Records[0].Sns.Message` is read; every other field of the SNS record
/// is ignored.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct NotificationEnvelope {
    #[serde(rename = "Records")]
    pub records: Option<Vec<NotificationRecord>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NotificationRecord {
    #[serde(rename = "Sns")]
    pub sns: Option<SnsEntity>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SnsEntity {
    #[serde(rename = "Message")]
    pub message: Option<Value>,
}

impl NotificationEnvelope {
    /// Decodes the alarm carried by the first record.
    ///
    /// A missing record or message yields an empty alarm, which is never in
    /// the ALARM state. A message string that is not JSON is an error.
    pub fn alarm_message(&self) -> Result<AlarmMessage, serde_json::Error> {
        let records = self.records.as_deref().unwrap_or_default();
        if records.len() > 1 {
            debug!(
                skipped = records.len() - 1,
                "Envelope carries more than one record, only the first is processed"
            );
        }

        let message = records
            .first()
            .and_then(|record| record.sns.as_ref())
            .and_then(|sns| sns.message.as_ref());

        match message {
            Some(Value::String(raw)) => serde_json::from_str(raw),
            Some(value @ Value::Object(_)) => AlarmMessage::deserialize(value),
            _ => Ok(AlarmMessage::default()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AlarmMessage {
    pub alarm_name: Option<String>,
    pub alarm_description: Option<String>,
    #[serde(rename = "AWSAccountId")]
    pub aws_account_id: Option<String>,
    pub region: Option<String>,
    pub new_state_value: Option<String>,
    pub new_state_reason: Option<String>,
    pub state_change_time: Option<String>,
    pub trigger: Option<Trigger>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Trigger {
    pub metric_name: Option<String>,
    pub namespace: Option<String>,
    pub dimensions: Option<Vec<Dimension>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Dimension {
    pub name: Option<String>,
    pub value: Option<String>,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmState {
    Ok,
    Alarm,
    InsufficientData,
    /// Any other value, including a missing one (empty string).
    Unknown(String),
}

impl AlarmState {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("OK") => Self::Ok,
            Some("ALARM") => Self::Alarm,
            Some("INSUFFICIENT_DATA") => Self::InsufficientData,
            Some(other) => Self::Unknown(other.to_string()),
            None => Self::Unknown(String::new()),
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Alarm => write!(f, "ALARM"),
            Self::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
            Self::Unknown(raw) if raw.is_empty() => write!(f, "<missing>"),
            Self::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

impl AlarmMessage {
    pub fn state(&self) -> AlarmState {
        AlarmState::parse(self.new_state_value.as_deref())
    }

    pub fn dimensions(&self) -> &[Dimension] {
        self.trigger
            .as_ref()
            .and_then(|trigger| trigger.dimensions.as_deref())
            .unwrap_or_default()
    }

    /// Log group of the Lambda function the alarm's metric belongs to.
    pub fn log_group(&self) -> Option<String> {
        self.dimensions()
            .iter()
            .find(|dimension| dimension.name.as_deref() == Some(FUNCTION_NAME_DIMENSION))
            .map(|dimension| {
                format!(
                    "{}{}",
                    LAMBDA_LOG_GROUP_PREFIX,
                    dimension.value.as_deref().unwrap_or_default()
                )
            })
    }

    /// End of the log window: the state change time, or `now` when it is
    /// missing or unparseable.
    pub fn window_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.state_change_time.as_deref() {
            Some(raw) => parse_state_change_time(raw).unwrap_or_else(|| {
                debug!("Unparseable StateChangeTime {:?}, using current time", raw);
                now
            }),
            None => now,
        }
    }

    /// Log window of `lookback` ending at [`Self::window_end`]. A state change
    /// time too close to the representable minimum is treated like an
    /// unparseable one.
    pub fn query_window(&self, now: DateTime<Utc>, lookback: Duration) -> QueryWindow {
        QueryWindow::ending_at(self.window_end(now), lookback)
            .or_else(|| {
                debug!("StateChangeTime out of range, using current time");
                QueryWindow::ending_at(now, lookback)
            })
            .unwrap_or(QueryWindow { start: now, end: now })
    }
}

/// Parses CloudWatch's `2024-01-01T12:00:00.000+0000` style timestamps.
///
/// A bare `+0000` offset is accepted as `+00:00`; a timestamp without any
/// offset is read as UTC.
pub fn parse_state_change_time(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.trim().replace("+0000", "+00:00");

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }

    // compact offsets other than +0000, e.g. -0500
    if let Ok(parsed) = DateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QueryWindow {
    /// `None` when the start would fall outside chrono's range.
    pub fn ending_at(end: DateTime<Utc>, lookback: Duration) -> Option<Self> {
        let start = end.checked_sub_signed(lookback)?;
        Some(Self { start, end })
    }

    pub fn query(&self, log_group: &str, limit: i32) -> LogQuery {
        LogQuery {
            log_group: log_group.to_string(),
            start_time: self.start.timestamp_millis(),
            end_time: self.end.timestamp_millis(),
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_state_parsing() {
        assert_eq!(AlarmState::parse(Some("ALARM")), AlarmState::Alarm);
        assert_eq!(AlarmState::parse(Some("OK")), AlarmState::Ok);
        assert_eq!(
            AlarmState::parse(Some("INSUFFICIENT_DATA")),
            AlarmState::InsufficientData
        );
        assert_eq!(
            AlarmState::parse(Some("alarm")),
            AlarmState::Unknown("alarm".to_string())
        );
        assert_eq!(AlarmState::parse(None), AlarmState::Unknown(String::new()));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(AlarmState::Alarm.to_string(), "ALARM");
        assert_eq!(AlarmState::InsufficientData.to_string(), "INSUFFICIENT_DATA");
        assert_eq!(AlarmState::Unknown(String::new()).to_string(), "<missing>");
    }

    #[test]
    fn test_null_fields_are_absent() {
        let message: AlarmMessage = serde_json::from_value(json!({
            "AlarmName": "errors",
            "AlarmDescription": null,
            "Trigger": { "Dimensions": null }
        }))
        .unwrap();

        assert_eq!(message.alarm_name.as_deref(), Some("errors"));
        assert_eq!(message.alarm_description, None);
        assert!(message.dimensions().is_empty());
    }

    #[test]
    fn test_log_group_uses_first_function_name() {
        let message = AlarmMessage {
            trigger: Some(Trigger {
                dimensions: Some(vec![
                    Dimension::new("Resource", "svc-x:live"),
                    Dimension::new("FunctionName", "svc-x"),
                    Dimension::new("FunctionName", "svc-y"),
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(message.log_group().as_deref(), Some("/aws/lambda/svc-x"));
    }

    #[test]
    fn test_log_group_absent_without_function_name() {
        let message = AlarmMessage {
            trigger: Some(Trigger {
                dimensions: Some(vec![Dimension::new("QueueName", "jobs")]),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(message.log_group(), None);
        assert_eq!(AlarmMessage::default().log_group(), None);
    }

    #[test]
    fn test_parse_cloudwatch_offset() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        assert_eq!(
            parse_state_change_time("2024-01-01T12:00:00+0000"),
            Some(expected)
        );
        assert_eq!(
            parse_state_change_time("2024-01-01T12:00:00.000+0000"),
            Some(expected)
        );
        assert_eq!(
            parse_state_change_time("2024-01-01T12:00:00+00:00"),
            Some(expected)
        );
        assert_eq!(parse_state_change_time("2024-01-01T12:00:00"), Some(expected));
    }

    #[test]
    fn test_parse_other_offsets() {
        let parsed = parse_state_change_time("2024-01-01T14:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_compact_offsets() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        assert_eq!(
            parse_state_change_time("2024-01-01T17:30:00+0530"),
            Some(expected)
        );
        assert_eq!(
            parse_state_change_time("2024-01-01T07:00:00.000-0500"),
            Some(expected)
        );
    }

    #[test]
    fn test_window_start_before_min_date_uses_now() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
        let message = AlarmMessage {
            state_change_time: Some("-262143-01-01T00:02:00".to_string()),
            ..Default::default()
        };

        assert!(QueryWindow::ending_at(DateTime::<Utc>::MIN_UTC, Duration::minutes(5)).is_none());

        let window = message.query_window(now, Duration::minutes(5));
        assert_eq!(window.end, now);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2025, 6, 1, 8, 25, 0).unwrap());
    }

    #[test]
    fn test_query_window_from_state_change_time() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
        let message = AlarmMessage {
            state_change_time: Some("2024-01-01T12:00:00+0000".to_string()),
            ..Default::default()
        };

        let window = message.query_window(now, Duration::minutes(5));
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 1, 11, 55, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_state_change_time("yesterday"), None);
        assert_eq!(parse_state_change_time(""), None);
    }

    #[test]
    fn test_window_end_falls_back_to_now() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();

        let missing = AlarmMessage::default();
        assert_eq!(missing.window_end(now), now);

        let garbage = AlarmMessage {
            state_change_time: Some("not a time".to_string()),
            ..Default::default()
        };
        assert_eq!(garbage.window_end(now), now);
    }

    #[test]
    fn test_query_window() {
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let window = QueryWindow::ending_at(end, Duration::minutes(5)).unwrap();

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 1, 11, 55, 0).unwrap());

        let query = window.query("/aws/lambda/svc-x", 20);
        assert_eq!(query.log_group, "/aws/lambda/svc-x");
        assert_eq!(query.end_time, 1_704_110_400_000);
        assert_eq!(query.start_time, 1_704_110_100_000);
        assert_eq!(query.limit, 20);
    }

    #[test]
    fn test_envelope_with_string_message() {
        let envelope: NotificationEnvelope = serde_json::from_value(json!({
            "Records": [{
                "EventSource": "aws:sns",
                "Sns": {
                    "Type": "Notification",
                    "Message": "{\"AlarmName\":\"errors\",\"NewStateValue\":\"ALARM\"}"
                }
            }]
        }))
        .unwrap();

        let message = envelope.alarm_message().unwrap();
        assert_eq!(message.alarm_name.as_deref(), Some("errors"));
        assert_eq!(message.state(), AlarmState::Alarm);
    }

    #[test]
    fn test_envelope_with_inline_message() {
        let envelope: NotificationEnvelope = serde_json::from_value(json!({
            "Records": [{ "Sns": { "Message": { "NewStateValue": "OK" } } }]
        }))
        .unwrap();

        assert_eq!(envelope.alarm_message().unwrap().state(), AlarmState::Ok);
    }

    #[test]
    fn test_envelope_without_records() {
        let empty = NotificationEnvelope::default();
        assert_eq!(empty.alarm_message().unwrap(), AlarmMessage::default());

        let no_sns: NotificationEnvelope =
            serde_json::from_value(json!({ "Records": [{}] })).unwrap();
        assert_eq!(no_sns.alarm_message().unwrap(), AlarmMessage::default());
    }

    #[test]
    fn test_envelope_with_malformed_message() {
        let envelope: NotificationEnvelope = serde_json::from_value(json!({
            "Records": [{ "Sns": { "Message": "{not json" } }]
        }))
        .unwrap();

        assert!(envelope.alarm_message().is_err());
    }

    #[test]
    fn test_only_first_record_is_read() {
        let envelope: NotificationEnvelope = serde_json::from_value(json!({
            "Records": [
                { "Sns": { "Message": "{\"AlarmName\":\"first\"}" } },
                { "Sns": { "Message": "{\"AlarmName\":\"second\"}" } }
            ]
        }))
        .unwrap();

        assert_eq!(
            envelope.alarm_message().unwrap().alarm_name.as_deref(),
            Some("first")
        );
    }
}
