//! Inbound "mail received" notifications.
//!
//! The bridge is driven by SES receipt events. Only the fields the pipeline
//! acts on are read; everything else in the event is ignored.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::PipelineError;

/// One notification: a message landed in storage under `message_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    /// Storage key of the raw message. Records without one are skipped.
    pub message_id: Option<String>,
    pub event_source: String,
    pub event_version: String,
    /// Envelope sender as reported by SES.
    pub source: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Record carrying only a message id, for callers that already know the key.
    pub fn for_message(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            event_source: "aws:ses".to_string(),
            event_version: "1.0".to_string(),
            source: None,
            timestamp: None,
        }
    }
}

// ── SES wire shape ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SesEvent {
    #[serde(rename = "Records", default)]
    records: Vec<SesRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SesRecord {
    #[serde(default)]
    event_source: String,
    #[serde(default)]
    event_version: String,
    #[serde(default)]
    ses: Option<SesPayload>,
}

#[derive(Debug, Deserialize)]
struct SesPayload {
    #[serde(default)]
    mail: Option<SesMail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SesMail {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Parse an SES receipt event into notification records.
///
/// Only a payload that is not JSON (or not an object of the expected shape)
/// is an error. Missing per-record fields come through as `None`.
pub fn parse_ses_event(json: &str) -> Result<Vec<NotificationRecord>, PipelineError> {
    let event: SesEvent = serde_json::from_str(json)
        .map_err(|e| PipelineError::InvalidNotification(e.to_string()))?;

    Ok(event
        .records
        .into_iter()
        .map(|record| {
            let mail = record.ses.and_then(|ses| ses.mail);
            let (message_id, source, timestamp) = match mail {
                Some(mail) => (mail.message_id, mail.source, mail.timestamp),
                None => (None, None, None),
            };
            NotificationRecord {
                message_id: message_id.filter(|id| !id.trim().is_empty()),
                event_source: record.event_source,
                event_version: record.event_version,
                source,
                timestamp: timestamp
                    .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
                    .map(|ts| ts.with_timezone(&Utc)),
            }
        })
        .collect())
}

/// Supplies batches of notifications to the bridge.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn next_batch(&self) -> Result<Vec<NotificationRecord>, PipelineError>;
}

/// A fixed batch, typically one event read from a file or stdin.
#[derive(Debug, Clone, Default)]
pub struct StaticNotifications {
    records: Vec<NotificationRecord>,
}

impl StaticNotifications {
    pub fn new(records: Vec<NotificationRecord>) -> Self {
        Self { records }
    }

    pub fn from_ses_json(json: &str) -> Result<Self, PipelineError> {
        parse_ses_event(json).map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl NotificationSource for StaticNotifications {
    async fn next_batch(&self) -> Result<Vec<NotificationRecord>, PipelineError> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const SES_EVENT: &str = r#"{
        "Records": [
            {
                "eventSource": "aws:ses",
                "eventVersion": "1.0",
                "ses": {
                    "mail": {
                        "timestamp": "2024-03-05T10:15:30.123Z",
                        "source": "alice@example.com",
                        "messageId": "o3vrnil0e2ic28trm7dfhrc2v0clambda4nbp0g1",
                        "destination": ["bot@example.com"],
                        "commonHeaders": { "subject": "Hello" }
                    },
                    "receipt": {
                        "action": { "type": "S3", "bucketName": "inbox", "objectKey": "o3vrnil0e2ic28trm7dfhrc2v0clambda4nbp0g1" }
                    }
                }
            }
        ]
    }"#;

    #[test]
    fn parses_ses_receipt_record() {
        let records = parse_ses_event(SES_EVENT).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(
            record.message_id.as_deref(),
            Some("o3vrnil0e2ic28trm7dfhrc2v0clambda4nbp0g1")
        );
        assert_eq!(record.event_source, "aws:ses");
        assert_eq!(record.event_version, "1.0");
        assert_eq!(record.source.as_deref(), Some("alice@example.com"));
        assert_eq!(
            record.timestamp,
            Some(
                Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 30).unwrap()
                    + chrono::Duration::milliseconds(123)
            )
        );
    }

    #[test]
    fn record_without_mail_has_no_message_id() {
        let records = parse_ses_event(
            r#"{"Records":[{"eventSource":"aws:ses","ses":{}},{"eventSource":"aws:ses","ses":{"mail":{"messageId":"  "}}}]}"#,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.message_id.is_none()));
    }

    #[test]
    fn bad_timestamp_is_ignored() {
        let records = parse_ses_event(
            r#"{"Records":[{"ses":{"mail":{"messageId":"m1","timestamp":"yesterday"}}}]}"#,
        )
        .unwrap();
        assert_eq!(records[0].message_id.as_deref(), Some("m1"));
        assert!(records[0].timestamp.is_none());
    }

    #[test]
    fn empty_event_yields_no_records() {
        assert!(parse_ses_event("{}").unwrap().is_empty());
    }

    #[test]
    fn non_json_is_invalid_notification() {
        let err = parse_ses_event("not json").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidNotification(_)));
    }

    #[tokio::test]
    async fn static_source_yields_its_batch() {
        let source = StaticNotifications::from_ses_json(SES_EVENT).unwrap();
        assert_eq!(source.len(), 1);
        let batch = source.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
    }
}
