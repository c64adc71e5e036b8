//! The mail bridge: notification → raw message → decoded text → assistant reply.
//!
//! Notifications in a batch are handled one after another, each with its own
//! conversation client. The first fatal error ends the batch.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::notification::{NotificationRecord, NotificationSource};
use crate::assistant::{ConversationClient, HttpTransport, ThreadMode};
use crate::config::{AssistantConfig, PollPolicy};
use crate::error::PipelineError;
use crate::mime;
use crate::storage::BlobStore;

/// Bytes of the raw message shown in the debug preview.
const PREVIEW_BYTES: usize = 500;

/// The assistant's answer to one inbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeReply {
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub reply: String,
}

/// Drives inbound mail through decoding and the assistant.
pub struct MailBridge {
    blobs: Arc<dyn BlobStore>,
    transport: Arc<dyn HttpTransport>,
    assistant: AssistantConfig,
    bucket: String,
    poll: PollPolicy,
    conversation_timeout: Option<Duration>,
}

impl MailBridge {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        transport: Arc<dyn HttpTransport>,
        assistant: AssistantConfig,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            transport,
            assistant,
            bucket: bucket.into(),
            poll: PollPolicy::default(),
            conversation_timeout: None,
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Bound each conversation (post, run, poll, fetch) by `timeout`.
    pub fn with_conversation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.conversation_timeout = timeout;
        self
    }

    /// Pull one batch from `source` and process it.
    pub async fn run(
        &self,
        source: &dyn NotificationSource,
    ) -> Result<Vec<BridgeReply>, PipelineError> {
        let batch = source.next_batch().await?;
        self.process_batch(&batch).await
    }

    /// Process every record in order. Records without a message id, and
    /// emails without usable text, are skipped.
    pub async fn process_batch(
        &self,
        records: &[NotificationRecord],
    ) -> Result<Vec<BridgeReply>, PipelineError> {
        info!(count = records.len(), bucket = %self.bucket, "Processing notification batch");

        let mut replies = Vec::new();
        for record in records {
            let Some(message_id) = record.message_id.as_deref() else {
                warn!(
                    event_source = %record.event_source,
                    "Notification has no message id, skipping"
                );
                continue;
            };

            if let Some(reply) = self.process_message(record, message_id).await? {
                info!(
                    message_id = %reply.message_id,
                    subject = %reply.subject,
                    reply_len = reply.reply.len(),
                    "Assistant replied"
                );
                replies.push(reply);
            }
        }

        Ok(replies)
    }

    async fn process_message(
        &self,
        record: &NotificationRecord,
        message_id: &str,
    ) -> Result<Option<BridgeReply>, PipelineError> {
        info!(
            message_id,
            event_source = %record.event_source,
            event_version = %record.event_version,
            sender = record.source.as_deref().unwrap_or(""),
            "Fetching message"
        );

        let raw = self
            .blobs
            .get(&self.bucket, message_id)
            .await
            .map_err(|source| PipelineError::Fetch {
                message_id: message_id.to_string(),
                source,
            })?;
        debug!(
            message_id,
            size = raw.len(),
            preview = %String::from_utf8_lossy(&raw[..raw.len().min(PREVIEW_BYTES)]),
            "Raw message fetched"
        );

        let email = mime::decode(&raw).map_err(|source| PipelineError::Decode {
            message_id: message_id.to_string(),
            source,
        })?;
        info!(
            message_id,
            subject = %email.subject,
            from = %email.from,
            to = %email.to,
            attachments = email.attachments.len(),
            "Message decoded"
        );

        let Some(prompt) = email.prompt_text() else {
            warn!(message_id, "Message has no text content, skipping");
            return Ok(None);
        };

        let reply = self.converse(message_id, &prompt).await?;

        Ok(Some(BridgeReply {
            message_id: message_id.to_string(),
            subject: email.subject,
            from: email.from,
            reply,
        }))
    }

    async fn converse(&self, message_id: &str, prompt: &str) -> Result<String, PipelineError> {
        let conversation_failed = |source| PipelineError::Conversation {
            message_id: message_id.to_string(),
            source,
        };

        let mut client = ConversationClient::initialize(
            self.transport.clone(),
            self.assistant.clone(),
            ThreadMode::Create,
        )
        .await
        .map_err(conversation_failed)?;

        let conversation = client.converse(prompt, &self.poll);
        let outcome = match self.conversation_timeout {
            Some(deadline) => tokio::time::timeout(deadline, conversation)
                .await
                .map_err(|_| PipelineError::ConversationDeadline {
                    message_id: message_id.to_string(),
                    deadline,
                })?,
            None => conversation.await,
        };

        outcome.map_err(conversation_failed)
    }
}
