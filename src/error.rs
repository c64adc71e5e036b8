//! Error types for the mail bridge.

use std::time::Duration;

use crate::assistant::SessionState;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// MIME decoding errors. All of these abort the whole message.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read email message: {0}")]
    Message(String),

    #[error("Message has no Content-Type header")]
    MissingContentType,

    #[error("Malformed Content-Type header: {0}")]
    MalformedContentType(String),

    #[error("Multipart message has no boundary parameter: {0}")]
    MissingBoundary(String),

    #[error("Failed to quoted-printable decode: {0}")]
    QuotedPrintable(String),
}

/// Failure reported by an [`HttpTransport`](crate::assistant::HttpTransport)
/// before any HTTP status was available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Failure descriptor shared by the assistant error variants that wrap an
/// HTTP exchange: transport failure, non-2xx status, or an undecodable body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Conversation client errors. Each one ends the current conversation attempt.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Thread could not be initialised: {0}")]
    Initialization(ApiFailure),

    #[error("Failed to add message to thread {thread_id}: {failure}")]
    MessagePost {
        thread_id: String,
        failure: ApiFailure,
    },

    #[error("Failed to start run on thread {thread_id}: {failure}")]
    RunStart {
        thread_id: String,
        failure: ApiFailure,
    },

    #[error("Run {run_id} failed: {details}")]
    RunFailed { run_id: String, details: String },

    #[error("Run {run_id} did not finish after {attempts} poll attempts")]
    PollTimeout { run_id: String, attempts: u32 },

    #[error("Failed to list messages on thread {thread_id}: {failure}")]
    ReplyFetch {
        thread_id: String,
        failure: ApiFailure,
    },

    #[error("No text content found in the latest message of thread {thread_id}")]
    NoReplyContent { thread_id: String },

    #[error("Thread {thread_id} is not ready for a new message (session is {state:?})")]
    SessionNotReady {
        thread_id: String,
        state: SessionState,
    },
}

/// Blob store errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Failed to fetch {bucket}/{key}: {reason}")]
    Transport {
        bucket: String,
        key: String,
        reason: String,
    },
}

/// Orchestration errors. Each names the stage that failed and the message it
/// was working on.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to fetch message {message_id}: {source}")]
    Fetch {
        message_id: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to decode message {message_id}: {source}")]
    Decode {
        message_id: String,
        #[source]
        source: ParseError,
    },

    #[error("Conversation failed for message {message_id}: {source}")]
    Conversation {
        message_id: String,
        #[source]
        source: AssistantError,
    },

    #[error("Conversation for message {message_id} exceeded deadline of {deadline:?}")]
    ConversationDeadline {
        message_id: String,
        deadline: Duration,
    },

    #[error("Invalid notification payload: {0}")]
    InvalidNotification(String),
}
