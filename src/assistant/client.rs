//! Conversation client: one assistant thread, one request/reply at a time.
//!
//! A client only exists once its thread is ready, either freshly created on
//! the server or adopted from a caller-supplied id. Each
//! [`converse`](ConversationClient::converse) call walks
//! `ThreadReady → MessagePosted → RunStarted → {RunCompleted, RunFailed, RunTimedOut}`.
//!
//! Polling is fixed-interval with no back-off. The client is not meant to be
//! shared between concurrent callers; give each conversation its own.

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::transport::{ApiRequest, HttpTransport};
use super::types::{ApiErrorBody, MessageList, RunObject, RunStatus, ThreadObject};
use crate::config::{AssistantConfig, PollPolicy};
use crate::error::{ApiFailure, AssistantError};

const BETA_HEADER: &str = "openai-beta";
const BETA_VERSION: &str = "assistants=v2";

/// How the session obtains its thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadMode {
    /// Create a fresh thread on the server.
    Create,
    /// Reuse an existing thread id without a network call. An empty id
    /// falls back to [`ThreadMode::Create`].
    Adopt(String),
}

/// Where the session is in the request/reply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    ThreadReady,
    MessagePosted,
    RunStarted,
    RunCompleted,
    RunFailed,
    RunTimedOut,
}

/// Client for a single assistant conversation thread.
pub struct ConversationClient {
    transport: Arc<dyn HttpTransport>,
    authorization: HeaderValue,
    assistant_id: String,
    thread_id: String,
    run_id: Option<String>,
    state: SessionState,
    suppress_logging: bool,
}

impl std::fmt::Debug for ConversationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationClient")
            .field("assistant_id", &self.assistant_id)
            .field("thread_id", &self.thread_id)
            .field("run_id", &self.run_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ConversationClient {
    /// Open a session, creating a server-side thread unless one is adopted.
    pub async fn initialize(
        transport: Arc<dyn HttpTransport>,
        config: AssistantConfig,
        mode: ThreadMode,
    ) -> Result<Self, AssistantError> {
        let suppress_logging = config.suppress_logging;
        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret())).map_err(
                |_| {
                    report(
                        suppress_logging,
                        "",
                        AssistantError::Initialization(ApiFailure::Transport(
                            "credential contains characters not allowed in a header".into(),
                        )),
                    )
                },
            )?;
        authorization.set_sensitive(true);

        let mut client = Self {
            transport,
            authorization,
            assistant_id: config.assistant_id,
            thread_id: String::new(),
            run_id: None,
            state: SessionState::ThreadReady,
            suppress_logging,
        };

        match mode {
            ThreadMode::Adopt(thread_id) if !thread_id.is_empty() => {
                debug!(thread_id = %thread_id, "Adopting existing assistant thread");
                client.thread_id = thread_id;
            }
            _ => {
                client.thread_id = client
                    .create_thread()
                    .await
                    .map_err(|failure| client.report(AssistantError::Initialization(failure)))?;
                info!(thread_id = %client.thread_id, "Assistant thread created");
            }
        }

        Ok(client)
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Id of the most recently started run, if any run has started.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Swap the assistant used for subsequent runs.
    pub fn set_assistant_id(&mut self, assistant_id: impl Into<String>) {
        self.assistant_id = assistant_id.into();
    }

    /// Replace the session's thread with a freshly created one. On failure
    /// the current thread is kept.
    pub async fn reset_thread(&mut self) -> Result<(), AssistantError> {
        let thread_id = self
            .create_thread()
            .await
            .map_err(|failure| self.report(AssistantError::Initialization(failure)))?;
        info!(old = %self.thread_id, new = %thread_id, "Assistant thread reset");
        self.thread_id = thread_id;
        self.run_id = None;
        self.state = SessionState::ThreadReady;
        Ok(())
    }

    /// Post `prompt` as a user message, run the assistant, and wait for the
    /// reply text.
    ///
    /// Only a fresh thread or one whose last run completed accepts a new
    /// message. After any failure the thread may still hold an active run;
    /// call [`reset_thread`](Self::reset_thread) to continue.
    pub async fn converse(
        &mut self,
        prompt: &str,
        policy: &PollPolicy,
    ) -> Result<String, AssistantError> {
        if !matches!(
            self.state,
            SessionState::ThreadReady | SessionState::RunCompleted
        ) {
            return Err(self.report(AssistantError::SessionNotReady {
                thread_id: self.thread_id.clone(),
                state: self.state,
            }));
        }
        self.post_message(prompt).await?;
        let run_id = self.start_run().await?;
        self.await_run(&run_id, policy).await
    }

    /// Text of the newest message on the thread.
    pub async fn fetch_latest_reply(&self) -> Result<String, AssistantError> {
        let request = self.request(
            Method::GET,
            format!("/v1/threads/{}/messages", self.thread_id),
            None,
        );
        let list: MessageList = self.exchange(request).await.map_err(|failure| {
            self.report(AssistantError::ReplyFetch {
                thread_id: self.thread_id.clone(),
                failure,
            })
        })?;

        list.data
            .first()
            .and_then(|message| message.first_text())
            .map(str::to_string)
            .ok_or_else(|| {
                self.report(AssistantError::NoReplyContent {
                    thread_id: self.thread_id.clone(),
                })
            })
    }

    async fn create_thread(&self) -> Result<String, ApiFailure> {
        let request = self.request(Method::POST, "/v1/threads".into(), Some(json!({})));
        let thread: ThreadObject = self.exchange(request).await?;
        Ok(thread.id)
    }

    async fn post_message(&mut self, prompt: &str) -> Result<(), AssistantError> {
        let request = self.request(
            Method::POST,
            format!("/v1/threads/{}/messages", self.thread_id),
            Some(json!({ "role": "user", "content": prompt })),
        );
        // The response body is the created message; only success matters.
        self.exchange::<serde_json::Value>(request)
            .await
            .map_err(|failure| {
                self.report(AssistantError::MessagePost {
                    thread_id: self.thread_id.clone(),
                    failure,
                })
            })?;

        self.state = SessionState::MessagePosted;
        Ok(())
    }

    async fn start_run(&mut self) -> Result<String, AssistantError> {
        let request = self.request(
            Method::POST,
            format!("/v1/threads/{}/runs", self.thread_id),
            Some(json!({ "assistant_id": self.assistant_id })),
        );
        let run: RunObject = self.exchange(request).await.map_err(|failure| {
            self.report(AssistantError::RunStart {
                thread_id: self.thread_id.clone(),
                failure,
            })
        })?;

        debug!(thread_id = %self.thread_id, run_id = %run.id, "Run started");
        self.run_id = Some(run.id.clone());
        self.state = SessionState::RunStarted;
        Ok(run.id)
    }

    /// Poll `run_id` until it reaches a terminal state or the policy's
    /// attempts run out. Every attempt that does not end the loop is
    /// followed by exactly one wait.
    async fn await_run(
        &mut self,
        run_id: &str,
        policy: &PollPolicy,
    ) -> Result<String, AssistantError> {
        let path = format!("/v1/threads/{}/runs/{}", self.thread_id, run_id);

        for attempt in 1..=policy.max_attempts {
            let request = self.request(Method::GET, path.clone(), None);
            match self.exchange::<RunObject>(request).await {
                Ok(run) => match run.status {
                    RunStatus::Completed => {
                        debug!(run_id = %run_id, attempt, "Run completed");
                        self.state = SessionState::RunCompleted;
                        return self.fetch_latest_reply().await;
                    }
                    RunStatus::Failed => {
                        self.state = SessionState::RunFailed;
                        let details = run
                            .last_error
                            .map(|e| format!("{}: {}", e.code, e.message))
                            .unwrap_or_else(|| "no error details".to_string());
                        return Err(self.report(AssistantError::RunFailed {
                            run_id: run_id.to_string(),
                            details,
                        }));
                    }
                    status => {
                        debug!(run_id = %run_id, attempt, status = ?status, "Run not finished yet");
                    }
                },
                Err(failure) => {
                    if !self.suppress_logging {
                        warn!(run_id = %run_id, attempt, error = %failure, "Run status poll failed, retrying");
                    }
                }
            }

            if !policy.interval.is_zero() {
                tokio::time::sleep(policy.interval).await;
            }
        }

        self.state = SessionState::RunTimedOut;
        Err(self.report(AssistantError::PollTimeout {
            run_id: run_id.to_string(),
            attempts: policy.max_attempts,
        }))
    }

    fn request(&self, method: Method, path: String, body: Option<serde_json::Value>) -> ApiRequest {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.authorization.clone());
        headers.insert(
            HeaderName::from_static(BETA_HEADER),
            HeaderValue::from_static(BETA_VERSION),
        );
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        ApiRequest {
            method,
            path,
            headers,
            body,
        }
    }

    /// Send a request and decode a 2xx JSON body into `T`.
    async fn exchange<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiFailure> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ApiFailure::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(ApiFailure::Status {
                status: response.status,
                message: ApiErrorBody::describe(&response.body),
            });
        }

        serde_json::from_str(&response.body)
            .map_err(|e| ApiFailure::Decode(format!("{e}; body: {}", response.body)))
    }

    fn report(&self, err: AssistantError) -> AssistantError {
        report(self.suppress_logging, &self.thread_id, err)
    }
}

/// Log `err` unless suppressed, then hand it back for propagation.
fn report(suppress_logging: bool, thread_id: &str, err: AssistantError) -> AssistantError {
    if !suppress_logging {
        error!(thread_id = %thread_id, error = %err, "Assistant error");
    }
    err
}
