//! Client for an assistants-style conversation API.
//!
//! Threads hold the conversation, messages are posted to a thread, and a run
//! asks the assistant to respond. The run is polled until it finishes, then
//! the newest message is read back.

pub mod client;
pub mod transport;
pub mod types;

pub use client::{ConversationClient, SessionState, ThreadMode};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
pub use types::RunStatus;
