//! Mail bridge: hands inbound email to a conversational assistant.

pub mod assistant;
pub mod config;
pub mod error;
pub mod mime;
pub mod pipeline;
pub mod storage;
