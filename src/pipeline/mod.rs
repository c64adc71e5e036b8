//! Inbound mail pipeline.
//!
//! 1. A [`NotificationSource`] yields records naming stored messages.
//! 2. [`MailBridge`] fetches each raw message from the [`BlobStore`](crate::storage::BlobStore).
//! 3. The MIME decoder extracts headers and text.
//! 4. A fresh conversation client sends the text to the assistant and
//!    returns its reply.

pub mod bridge;
pub mod notification;

pub use bridge::{BridgeReply, MailBridge};
pub use notification::{
    NotificationRecord, NotificationSource, StaticNotifications, parse_ses_event,
};
