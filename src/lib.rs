//! Chatterbox: pattern-routed message channels.
//!
//! Incoming messages from mail, chat, micro-blog and pub/sub channels
//! are matched against per-facet URI-style templates and dispatched to
//! handler closures, with optional per-sender conversations.

pub mod bots;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod template;

pub use error::{Error, Result};
