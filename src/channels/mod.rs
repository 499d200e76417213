//! Channel adapters.
//!
//! Each adapter turns a native message into a [`Message`] with the
//! channel's facets and hands it to the dispatcher. Protocol clients
//! (mailbox, chat connection, micro-blog API) are traits so adapters can
//! be driven by test fakes.

pub mod chat;
pub mod cli;
pub mod imap;
pub mod mail;
pub mod mail_poller;
pub mod microblog;
pub mod pubsub;

use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::{DispatchOutcome, Dispatcher, HandlerGroup, Message};
use crate::error::ChannelError;

pub use chat::{ChatAdapter, ChatMessage, ChatReplier};
pub use cli::CliChannel;
pub use imap::ImapMailbox;
pub use mail::{FetchedMail, MailAdapter, MailConfig, Mailbox};
pub use mail_poller::spawn_mail_poller;
pub use microblog::{MicroblogAdapter, MicroblogPoster, Post};
pub use pubsub::{PubSubAdapter, PubSubConfig, PubSubEnvelope};

/// A source of native messages routed through handler groups.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Native message type accepted by [`deliver`](Self::deliver).
    type Raw: Send + 'static;

    /// Channel name (e.g. "mail", "chat").
    fn name(&self) -> &str;

    /// Convert and dispatch one native message, then send any replies.
    async fn deliver(&self, raw: Self::Raw) -> Result<Vec<DispatchOutcome>, ChannelError>;
}

/// Dispatch `message` to every target; each one reports its own outcome.
pub fn dispatch_to_targets(
    dispatcher: &Dispatcher,
    message: &Message,
    targets: &[Arc<HandlerGroup>],
) -> Vec<DispatchOutcome> {
    targets
        .iter()
        .map(|group| dispatcher.dispatch(message, group))
        .collect()
}

/// Text of every reply in `outcomes`, in dispatch order.
pub fn reply_texts(outcomes: &[DispatchOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .flat_map(DispatchOutcome::replies)
        .filter_map(|reply| reply.message().map(str::to_string))
        .collect()
}
