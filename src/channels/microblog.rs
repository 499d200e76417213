//! Micro-blog channel routed on `user` and `text`, with per-user
//! conversations.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

use crate::channels::ChannelAdapter;
use crate::dispatch::message::{TEXT, USER};
use crate::dispatch::{
    ContinuationStore, ConversationRouter, DispatchOutcome, Dispatcher, HandlerGroup, Message,
    Reply,
};
use crate::error::ChannelError;

/// One leading mention plus the whitespace after it.
static LEADING_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@?\w{1,15}\s+").unwrap());

/// An incoming post that mentions the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub user: String,
    pub text: String,
}

impl Post {
    pub fn new(id: impl Into<String>, user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user: user.into(),
            text: text.into(),
        }
    }
}

/// Publishes posts on behalf of the bot.
#[async_trait]
pub trait MicroblogPoster: Send + Sync {
    async fn post(&self, text: &str, in_reply_to: Option<&str>) -> Result<(), ChannelError>;
}

/// Routes posts through a [`ConversationRouter`] keyed by user and
/// posts the replies.
pub struct MicroblogAdapter {
    router: ConversationRouter,
    poster: Arc<dyn MicroblogPoster>,
    prefix_replies: bool,
}

impl MicroblogAdapter {
    pub fn new(
        dispatcher: Dispatcher,
        targets: Vec<Arc<HandlerGroup>>,
        poster: Arc<dyn MicroblogPoster>,
    ) -> Self {
        let mut router = ConversationRouter::new(dispatcher, USER);
        for group in targets {
            router.add_target(group);
        }
        Self {
            router,
            poster,
            prefix_replies: true,
        }
    }

    /// Allow or suppress the `@user` prefix on replies.
    pub fn with_prefix_replies(mut self, prefix_replies: bool) -> Self {
        self.prefix_replies = prefix_replies;
        self
    }

    pub fn with_store(mut self, store: Arc<ContinuationStore>) -> Self {
        self.router = self.router.with_store(store);
        self
    }

    pub fn store(&self) -> &Arc<ContinuationStore> {
        self.router.store()
    }

    /// Text to post for `reply` to `user`, if any.
    pub fn render_reply(&self, user: &str, reply: &Reply) -> Option<String> {
        let (text, prefix) = match reply {
            Reply::Nothing => return None,
            Reply::Text(text) => (text.as_str(), self.prefix_replies),
            Reply::Response(response) => (
                response.text()?,
                self.prefix_replies && response.prefix_reply(),
            ),
        };
        Some(if prefix {
            format!("@{user} {text}")
        } else {
            text.to_string()
        })
    }
}

#[async_trait]
impl ChannelAdapter for MicroblogAdapter {
    type Raw = Post;

    fn name(&self) -> &str {
        "microblog"
    }

    async fn deliver(&self, raw: Post) -> Result<Vec<DispatchOutcome>, ChannelError> {
        let text = normalize_text(&raw.text);
        info!(user = %raw.user, text = %text, "Post received");

        let message = Message::new("microblog")
            .with(USER, raw.user.as_str())
            .with(TEXT, text);
        let outcomes = self.router.route(&message);

        let posts: Vec<String> = outcomes
            .iter()
            .flat_map(DispatchOutcome::replies)
            .filter_map(|reply| self.render_reply(&raw.user, reply))
            .collect();
        for post in posts {
            if let Err(e) = self.poster.post(&post, Some(&raw.id)).await {
                warn!(user = %raw.user, error = %e, "Reply post failed");
            }
        }
        Ok(outcomes)
    }
}

/// Strip leading `@mention` tokens, one at a time, while the text
/// starts with `@`.
pub fn normalize_text(text: &str) -> &str {
    let mut rest = text;
    while rest.starts_with('@') {
        match LEADING_MENTION.find(rest) {
            Some(mention) => rest = &rest[mention.end()..],
            None => break,
        }
    }
    rest
}
