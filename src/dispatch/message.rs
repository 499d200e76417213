//! Faceted inbound message.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

// ── Facet names ─────────────────────────────────────────────────────

/// Mail sender address list.
pub const FROM: &str = "from";
/// Chat participant or generic sender handle.
pub const SENDER: &str = "sender";
/// Mail subject or pub/sub subject.
pub const SUBJECT: &str = "subject";
/// Message body text.
pub const BODY: &str = "body";
/// Micro-blog screen name.
pub const USER: &str = "user";
/// Micro-blog post text, mentions stripped.
pub const TEXT: &str = "text";

// ── Message ─────────────────────────────────────────────────────────

/// An inbound message decomposed into named text facets.
///
/// Channel adapters build one of these per delivery. Facets that were
/// not supplied are absent, which is distinct from an empty value.
#[derive(Debug, Clone)]
pub struct Message {
    /// Generated id, used to correlate log lines.
    pub id: Uuid,
    /// Source channel: "mail", "chat", "microblog", "pubsub", "cli".
    pub channel: String,
    /// When the adapter received the message.
    pub received_at: DateTime<Utc>,
    facets: BTreeMap<String, String>,
}

impl Message {
    /// Create an empty message for `channel`.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            received_at: Utc::now(),
            facets: BTreeMap::new(),
        }
    }

    /// Builder-style facet setter.
    pub fn with(mut self, facet: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(facet, value);
        self
    }

    /// Set or replace a facet value.
    pub fn insert(&mut self, facet: impl Into<String>, value: impl Into<String>) {
        self.facets.insert(facet.into(), value.into());
    }

    /// Value of `facet`, if present.
    pub fn get(&self, facet: &str) -> Option<&str> {
        self.facets.get(facet).map(String::as_str)
    }

    /// All facets in name order.
    pub fn facets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.facets.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.channel)?;
        for (i, (name, value)) in self.facets.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value:?}")?;
        }
        f.write_str("}")
    }
}
