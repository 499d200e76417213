//! Mail channel: RFC 822 messages routed on `from`, `subject` and `body`.

use std::sync::Arc;

use async_trait::async_trait;
use mail_parser::{MessageParser, PartType};
use secrecy::SecretString;
use tracing::{debug, info};

use crate::channels::{ChannelAdapter, dispatch_to_targets};
use crate::config::parse_or;
use crate::dispatch::message::{BODY, FROM, SUBJECT};
use crate::dispatch::{DispatchOutcome, Dispatcher, HandlerGroup, Message};
use crate::error::{ChannelError, ConfigError};

// ── Configuration ───────────────────────────────────────────────────

/// Mail channel configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub username: String,
    pub password: SecretString,
    pub folder: String,
    pub poll_interval_secs: u64,
}

impl MailConfig {
    /// Build config from environment variables.
    /// Returns `Ok(None)` if `MAIL_IMAP_HOST` is not set (channel disabled).
    /// Once a host is set, the credentials are required.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let Some(imap_host) = lookup("MAIL_IMAP_HOST") else {
            return Ok(None);
        };
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        Ok(Some(Self {
            imap_host,
            imap_port: parse_or("MAIL_IMAP_PORT", lookup("MAIL_IMAP_PORT"), 993),
            username: required("MAIL_USERNAME")?,
            password: SecretString::from(required("MAIL_PASSWORD")?),
            folder: lookup("MAIL_FOLDER").unwrap_or_else(|| "INBOX".to_string()),
            poll_interval_secs: parse_or(
                "MAIL_POLL_INTERVAL_SECS",
                lookup("MAIL_POLL_INTERVAL_SECS"),
                5,
            ),
        }))
    }
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// An unseen message as fetched from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMail {
    /// Store-specific id used to mark the message seen.
    pub uid: String,
    /// Raw RFC 822 bytes.
    pub raw: Vec<u8>,
}

/// Message store the poller reads from. Calls may block; the poller runs
/// them on the blocking pool.
pub trait Mailbox: Send + Sync + 'static {
    /// Unseen messages, without marking them seen.
    fn fetch_unseen(&self) -> Result<Vec<FetchedMail>, ChannelError>;

    fn mark_seen(&self, uid: &str) -> Result<(), ChannelError>;
}

// ── Adapter ─────────────────────────────────────────────────────────

/// Routes parsed mail to its endpoint targets.
pub struct MailAdapter {
    dispatcher: Dispatcher,
    targets: Vec<Arc<HandlerGroup>>,
}

impl MailAdapter {
    pub fn new(dispatcher: Dispatcher, targets: Vec<Arc<HandlerGroup>>) -> Self {
        Self {
            dispatcher,
            targets,
        }
    }

    pub fn targets(&self) -> &[Arc<HandlerGroup>] {
        &self.targets
    }
}

#[async_trait]
impl ChannelAdapter for MailAdapter {
    type Raw = Vec<u8>;

    fn name(&self) -> &str {
        "mail"
    }

    async fn deliver(&self, raw: Vec<u8>) -> Result<Vec<DispatchOutcome>, ChannelError> {
        let message = parse_mail(&raw)?;
        info!(from = ?message.get(FROM), subject = ?message.get(SUBJECT), "Mail received");
        let outcomes = dispatch_to_targets(&self.dispatcher, &message, &self.targets);
        for text in super::reply_texts(&outcomes) {
            // Mail is inbound only; replies are recorded but not sent.
            debug!(reply = %text, "Dropping mail reply");
        }
        Ok(outcomes)
    }
}

// ── Parsing (public for testing) ────────────────────────────────────

/// Parse raw RFC 822 bytes into a mail [`Message`].
///
/// The body is the first `text/plain` part, else the first HTML part
/// with tags stripped, else empty.
pub fn parse_mail(raw: &[u8]) -> Result<Message, ChannelError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| ChannelError::InvalidMessage("not an RFC 822 message".into()))?;

    let mut message = Message::new("mail");
    if let Some(from) = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
    {
        message.insert(FROM, from);
    }
    if let Some(subject) = parsed.subject() {
        message.insert(SUBJECT, subject);
    }

    message.insert(BODY, extract_body(&parsed));

    Ok(message)
}

fn extract_body(parsed: &mail_parser::Message) -> String {
    let mut html = None;
    for part in &parsed.parts {
        match &part.body {
            PartType::Text(text) => return text.to_string(),
            PartType::Html(markup) if html.is_none() => html = Some(strip_html(markup)),
            _ => {}
        }
    }
    html.unwrap_or_default()
}

/// Strip HTML tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{HandlerDescriptor, TargetType};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const PLAIN: &str = "From: Ann <ann@example.com>\r\n\
        To: bot@example.com\r\n\
        Subject: a test message\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        Hello there\r\n";

    const HTML: &str = "From: bob@example.com\r\n\
        Subject: newsletter\r\n\
        Content-Type: text/html\r\n\
        \r\n\
        <html><body><p>Big</p><p>news</p></body></html>\r\n";

    #[test]
    fn extracts_facets_from_plain_mail() {
        let msg = parse_mail(PLAIN.as_bytes()).unwrap();
        assert_eq!(msg.channel, "mail");
        assert_eq!(msg.get(FROM), Some("ann@example.com"));
        assert_eq!(msg.get(SUBJECT), Some("a test message"));
        assert_eq!(msg.get(BODY).map(str::trim), Some("Hello there"));
    }

    #[test]
    fn html_only_body_is_stripped() {
        let msg = parse_mail(HTML.as_bytes()).unwrap();
        assert_eq!(msg.get(BODY), Some("Big news"));
    }

    #[test]
    fn strip_html_collapses_whitespace() {
        assert_eq!(strip_html("<b>hi</b>\n\n  <i>there</i>"), "hi there");
        assert_eq!(strip_html("no tags"), "no tags");
    }

    #[test]
    fn config_requires_host() {
        assert!(MailConfig::from_lookup(|_| None).unwrap().is_none());
    }

    #[test]
    fn config_with_host_requires_credentials() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MAIL_IMAP_HOST", "imap.example.com"),
            ("MAIL_USERNAME", "bot@example.com"),
        ]);
        let err = MailConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "MAIL_PASSWORD"));
    }

    #[test]
    fn config_defaults_and_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MAIL_IMAP_HOST", "imap.example.com"),
            ("MAIL_POLL_INTERVAL_SECS", "30"),
            ("MAIL_IMAP_PORT", "not-a-port"),
            ("MAIL_USERNAME", "bot@example.com"),
            ("MAIL_PASSWORD", "hunter2"),
        ]);
        let config = MailConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(config.imap_host, "imap.example.com");
        assert_eq!(config.imap_port, 993);
        assert_eq!(config.folder, "INBOX");
        assert_eq!(config.poll_interval_secs, 30);
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn delivers_to_matching_target() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let log = Arc::clone(&seen);
        let inbox = HandlerGroup::builder("inbox")
            .handler(
                HandlerDescriptor::builder("log-test")
                    .on(SUBJECT, ".*test.*")
                    .param(FROM, TargetType::Text)
                    .handle(move |args| {
                        log.lock().push(args.text(0)?.to_string());
                        Ok(())
                    }),
            )
            .build();

        let adapter = MailAdapter::new(Dispatcher::default(), vec![Arc::new(inbox)]);
        assert_eq!(adapter.name(), "mail");

        let outcomes = adapter.deliver(PLAIN.as_bytes().to_vec()).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(*seen.lock(), vec!["ann@example.com"]);

        let outcomes = adapter.deliver(HTML.as_bytes().to_vec()).await.unwrap();
        assert!(outcomes[0].is_no_match());
    }
}
