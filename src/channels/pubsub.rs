//! Publish/subscribe channel routed on `subject` and `body`.
//!
//! The client speaks a small JSON protocol over one WebSocket connection.
//! It sends `{"op":"subscribe","subject":"..."}` once, then receives one
//! `{"subject":"...","body":"..."}` envelope per text frame. Outbound
//! messages go over the same connection as
//! `{"op":"publish","subject":"...","body":"..."}`.

use std::pin::pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use futures::stream::SplitSink;
use futures::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::channels::{ChannelAdapter, dispatch_to_targets, reply_texts};
use crate::dispatch::message::{BODY, SUBJECT};
use crate::dispatch::{DispatchOutcome, Dispatcher, HandlerGroup, Message};
use crate::error::ChannelError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Frame>;

// ── Configuration ───────────────────────────────────────────────────

/// Pub/sub channel configuration, built from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubConfig {
    pub url: String,
    pub subject: String,
    /// Where handler replies are published. Replies are dropped when unset.
    pub reply_subject: Option<String>,
}

impl PubSubConfig {
    /// Build config from environment variables.
    /// Returns `None` if `PUBSUB_URL` is not set (channel disabled).
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let url = lookup("PUBSUB_URL")?;
        let subject = lookup("PUBSUB_SUBJECT").unwrap_or_else(|| "chatterbox".to_string());
        // Publishing replies to the subscribed subject would feed them back in.
        let reply_subject = lookup("PUBSUB_REPLY_SUBJECT").filter(|reply| {
            let distinct = *reply != subject;
            if !distinct {
                warn!(subject = %reply, "Reply subject equals subscribed subject, replies disabled");
            }
            distinct
        });

        Some(Self {
            url,
            subject,
            reply_subject,
        })
    }
}

// ── Wire format ─────────────────────────────────────────────────────

/// A published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubSubEnvelope {
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    op: &'static str,
    subject: &'a str,
}

#[derive(Serialize)]
struct PublishRequest<'a> {
    op: &'static str,
    subject: &'a str,
    body: &'a str,
}

// ── Connection ──────────────────────────────────────────────────────

/// Sending half of a broker connection. Clones share the connection.
#[derive(Clone)]
pub struct Publisher {
    sink: Arc<Mutex<WsSink>>,
}

impl Publisher {
    /// Publish `body` on `subject`.
    pub async fn publish(&self, subject: &str, body: &str) -> Result<(), ChannelError> {
        let request = serde_json::to_string(&PublishRequest {
            op: "publish",
            subject,
            body,
        })
        .map_err(|e| ChannelError::InvalidMessage(e.to_string()))?;

        self.sink
            .lock()
            .await
            .send(Frame::Text(request.into()))
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "pubsub".into(),
                reason: e.to_string(),
            })?;
        trace!(subject, "Published");
        Ok(())
    }
}

/// Connect to the broker and subscribe to the configured subject.
///
/// Returns a [`Publisher`] on the same connection together with the
/// subscription. Frames that are not envelopes, or that carry another
/// subject, are skipped. The subscription ends when the connection
/// closes; a read failure is yielded once as `Disconnected` and ends it.
pub async fn connect(
    config: PubSubConfig,
) -> Result<
    (
        Publisher,
        impl Stream<Item = Result<PubSubEnvelope, ChannelError>>,
    ),
    ChannelError,
> {
    info!(url = %config.url, subject = %config.subject, "Subscribing");

    let (mut ws, _response) =
        connect_async(config.url.as_str())
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "pubsub".into(),
                reason: format!("WebSocket connection failed: {e}"),
            })?;

    let request = serde_json::to_string(&SubscribeRequest {
        op: "subscribe",
        subject: &config.subject,
    })
    .map_err(|e| ChannelError::InvalidMessage(e.to_string()))?;
    ws.send(Frame::Text(request.into()))
        .await
        .map_err(|e| ChannelError::StartupFailed {
            name: "pubsub".into(),
            reason: format!("subscribe failed: {e}"),
        })?;

    let (sink, frames) = ws.split();
    let publisher = Publisher {
        sink: Arc::new(Mutex::new(sink)),
    };

    let subject = config.subject;
    let envelopes = frames
        .scan(false, move |failed, frame| {
            if *failed {
                return future::ready(None);
            }
            let item = match frame {
                Ok(Frame::Text(text)) => decode_envelope(text.as_str(), &subject).map(Ok),
                Ok(other) => {
                    trace!(kind = ?other, "Ignoring non-text frame");
                    None
                }
                Err(e) => {
                    *failed = true;
                    Some(Err(ChannelError::Disconnected {
                        name: "pubsub".into(),
                        reason: e.to_string(),
                    }))
                }
            };
            future::ready(Some(item))
        })
        .filter_map(future::ready);

    Ok((publisher, envelopes))
}

/// Parse one text frame, keeping it only if it is for `subject`.
pub fn decode_envelope(text: &str, subject: &str) -> Option<PubSubEnvelope> {
    match serde_json::from_str::<PubSubEnvelope>(text) {
        Ok(envelope) if envelope.subject == subject => Some(envelope),
        Ok(envelope) => {
            debug!(subject = %envelope.subject, "Ignoring message for another subject");
            None
        }
        Err(e) => {
            warn!(error = %e, "Malformed pub/sub frame");
            None
        }
    }
}

// ── Adapter ─────────────────────────────────────────────────────────

/// Routes published messages to their endpoint targets.
pub struct PubSubAdapter {
    dispatcher: Dispatcher,
    targets: Vec<Arc<HandlerGroup>>,
    replies: Option<(Publisher, String)>,
}

impl PubSubAdapter {
    pub fn new(dispatcher: Dispatcher, targets: Vec<Arc<HandlerGroup>>) -> Self {
        Self {
            dispatcher,
            targets,
            replies: None,
        }
    }

    /// Publish handler replies on `subject` instead of dropping them.
    pub fn with_replies(mut self, publisher: Publisher, subject: impl Into<String>) -> Self {
        self.replies = Some((publisher, subject.into()));
        self
    }

    /// Deliver every envelope from `stream` until it ends or reports a
    /// disconnect. Returns how many were delivered.
    pub async fn pump(
        &self,
        stream: impl Stream<Item = Result<PubSubEnvelope, ChannelError>>,
    ) -> usize {
        let mut stream = pin!(stream);
        let mut delivered = 0;
        while let Some(next) = stream.next().await {
            let envelope = match next {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(error = %e, "Subscription lost");
                    break;
                }
            };
            match self.deliver(envelope).await {
                Ok(_) => delivered += 1,
                Err(e) => warn!(error = %e, "Pub/sub delivery failed"),
            }
        }
        info!(delivered, "Subscription ended");
        delivered
    }
}

#[async_trait]
impl ChannelAdapter for PubSubAdapter {
    type Raw = PubSubEnvelope;

    fn name(&self) -> &str {
        "pubsub"
    }

    async fn deliver(&self, raw: PubSubEnvelope) -> Result<Vec<DispatchOutcome>, ChannelError> {
        let message = Message::new("pubsub")
            .with(SUBJECT, raw.subject)
            .with(BODY, raw.body);
        let outcomes = dispatch_to_targets(&self.dispatcher, &message, &self.targets);

        for text in reply_texts(&outcomes) {
            match &self.replies {
                Some((publisher, subject)) => {
                    if let Err(e) = publisher.publish(subject, &text).await {
                        warn!(subject = %subject, error = %e, "Reply publish failed");
                    }
                }
                None => debug!(reply = %text, "Dropping pub/sub reply"),
            }
        }
        Ok(outcomes)
    }
}
