//! Instant-messaging channel routed on `sender` and `body`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::channels::{ChannelAdapter, dispatch_to_targets, reply_texts};
use crate::dispatch::message::{BODY, SENDER};
use crate::dispatch::{DispatchOutcome, Dispatcher, HandlerGroup, Message};
use crate::error::ChannelError;

/// An incoming chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    /// `None` for presence or typing notifications.
    pub body: Option<String>,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: Some(body.into()),
        }
    }
}

/// Sends text back to a chat participant.
#[async_trait]
pub trait ChatReplier: Send + Sync {
    async fn send(&self, to: &str, text: &str) -> Result<(), ChannelError>;
}

/// Routes chat messages and sends handler replies back to the sender.
pub struct ChatAdapter {
    dispatcher: Dispatcher,
    targets: Vec<Arc<HandlerGroup>>,
    replier: Arc<dyn ChatReplier>,
}

impl ChatAdapter {
    pub fn new(
        dispatcher: Dispatcher,
        targets: Vec<Arc<HandlerGroup>>,
        replier: Arc<dyn ChatReplier>,
    ) -> Self {
        Self {
            dispatcher,
            targets,
            replier,
        }
    }
}

#[async_trait]
impl ChannelAdapter for ChatAdapter {
    type Raw = ChatMessage;

    fn name(&self) -> &str {
        "chat"
    }

    async fn deliver(&self, raw: ChatMessage) -> Result<Vec<DispatchOutcome>, ChannelError> {
        let body = match raw.body.as_deref() {
            Some(body) if !body.is_empty() => body,
            _ => {
                debug!(sender = %raw.sender, "Ignoring chat message without body");
                return Ok(Vec::new());
            }
        };

        let message = Message::new("chat")
            .with(SENDER, raw.sender.as_str())
            .with(BODY, body);
        let outcomes = dispatch_to_targets(&self.dispatcher, &message, &self.targets);

        for text in reply_texts(&outcomes) {
            if let Err(e) = self.replier.send(&raw.sender, &text).await {
                warn!(to = %raw.sender, error = %e, "Chat reply failed");
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{HandlerDescriptor, TargetType};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingReplier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatReplier for RecordingReplier {
        async fn send(&self, to: &str, text: &str) -> Result<(), ChannelError> {
            self.sent.lock().push((to.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn adapter(replier: Arc<RecordingReplier>) -> ChatAdapter {
        let greeter = HandlerGroup::builder("greeter")
            .handler(
                HandlerDescriptor::builder("greet")
                    .on(BODY, "hi")
                    .param(SENDER, TargetType::Text)
                    .handle(|args| Ok(format!("hello {}", args.text(0)?))),
            )
            .build();
        ChatAdapter::new(Dispatcher::default(), vec![Arc::new(greeter)], replier)
    }

    #[tokio::test]
    async fn replies_to_sender() {
        let replier = Arc::new(RecordingReplier::default());
        let adapter = adapter(replier.clone());

        let outcomes = adapter.deliver(ChatMessage::new("ann", "hi")).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            *replier.sent.lock(),
            vec![("ann".to_string(), "hello ann".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_or_absent_body_is_ignored() {
        let replier = Arc::new(RecordingReplier::default());
        let adapter = adapter(replier.clone());

        let empty = adapter.deliver(ChatMessage::new("ann", "")).await.unwrap();
        let absent = adapter
            .deliver(ChatMessage {
                sender: "ann".into(),
                body: None,
            })
            .await
            .unwrap();
        assert!(empty.is_empty());
        assert!(absent.is_empty());
        assert!(replier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn unmatched_message_sends_nothing() {
        let replier = Arc::new(RecordingReplier::default());
        let adapter = adapter(replier.clone());

        let outcomes = adapter.deliver(ChatMessage::new("ann", "bye")).await.unwrap();
        assert!(outcomes[0].is_no_match());
        assert!(replier.sent.lock().is_empty());
    }
}
