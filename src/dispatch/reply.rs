//! What a handler hands back to its channel.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::descriptor::HandlerGroup;

/// Result of a successful handler invocation.
#[derive(Debug, Clone, Default)]
pub enum Reply {
    /// Nothing to send. Ends any pending conversation.
    #[default]
    Nothing,
    /// Plain text reply. Ends any pending conversation.
    Text(String),
    /// Reply that may keep the conversation going.
    Response(Response),
}

impl Reply {
    /// Text to send, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Nothing => None,
            Self::Text(text) => Some(text),
            Self::Response(response) => response.text(),
        }
    }

    /// The continuation carried by this reply, if any.
    pub fn dialog(&self) -> Option<&Dialog> {
        match self {
            Self::Response(response) => response.dialog(),
            _ => None,
        }
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Self::Nothing
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

/// Which handler group takes the next message of a conversation.
#[derive(Clone)]
pub enum Dialog {
    /// Continue with this group.
    Group(Arc<HandlerGroup>),
    /// Continue with the group that produced the response.
    Current,
}

impl fmt::Debug for Dialog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(group) => f.debug_tuple("Group").field(&group.name()).finish(),
            Self::Current => f.write_str("Current"),
        }
    }
}

/// Conversational reply: a message plus an optional continuation.
#[derive(Debug, Clone)]
pub struct Response {
    prefix_reply: bool,
    message: Option<String>,
    dialog: Option<Dialog>,
}

impl Response {
    /// Start building a response carrying `message`.
    pub fn message(message: impl Into<String>) -> ResponseBuilder {
        ResponseBuilder::default().message(message)
    }

    /// Start building a response with no preset fields.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    pub fn prefix_reply(&self) -> bool {
        self.prefix_reply
    }

    /// Text to send, if any.
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }
}

/// Builder for [`Response`]. Replies are prefixed with the addressee by default.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    prefix_reply: bool,
    message: Option<String>,
    dialog: Option<Dialog>,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self {
            prefix_reply: true,
            message: None,
            dialog: None,
        }
    }
}

impl ResponseBuilder {
    pub fn prefix_reply(mut self, prefix_reply: bool) -> Self {
        self.prefix_reply = prefix_reply;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Route the sender's next message to `group`.
    pub fn dialog(mut self, group: Arc<HandlerGroup>) -> Self {
        self.dialog = Some(Dialog::Group(group));
        self
    }

    /// Route the sender's next message back to the current group.
    pub fn same_dialog(mut self) -> Self {
        self.dialog = Some(Dialog::Current);
        self
    }

    pub fn build(self) -> Response {
        Response {
            prefix_reply: self.prefix_reply,
            message: self.message,
            dialog: self.dialog,
        }
    }
}

impl From<ResponseBuilder> for Reply {
    fn from(builder: ResponseBuilder) -> Self {
        Self::Response(builder.build())
    }
}
