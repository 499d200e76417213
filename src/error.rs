//! Error types for chatterbox.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Malformed template or pattern, raised when a handler is registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Unterminated '{{' at offset {offset} in pattern {pattern:?}")]
    Unterminated { pattern: String, offset: usize },

    #[error("Invalid variable {chunk:?} in pattern {pattern:?}")]
    InvalidVariable { pattern: String, chunk: String },

    #[error("Constraint for variable {name} does not compile: {reason}")]
    InvalidConstraint { name: String, reason: String },

    #[error("Pattern {pattern:?} does not compile: {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

/// Errors raised by `Template::substitute`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstituteError {
    #[error("Value {value:?} does not match variable {name} with constraint {constraint}")]
    ConstraintViolation {
        name: String,
        value: String,
        constraint: String,
    },

    #[error("Template variable {name} has no matching value")]
    MissingVariable { name: String },
}

/// A bound value could not be converted to its parameter type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot convert {value:?} to {target}: {reason}")]
pub struct ConversionError {
    pub value: String,
    pub target: &'static str,
    pub reason: String,
}

/// Failure of a single handler invocation. Never escapes `dispatch`; it is
/// carried in the dispatch report instead.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("Handler {identity} parameter binding failed: {source}")]
    Conversion {
        identity: String,
        #[source]
        source: ConversionError,
    },

    #[error("Before-delivery hook refused handler {identity}: {reason}")]
    Delivery { identity: String, reason: String },

    #[error("Handler {identity} failed: {source}")]
    Handler {
        identity: String,
        #[source]
        source: anyhow::Error,
    },
}

impl InvocationError {
    /// Identity of the handler whose invocation failed.
    pub fn identity(&self) -> &str {
        match self {
            Self::Conversion { identity, .. }
            | Self::Delivery { identity, .. }
            | Self::Handler { identity, .. } => identity,
        }
    }
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Channel {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },

    #[error("Failed to send reply on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Mailbox error: {0}")]
    Mailbox(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for chatterbox.
pub type Result<T> = std::result::Result<T, Error>;
