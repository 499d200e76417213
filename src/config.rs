//! Configuration types.

use std::str::FromStr;

use tracing::{Level, warn};

use crate::error::ConfigError;

pub const DELIVERY_LOG_LEVEL_VAR: &str = "CHATTERBOX_DELIVERY_LOG_LEVEL";
pub const PREFIX_REPLIES_VAR: &str = "CHATTERBOX_PREFIX_REPLIES";

/// Router-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Level at which each handler invocation is logged.
    pub delivery_log_level: Level,
    /// Whether channel replies may be prefixed with the addressee.
    /// A response can still opt out on its own.
    pub prefix_replies: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            delivery_log_level: Level::INFO,
            prefix_replies: true,
        }
    }
}

impl RouterConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(level) = lookup(DELIVERY_LOG_LEVEL_VAR) {
            config.delivery_log_level =
                Level::from_str(level.trim()).map_err(|e| ConfigError::InvalidValue {
                    key: DELIVERY_LOG_LEVEL_VAR.into(),
                    message: format!("{level:?}: {e}"),
                })?;
        }

        if let Some(raw) = lookup(PREFIX_REPLIES_VAR) {
            config.prefix_replies = parse_flag(PREFIX_REPLIES_VAR, &raw, config.prefix_replies);
        }

        Ok(config)
    }
}

/// Parse a boolean env value, keeping `default` (with a warning) when it
/// is not recognized.
pub(crate) fn parse_flag(key: &str, raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(key, value = %raw, default, "Unrecognized flag value, using default");
            default
        }
    }
}

/// Parse a numeric env value, keeping `default` (with a warning) when it
/// does not parse.
pub(crate) fn parse_or<T: FromStr + Copy + std::fmt::Display>(
    key: &str,
    raw: Option<String>,
    default: T,
) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, %default, "Unparseable value, using default");
            default
        }),
    }
}
