//! Sample handler groups.
//!
//! These double as usage examples for the builder API and as fixtures
//! for the integration tests.

pub mod chat_commands;
pub mod hashtags;
pub mod inbox;
pub mod knock_knock;
pub mod math_wiz;
