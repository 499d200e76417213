//! Logs mail whose subject mentions "test".

use tracing::info;

use crate::dispatch::message::{BODY, FROM, SUBJECT};
use crate::dispatch::{HandlerDescriptor, HandlerGroup, TargetType};

pub fn group() -> HandlerGroup {
    HandlerGroup::builder("inbox")
        .handler(
            HandlerDescriptor::builder("log_message")
                .on(SUBJECT, ".*test.*")
                .param(FROM, TargetType::Text)
                .param(SUBJECT, TargetType::Text)
                .param(BODY, TargetType::Text)
                .handle(|args| {
                    info!(from = %args.text(0)?, subject = %args.text(1)?, "Message received");
                    info!(body = %args.text(2)?, "Message body");
                    Ok(())
                }),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Dispatcher, Message};

    #[test]
    fn only_test_subjects_match() {
        let group = group();
        let hit = Message::new("mail")
            .with(FROM, "ann@example.com")
            .with(SUBJECT, "a test")
            .with(BODY, "hi");
        let miss = Message::new("mail").with(SUBJECT, "invoice");

        let outcome = Dispatcher::default().dispatch(&hit, &group);
        assert_eq!(outcome.identities(), vec!["log_message"]);
        assert_eq!(outcome.failures().count(), 0);
        assert!(Dispatcher::default().dispatch(&miss, &group).is_no_match());
    }
}
