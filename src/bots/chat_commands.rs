//! Chat commands: echo, help and a greeting.

use crate::dispatch::message::BODY;
use crate::dispatch::{HandlerDescriptor, HandlerGroup, TargetType};

pub const HELP: &str = "Commands available\n\
    help - Displays this message\n\
    echo <text> - Echos the text\n\
    my name is <name> - greets the sender";

pub fn group() -> HandlerGroup {
    HandlerGroup::builder("chat_commands")
        .handler(
            HandlerDescriptor::builder("echo")
                .on(BODY, "echo {message:.*$}")
                .capture(BODY, "message", TargetType::Text)
                .handle(|args| Ok(args.text(0)?.to_string())),
        )
        .handler(
            HandlerDescriptor::builder("greet")
                .on(BODY, "my name is {name}")
                .capture(BODY, "name", TargetType::Text)
                .handle(|args| {
                    Ok(format!(
                        "Hello {}, it is very nice to meet you",
                        args.text(0)?
                    ))
                }),
        )
        .handler(
            HandlerDescriptor::builder("help")
                .on(BODY, "help")
                .handle(|_| Ok(HELP)),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::message::SENDER;
    use crate::dispatch::{Dispatcher, Message, Reply};

    fn reply(body: &str) -> Option<String> {
        let message = Message::new("chat").with(SENDER, "ann").with(BODY, body);
        let outcome = Dispatcher::default().dispatch(&message, &group());
        outcome
            .replies()
            .find_map(Reply::message)
            .map(str::to_string)
    }

    #[test]
    fn echo_keeps_slashes() {
        assert_eq!(reply("echo a/b c").as_deref(), Some("a/b c"));
    }

    #[test]
    fn greets_by_name() {
        assert_eq!(
            reply("my name is Ann").as_deref(),
            Some("Hello Ann, it is very nice to meet you")
        );
    }

    #[test]
    fn help_lists_commands() {
        assert!(reply("help").unwrap().starts_with("Commands available\nhelp"));
        assert_eq!(reply("helpme"), None);
    }
}
