//! Cheers for favourite hashtags. Every matching tag gets its own reply.

use tracing::info;

use crate::dispatch::message::{TEXT, USER};
use crate::dispatch::{DescriptorBuilder, HandlerDescriptor, HandlerGroup, TargetType};

pub fn group() -> HandlerGroup {
    HandlerGroup::builder("hashtags")
        .invoke_all_matches(true)
        .handler(cheer("async", "#async all the way down"))
        .handler(cheer("rust", "#rust is awesome"))
        .handler(cheer("tokio", "#tokio is where the cool runtimes showcase"))
        .build()
}

fn cheer(tag: &'static str, reply: &'static str) -> DescriptorBuilder {
    HandlerDescriptor::builder(tag)
        .on(TEXT, format!(".*#{tag}.*"))
        .param(TEXT, TargetType::Text)
        .param(USER, TargetType::Text)
        .handle(move |args| {
            info!(tag, status = %args.text(0)?, user = %args.text(1)?, "New status");
            Ok(reply)
        })
}
