//! Knock-knock jokes, one dialog step at a time.

use std::sync::Arc;

use crate::dispatch::message::{TEXT, USER};
use crate::dispatch::{HandlerDescriptor, HandlerGroup, Response, TargetType};

pub const WHOS_THERE: &str = "Who's there?";
pub const LOUD: &str = "Not so loud, you're giving me a headache!";
pub const SELF_KNOCK: &str = "You know how knock knock jokes work, right?";
pub const BANANA: &str = "Orange you glad I didn't say Banana again.  Try again, who's there?";
pub const PUNCHLINE: &str = "Haha, lol. That's a good one, I'll have to remember that.";

/// Entry group: starts a joke when someone knocks.
pub fn group() -> HandlerGroup {
    let whos_there = Arc::new(whos_there(Arc::new(punchline())));

    HandlerGroup::builder("knock_knock")
        .handler(
            HandlerDescriptor::builder("knock_knock")
                .on(TEXT, ".*[Kk]nock(,? |-)[Kk]nock.*")
                .handle(move |_| Ok(Response::message(WHOS_THERE).dialog(Arc::clone(&whos_there)))),
        )
        .handler(
            HandlerDescriptor::builder("loud_knock")
                .on(TEXT, ".*KNOCK KNOCK.*")
                .handle(|_| Ok(LOUD)),
        )
        .build()
}

/// Second step: whoever is at the door.
fn whos_there(punchline: Arc<HandlerGroup>) -> HandlerGroup {
    HandlerGroup::builder("whos_there")
        .handler(
            HandlerDescriptor::builder("orange")
                .on(TEXT, "(?i)Banana")
                .handle(|_| Ok(Response::message(BANANA).same_dialog())),
        )
        .handler(
            HandlerDescriptor::builder("who")
                .on(TEXT, "{who}")
                .capture(TEXT, "who", TargetType::Text)
                .param(USER, TargetType::Text)
                .handle(move |args| {
                    let who = args.text(0)?;
                    if who == args.text(1)? {
                        return Ok(Response::message(SELF_KNOCK));
                    }
                    Ok(Response::message(format!("{who} who?")).dialog(Arc::clone(&punchline)))
                }),
        )
        .build()
}

/// Last step: whatever the answer, laugh.
fn punchline() -> HandlerGroup {
    HandlerGroup::builder("punchline")
        .handler(
            HandlerDescriptor::builder("punchline")
                .on(TEXT, "")
                .handle(|_| Ok(PUNCHLINE)),
        )
        .build()
}
