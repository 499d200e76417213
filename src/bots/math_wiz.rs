//! Answers arithmetic questions posted to the micro-blog channel.

use crate::dispatch::message::TEXT;
use crate::dispatch::{DescriptorBuilder, HandlerDescriptor, HandlerGroup, TargetType};

/// Build the math group.
///
/// "what is 2 x 2" matches both `2_times_2` and `times`; only the first
/// in identity order runs, so the digit-prefixed special cases win.
pub fn group() -> HandlerGroup {
    HandlerGroup::builder("math_wiz")
        .handler(
            HandlerDescriptor::builder("2_times_2")
                .on(TEXT, "what is 2 ?[*x] ?2")
                .handle(|_| Ok("The same thing as 2 + 2")),
        )
        .handler(
            HandlerDescriptor::builder("2_plus_2")
                .on(TEXT, "what is 2 ?+ ?2")
                .handle(|_| Ok("The same thing as 2 x 2")),
        )
        .handler(binary("times", "what is {a} ?[*x] ?{b}", times))
        .handler(binary("times_words", "what is {a} times {b}", times))
        .handler(binary("plus", "what is {a} ?+ ?{b}", plus))
        .handler(binary("plus_words", "what is {a} plus {b}", plus))
        .handler(binary("minus", "what is {a} ?- ?{b}", minus))
        .handler(binary("minus_words", "what is {a} minus {b}", minus))
        .handler(binary("divided", "what is {a} ?/ ?{b}", divided))
        .handler(binary("divided_words", "what is {a} divided by {b}", divided))
        .build()
}

/// A handler taking the integer captures `a` and `b`.
fn binary(
    identity: &str,
    pattern: &str,
    op: fn(i32, i32) -> anyhow::Result<String>,
) -> DescriptorBuilder {
    HandlerDescriptor::builder(identity)
        .on(TEXT, pattern)
        .capture(TEXT, "a", TargetType::Int)
        .capture(TEXT, "b", TargetType::Int)
        .handle(move |args| op(args.int(0)?, args.int(1)?))
}

fn times(a: i32, b: i32) -> anyhow::Result<String> {
    let product = a
        .checked_mul(b)
        .ok_or_else(|| anyhow::anyhow!("{a} times {b} overflows"))?;
    Ok(format!("{a} times {b} is {product}"))
}

fn plus(a: i32, b: i32) -> anyhow::Result<String> {
    let sum = a
        .checked_add(b)
        .ok_or_else(|| anyhow::anyhow!("{a} plus {b} overflows"))?;
    Ok(format!("{a} plus {b} is {sum}"))
}

fn minus(a: i32, b: i32) -> anyhow::Result<String> {
    let difference = a
        .checked_sub(b)
        .ok_or_else(|| anyhow::anyhow!("{a} minus {b} overflows"))?;
    Ok(format!("{a} minus {b} is {difference}"))
}

fn divided(a: i32, b: i32) -> anyhow::Result<String> {
    if b == 0 {
        anyhow::bail!("cannot divide {a} by zero");
    }
    Ok(format!("{a} divided by {b} is {}", a / b))
}
