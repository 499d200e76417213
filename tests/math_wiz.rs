//! The arithmetic bot, driven through the dispatcher.

use chatterbox::bots::math_wiz;
use chatterbox::dispatch::message::{TEXT, USER};
use chatterbox::dispatch::{DispatchOutcome, Dispatcher, HandlerGroup, Message, Reply};
use chatterbox::error::InvocationError;

fn ask(group: &HandlerGroup, question: &str) -> DispatchOutcome {
    let message = Message::new("microblog")
        .with(USER, "alice")
        .with(TEXT, question);
    Dispatcher::default().dispatch(&message, group)
}

fn answer(group: &HandlerGroup, question: &str) -> Option<String> {
    ask(group, question)
        .replies()
        .find_map(Reply::message)
        .map(str::to_string)
}

#[test]
fn symbol_and_word_operators() {
    let wiz = math_wiz::group();
    assert_eq!(answer(&wiz, "what is 4 x 7").as_deref(), Some("4 times 7 is 28"));
    assert_eq!(answer(&wiz, "what is 4*7").as_deref(), Some("4 times 7 is 28"));
    assert_eq!(answer(&wiz, "what is 6 times 7").as_deref(), Some("6 times 7 is 42"));
    assert_eq!(answer(&wiz, "what is 3 + 4").as_deref(), Some("3 plus 4 is 7"));
    assert_eq!(answer(&wiz, "what is 3 plus 4").as_deref(), Some("3 plus 4 is 7"));
    assert_eq!(answer(&wiz, "what is 10 - 3").as_deref(), Some("10 minus 3 is 7"));
    assert_eq!(answer(&wiz, "what is 10 minus 3").as_deref(), Some("10 minus 3 is 7"));
    assert_eq!(answer(&wiz, "what is 9 / 3").as_deref(), Some("9 divided by 3 is 3"));
    assert_eq!(
        answer(&wiz, "what is 9 divided by 3").as_deref(),
        Some("9 divided by 3 is 3")
    );
}

#[test]
fn special_cases_win_by_identity() {
    let wiz = math_wiz::group();
    let outcome = ask(&wiz, "what is 2 x 2");
    assert_eq!(outcome.identities(), vec!["2_times_2"]);
    assert_eq!(answer(&wiz, "what is 2 + 2").as_deref(), Some("The same thing as 2 x 2"));
}

#[test]
fn division_by_zero_is_a_handler_error() {
    let outcome = ask(&math_wiz::group(), "what is 1 / 0");
    let failures: Vec<&InvocationError> = outcome.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], InvocationError::Handler { identity, .. } if identity == "divided"));
}

#[test]
fn non_numbers_fail_conversion() {
    let outcome = ask(&math_wiz::group(), "what is cake x pie");
    assert!(matches!(
        outcome.failures().next(),
        Some(InvocationError::Conversion { .. })
    ));
}

#[test]
fn templates_are_case_sensitive() {
    assert!(ask(&math_wiz::group(), "What is 4 x 7").is_no_match());
}
