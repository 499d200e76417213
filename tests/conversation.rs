//! End-to-end knock-knock conversations through the micro-blog adapter.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use chatterbox::bots::knock_knock::{self, BANANA, LOUD, PUNCHLINE, SELF_KNOCK, WHOS_THERE};
use chatterbox::channels::{ChannelAdapter, MicroblogAdapter, MicroblogPoster, Post};
use chatterbox::error::ChannelError;
use chatterbox::dispatch::Dispatcher;

/// Poster that records what would have been published.
#[derive(Default)]
struct RecordingPoster {
    posts: Mutex<Vec<String>>,
}

#[async_trait]
impl MicroblogPoster for RecordingPoster {
    async fn post(&self, text: &str, _in_reply_to: Option<&str>) -> Result<(), ChannelError> {
        self.posts.lock().push(text.to_string());
        Ok(())
    }
}

impl RecordingPoster {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.posts.lock())
    }
}

fn setup() -> (MicroblogAdapter, Arc<RecordingPoster>) {
    let poster = Arc::new(RecordingPoster::default());
    let adapter = MicroblogAdapter::new(
        Dispatcher::default(),
        vec![Arc::new(knock_knock::group())],
        poster.clone(),
    );
    (adapter, poster)
}

async fn say(adapter: &MicroblogAdapter, user: &str, text: &str) {
    adapter
        .deliver(Post::new("id", user, format!("@chatterbox {text}")))
        .await
        .unwrap();
}

#[tokio::test]
async fn full_joke() {
    let (bot, poster) = setup();

    say(&bot, "alice", "Knock knock").await;
    assert_eq!(poster.take(), vec![format!("@alice {WHOS_THERE}")]);

    say(&bot, "alice", "Boo").await;
    assert_eq!(poster.take(), vec!["@alice Boo who?"]);

    say(&bot, "alice", "Don't cry, it's only a joke").await;
    assert_eq!(poster.take(), vec![format!("@alice {PUNCHLINE}")]);
    assert!(bot.store().is_empty());
}

#[tokio::test]
async fn banana_stays_in_the_same_step() {
    let (bot, poster) = setup();

    say(&bot, "alice", "knock-knock").await;
    say(&bot, "alice", "banana").await;
    say(&bot, "alice", "BANANA").await;
    say(&bot, "alice", "Orange").await;

    assert_eq!(
        poster.take(),
        vec![
            format!("@alice {WHOS_THERE}"),
            format!("@alice {BANANA}"),
            format!("@alice {BANANA}"),
            "@alice Orange who?".to_string(),
        ]
    );
}

#[tokio::test]
async fn answering_with_own_name_ends_the_joke() {
    let (bot, poster) = setup();

    say(&bot, "alice", "knock, knock").await;
    say(&bot, "alice", "alice").await;
    assert_eq!(poster.take().last(), Some(&format!("@alice {SELF_KNOCK}")));
    assert!(bot.store().is_empty());
}

#[tokio::test]
async fn senders_do_not_share_dialogs() {
    let (bot, poster) = setup();

    say(&bot, "alice", "knock knock").await;
    say(&bot, "bob", "Boo").await;
    say(&bot, "alice", "Boo").await;

    assert_eq!(
        poster.take(),
        vec![format!("@alice {WHOS_THERE}"), "@alice Boo who?".to_string()]
    );
}

#[tokio::test]
async fn shouting_is_not_a_knock() {
    let (bot, poster) = setup();

    say(&bot, "carol", "KNOCK KNOCK").await;
    assert_eq!(poster.take(), vec![format!("@carol {LOUD}")]);
    assert!(bot.store().is_empty());
}
