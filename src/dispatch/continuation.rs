//! Per-sender conversation state.
//!
//! A handler that returns a [`Response`](crate::dispatch::reply::Response)
//! with a dialog parks that group under the sender's key. The sender's
//! next message goes to the parked group instead of the channel's
//! default targets. Any other outcome clears the entry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::dispatch::descriptor::HandlerGroup;
use crate::dispatch::reply::Dialog;
use crate::dispatch::resolver::{DispatchOutcome, Dispatcher};
use crate::dispatch::message::Message;

/// Pending dialog per conversation key. Safe to share between channel tasks.
#[derive(Default)]
pub struct ContinuationStore {
    pending: Mutex<HashMap<String, Arc<HandlerGroup>>>,
}

impl ContinuationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<HandlerGroup>> {
        self.pending.lock().get(key).cloned()
    }

    /// Park `group` for `key`, returning the previous entry.
    pub fn put(&self, key: impl Into<String>, group: Arc<HandlerGroup>) -> Option<Arc<HandlerGroup>> {
        self.pending.lock().insert(key.into(), group)
    }

    pub fn remove(&self, key: &str) -> Option<Arc<HandlerGroup>> {
        self.pending.lock().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pending.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    pub fn clear(&self) {
        self.pending.lock().clear();
    }
}

/// Routes messages to default targets or to a pending dialog.
#[derive(Clone)]
pub struct ConversationRouter {
    dispatcher: Dispatcher,
    key_facet: String,
    targets: Vec<Arc<HandlerGroup>>,
    store: Arc<ContinuationStore>,
}

impl ConversationRouter {
    /// Router keyed on the `key_facet` value of each message (the sender).
    pub fn new(dispatcher: Dispatcher, key_facet: impl Into<String>) -> Self {
        Self {
            dispatcher,
            key_facet: key_facet.into(),
            targets: Vec::new(),
            store: Arc::new(ContinuationStore::new()),
        }
    }

    /// Share an existing store, e.g. between two adapters of one channel.
    pub fn with_store(mut self, store: Arc<ContinuationStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_target(mut self, group: Arc<HandlerGroup>) -> Self {
        self.targets.push(group);
        self
    }

    pub fn add_target(&mut self, group: Arc<HandlerGroup>) {
        self.targets.push(group);
    }

    pub fn targets(&self) -> &[Arc<HandlerGroup>] {
        &self.targets
    }

    pub fn store(&self) -> &Arc<ContinuationStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispatch `message`, one outcome per group consulted.
    ///
    /// A pending dialog is consumed before dispatching to it, so a dialog
    /// that does not match leaves the sender back at the default targets.
    pub fn route(&self, message: &Message) -> Vec<DispatchOutcome> {
        let key = message.get(&self.key_facet);

        if let Some(key) = key
            && let Some(dialog) = self.store.remove(key)
        {
            debug!(key, dialog = %dialog.name(), "Continuing conversation");
            let outcome = self.dispatcher.dispatch(message, &dialog);
            self.record(key, &dialog, &outcome);
            return vec![outcome];
        }

        self.targets
            .iter()
            .map(|group| {
                let outcome = self.dispatcher.dispatch(message, group);
                if let Some(key) = key {
                    self.record(key, group, &outcome);
                }
                outcome
            })
            .collect()
    }

    fn record(&self, key: &str, group: &Arc<HandlerGroup>, outcome: &DispatchOutcome) {
        for invocation in outcome.invocations() {
            let next = match &invocation.result {
                Ok(reply) => match reply.dialog() {
                    Some(Dialog::Group(next)) => Some(Arc::clone(next)),
                    Some(Dialog::Current) => Some(Arc::clone(group)),
                    None => None,
                },
                Err(_) => None,
            };
            match next {
                Some(next) => {
                    debug!(key, dialog = %next.name(), "Parking conversation");
                    self.store.put(key, next);
                }
                None => {
                    self.store.remove(key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::descriptor::HandlerDescriptor;
    use crate::dispatch::message::{TEXT, USER};
    use crate::dispatch::reply::{Reply, Response};
    use crate::dispatch::value::TargetType;

    fn tweet(user: &str, text: &str) -> Message {
        Message::new("microblog").with(USER, user).with(TEXT, text)
    }

    fn texts(outcomes: &[DispatchOutcome]) -> Vec<String> {
        outcomes
            .iter()
            .flat_map(|o| o.replies())
            .filter_map(|r| r.message().map(str::to_string))
            .collect()
    }

    fn follow_up() -> Arc<HandlerGroup> {
        Arc::new(
            HandlerGroup::builder("follow-up")
                .handler(
                    HandlerDescriptor::builder("who")
                        .on(TEXT, "{who}")
                        .capture(TEXT, "who", TargetType::Text)
                        .handle(|args| Ok(format!("{} who?", args.text(0)?))),
                )
                .build(),
        )
    }

    fn opener(next: Arc<HandlerGroup>) -> Arc<HandlerGroup> {
        Arc::new(
            HandlerGroup::builder("opener")
                .handler(HandlerDescriptor::builder("knock").on(TEXT, "knock").handle(
                    move |_| Ok(Response::message("Who's there?").dialog(Arc::clone(&next))),
                ))
                .handler(
                    HandlerDescriptor::builder("ping")
                        .on(TEXT, "ping")
                        .handle(|_| Ok("pong")),
                )
                .build(),
        )
    }

    fn router() -> ConversationRouter {
        ConversationRouter::new(Dispatcher::default(), USER).with_target(opener(follow_up()))
    }

    #[test]
    fn dialog_takes_the_next_message() {
        let router = router();

        assert_eq!(texts(&router.route(&tweet("alice", "knock"))), vec!["Who's there?"]);
        assert!(router.store().contains("alice"));

        assert_eq!(texts(&router.route(&tweet("alice", "Boo"))), vec!["Boo who?"]);
        assert!(!router.store().contains("alice"));

        // Back at the defaults.
        assert_eq!(texts(&router.route(&tweet("alice", "ping"))), vec!["pong"]);
    }

    #[test]
    fn conversations_are_independent_per_sender() {
        let router = router();
        router.route(&tweet("alice", "knock"));

        assert_eq!(texts(&router.route(&tweet("bob", "ping"))), vec!["pong"]);
        assert!(router.store().contains("alice"));
        assert!(!router.store().contains("bob"));
    }

    #[test]
    fn unmatched_dialog_clears_entry() {
        let strict = Arc::new(
            HandlerGroup::builder("strict")
                .handler(HandlerDescriptor::builder("yes").on(TEXT, "yes"))
                .build(),
        );
        let router =
            ConversationRouter::new(Dispatcher::default(), USER).with_target(opener(strict));

        router.route(&tweet("alice", "knock"));
        let outcomes = router.route(&tweet("alice", "maybe"));
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_no_match());
        assert!(router.store().is_empty());
    }

    #[test]
    fn same_dialog_parks_the_producing_group() {
        let looping = Arc::new(
            HandlerGroup::builder("loop")
                .handler(
                    HandlerDescriptor::builder("again")
                        .on(TEXT, "again")
                        .handle(|_| Ok(Response::message("once more").same_dialog())),
                )
                .build(),
        );
        let router = ConversationRouter::new(Dispatcher::default(), USER).with_target(looping);

        router.route(&tweet("alice", "again"));
        assert_eq!(router.store().get("alice").map(|g| g.name().to_string()), Some("loop".into()));
        router.route(&tweet("alice", "again"));
        assert!(router.store().contains("alice"));
        router.route(&tweet("alice", "stop"));
        assert!(router.store().is_empty());
    }

    #[test]
    fn failed_invocation_clears_entry() {
        let failing = Arc::new(
            HandlerGroup::builder("failing")
                .handler(
                    HandlerDescriptor::builder("oops")
                        .on(TEXT, ".*")
                        .handle(|_| Err::<Reply, _>(anyhow::anyhow!("broken"))),
                )
                .build(),
        );
        let router =
            ConversationRouter::new(Dispatcher::default(), USER).with_target(opener(failing));

        router.route(&tweet("alice", "knock"));
        let outcomes = router.route(&tweet("alice", "anything"));
        assert_eq!(outcomes[0].failures().count(), 1);
        assert!(router.store().is_empty());
    }

    #[test]
    fn message_without_key_uses_defaults_and_stores_nothing() {
        let router = router();
        let anonymous = Message::new("microblog").with(TEXT, "knock");
        assert_eq!(texts(&router.route(&anonymous)), vec!["Who's there?"]);
        assert!(router.store().is_empty());
    }

    #[test]
    fn store_is_shared_across_threads() {
        let store = Arc::new(ContinuationStore::new());
        let group = follow_up();

        std::thread::scope(|s| {
            for i in 0..8 {
                let store = Arc::clone(&store);
                let group = Arc::clone(&group);
                s.spawn(move || {
                    let key = format!("user-{i}");
                    store.put(key.clone(), group);
                    assert!(store.contains(&key));
                });
            }
        });
        assert_eq!(store.len(), 8);
        store.clear();
        assert!(store.is_empty());
    }
}
