//! Background mailbox poller.
//!
//! Each tick fetches unseen messages, delivers them through a
//! [`MailAdapter`] and marks them seen. Messages that fail to parse are
//! marked seen as well so they are not redelivered on every tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channels::ChannelAdapter;
use crate::channels::mail::{MailAdapter, Mailbox};

/// Spawn a task polling `mailbox` every `interval`.
///
/// Returns the task handle and a shutdown flag. Set the flag to stop
/// polling after the current tick.
pub fn spawn_mail_poller(
    mailbox: Arc<dyn Mailbox>,
    adapter: Arc<MailAdapter>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Mail poller started");
        let mut tick = tokio::time::interval(interval);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Mail poller shutting down");
                return;
            }

            poll_once(&mailbox, &adapter).await;
        }
    });

    (handle, shutdown_flag)
}

/// Run a single cycle: fetch unseen, deliver, mark seen.
pub async fn poll_once(mailbox: &Arc<dyn Mailbox>, adapter: &MailAdapter) -> usize {
    let fetcher = Arc::clone(mailbox);
    let fetched = match tokio::task::spawn_blocking(move || fetcher.fetch_unseen()).await {
        Ok(Ok(fetched)) => fetched,
        Ok(Err(e)) => {
            error!(error = %e, "Mail poll failed");
            return 0;
        }
        Err(e) => {
            error!(error = %e, "Mail poll task panicked");
            return 0;
        }
    };

    if fetched.is_empty() {
        return 0;
    }
    debug!(count = fetched.len(), "Fetched unseen mail");

    let mut delivered = 0;
    for mail in fetched {
        match adapter.deliver(mail.raw).await {
            Ok(_) => delivered += 1,
            Err(e) => warn!(uid = %mail.uid, error = %e, "Undeliverable mail"),
        }

        let marker = Arc::clone(mailbox);
        let uid = mail.uid;
        match tokio::task::spawn_blocking(move || marker.mark_seen(&uid)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to mark mail as seen"),
            Err(e) => warn!(error = %e, "Mark-seen task panicked"),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::mail::FetchedMail;
    use crate::dispatch::message::SUBJECT;
    use crate::dispatch::{Dispatcher, HandlerDescriptor, HandlerGroup};
    use crate::error::ChannelError;
    use parking_lot::Mutex;

    /// In-memory mailbox that forgets messages once marked seen.
    #[derive(Default)]
    struct FakeMailbox {
        unseen: Mutex<Vec<FetchedMail>>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeMailbox {
        fn push(&self, uid: &str, subject: &str) {
            let raw = format!("From: ann@example.com\r\nSubject: {subject}\r\n\r\nbody\r\n");
            self.unseen.lock().push(FetchedMail {
                uid: uid.to_string(),
                raw: raw.into_bytes(),
            });
        }
    }

    impl Mailbox for FakeMailbox {
        fn fetch_unseen(&self) -> Result<Vec<FetchedMail>, ChannelError> {
            Ok(self.unseen.lock().clone())
        }

        fn mark_seen(&self, uid: &str) -> Result<(), ChannelError> {
            self.unseen.lock().retain(|m| m.uid != uid);
            self.seen.lock().push(uid.to_string());
            Ok(())
        }
    }

    struct BrokenMailbox;

    impl Mailbox for BrokenMailbox {
        fn fetch_unseen(&self) -> Result<Vec<FetchedMail>, ChannelError> {
            Err(ChannelError::Mailbox("login refused".into()))
        }

        fn mark_seen(&self, _uid: &str) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn counting_adapter(count: &Arc<Mutex<Vec<String>>>) -> Arc<MailAdapter> {
        let log = Arc::clone(count);
        let group = HandlerGroup::builder("inbox")
            .handler(
                HandlerDescriptor::builder("any")
                    .param(SUBJECT, crate::dispatch::TargetType::Text)
                    .handle(move |args| {
                        log.lock().push(args.text(0)?.to_string());
                        Ok(())
                    }),
            )
            .build();
        Arc::new(MailAdapter::new(Dispatcher::default(), vec![Arc::new(group)]))
    }

    #[tokio::test]
    async fn poll_delivers_and_marks_seen() {
        let mailbox = Arc::new(FakeMailbox::default());
        mailbox.push("1", "first");
        mailbox.push("2", "second");
        let subjects = Arc::new(Mutex::new(Vec::new()));
        let adapter = counting_adapter(&subjects);

        let dyn_mailbox: Arc<dyn Mailbox> = mailbox.clone();
        assert_eq!(poll_once(&dyn_mailbox, &adapter).await, 2);
        assert_eq!(*subjects.lock(), vec!["first", "second"]);
        assert_eq!(*mailbox.seen.lock(), vec!["1", "2"]);

        // Nothing left to deliver.
        assert_eq!(poll_once(&dyn_mailbox, &adapter).await, 0);
    }

    #[tokio::test]
    async fn fetch_failure_delivers_nothing() {
        let subjects = Arc::new(Mutex::new(Vec::new()));
        let adapter = counting_adapter(&subjects);
        let mailbox: Arc<dyn Mailbox> = Arc::new(BrokenMailbox);
        assert_eq!(poll_once(&mailbox, &adapter).await, 0);
        assert!(subjects.lock().is_empty());
    }

    #[tokio::test]
    async fn poller_stops_on_shutdown_flag() {
        let mailbox = Arc::new(FakeMailbox::default());
        mailbox.push("7", "hello");
        let subjects = Arc::new(Mutex::new(Vec::new()));
        let adapter = counting_adapter(&subjects);

        let (handle, shutdown) =
            spawn_mail_poller(mailbox.clone(), adapter, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.store(true, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller did not stop")
            .unwrap();

        assert_eq!(*subjects.lock(), vec!["hello"]);
        assert_eq!(*mailbox.seen.lock(), vec!["7"]);
    }
}
