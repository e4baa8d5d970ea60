//! Debounced, serialized autosave.
//!
//! [`Autosaver::spawn`] starts one driver task per editing session. The
//! driver owns the [`AutosaveMachine`], the debounce [`TimerHandle`] and the
//! latest article value, and processes commands strictly in arrival order.
//! Persistence calls run in their own task, bounded by a timeout, and report
//! back through the same command queue, so the driver never blocks on I/O.
//!
//! Save state is published through a `tokio::sync::watch` channel.

pub mod machine;
pub mod timer;

pub use machine::{AutosaveMachine, Effect, Event, SaveState, SaveStatus};
pub use timer::{TimerHandle, schedule};

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

use crate::article::Article;
use crate::config::EditorConfig;
use crate::error::Error;
use crate::store::ArticleStore;

/// Messages processed by the driver task.
#[derive(Debug)]
enum Command {
    Mutated(Arc<Article>),
    SaveNow,
    DebounceElapsed(u64),
    PersistFinished(Event),
    Close(oneshot::Sender<SaveState>),
}

// ============================================================================
// Handle
// ============================================================================

/// Cheap, cloneable handle to a running autosave driver.
#[derive(Debug, Clone)]
pub struct AutosaveHandle {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SaveState>,
}

impl AutosaveHandle {
    /// Report that the article changed. `article` is the new value in full.
    pub fn notify_mutation(&self, article: Arc<Article>) {
        self.send(Command::Mutated(article));
    }

    /// Save immediately, or as soon as the in-flight save finishes.
    pub fn save_now(&self) {
        self.send(Command::SaveNow);
    }

    /// Current save state.
    pub fn state(&self) -> SaveState {
        self.state.borrow().clone()
    }

    /// A receiver that sees every published save state.
    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.state.clone()
    }

    /// Stop the driver and return the final save state.
    ///
    /// Pending debounce timers are cancelled. An in-flight save is allowed
    /// to finish first so its outcome is reflected in the returned state.
    pub async fn close(self) -> SaveState {
        let (reply, wait) = oneshot::channel();
        if self.tx.send(Command::Close(reply)).is_err() {
            return self.state();
        }
        match wait.await {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::warn!("Autosave driver has stopped; command dropped");
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// The autosave driver task.
pub struct Autosaver {
    machine: AutosaveMachine,
    store: Arc<dyn ArticleStore>,
    latest: Arc<Article>,
    debounce: Duration,
    save_timeout: Duration,
    timer: Option<TimerHandle>,
    next_timer_id: u64,
    tx: mpsc::WeakUnboundedSender<Command>,
    rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<SaveState>,
    closing: Option<oneshot::Sender<SaveState>>,
}

impl Autosaver {
    /// Start a driver for `article`, persisting through `store`.
    ///
    /// The initial state is `SAVED`. Must be called from within a tokio
    /// runtime.
    pub fn spawn(
        store: Arc<dyn ArticleStore>,
        article: Article,
        config: &EditorConfig,
    ) -> AutosaveHandle {
        let machine = AutosaveMachine::new(article.id.clone(), article.version);
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(machine.state().clone());

        let driver = Self {
            machine,
            store,
            latest: Arc::new(article),
            debounce: config.debounce(),
            save_timeout: config.save_timeout(),
            timer: None,
            next_timer_id: 0,
            tx: tx.downgrade(),
            rx,
            state_tx,
            closing: None,
        };
        tokio::spawn(driver.run());

        AutosaveHandle {
            tx,
            state: state_rx,
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Mutated(article) => {
                    self.latest = article;
                    self.apply(Event::Mutated);
                }
                Command::SaveNow => self.apply(Event::SaveNow),
                Command::DebounceElapsed(id) => {
                    if self.timer.as_ref().map(TimerHandle::id) == Some(id) {
                        self.timer = None;
                        self.apply(Event::DebounceElapsed);
                    }
                }
                Command::PersistFinished(event) => {
                    self.apply(event);
                    if self.closing.is_some() {
                        self.finish();
                        break;
                    }
                }
                Command::Close(reply) => {
                    self.timer = None;
                    self.closing = Some(reply);
                    if self.machine.state().status != SaveStatus::Saving {
                        self.finish();
                        break;
                    }
                }
            }
        }
        tracing::debug!("Autosave driver stopped");
    }

    fn apply(&mut self, event: Event) {
        for effect in self.machine.handle(event) {
            match effect {
                Effect::ScheduleDebounce if self.closing.is_none() => self.restart_timer(),
                Effect::ScheduleDebounce => {}
                Effect::CancelDebounce => self.timer = None,
                Effect::Persist => self.persist(),
            }
        }
        self.state_tx.send_replace(self.machine.state().clone());
    }

    fn finish(&mut self) {
        self.timer = None;
        if let Some(reply) = self.closing.take() {
            let _ = reply.send(self.machine.state().clone());
        }
    }

    fn restart_timer(&mut self) {
        self.next_timer_id += 1;
        let id = self.next_timer_id;
        let tx = self.tx.clone();
        // Replacing the handle drops, and so cancels, the previous timer.
        self.timer = Some(schedule(id, self.debounce, move || {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::DebounceElapsed(id));
            }
        }));
    }

    /// Snapshot the latest article and start a persistence call.
    fn persist(&mut self) {
        let state = self.machine.state();
        let mut snapshot = (*self.latest).clone();
        if state.article_id.is_some() {
            snapshot.id = state.article_id.clone();
        }
        snapshot.version = state.version;

        let store = self.store.clone();
        let tx = self.tx.clone();
        let limit = self.save_timeout;

        tracing::debug!(
            article_id = snapshot.diagnostic_id(),
            version = snapshot.version,
            "Persisting article"
        );

        tokio::spawn(async move {
            let event = persist_once(store.as_ref(), &snapshot, limit).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::PersistFinished(event));
            }
        });
    }
}

async fn persist_once(store: &dyn ArticleStore, snapshot: &Article, limit: Duration) -> Event {
    let result = match snapshot.id {
        Some(_) => tokio::time::timeout(limit, store.save(snapshot))
            .await
            .map(|r| r.map(|receipt| (None, receipt.version))),
        None => tokio::time::timeout(limit, store.create(snapshot))
            .await
            .map(|r| r.map(|receipt| (Some(receipt.id), receipt.version))),
    };

    match result {
        Ok(Ok((created_id, version))) => {
            tracing::debug!(version, "Article persisted");
            Event::PersistSucceeded {
                created_id,
                version,
                at: Utc::now(),
            }
        }
        Ok(Err(err)) => {
            tracing::warn!(
                article_id = snapshot.diagnostic_id(),
                error = %err,
                "Persistence failed"
            );
            Event::PersistFailed {
                error: err.to_string(),
            }
        }
        Err(_) => {
            let err = Error::Timeout(limit);
            tracing::warn!(
                article_id = snapshot.diagnostic_id(),
                error = %err,
                "Persistence timed out"
            );
            Event::PersistFailed {
                error: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{MockArticleStore, StoreCallKind};
    use tokio::time::{Instant, sleep};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn assert_elapsed(elapsed: Duration, expected_ms: u64) {
        assert!(
            elapsed >= ms(expected_ms) && elapsed < ms(expected_ms + 5),
            "expected ~{expected_ms}ms, got {elapsed:?}"
        );
    }

    fn start(store: &MockArticleStore, article: Article) -> AutosaveHandle {
        Autosaver::spawn(Arc::new(store.clone()), article, &EditorConfig::default())
    }

    fn edit(content: &str) -> Arc<Article> {
        Arc::new(Article::new("T", content).with_id("a-1"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_mutation_saves_once_after_debounce() {
        let store = MockArticleStore::new();
        let handle = start(&store, Article::new("T", "").with_id("a-1"));
        let t0 = Instant::now();

        handle.notify_mutation(edit("<p>1</p>"));
        sleep(ms(1999)).await;
        assert_eq!(store.call_count().await, 0);
        assert_eq!(handle.state().status, SaveStatus::Unsaved);

        sleep(ms(1000)).await;
        let calls = store.calls().await;
        assert_eq!(calls.len(), 1);
        assert_elapsed(calls[0].at - t0, 2000);
        assert_eq!(calls[0].article.content, "<p>1</p>");
        assert_eq!(handle.state().status, SaveStatus::Saved);
        assert!(handle.state().last_saved_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_mutations_saves_once() {
        let store = MockArticleStore::new();
        let handle = start(&store, Article::new("T", "").with_id("a-1"));
        let t0 = Instant::now();

        handle.notify_mutation(edit("<p>1</p>"));
        sleep(ms(500)).await;
        handle.notify_mutation(edit("<p>2</p>"));
        sleep(ms(400)).await;
        handle.notify_mutation(edit("<p>3</p>"));
        sleep(ms(5000)).await;

        let calls = store.calls().await;
        assert_eq!(calls.len(), 1);
        assert_elapsed(calls[0].at - t0, 2900);
        assert_eq!(calls[0].article.content, "<p>3</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_save_cancels_debounce() {
        let store = MockArticleStore::new();
        let handle = start(&store, Article::new("T", "").with_id("a-1"));
        let t0 = Instant::now();

        handle.notify_mutation(edit("<p>1</p>"));
        sleep(ms(1000)).await;
        handle.save_now();
        sleep(ms(5000)).await;

        let calls = store.calls().await;
        assert_eq!(calls.len(), 1);
        assert_elapsed(calls[0].at - t0, 1000);
        assert_eq!(handle.state().status, SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_during_save_triggers_exactly_one_more() {
        let store = MockArticleStore::with_delay(ms(500));
        let handle = start(&store, Article::new("T", "").with_id("a-1"));
        let t0 = Instant::now();

        handle.notify_mutation(edit("<p>1</p>"));
        sleep(ms(2100)).await;
        assert_eq!(handle.state().status, SaveStatus::Saving);
        handle.notify_mutation(edit("<p>2</p>"));
        sleep(ms(10)).await;
        assert!(handle.state().pending_retry);

        sleep(ms(10_000)).await;
        let calls = store.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].article.content, "<p>1</p>");
        assert_eq!(calls[1].article.content, "<p>2</p>");
        // First save completes at 2500, then a fresh debounce.
        assert_elapsed(calls[1].at - t0, 4500);
        assert_eq!(handle.state().status, SaveStatus::Saved);
        assert!(!handle.state().pending_retry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_save_while_saving_sets_pending_retry() {
        let store = MockArticleStore::with_delay(ms(500));
        let handle = start(&store, Article::new("T", "").with_id("a-1"));

        handle.notify_mutation(edit("<p>1</p>"));
        handle.save_now();
        sleep(ms(100)).await;
        handle.save_now();
        sleep(ms(100)).await;
        assert!(handle.state().pending_retry);

        sleep(ms(10_000)).await;
        assert_eq!(store.call_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reverts_to_unsaved() {
        let store = MockArticleStore::with_delay(ms(60_000));
        let handle = start(&store, Article::new("T", "").with_id("a-1"));

        handle.save_now();
        sleep(ms(10_001)).await;
        let state = handle.state();
        assert_eq!(state.status, SaveStatus::Unsaved);
        assert!(state.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_retries_on_next_cycle() {
        let store = MockArticleStore::new();
        store.fail_next("offline").await;
        let handle = start(&store, Article::new("T", "").with_id("a-1"));

        handle.notify_mutation(edit("<p>1</p>"));
        sleep(ms(2001)).await;
        assert_eq!(handle.state().status, SaveStatus::Unsaved);
        assert_eq!(store.call_count().await, 1);

        sleep(ms(2000)).await;
        assert_eq!(store.call_count().await, 2);
        assert_eq!(handle.state().status, SaveStatus::Saved);
        assert!(handle.state().last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsaved_article_is_created_then_saved() {
        let store = MockArticleStore::new();
        let handle = start(&store, Article::new("New", ""));

        handle.notify_mutation(Arc::new(Article::new("New", "<p>a</p>")));
        sleep(ms(2500)).await;
        assert_eq!(handle.state().article_id.as_deref(), Some("article-1"));

        handle.notify_mutation(Arc::new(Article::new("New", "<p>b</p>")));
        sleep(ms(2500)).await;

        let calls = store.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, StoreCallKind::Create);
        assert_eq!(calls[1].kind, StoreCallKind::Save);
        assert_eq!(calls[1].article.id.as_deref(), Some("article-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_debounce() {
        let store = MockArticleStore::new();
        let handle = start(&store, Article::new("T", "").with_id("a-1"));

        handle.notify_mutation(edit("<p>1</p>"));
        let state = handle.clone().close().await;
        assert_eq!(state.status, SaveStatus::Unsaved);
        assert!(state.has_unsaved_changes());

        sleep(ms(5000)).await;
        assert_eq!(store.call_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_waits_for_in_flight_save() {
        let store = MockArticleStore::with_delay(ms(300));
        let handle = start(&store, Article::new("T", "").with_id("a-1"));

        handle.save_now();
        sleep(ms(10)).await;
        let state = handle.close().await;
        assert_eq!(state.status, SaveStatus::Saved);
    }
}
