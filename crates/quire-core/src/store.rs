//! Persistence collaborator.
//!
//! The engine never talks to a network directly. It hands article snapshots
//! to an [`ArticleStore`] and turns whatever comes back into save-state
//! transitions. Transport, identity and article shape beyond [`Article`] are
//! the implementor's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::article::Article;
use crate::error::{Error, Result};

/// Reply to a successful [`ArticleStore::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    /// Version assigned to the stored snapshot.
    pub version: u64,
}

/// Reply to a successful [`ArticleStore::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReceipt {
    /// Identifier for the new article.
    pub id: String,
    /// Version assigned to the stored snapshot.
    pub version: u64,
}

/// Asynchronous article persistence.
///
/// Calls may fail or never answer; the autosave driver bounds each call
/// with a timeout and treats both as a recoverable failure.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Store a snapshot of an existing article.
    async fn save(&self, article: &Article) -> Result<SaveReceipt>;

    /// Store an article for the first time and assign it an id.
    async fn create(&self, article: &Article) -> Result<CreateReceipt>;
}

// ============================================================================
// Mock
// ============================================================================

/// Which store method was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCallKind {
    /// [`ArticleStore::save`]
    Save,
    /// [`ArticleStore::create`]
    Create,
}

/// One recorded call on [`MockArticleStore`].
#[derive(Debug, Clone)]
pub struct StoreCall {
    /// Method called.
    pub kind: StoreCallKind,
    /// When the call began.
    pub at: Instant,
    /// The snapshot passed in.
    pub article: Article,
}

/// In-memory store that records every call.
///
/// Useful for testing autosave timing without a real backend. Clones share
/// state.
#[derive(Clone, Default)]
pub struct MockArticleStore {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<StoreCall>,
    delay: Duration,
    scripted_failures: VecDeque<String>,
    next_id: u64,
    version: u64,
}

impl MockArticleStore {
    /// Create a store that answers immediately and always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that takes `delay` to answer every call.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                delay,
                ..MockState::default()
            })),
        }
    }

    /// Change the answer delay.
    pub async fn set_delay(&self, delay: Duration) {
        self.state.lock().await.delay = delay;
    }

    /// Make the next call fail with `message`. Queued failures are consumed
    /// in order.
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.state
            .lock()
            .await
            .scripted_failures
            .push_back(message.into());
    }

    /// Every call so far, in the order they began.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of calls so far.
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls.len()
    }

    async fn record(&self, kind: StoreCallKind, article: &Article) -> (Duration, Option<String>) {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall {
            kind,
            at: Instant::now(),
            article: article.clone(),
        });
        (state.delay, state.scripted_failures.pop_front())
    }
}

#[async_trait]
impl ArticleStore for MockArticleStore {
    async fn save(&self, article: &Article) -> Result<SaveReceipt> {
        let (delay, failure) = self.record(StoreCallKind::Save, article).await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = failure {
            return Err(Error::persistence(message));
        }

        let mut state = self.state.lock().await;
        state.version = state.version.max(article.version) + 1;
        Ok(SaveReceipt {
            version: state.version,
        })
    }

    async fn create(&self, article: &Article) -> Result<CreateReceipt> {
        let (delay, failure) = self.record(StoreCallKind::Create, article).await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = failure {
            return Err(Error::persistence(message));
        }

        let mut state = self.state.lock().await;
        state.next_id += 1;
        state.version += 1;
        Ok(CreateReceipt {
            id: format!("article-{}", state.next_id),
            version: state.version,
        })
    }
}
