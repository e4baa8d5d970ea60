//! One article open for editing.
//!
//! [`EditorSession`] is the surface the host UI talks to. It owns the
//! article, the [`SurfaceSync`], the block menu and a handle to the autosave
//! driver, and routes every change to the article through the same dirty
//! path.
//!
//! All methods except [`EditorSession::open`] are synchronous and never
//! block; persistence happens on the autosave task.

use std::sync::Arc;
use tokio::sync::watch;

use crate::article::{Article, ArticleStatus};
use crate::autosave::{AutosaveHandle, Autosaver, SaveState};
use crate::blocks::{BlockCatalog, BlockKind, BlockMenu, MenuKey, MenuOutcome, insert_fragment};
use crate::classify::{Classification, Format, classify_detailed};
use crate::config::EditorConfig;
use crate::error::{Error, Result};
use crate::platform::EditSurface;
use crate::store::ArticleStore;
use crate::surface::{MutationReport, Surface, SurfaceSync, SwitchReport};
use crate::transcode::{Transcoder, TranscodeWarning};

/// Characters of context inspected before a typed trigger.
const TRIGGER_CONTEXT: usize = 16;

/// How the loaded content was interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Classifier verdict for the stored content.
    pub classification: Classification,
    /// Stored content was markdown and has been converted to markup.
    pub normalized: bool,
    /// Inline images dropped while converting.
    pub dropped_count: usize,
    /// Problems met while converting.
    pub warnings: Vec<TranscodeWarning>,
}

/// An open editing session for one article.
#[derive(Debug)]
pub struct EditorSession {
    article: Article,
    sync: SurfaceSync,
    autosave: AutosaveHandle,
    config: EditorConfig,
    catalog: BlockCatalog,
    menu: BlockMenu,
    load: LoadReport,
}

impl EditorSession {
    /// Open `article` for editing, persisting through `store`.
    ///
    /// Markdown content from older articles is converted to markup first so
    /// canonical content is always markup. The save state starts at
    /// `SAVED`. Must be called from within a tokio runtime.
    pub fn open(
        mut article: Article,
        store: Arc<dyn ArticleStore>,
        config: EditorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let transcoder = Transcoder::from_config(&config);

        let classification = classify_detailed(&article.content);
        let mut load = LoadReport {
            classification,
            normalized: false,
            dropped_count: 0,
            warnings: Vec::new(),
        };
        if classification.format == Format::Markdown {
            let out = transcoder.markdown_to_markup(&article.content, article.diagnostic_id());
            article.content = out.markup;
            load.normalized = true;
            load.dropped_count = out.dropped_count;
            load.warnings = out.warnings;
        } else if classification.ambiguous {
            tracing::warn!(
                article_id = article.diagnostic_id(),
                "Content looks like both markdown and markup; treating as markup"
            );
        }

        tracing::info!(
            article_id = article.diagnostic_id(),
            version = article.version,
            format = %classification.format,
            normalized = load.normalized,
            "Opened article"
        );

        let sync = SurfaceSync::new(article.content.clone(), transcoder)
            .with_article_id(article.diagnostic_id());
        let autosave = Autosaver::spawn(store, article.clone(), &config);

        Ok(Self {
            article,
            sync,
            autosave,
            catalog: BlockCatalog::standard(&config),
            menu: BlockMenu::new(config.slash_trigger),
            config,
            load,
        })
    }

    // ------------------------------------------------------------------------
    // Content and surfaces
    // ------------------------------------------------------------------------

    /// Record new text typed into the active surface.
    pub fn mutate(&mut self, text: &str) -> MutationReport {
        self.refresh_identity();
        let report = self.sync.mutate(text);
        self.article.content = self.sync.content().to_string();
        self.mark_dirty();
        report
    }

    /// Make `surface` active. Closes the block menu.
    pub fn switch_to(&mut self, surface: Surface) -> SwitchReport {
        self.menu.close();
        self.sync.switch_to(surface)
    }

    /// The active surface.
    pub fn active_surface(&self) -> Surface {
        self.sync.active()
    }

    /// Text of the active surface.
    pub fn active_text(&self) -> &str {
        self.sync.active_text()
    }

    /// Canonical markup.
    pub fn content(&self) -> &str {
        self.sync.content()
    }

    /// The article as it stands, with the id and version the store last
    /// reported.
    pub fn article(&self) -> Article {
        let state = self.autosave.state();
        let mut article = self.article.clone();
        if state.article_id.is_some() {
            article.id = state.article_id;
        }
        article.version = state.version;
        article
    }

    /// How the stored content was interpreted on open.
    pub fn load_report(&self) -> &LoadReport {
        &self.load
    }

    /// Session configuration.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Article metadata
    // ------------------------------------------------------------------------

    /// Change the title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.article.title = title.into();
        self.mark_dirty();
    }

    /// Add a tag. Returns `false` if it was already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let added = self.article.tags.insert(tag.into());
        if added {
            self.mark_dirty();
        }
        added
    }

    /// Remove a tag. Returns `false` if it was not present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let removed = self.article.tags.remove(tag);
        if removed {
            self.mark_dirty();
        }
        removed
    }

    /// Change the editorial status.
    pub fn set_status(&mut self, status: ArticleStatus) {
        if self.article.status != status {
            self.article.status = status;
            self.mark_dirty();
        }
    }

    /// Set a metadata entry.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.article.metadata.insert(key.into(), value);
        self.mark_dirty();
    }

    // ------------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------------

    /// Current save state.
    pub fn save_state(&self) -> SaveState {
        self.autosave.state()
    }

    /// A receiver that sees every save-state change.
    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.autosave.subscribe()
    }

    /// Save now instead of waiting for the debounce.
    pub fn save_now(&self) {
        self.autosave.save_now();
    }

    /// End the session and return the final save state.
    ///
    /// A save already in flight is allowed to finish; pending changes that
    /// never started saving are reported through
    /// [`SaveState::has_unsaved_changes`].
    pub async fn close(self) -> SaveState {
        let article_id = self.article.diagnostic_id().to_string();
        let state = self.autosave.close().await;
        tracing::info!(
            article_id = %article_id,
            status = %state.status,
            "Closed article"
        );
        state
    }

    // ------------------------------------------------------------------------
    // Block insertion
    // ------------------------------------------------------------------------

    /// The block catalog.
    pub fn catalog(&self) -> &BlockCatalog {
        &self.catalog
    }

    /// Swap the block catalog. Closes the menu.
    pub fn set_catalog(&mut self, catalog: BlockCatalog) {
        self.menu.close();
        self.catalog = catalog;
    }

    /// The block menu.
    pub fn menu(&self) -> &BlockMenu {
        &self.menu
    }

    /// Tell the menu about a character that has just landed in `surface`.
    pub fn observe_typed(&mut self, surface: &dyn EditSurface, ch: char) -> MenuOutcome {
        let mut before = surface.text_before_caret(TRIGGER_CONTEXT);
        before.pop();
        self.menu.on_typed(
            ch,
            self.sync.active(),
            &before,
            surface.caret_screen_position(),
            &self.catalog,
        )
    }

    /// Feed a navigation key to the menu. A selection is inserted into
    /// `surface` and recorded as a mutation.
    pub fn menu_key(&mut self, surface: &mut dyn EditSurface, key: MenuKey) -> Result<MenuOutcome> {
        let outcome = self.menu.on_key(key, &self.catalog);
        self.apply_selection(surface, &outcome)?;
        Ok(outcome)
    }

    /// Choose menu entry `index` directly, e.g. from a pointer click.
    pub fn choose_block(&mut self, surface: &mut dyn EditSurface, index: usize) -> Result<MenuOutcome> {
        let outcome = self.menu.choose(index);
        self.apply_selection(surface, &outcome)?;
        Ok(outcome)
    }

    /// The edit surface lost focus.
    pub fn on_blur(&mut self) -> MenuOutcome {
        self.menu.close()
    }

    /// Insert `kind` at the caret without going through the menu.
    pub fn insert_block(
        &mut self,
        surface: &mut dyn EditSurface,
        kind: BlockKind,
    ) -> Result<MutationReport> {
        if self.sync.active() != Surface::Edit {
            return Err(Error::invalid_data(format!(
                "blocks can only be inserted on the edit surface, not {}",
                self.sync.active()
            )));
        }
        insert_fragment(surface, &kind.fragment(), 0)?;
        Ok(self.mutate(&surface.content()))
    }

    fn apply_selection(&mut self, surface: &mut dyn EditSurface, outcome: &MenuOutcome) -> Result<()> {
        if let MenuOutcome::Selected { template, erase } = outcome {
            insert_fragment(surface, &template.kind.fragment(), *erase)?;
            self.mutate(&surface.content());
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn mark_dirty(&mut self) {
        self.autosave.notify_mutation(Arc::new(self.article.clone()));
    }

    /// Pick up an id assigned by a create so diagnostics carry it.
    fn refresh_identity(&mut self) {
        if self.article.id.is_some() {
            return;
        }
        if let Some(id) = self.autosave.state().article_id {
            self.sync.set_article_id(id.as_str());
            self.article.id = Some(id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::autosave::SaveStatus;
    use crate::platform::MockEditSurface;
    use crate::store::{MockArticleStore, StoreCallKind};
    use std::time::Duration;
    use tokio::time::sleep;

    fn open(store: &MockArticleStore, article: Article) -> EditorSession {
        EditorSession::open(article, Arc::new(store.clone()), EditorConfig::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_normalizes_markdown() {
        let store = MockArticleStore::new();
        let session = open(&store, Article::new("T", "# Title\n\nSome **bold** text."));
        assert!(session.load_report().normalized);
        assert!(session.content().contains("<h1>Title</h1>"));
        assert_eq!(session.save_state().status, SaveStatus::Saved);
        assert_eq!(store.call_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_keeps_markup() {
        let store = MockArticleStore::new();
        let session = open(&store, Article::new("T", "<p>Hello</p>").with_id("a-1"));
        assert!(!session.load_report().normalized);
        assert_eq!(session.content(), "<p>Hello</p>");
        assert_eq!(session.active_surface(), Surface::Edit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_bad_config() {
        let store = MockArticleStore::new();
        let config = EditorConfig::default().with_debounce_ms(0);
        let err = EditorSession::open(Article::default(), Arc::new(store), config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_is_saved_after_debounce() {
        let store = MockArticleStore::new();
        let mut session = open(&store, Article::new("T", "<p>a</p>").with_id("a-1"));

        session.mutate("<p>b</p>");
        sleep(Duration::from_millis(1)).await;
        assert_eq!(session.save_state().status, SaveStatus::Unsaved);
        sleep(Duration::from_millis(2100)).await;

        let calls = store.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].article.content, "<p>b</p>");
        assert_eq!(session.save_state().status, SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_changes_are_saved() {
        let store = MockArticleStore::new();
        let mut session = open(&store, Article::new("T", "<p>a</p>").with_id("a-1"));

        session.set_title("New title");
        assert!(session.add_tag("rust"));
        assert!(!session.add_tag("rust"));
        session.set_status(ArticleStatus::Review);
        session.set_metadata("cover", serde_json::json!("x.png"));
        sleep(Duration::from_millis(2100)).await;

        let calls = store.calls().await;
        assert_eq!(calls.len(), 1);
        let saved = &calls[0].article;
        assert_eq!(saved.title, "New title");
        assert!(saved.tags.contains("rust"));
        assert_eq!(saved.status, ArticleStatus::Review);
        assert_eq!(saved.metadata["cover"], "x.png");

        assert!(session.remove_tag("rust"));
        sleep(Duration::from_millis(1)).await;
        assert_eq!(session.save_state().status, SaveStatus::Unsaved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_article_is_created_then_saved() {
        let store = MockArticleStore::new();
        let mut session = open(&store, Article::new("Draft", ""));

        session.mutate("<p>first</p>");
        session.save_now();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(session.article().id.as_deref(), Some("article-1"));

        session.mutate("<p>second</p>");
        sleep(Duration::from_millis(2100)).await;

        let calls = store.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, StoreCallKind::Create);
        assert_eq!(calls[1].kind, StoreCallKind::Save);
        assert_eq!(calls[1].article.id.as_deref(), Some("article-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slash_menu_inserts_block() {
        let store = MockArticleStore::new();
        let mut session = open(&store, Article::new("T", "<p>Hi</p>").with_id("a-1"));
        let mut surface = MockEditSurface::new(session.content());

        for ch in "/div".chars() {
            surface.type_text(&ch.to_string());
            session.observe_typed(&surface, ch);
        }
        assert!(session.menu().is_open());
        assert_eq!(session.menu().entries()[0].id, "divider");

        let outcome = session.menu_key(&mut surface, MenuKey::Enter).unwrap();
        assert!(matches!(outcome, MenuOutcome::Selected { erase: 4, .. }));
        assert_eq!(surface.content(), "<p>Hi</p><hr>");
        assert_eq!(session.content(), "<p>Hi</p><hr>");
        sleep(Duration::from_millis(1)).await;
        assert_eq!(session.save_state().status, SaveStatus::Unsaved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blur_dismisses_menu_and_keeps_trigger() {
        let store = MockArticleStore::new();
        let mut session = open(&store, Article::new("T", "").with_id("a-1"));
        let mut surface = MockEditSurface::new("");

        surface.type_text("/");
        session.observe_typed(&surface, '/');
        assert!(session.menu().is_open());
        assert_eq!(session.on_blur(), MenuOutcome::Closed);
        assert_eq!(surface.content(), "/");
    }

    #[tokio::test(start_paused = true)]
    async fn test_menu_only_on_edit_surface() {
        let store = MockArticleStore::new();
        let mut session = open(&store, Article::new("T", "").with_id("a-1"));
        session.switch_to(Surface::Markdown);
        let mut surface = MockEditSurface::new("");

        surface.type_text("/");
        session.observe_typed(&surface, '/');
        assert!(!session.menu().is_open());

        let err = session
            .insert_block(&mut surface, BlockKind::Divider)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_block_directly() {
        let store = MockArticleStore::new();
        let mut session = open(&store, Article::new("T", "<p>x</p>").with_id("a-1"));
        let mut surface = MockEditSurface::new(session.content());

        session.insert_block(&mut surface, BlockKind::Quote).unwrap();
        assert_eq!(
            session.content(),
            "<p>x</p><blockquote><p>Quote</p></blockquote>"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_reports_unsaved_changes() {
        let store = MockArticleStore::new();
        let mut session = open(&store, Article::new("T", "<p>a</p>").with_id("a-1"));
        session.mutate("<p>b</p>");
        let state = session.close().await;
        assert!(state.has_unsaved_changes());
        assert_eq!(store.call_count().await, 0);
    }
}
