//! Article records exchanged with the persistence collaborator.
//!
//! An [`Article`] is owned by one editing session for its lifetime. Its
//! `content` is the canonical markup string; the markdown and edit-surface
//! texts are views derived from it and never stored here.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// Status
// ============================================================================

/// Editorial status of an article.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Work in progress.
    #[default]
    Draft,
    /// Waiting for review.
    Review,
    /// Publicly visible.
    Published,
}

impl ArticleStatus {
    /// Lowercase name used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Published => "published",
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Article
// ============================================================================

/// A single article as seen by the editing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Identifier assigned by the persistence collaborator.
    ///
    /// `None` until the first successful `create`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Article title.
    #[serde(default)]
    pub title: String,

    /// Canonical markup content.
    #[serde(default)]
    pub content: String,

    /// Tag set, kept sorted.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Editorial status.
    #[serde(default)]
    pub status: ArticleStatus,

    /// Monotonic version assigned by the persistence collaborator.
    #[serde(default)]
    pub version: u64,

    /// Open key/value metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Article {
    /// Create a new, never-persisted article.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            tags: BTreeSet::new(),
            status: ArticleStatus::Draft,
            version: 0,
            metadata: HashMap::new(),
        }
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: ArticleStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the persistence collaborator has ever seen this article.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Identifier used in diagnostics; unsaved articles report `"unsaved"`.
    pub fn diagnostic_id(&self) -> &str {
        self.id.as_deref().unwrap_or("unsaved")
    }
}

impl Default for Article {
    fn default() -> Self {
        Self::new("", "")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_article_builder() {
        let article = Article::new("Title", "<p>Body</p>")
            .with_id("a-1")
            .with_version(3)
            .with_tag("rust")
            .with_tag("rust")
            .with_status(ArticleStatus::Review);

        assert_eq!(article.id.as_deref(), Some("a-1"));
        assert_eq!(article.version, 3);
        assert_eq!(article.tags.len(), 1);
        assert_eq!(article.status, ArticleStatus::Review);
        assert!(article.is_persisted());
    }

    #[test]
    fn test_diagnostic_id() {
        assert_eq!(Article::default().diagnostic_id(), "unsaved");
        assert_eq!(Article::default().with_id("x").diagnostic_id(), "x");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ArticleStatus::Published).unwrap();
        assert_eq!(json, "\"published\"");
        assert_eq!(ArticleStatus::Review.to_string(), "review");
    }

    #[test]
    fn test_article_deserialize_defaults() {
        let article: Article = serde_json::from_str(r#"{"title":"T"}"#).unwrap();
        assert_eq!(article.title, "T");
        assert!(article.id.is_none());
        assert_eq!(article.status, ArticleStatus::Draft);
        assert_eq!(article.version, 0);
    }
}
