//! Surface synchronizer.
//!
//! One canonical markup string backs three textual views. The active
//! surface's view is whatever the user last typed; the other two are
//! derived from canonical content on demand and cached until the next
//! mutation makes them stale.

use serde::{Deserialize, Serialize};

use crate::transcode::{MediaDiagnostic, TranscodeWarning, Transcoder};

// ============================================================================
// Surface
// ============================================================================

/// The three views onto canonical content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    /// Direct-manipulation editor.
    Edit,
    /// Markdown source.
    Markdown,
    /// Raw markup source.
    Markup,
}

impl Surface {
    /// Every surface, in display order.
    pub const ALL: [Surface; 3] = [Surface::Edit, Surface::Markdown, Surface::Markup];

    fn index(self) -> usize {
        match self {
            Self::Edit => 0,
            Self::Markdown => 1,
            Self::Markup => 2,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Markdown => "markdown",
            Self::Markup => "markup",
        }
    }

    /// Turn text typed into this surface into canonical markup.
    fn inbound(self, text: &str, transcoder: &Transcoder, article_id: &str) -> Inbound {
        match self {
            Self::Markdown => {
                let out = transcoder.markdown_to_markup(text, article_id);
                Inbound {
                    markup: out.markup,
                    recovered_media_count: out.recovered_media_count,
                    dropped_count: out.dropped_count,
                    diagnostics: out.diagnostics,
                    warnings: out.warnings,
                }
            }
            Self::Edit | Self::Markup => Inbound {
                markup: text.to_string(),
                ..Inbound::default()
            },
        }
    }

    /// Derive this surface's text from canonical markup.
    fn derive(self, content: &str, transcoder: &Transcoder) -> Derived {
        match self {
            Self::Markdown => {
                let out = transcoder.markup_to_markdown(content);
                Derived {
                    text: out.markdown,
                    media_mismatch_warning: out.media_mismatch_warning,
                    warnings: out.warnings,
                }
            }
            Self::Edit | Self::Markup => Derived {
                text: content.to_string(),
                media_mismatch_warning: false,
                warnings: Vec::new(),
            },
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Surface {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "edit" => Ok(Self::Edit),
            "markdown" | "md" => Ok(Self::Markdown),
            "markup" | "html" => Ok(Self::Markup),
            other => Err(crate::Error::invalid_data(format!("unknown surface: {other}"))),
        }
    }
}

#[derive(Debug, Default)]
struct Inbound {
    markup: String,
    recovered_media_count: usize,
    dropped_count: usize,
    diagnostics: Vec<MediaDiagnostic>,
    warnings: Vec<TranscodeWarning>,
}

#[derive(Debug)]
struct Derived {
    text: String,
    media_mismatch_warning: bool,
    warnings: Vec<TranscodeWarning>,
}

// ============================================================================
// Reports
// ============================================================================

/// What a [`SurfaceSync::mutate`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationReport {
    /// Inline images carried into canonical content.
    pub recovered_media_count: usize,
    /// Inline images dropped by the integrity guard.
    pub dropped_count: usize,
    /// One record per dropped image.
    pub diagnostics: Vec<MediaDiagnostic>,
    /// Non-fatal transcoding problems.
    pub warnings: Vec<TranscodeWarning>,
}

/// What a [`SurfaceSync::switch_to`] call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchReport {
    /// The now-active surface.
    pub surface: Surface,
    /// Its text.
    pub text: String,
    /// The cached derivation was stale and had to be recomputed.
    pub recomputed: bool,
    /// Image counts changed while deriving markdown.
    pub media_mismatch_warning: bool,
    /// Non-fatal transcoding problems.
    pub warnings: Vec<TranscodeWarning>,
}

// ============================================================================
// Synchronizer
// ============================================================================

#[derive(Debug, Clone, Default)]
struct DerivationCache {
    text: String,
    fresh: bool,
}

/// Owns canonical content and the per-surface derivation caches.
#[derive(Debug, Clone)]
pub struct SurfaceSync {
    content: String,
    active: Surface,
    caches: [DerivationCache; 3],
    transcoder: Transcoder,
    article_id: String,
    revision: u64,
}

impl SurfaceSync {
    /// Start on the edit surface with `content` as canonical markup.
    pub fn new(content: impl Into<String>, transcoder: Transcoder) -> Self {
        let content = content.into();
        let mut sync = Self {
            content: String::new(),
            active: Surface::Edit,
            caches: Default::default(),
            transcoder,
            article_id: "unsaved".to_string(),
            revision: 0,
        };
        sync.load(content);
        sync
    }

    /// Label used on media diagnostics.
    pub fn with_article_id(mut self, article_id: impl Into<String>) -> Self {
        self.article_id = article_id.into();
        self
    }

    /// Update the diagnostics label, e.g. after the first create.
    pub fn set_article_id(&mut self, article_id: impl Into<String>) {
        self.article_id = article_id.into();
    }

    /// Replace canonical content wholesale and invalidate every cache
    /// except the active one, which is reset to the new content's view.
    pub fn load(&mut self, content: impl Into<String>) {
        self.content = content.into();
        for cache in &mut self.caches {
            cache.fresh = false;
        }
        let derived = self.active.derive(&self.content, &self.transcoder);
        self.caches[self.active.index()] = DerivationCache {
            text: derived.text,
            fresh: true,
        };
    }

    /// Canonical markup.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The active surface.
    pub fn active(&self) -> Surface {
        self.active
    }

    /// Number of mutations applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Text of the active surface.
    pub fn active_text(&self) -> &str {
        &self.caches[self.active.index()].text
    }

    /// Cached text for `surface`, if it is still valid.
    pub fn cached(&self, surface: Surface) -> Option<&str> {
        let cache = &self.caches[surface.index()];
        cache.fresh.then_some(cache.text.as_str())
    }

    /// Whether `surface` needs recomputing before it can be shown.
    pub fn is_stale(&self, surface: Surface) -> bool {
        !self.caches[surface.index()].fresh
    }

    /// Record new text typed into the active surface.
    ///
    /// Text from the markdown surface is transcoded before it reaches
    /// canonical content; edit and markup text is stored as is. The other
    /// two caches go stale.
    pub fn mutate(&mut self, new_text: &str) -> MutationReport {
        let inbound = self
            .active
            .inbound(new_text, &self.transcoder, &self.article_id);
        self.content = inbound.markup;
        self.revision += 1;

        for surface in Surface::ALL {
            let cache = &mut self.caches[surface.index()];
            if surface == self.active {
                cache.text = new_text.to_string();
                cache.fresh = true;
            } else {
                cache.fresh = false;
            }
        }

        tracing::debug!(
            surface = %self.active,
            revision = self.revision,
            bytes = self.content.len(),
            "Content mutated"
        );

        MutationReport {
            recovered_media_count: inbound.recovered_media_count,
            dropped_count: inbound.dropped_count,
            diagnostics: inbound.diagnostics,
            warnings: inbound.warnings,
        }
    }

    /// Make `surface` active, deriving its text if the cache is stale.
    ///
    /// Never touches canonical content.
    pub fn switch_to(&mut self, surface: Surface) -> SwitchReport {
        if surface == self.active {
            return SwitchReport {
                surface,
                text: self.active_text().to_string(),
                recomputed: false,
                media_mismatch_warning: false,
                warnings: Vec::new(),
            };
        }

        let index = surface.index();
        let mut report = SwitchReport {
            surface,
            text: String::new(),
            recomputed: false,
            media_mismatch_warning: false,
            warnings: Vec::new(),
        };

        if !self.caches[index].fresh {
            let derived = surface.derive(&self.content, &self.transcoder);
            self.caches[index] = DerivationCache {
                text: derived.text,
                fresh: true,
            };
            report.recomputed = true;
            report.media_mismatch_warning = derived.media_mismatch_warning;
            report.warnings = derived.warnings;
        }

        tracing::debug!(
            from = %self.active,
            to = %surface,
            recomputed = report.recomputed,
            "Switched surface"
        );
        self.active = surface;
        report.text = self.caches[index].text.clone();
        report
    }
}
