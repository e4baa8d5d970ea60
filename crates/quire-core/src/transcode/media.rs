//! Inline media protection.
//!
//! Base64 image payloads embedded in markdown are lifted out of the text
//! before rendering and put back afterwards. The lifted payloads live in a
//! [`PlaceholderTable`] keyed by match index; the text carries only an
//! alphanumeric token that no markdown construct can rewrite.

use pulldown_cmark::{Event, Parser, Tag};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;
use uuid::Uuid;

use super::forward::renderer_options;
use crate::error::{Error, Result};

#[allow(clippy::expect_used)]
static MARKDOWN_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"!\[(?P<alt>(?:\\.|[^\]\\\n])*)\]\(\s*<?data:(?P<mime>image/[A-Za-z0-9.+-]+);base64,"#,
        r#"(?P<payload>[A-Za-z0-9+/=]*)>?(?:\s+"[^"\n]*")?\s*\)"#,
    ))
    .expect("valid markdown image regex")
});

#[allow(clippy::expect_used)]
static IMAGE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("valid image tag regex"));

#[allow(clippy::expect_used)]
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([a-z][a-z0-9_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});

#[allow(clippy::expect_used)]
static DATA_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*data:(image/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=]*)\s*$")
        .expect("valid data uri regex")
});

#[allow(clippy::expect_used)]
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"<p>quiremedia(?P<ppass>[0-9a-f]{32})x(?P<pidx>\d+)x</p>",
        r"|quiremedia(?P<pass>[0-9a-f]{32})x(?P<idx>\d+)x",
    ))
    .expect("valid placeholder regex")
});

// ============================================================================
// Directives
// ============================================================================

/// How an inline image was written in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveSyntax {
    /// `![alt](data:...)`
    Markdown,
    /// `<img src="data:..." alt="...">`
    ImageTag,
}

/// One inline image found in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDirective {
    /// Byte offset of the first character of the directive.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    /// Alternative text, entity-decoded.
    pub alt_text: String,
    /// MIME type from the data URI.
    pub mime_type: String,
    /// Raw base64 payload.
    pub payload: String,
    /// Source syntax.
    pub syntax: DirectiveSyntax,
}

/// Find every inline data image in `text`, in source order.
///
/// Both markdown image syntax and raw `<img>` tags are recognised. Images
/// whose source is not a base64 `data:image/...` URI are left alone, and so
/// is anything written inside a code span or code block.
pub fn scan_directives(text: &str) -> Vec<MediaDirective> {
    let code = code_ranges(text);
    scan_all(text)
        .into_iter()
        .filter(|d| !code.iter().any(|r| r.contains(&d.start)))
        .collect()
}

/// Byte ranges of code spans and code blocks in `text`.
fn code_ranges(text: &str) -> Vec<Range<usize>> {
    Parser::new_ext(text, renderer_options())
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Code(_) | Event::Start(Tag::CodeBlock(_)) => Some(range),
            _ => None,
        })
        .collect()
}

fn scan_all(text: &str) -> Vec<MediaDirective> {
    let mut found: Vec<MediaDirective> = MARKDOWN_IMAGE_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(MediaDirective {
                start: whole.start(),
                end: whole.end(),
                alt_text: unescape_markdown(caps.name("alt")?.as_str()),
                mime_type: caps.name("mime")?.as_str().to_string(),
                payload: caps.name("payload")?.as_str().to_string(),
                syntax: DirectiveSyntax::Markdown,
            })
        })
        .collect();

    for tag in IMAGE_TAG_RE.find_iter(text) {
        if let Some(directive) = parse_image_tag(tag.as_str(), tag.start(), tag.end()) {
            found.push(directive);
        }
    }

    found.sort_by_key(|d| d.start);

    // An <img> written inside a markdown alt text would overlap; keep the
    // outer match.
    let mut kept: Vec<MediaDirective> = Vec::with_capacity(found.len());
    for directive in found {
        match kept.last() {
            Some(prev) if directive.start < prev.end => continue,
            _ => kept.push(directive),
        }
    }
    kept
}

fn parse_image_tag(tag: &str, start: usize, end: usize) -> Option<MediaDirective> {
    let mut src = None;
    let mut alt = String::new();
    for caps in ATTR_RE.captures_iter(tag) {
        let name = caps.get(1)?.as_str().to_ascii_lowercase();
        let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
        match name.as_str() {
            "src" => src = Some(value.to_string()),
            "alt" => alt = decode_entities(value),
            _ => {}
        }
    }
    let src = src?;
    let uri = DATA_URI_RE.captures(&src)?;
    Some(MediaDirective {
        start,
        end,
        alt_text: alt,
        mime_type: uri.get(1)?.as_str().to_string(),
        payload: uri.get(2)?.as_str().to_string(),
        syntax: DirectiveSyntax::ImageTag,
    })
}

// ============================================================================
// Placeholders
// ============================================================================

/// A payload lifted out of the text for the duration of one transcoding
/// pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlaceholder {
    /// Token substituted into the text.
    pub token: String,
    /// Alternative text, also used as the caption.
    pub alt_text: String,
    /// MIME type.
    pub mime_type: String,
    /// Raw base64 payload, byte for byte.
    pub payload: String,
}

/// Side-table mapping placeholder tokens back to their payloads.
///
/// Every table gets a fresh pass id so tokens from one pass are never
/// resolved against another.
#[derive(Debug, Clone)]
pub struct PlaceholderTable {
    pass_id: String,
    entries: BTreeMap<usize, MediaPlaceholder>,
}

impl PlaceholderTable {
    /// Create an empty table with a new pass id.
    pub fn new() -> Self {
        Self {
            pass_id: Uuid::new_v4().simple().to_string(),
            entries: BTreeMap::new(),
        }
    }

    /// This pass's id.
    pub fn pass_id(&self) -> &str {
        &self.pass_id
    }

    /// Token for the directive at `match_index`.
    pub fn token_for(&self, match_index: usize) -> String {
        format!("quiremedia{}x{}x", self.pass_id, match_index)
    }

    /// Record a directive and return its token.
    pub fn insert(&mut self, match_index: usize, directive: &MediaDirective) -> String {
        let token = self.token_for(match_index);
        self.entries.insert(
            match_index,
            MediaPlaceholder {
                token: token.clone(),
                alt_text: directive.alt_text.clone(),
                mime_type: directive.mime_type.clone(),
                payload: directive.payload.clone(),
            },
        );
        token
    }

    /// Look up the placeholder recorded at `match_index`.
    pub fn get(&self, match_index: usize) -> Option<&MediaPlaceholder> {
        self.entries.get(&match_index)
    }

    /// Number of recorded placeholders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Placeholders in match order.
    pub fn iter(&self) -> impl Iterator<Item = &MediaPlaceholder> {
        self.entries.values()
    }

    /// Replace every token of this pass in `rendered` with its media
    /// element.
    ///
    /// A token that is the sole content of a paragraph replaces the whole
    /// `<p>` with a captioned figure. A token anywhere else sits in phrasing
    /// content and becomes a bare `<img>`. Fails if any recorded token is
    /// missing from `rendered`.
    pub fn restore(&self, rendered: &str) -> Result<String> {
        let mut restored = vec![false; self.entries.len()];
        let slots: BTreeMap<usize, usize> = self
            .entries
            .keys()
            .enumerate()
            .map(|(slot, idx)| (*idx, slot))
            .collect();

        let output = TOKEN_RE.replace_all(rendered, |caps: &Captures<'_>| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let (pass, idx, standalone) = match (caps.name("ppass"), caps.name("pidx")) {
                (Some(p), Some(i)) => (p.as_str(), i.as_str(), true),
                _ => match (caps.name("pass"), caps.name("idx")) {
                    (Some(p), Some(i)) => (p.as_str(), i.as_str(), false),
                    _ => return whole.to_string(),
                },
            };
            if pass != self.pass_id {
                return whole.to_string();
            }
            let Ok(idx) = idx.parse::<usize>() else {
                return whole.to_string();
            };
            match (self.entries.get(&idx), slots.get(&idx)) {
                (Some(placeholder), Some(slot)) => {
                    restored[*slot] = true;
                    if standalone {
                        render_media_element(placeholder)
                    } else {
                        render_inline_image(placeholder)
                    }
                }
                _ => whole.to_string(),
            }
        });

        if let Some(missing) = restored.iter().position(|done| !done) {
            let token = self
                .entries
                .values()
                .nth(missing)
                .map(|p| p.token.clone())
                .unwrap_or_default();
            return Err(Error::transcode(format!(
                "placeholder {token} missing from rendered output"
            )));
        }
        Ok(output.into_owned())
    }
}

impl Default for PlaceholderTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Protection pass
// ============================================================================

/// Record of an inline image dropped by the integrity guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDiagnostic {
    /// Article the text belongs to.
    pub article_id: String,
    /// Zero-based index of the directive among all directives in the text.
    pub match_index: usize,
    /// Length of the rejected payload.
    pub payload_len: usize,
    /// MIME type of the rejected payload.
    pub mime_type: String,
}

/// Output of [`protect`].
#[derive(Debug, Clone)]
pub struct Protected {
    /// Text with surviving directives replaced by tokens and dropped ones
    /// removed.
    pub text: String,
    /// Side-table for the surviving directives.
    pub table: PlaceholderTable,
    /// One record per dropped directive.
    pub dropped: Vec<MediaDiagnostic>,
}

/// Lift every inline image out of `text`.
///
/// Payloads shorter than `min_payload` are dropped outright and reported.
pub fn protect(text: &str, article_id: &str, min_payload: usize) -> Protected {
    let directives = scan_directives(text);
    let mut table = PlaceholderTable::new();
    let mut dropped = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for (match_index, directive) in directives.iter().enumerate() {
        out.push_str(&text[cursor..directive.start]);
        cursor = directive.end;

        if directive.payload.len() < min_payload {
            tracing::warn!(
                article_id,
                match_index,
                payload_len = directive.payload.len(),
                mime_type = %directive.mime_type,
                "Dropping inline image with truncated payload"
            );
            dropped.push(MediaDiagnostic {
                article_id: article_id.to_string(),
                match_index,
                payload_len: directive.payload.len(),
                mime_type: directive.mime_type.clone(),
            });
            continue;
        }

        out.push_str(&table.insert(match_index, directive));
    }
    out.push_str(&text[cursor..]);

    Protected {
        text: out,
        table,
        dropped,
    }
}

// ============================================================================
// Rendering helpers
// ============================================================================

/// Render the self-contained media element for a placeholder.
pub fn render_media_element(placeholder: &MediaPlaceholder) -> String {
    let mut html = format!(
        r#"<figure class="quire-media"><img src="data:{};base64,{}" alt="{}">"#,
        placeholder.mime_type,
        placeholder.payload,
        escape_attr(&placeholder.alt_text)
    );
    if !placeholder.alt_text.is_empty() {
        html.push_str("<figcaption>");
        html.push_str(&escape_text(&placeholder.alt_text));
        html.push_str("</figcaption>");
    }
    html.push_str("</figure>");
    html
}

/// Render a placeholder as a bare `<img>`, valid wherever phrasing content
/// is.
pub fn render_inline_image(placeholder: &MediaPlaceholder) -> String {
    format!(
        r#"<img src="data:{};base64,{}" alt="{}">"#,
        placeholder.mime_type,
        placeholder.payload,
        escape_attr(&placeholder.alt_text)
    )
}

/// Escape text content for markup.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape a double-quoted attribute value.
pub fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

/// Drop the backslash from markdown escapes of ASCII punctuation.
fn unescape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\'
            && let Some(escaped) = chars.next_if(char::is_ascii_punctuation)
        {
            out.push(escaped);
            continue;
        }
        out.push(ch);
    }
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
