//! Format classifier.
//!
//! Decides whether a content string is markdown-flavoured or already
//! rendered markup. The rules are heuristic and order-sensitive:
//!
//! 1. An inline image in markdown syntax whose target is a `data:` URI makes
//!    the text markdown, even when markup tags are also present.
//! 2. Otherwise, any markdown sentinel (heading, emphasis, list item, code
//!    fence, blockquote) with no markup tag delimiters makes it markdown.
//! 3. Everything else is markup, including empty text.
//!
//! Texts that carry both sentinels and tags (without a data image) answer
//! markup under rule 3 but are reported as ambiguous by
//! [`classify_detailed`] so callers can surface them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static DATA_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[[^\]\n]*\]\(\s*<?data:").expect("valid data image regex")
});

#[allow(clippy::expect_used)]
static SENTINEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)",
        // ATX heading
        r"^[ ]{0,3}#{1,6}[ \t]",
        // strong
        r"|\*\*[^*\n]+\*\*|__[^_\n]+__",
        // emphasis
        r"|(?:^|[\s(])\*[^*\s][^*\n]*\*|(?:^|[\s(])_[^_\s][^_\n]*_",
        // list item
        r"|^[ \t]*(?:[-*+]|\d{1,9}[.)])[ \t]+\S",
        // code fence
        r"|^[ ]{0,3}(?:```|~~~)",
        // blockquote
        r"|^[ ]{0,3}>",
    ))
    .expect("valid markdown sentinel regex")
});

#[allow(clippy::expect_used)]
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("valid tag regex"));

/// The two content formats the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Markdown source.
    Markdown,
    /// Rendered markup.
    Markup,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => f.write_str("markdown"),
            Self::Markup => f.write_str("markup"),
        }
    }
}

/// A classification verdict plus the ambiguity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// The format the heuristic chose.
    pub format: Format,
    /// Markdown sentinels and tag delimiters were both present.
    pub ambiguous: bool,
}

/// Classify `text` as markdown or markup.
///
/// # Example
///
/// ```
/// use quire_core::classify::{classify, Format};
///
/// assert_eq!(classify("# Title\n\nBody"), Format::Markdown);
/// assert_eq!(classify("<p>Body</p>"), Format::Markup);
/// assert_eq!(classify("   "), Format::Markup);
/// ```
pub fn classify(text: &str) -> Format {
    classify_detailed(text).format
}

/// Classify `text` and report whether the verdict was a close call.
pub fn classify_detailed(text: &str) -> Classification {
    if text.trim().is_empty() {
        return Classification {
            format: Format::Markup,
            ambiguous: false,
        };
    }

    if DATA_IMAGE_RE.is_match(text) {
        return Classification {
            format: Format::Markdown,
            ambiguous: false,
        };
    }

    let has_sentinel = SENTINEL_RE.is_match(text);
    let has_tag = TAG_RE.is_match(text);

    if has_sentinel && !has_tag {
        Classification {
            format: Format::Markdown,
            ambiguous: false,
        }
    } else {
        Classification {
            format: Format::Markup,
            ambiguous: has_sentinel && has_tag,
        }
    }
}
