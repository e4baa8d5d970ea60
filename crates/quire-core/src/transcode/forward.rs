//! Markdown to markup.
//!
//! Two passes around a stock renderer: [`media::protect`] lifts inline
//! payloads into a side-table, pulldown-cmark renders the token-bearing
//! text, and [`PlaceholderTable::restore`] swaps the tokens for media
//! elements.

use pulldown_cmark::{Options, Parser, html};

use super::media::{self, PlaceholderTable, escape_text};
use super::{Direction, ForwardOutput, TranscodeWarning};
use crate::error::{Error, Result};

/// Renderer options: GFM tables, strikethrough, task lists and footnotes,
/// smart punctuation. Soft breaks stay soft and raw markup is not
/// sanitised.
pub fn renderer_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_SMART_PUNCTUATION
}

/// Render `text` with no media handling at all.
pub fn render_plain(text: &str) -> String {
    let parser = Parser::new_ext(text, renderer_options());
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut out, parser);
    out
}

/// Run the full protected pipeline.
///
/// Fails only when a placeholder does not survive rendering; the caller
/// decides how to recover.
pub fn render(text: &str, article_id: &str, min_payload: usize) -> Result<ForwardOutput> {
    let protected = media::protect(text, article_id, min_payload);
    let rendered = render_plain(&protected.text);
    let markup = restore(&protected.table, &rendered)?;

    tracing::debug!(
        article_id,
        recovered = protected.table.len(),
        dropped = protected.dropped.len(),
        "Rendered markdown"
    );

    Ok(ForwardOutput {
        markup,
        recovered_media_count: protected.table.len(),
        dropped_count: protected.dropped.len(),
        diagnostics: protected.dropped,
        warnings: Vec::new(),
    })
}

fn restore(table: &PlaceholderTable, rendered: &str) -> Result<String> {
    if table.is_empty() {
        return Ok(rendered.to_string());
    }
    table.restore(rendered)
}

/// Wrap `text` verbatim in a single opaque block.
pub fn fallback(text: &str, err: &Error) -> ForwardOutput {
    ForwardOutput {
        markup: format!("<pre class=\"quire-raw\">{}</pre>", escape_text(text)),
        recovered_media_count: 0,
        dropped_count: 0,
        diagnostics: Vec::new(),
        warnings: vec![TranscodeWarning::Fallback {
            direction: Direction::ToMarkup,
            reason: err.to_string(),
        }],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(len: usize) -> String {
        "iVBO".repeat(len / 4 + 1)[..len].to_string()
    }

    #[test]
    fn test_render_plain_gfm() {
        let html = render_plain("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n\n- [x] done");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("type=\"checkbox\""));
    }

    #[test]
    fn test_render_plain_keeps_raw_markup() {
        let html = render_plain("<div class=\"note\">kept</div>\n\ntext");
        assert!(html.contains("<div class=\"note\">kept</div>"));
    }

    #[test]
    fn test_soft_break_is_not_hard() {
        let html = render_plain("one\ntwo");
        assert!(!html.contains("<br"));
    }

    #[test]
    fn test_render_recovers_media() {
        let p = payload(80);
        let out = render(&format!("![Diagram](data:image/png;base64,{p})"), "a", 50).unwrap();
        assert_eq!(out.recovered_media_count, 1);
        assert_eq!(out.dropped_count, 0);
        assert!(out.markup.contains(&format!("data:image/png;base64,{p}\"")));
        assert!(out.markup.contains("<figcaption>Diagram</figcaption>"));
        assert!(!out.markup.contains("<p><figure"));
        assert!(!out.markup.contains("quiremedia"));
    }

    #[test]
    fn test_render_inline_media_inside_text() {
        let p = payload(64);
        let out = render(&format!("before ![x](data:image/gif;base64,{p}) after"), "a", 50)
            .unwrap();
        assert_eq!(out.recovered_media_count, 1);
        assert!(out.markup.starts_with("<p>before <img src=\"data:image/gif;base64,"));
        assert!(out.markup.contains("alt=\"x\"> after</p>"));
        assert!(!out.markup.contains("<figure"));
    }

    #[test]
    fn test_render_media_in_heading_and_list_is_inline() {
        let p = payload(64);
        let text = format!(
            "# Title ![Cap](data:image/png;base64,{p})\n\n- item ![Cap](data:image/png;base64,{p})"
        );
        let out = render(&text, "a", 50).unwrap();
        assert_eq!(out.recovered_media_count, 2);
        assert!(out.markup.contains("<h1>Title <img src=\"data:image/png;base64,"));
        assert!(out.markup.contains("<li>item <img src=\"data:image/png;base64,"));
        assert!(!out.markup.contains("<figure"));
    }

    #[test]
    fn test_render_leaves_code_verbatim() {
        let p = payload(80);
        let fenced = format!("```\n![Cap](data:image/png;base64,{p})\n```");
        let out = render(&fenced, "a", 50).unwrap();
        assert_eq!(out.recovered_media_count, 0);
        assert!(out.markup.starts_with("<pre><code>![Cap](data:image/png;base64,"));
        assert!(!out.markup.contains("<img"));

        let span = format!("Write `![Cap](data:image/png;base64,{p})` for images");
        let out = render(&span, "a", 50).unwrap();
        assert_eq!(out.recovered_media_count, 0);
        assert!(out.markup.contains("<code>![Cap](data:image/png;base64,"));
        assert!(!out.markup.contains("<img"));
    }

    #[test]
    fn test_render_image_tag_directive() {
        let p = payload(70);
        let text = format!("# T\n\n<img src=\"data:image/jpeg;base64,{p}\" alt=\"Photo\">\n");
        let out = render(&text, "a", 50).unwrap();
        assert_eq!(out.recovered_media_count, 1);
        assert!(out.markup.contains("<h1>T</h1>"));
        assert!(out.markup.contains("data:image/jpeg;base64,"));
        assert!(out.markup.contains("<figcaption>Photo</figcaption>"));
    }

    #[test]
    fn test_fallback_escapes() {
        let out = fallback("<b>&", &Error::transcode("boom"));
        assert_eq!(out.markup, "<pre class=\"quire-raw\">&lt;b&gt;&amp;</pre>");
        assert_eq!(out.warnings.len(), 1);
    }
}
