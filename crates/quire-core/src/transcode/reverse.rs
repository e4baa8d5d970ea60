//! Markup to markdown.
//!
//! A structural walk over an html5ever DOM. Elements with a markdown
//! counterpart are rewritten; anything else is kept as a raw markup block so
//! rendering the result again gives back the same element. Data-URI image
//! sources are ordinary attribute text here and pass through untouched.

use html5ever::tendril::TendrilSink;
use html5ever::{
    ParseOpts, parse_document, serialize, serialize::SerializeOpts, serialize::TraversalScope,
};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;
use std::sync::LazyLock;

use super::forward::renderer_options;
use crate::error::{Error, Result};

/// Deepest element nesting the converter will follow.
pub const MAX_DEPTH: usize = 256;

#[allow(clippy::expect_used)]
static OUTPUT_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<img\b").expect("valid output image regex")
});

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct Converted {
    /// Markdown text.
    pub markdown: String,
    /// Number of `<img>` elements in the input document.
    pub images_in: usize,
}

/// Convert `markup` to markdown.
pub fn convert(markup: &str) -> Result<Converted> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(markup);
    let body = find_body(&dom.document)
        .ok_or_else(|| Error::transcode("parsed document has no body"))?;

    let images_in = count_elements(&body, "img");
    let mut writer = MarkdownWriter;
    let blocks = writer.blocks(&body, 0)?;

    Ok(Converted {
        markdown: blocks.join("\n\n"),
        images_in,
    })
}

/// Count images the markdown would render, raw `<img>` tags included.
///
/// Image syntax inside code is text, not an image, and is not counted.
pub fn count_output_images(markdown: &str) -> usize {
    Parser::new_ext(markdown, renderer_options())
        .map(|event| match event {
            Event::Start(Tag::Image { .. }) => 1,
            Event::Html(html) | Event::InlineHtml(html) => {
                OUTPUT_IMAGE_RE.find_iter(&html).count()
            }
            _ => 0,
        })
        .sum()
}

// ============================================================================
// Writer
// ============================================================================

struct MarkdownWriter;

impl MarkdownWriter {
    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(Error::transcode(format!(
                "markup nesting exceeds {MAX_DEPTH} levels"
            )));
        }
        Ok(())
    }

    /// Convert the children of `parent` into markdown blocks.
    fn blocks(&mut self, parent: &Handle, depth: usize) -> Result<Vec<String>> {
        self.check_depth(depth)?;
        let mut out = Vec::new();
        let mut run: Vec<Handle> = Vec::new();

        for child in parent.children.borrow().iter() {
            match &child.data {
                NodeData::Element { name, .. } if is_block(&name.local) => {
                    self.flush_inline(&mut run, &mut out, depth)?;
                    self.block(child, &name.local, depth + 1, &mut out)?;
                }
                NodeData::Comment { contents } => {
                    self.flush_inline(&mut run, &mut out, depth)?;
                    out.push(format!("<!--{contents}-->"));
                }
                NodeData::Text { .. } | NodeData::Element { .. } => run.push(child.clone()),
                _ => {}
            }
        }
        self.flush_inline(&mut run, &mut out, depth)?;
        Ok(out)
    }

    fn flush_inline(
        &mut self,
        run: &mut Vec<Handle>,
        out: &mut Vec<String>,
        depth: usize,
    ) -> Result<()> {
        if run.is_empty() {
            return Ok(());
        }
        let text = self.inline_nodes(run, depth)?;
        run.clear();
        let para = tidy_paragraph(&text);
        if !para.is_empty() {
            out.push(para);
        }
        Ok(())
    }

    fn block(
        &mut self,
        node: &Handle,
        name: &str,
        depth: usize,
        out: &mut Vec<String>,
    ) -> Result<()> {
        self.check_depth(depth)?;
        match name {
            "p" => {
                let para = tidy_paragraph(&self.inline_children(node, depth)?);
                if !para.is_empty() {
                    out.push(para);
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = self.inline_children(node, depth)?;
                let text = text.replace("\\\n", " ").replace('\n', " ");
                out.push(format!(
                    "{} {}",
                    "#".repeat(level),
                    escape_closing_hashes(text.trim())
                ));
            }
            "pre" => out.push(code_block(node)),
            "blockquote" => {
                let inner = self.blocks(node, depth)?.join("\n\n");
                if !inner.is_empty() {
                    out.push(prefix_lines(&inner, "> ", ">"));
                }
            }
            "ul" | "ol" => out.push(self.list(node, name == "ol", depth)?),
            "hr" => out.push("---".to_string()),
            "table" => match self.table(node, depth)? {
                Some(table) => out.push(table),
                None => out.push(raw(node)?),
            },
            "figure" => match figure(node) {
                Some(image) => out.push(image),
                None => out.push(raw(node)?),
            },
            "div" | "section" | "article" | "main" | "header" | "footer" | "li"
                if !has_attributes(node) =>
            {
                out.extend(self.blocks(node, depth)?);
            }
            _ => out.push(raw(node)?),
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Inline content
    // ------------------------------------------------------------------------

    fn inline_children(&mut self, node: &Handle, depth: usize) -> Result<String> {
        let children: Vec<Handle> = node.children.borrow().iter().cloned().collect();
        self.inline_nodes(&children, depth + 1)
    }

    fn inline_nodes(&mut self, nodes: &[Handle], depth: usize) -> Result<String> {
        let mut out = String::new();
        for node in nodes {
            out.push_str(&self.inline(node, depth)?);
        }
        Ok(out)
    }

    fn inline(&mut self, node: &Handle, depth: usize) -> Result<String> {
        self.check_depth(depth)?;
        let name = match &node.data {
            NodeData::Text { contents } => {
                return Ok(escape_markdown(&collapse_whitespace(&contents.borrow())));
            }
            NodeData::Comment { contents } => return Ok(format!("<!--{contents}-->")),
            NodeData::Element { name, .. } => name.local.to_string(),
            _ => return Ok(String::new()),
        };

        let text = match name.as_str() {
            "strong" | "b" => wrap(&self.inline_children(node, depth)?, "**"),
            "em" | "i" => wrap(&self.inline_children(node, depth)?, "*"),
            "del" | "s" | "strike" => wrap(&self.inline_children(node, depth)?, "~~"),
            "code" => code_span(&text_content(node)),
            "a" => {
                let inner = self.inline_children(node, depth)?;
                match attr(node, "href") {
                    Some(href) => format!(
                        "[{}]({}{})",
                        inner.trim(),
                        destination(&href),
                        title_suffix(node)
                    ),
                    None => inner,
                }
            }
            "img" => image(node),
            "br" => "\\\n".to_string(),
            "input" if attr(node, "type").as_deref() == Some("checkbox") => String::new(),
            "span" | "font" if !has_attributes(node) => self.inline_children(node, depth)?,
            _ => raw(node)?,
        };
        Ok(text)
    }

    // ------------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------------

    fn list(&mut self, node: &Handle, ordered: bool, depth: usize) -> Result<String> {
        let mut number = attr(node, "start")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(1);
        let mut items = Vec::new();
        let mut loose = false;

        for child in element_children(node) {
            if local_name(&child).as_deref() != Some("li") {
                continue;
            }
            let marker = if ordered {
                let m = format!("{number}. ");
                number += 1;
                m
            } else {
                "- ".to_string()
            };

            let item_loose = element_children(&child)
                .iter()
                .any(|c| local_name(c).as_deref() == Some("p"));
            loose |= item_loose;

            let blocks = self.blocks(&child, depth + 1)?;
            let mut body = blocks.join(if item_loose { "\n\n" } else { "\n" });
            if let Some(checked) = task_state(&child) {
                let mark = if checked { "[x] " } else { "[ ] " };
                body = format!("{mark}{body}");
            }

            let indent = " ".repeat(marker.len());
            let indented = indent_continuation(&body, &indent);
            items.push(format!("{marker}{indented}").trim_end().to_string());
        }

        Ok(items.join(if loose { "\n\n" } else { "\n" }))
    }

    // ------------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------------

    fn table(&mut self, node: &Handle, depth: usize) -> Result<Option<String>> {
        let mut rows: Vec<Handle> = Vec::new();
        for child in element_children(node) {
            match local_name(&child).as_deref() {
                Some("thead" | "tbody" | "tfoot") => rows.extend(
                    element_children(&child)
                        .into_iter()
                        .filter(|r| local_name(r).as_deref() == Some("tr")),
                ),
                Some("tr") => rows.push(child),
                Some("caption" | "colgroup") => return Ok(None),
                _ => {}
            }
        }
        if rows.is_empty() {
            return Ok(None);
        }

        let mut grid: Vec<Vec<String>> = Vec::new();
        let mut aligns: Vec<Option<&'static str>> = Vec::new();
        for (row_index, row) in rows.iter().enumerate() {
            let mut cells = Vec::new();
            for cell in element_children(row) {
                if !matches!(local_name(&cell).as_deref(), Some("td" | "th")) {
                    continue;
                }
                if attr(&cell, "colspan").is_some() || attr(&cell, "rowspan").is_some() {
                    return Ok(None);
                }
                if row_index == 0 {
                    aligns.push(cell_alignment(&cell));
                }
                let text = self.inline_children(&cell, depth)?;
                let text = text
                    .replace("\\\n", " ")
                    .replace('\n', " ")
                    .replace('|', "\\|");
                cells.push(text.trim().to_string());
            }
            grid.push(cells);
        }

        let columns = grid.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return Ok(None);
        }
        aligns.resize(columns, None);

        let mut lines = Vec::with_capacity(grid.len() + 1);
        for (i, mut cells) in grid.into_iter().enumerate() {
            cells.resize(columns, String::new());
            lines.push(format!("| {} |", cells.join(" | ")));
            if i == 0 {
                let rule: Vec<&str> = aligns
                    .iter()
                    .map(|a| match a {
                        Some("left") => ":---",
                        Some("center") => ":---:",
                        Some("right") => "---:",
                        _ => "---",
                    })
                    .collect();
                lines.push(format!("| {} |", rule.join(" | ")));
            }
        }
        Ok(Some(lines.join("\n")))
    }
}

// ============================================================================
// Element helpers
// ============================================================================

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "pre"
            | "blockquote"
            | "ul"
            | "ol"
            | "li"
            | "hr"
            | "table"
            | "figure"
            | "figcaption"
            | "div"
            | "section"
            | "article"
            | "main"
            | "header"
            | "footer"
            | "nav"
            | "aside"
            | "details"
            | "summary"
            | "dl"
            | "address"
            | "fieldset"
            | "form"
            | "iframe"
            | "video"
            | "audio"
            | "script"
            | "style"
    )
}

fn find_body(document: &Handle) -> Option<Handle> {
    let html = document
        .children
        .borrow()
        .iter()
        .find(|c| local_name(c).as_deref() == Some("html"))
        .cloned()?;
    let body = html
        .children
        .borrow()
        .iter()
        .find(|c| local_name(c).as_deref() == Some("body"))
        .cloned();
    body
}

fn local_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

fn attr(node: &Handle, key: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == key)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn has_attributes(node: &Handle) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => !attrs.borrow().is_empty(),
        _ => false,
    }
}

fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|c| matches!(c.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

/// Concatenated text of every descendant, walked without recursion.
fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    let mut stack = vec![node.clone()];
    while let Some(current) = stack.pop() {
        if let NodeData::Text { contents } = &current.data {
            out.push_str(&contents.borrow());
        }
        for child in current.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }
    out
}

fn count_elements(node: &Handle, name: &str) -> usize {
    let mut count = 0;
    let mut stack = vec![node.clone()];
    while let Some(current) = stack.pop() {
        if local_name(&current).as_deref() == Some(name) {
            count += 1;
        }
        stack.extend(current.children.borrow().iter().cloned());
    }
    count
}

fn raw(node: &Handle) -> Result<String> {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    serialize(&mut bytes, &SerializableHandle::from(node.clone()), opts)?;
    let html = String::from_utf8(bytes)
        .map_err(|e| Error::transcode(format!("serialized markup is not UTF-8: {e}")))?;
    // A blank line would end the raw block early once this is read back as
    // markdown.
    Ok(html
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn task_state(item: &Handle) -> Option<bool> {
    let mut first = first_significant_child(item)?;
    if local_name(&first).as_deref() == Some("p") {
        first = first_significant_child(&first)?;
    }
    if local_name(&first).as_deref() == Some("input")
        && attr(&first, "type").as_deref() == Some("checkbox")
    {
        return Some(attr(&first, "checked").is_some());
    }
    None
}

fn first_significant_child(node: &Handle) -> Option<Handle> {
    node.children
        .borrow()
        .iter()
        .find(|c| match &c.data {
            NodeData::Text { contents } => !contents.borrow().trim().is_empty(),
            NodeData::Element { .. } => true,
            _ => false,
        })
        .cloned()
}

fn cell_alignment(cell: &Handle) -> Option<&'static str> {
    let style = attr(cell, "style").unwrap_or_default().to_ascii_lowercase();
    let align = attr(cell, "align").unwrap_or_default().to_ascii_lowercase();
    ["left", "center", "right"]
        .into_iter()
        .find(|a| align == *a || style.contains(&format!("text-align: {a}")))
}

fn code_block(pre: &Handle) -> String {
    let lang = element_children(pre)
        .into_iter()
        .find(|c| local_name(c).as_deref() == Some("code"))
        .and_then(|code| attr(&code, "class"))
        .and_then(|class| {
            class
                .split_whitespace()
                .find_map(|c| c.strip_prefix("language-").map(str::to_string))
        })
        .unwrap_or_default();

    let content = text_content(pre);
    let content = content.strip_suffix('\n').unwrap_or(&content);
    let fence = "`".repeat(longest_run(content, '`').max(2) + 1);
    format!("{fence}{lang}\n{content}\n{fence}")
}

fn figure(node: &Handle) -> Option<String> {
    let mut img = None;
    let mut caption = String::new();
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } if contents.borrow().trim().is_empty() => {}
            NodeData::Element { name, .. } => match &*name.local {
                "img" if img.is_none() => img = Some(child.clone()),
                "figcaption" => caption = text_content(child).trim().to_string(),
                _ => return None,
            },
            _ => return None,
        }
    }
    let img = img?;
    let alt = attr(&img, "alt").unwrap_or_default();
    let alt = if alt.is_empty() { caption } else { alt };
    let src = attr(&img, "src").unwrap_or_default();
    Some(format!("![{}]({})", escape_alt(&alt), destination(&src)))
}

fn image(node: &Handle) -> String {
    let alt = attr(node, "alt").unwrap_or_default();
    let src = attr(node, "src").unwrap_or_default();
    format!(
        "![{}]({}{})",
        escape_alt(&alt),
        destination(&src),
        title_suffix(node)
    )
}

fn title_suffix(node: &Handle) -> String {
    match attr(node, "title") {
        Some(title) if !title.is_empty() => format!(" \"{}\"", title.replace('"', "\\\"")),
        _ => String::new(),
    }
}

// ============================================================================
// Text helpers
// ============================================================================

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn escape_markdown(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, ch) in chars.iter().enumerate() {
        match ch {
            '\\' | '`' | '*' | '[' | ']' | '<' | '~' => {
                out.push('\\');
                out.push(*ch);
            }
            '_' => {
                let prev = i.checked_sub(1).and_then(|p| chars.get(p));
                let next = chars.get(i + 1);
                let inside_word = prev.is_some_and(|c| c.is_alphanumeric())
                    && next.is_some_and(|c| c.is_alphanumeric());
                if !inside_word {
                    out.push('\\');
                }
                out.push('_');
            }
            '&' if starts_entity(&chars[i + 1..]) => out.push_str("\\&"),
            _ => out.push(*ch),
        }
    }
    out
}

/// Whether `rest` (the text after an `&`) would be read as a character
/// reference.
fn starts_entity(rest: &[char]) -> bool {
    let (digits, body): (fn(&char) -> bool, &[char]) = match rest {
        ['#', 'x' | 'X', body @ ..] => (char::is_ascii_hexdigit, body),
        ['#', body @ ..] => (char::is_ascii_digit, body),
        [first, ..] if first.is_ascii_alphabetic() => (char::is_ascii_alphanumeric, rest),
        _ => return false,
    };
    let len = body.iter().take_while(|c| digits(*c)).count();
    len > 0 && body.get(len) == Some(&';')
}

/// Escape a trailing run of `#` that would otherwise close an ATX heading.
fn escape_closing_hashes(text: &str) -> String {
    let body = text.trim_end_matches('#');
    if body.len() == text.len() || !(body.is_empty() || body.ends_with(' ')) {
        return text.to_string();
    }
    format!("{body}\\{}", &text[body.len()..])
}

fn escape_alt(alt: &str) -> String {
    let chars: Vec<char> = alt.chars().collect();
    let mut out = String::with_capacity(alt.len());
    for (i, ch) in chars.iter().enumerate() {
        match ch {
            '\\' | '[' | ']' => out.push('\\'),
            '&' if starts_entity(&chars[i + 1..]) => out.push('\\'),
            _ => {}
        }
        out.push(*ch);
    }
    out
}

/// Trim each line and escape characters that would start a block.
fn tidy_paragraph(text: &str) -> String {
    text.split('\n')
        .map(|line| escape_line_start(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn escape_line_start(line: &str) -> String {
    if line.starts_with(['#', '>', '-', '+', '=']) {
        return format!("\\{line}");
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if rest.starts_with(['.', ')'])
            && rest[1..].chars().next().is_none_or(|c| c == ' ')
        {
            return format!("{}\\{}", &line[..digits], rest);
        }
    }
    line.to_string()
}

fn wrap(inner: &str, mark: &str) -> String {
    let core = inner.trim();
    if core.is_empty() {
        return inner.to_string();
    }
    let lead = &inner[..inner.len() - inner.trim_start().len()];
    let trail = &inner[inner.trim_end().len()..];
    format!("{lead}{mark}{core}{mark}{trail}")
}

fn code_span(content: &str) -> String {
    let content = content.replace('\n', " ");
    let ticks = "`".repeat(longest_run(&content, '`') + 1);
    let pad = if content.starts_with('`') || content.ends_with('`') {
        " "
    } else {
        ""
    };
    format!("{ticks}{pad}{content}{pad}{ticks}")
}

fn longest_run(text: &str, target: char) -> usize {
    let mut best = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == target {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

fn destination(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    if url.contains([' ', '(', ')', '<', '>']) {
        format!("<{}>", url.replace('<', "%3C").replace('>', "%3E"))
    } else {
        url.to_string()
    }
}

fn prefix_lines(text: &str, prefix: &str, empty_prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                empty_prefix.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent_continuation(text: &str, indent: &str) -> String {
    let mut lines = text.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
    }
    out
}
