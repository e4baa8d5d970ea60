//! Insertable block kinds and the catalog that lists them.

use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;

/// Callout flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutVariant {
    /// Neutral information.
    Info,
    /// Something to be careful about.
    Warning,
    /// A positive outcome.
    Success,
    /// Something that will break.
    Danger,
}

impl CalloutVariant {
    /// Every variant.
    pub const ALL: [CalloutVariant; 4] = [
        CalloutVariant::Info,
        CalloutVariant::Warning,
        CalloutVariant::Success,
        CalloutVariant::Danger,
    ];

    /// Lowercase name, also used as the CSS modifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Success => "success",
            Self::Danger => "danger",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Success => "Success",
            Self::Danger => "Danger",
        }
    }
}

/// A structured block the menu can insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    /// Heading of the given level, 1 to 6.
    Heading {
        /// Heading level.
        level: u8,
    },
    /// Plain paragraph.
    Paragraph,
    /// Unordered list.
    BulletList,
    /// Ordered list.
    NumberedList,
    /// Block quotation.
    Quote,
    /// Preformatted code.
    CodeBlock,
    /// Table skeleton with a header row.
    Table {
        /// Body rows, header excluded.
        rows: usize,
        /// Columns.
        columns: usize,
    },
    /// Horizontal rule.
    Divider,
    /// Highlighted note.
    Callout {
        /// Flavour.
        variant: CalloutVariant,
    },
    /// Collapsible section.
    Expandable,
}

impl BlockKind {
    /// Markup inserted at the caret for this block.
    pub fn fragment(&self) -> String {
        match self {
            Self::Heading { level } => {
                let level = (*level).clamp(1, 6);
                format!("<h{level}>Heading</h{level}>")
            }
            Self::Paragraph => "<p>Text</p>".to_string(),
            Self::BulletList => "<ul><li>List item</li></ul>".to_string(),
            Self::NumberedList => "<ol><li>List item</li></ol>".to_string(),
            Self::Quote => "<blockquote><p>Quote</p></blockquote>".to_string(),
            Self::CodeBlock => "<pre><code>code</code></pre>".to_string(),
            Self::Table { rows, columns } => table_fragment((*rows).max(1), (*columns).max(1)),
            Self::Divider => "<hr>".to_string(),
            Self::Callout { variant } => format!(
                "<div class=\"quire-callout quire-callout-{}\"><p><strong>{}</strong> Note</p></div>",
                variant.as_str(),
                variant.title()
            ),
            Self::Expandable => concat!(
                "<details class=\"quire-expandable\">",
                "<summary>Details</summary><p>Content</p></details>"
            )
            .to_string(),
        }
    }
}

fn table_fragment(rows: usize, columns: usize) -> String {
    let mut html = String::from("<table><thead><tr>");
    for c in 1..=columns {
        html.push_str(&format!("<th>Header {c}</th>"));
    }
    html.push_str("</tr></thead><tbody>");
    for _ in 0..rows {
        html.push_str("<tr>");
        for _ in 0..columns {
            html.push_str("<td><br></td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTemplate {
    /// Stable identifier, e.g. `heading-2`.
    pub id: String,
    /// Label shown in the menu.
    pub label: String,
    /// Extra words the filter matches.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// What gets inserted.
    pub kind: BlockKind,
}

impl BlockTemplate {
    /// Create a template.
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            keywords: Vec::new(),
            kind,
        }
    }

    /// Add filter keywords.
    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords
            .extend(keywords.iter().map(|k| k.to_string()));
        self
    }

    /// Whether any word of the label, the id or a keyword starts with
    /// `query`, ignoring case.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let label = self.label.to_lowercase();
        label.starts_with(&query)
            || label.split_whitespace().any(|w| w.starts_with(&query))
            || self.id.to_lowercase().starts_with(&query)
            || self
                .keywords
                .iter()
                .any(|k| k.to_lowercase().starts_with(&query))
    }
}

/// Ordered, swappable list of insertable blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCatalog {
    templates: Vec<BlockTemplate>,
}

impl BlockCatalog {
    /// A catalog with exactly `templates`.
    pub fn new(templates: Vec<BlockTemplate>) -> Self {
        Self { templates }
    }

    /// The standard catalog, sized from `config`.
    pub fn standard(config: &EditorConfig) -> Self {
        let mut templates = vec![
            BlockTemplate::new("heading-1", "Heading 1", BlockKind::Heading { level: 1 })
                .with_keywords(&["h1", "title"]),
            BlockTemplate::new("heading-2", "Heading 2", BlockKind::Heading { level: 2 })
                .with_keywords(&["h2", "subtitle"]),
            BlockTemplate::new("heading-3", "Heading 3", BlockKind::Heading { level: 3 })
                .with_keywords(&["h3"]),
            BlockTemplate::new("paragraph", "Paragraph", BlockKind::Paragraph)
                .with_keywords(&["text"]),
            BlockTemplate::new("bullet-list", "Bulleted list", BlockKind::BulletList)
                .with_keywords(&["ul", "unordered"]),
            BlockTemplate::new("numbered-list", "Numbered list", BlockKind::NumberedList)
                .with_keywords(&["ol", "ordered"]),
            BlockTemplate::new("quote", "Quote", BlockKind::Quote).with_keywords(&["blockquote"]),
            BlockTemplate::new("code", "Code block", BlockKind::CodeBlock)
                .with_keywords(&["pre", "snippet"]),
            BlockTemplate::new(
                "table",
                "Table",
                BlockKind::Table {
                    rows: config.table_rows,
                    columns: config.table_columns,
                },
            )
            .with_keywords(&["grid"]),
            BlockTemplate::new("divider", "Divider", BlockKind::Divider)
                .with_keywords(&["hr", "rule", "separator"]),
        ];
        for variant in CalloutVariant::ALL {
            templates.push(
                BlockTemplate::new(
                    format!("callout-{}", variant.as_str()),
                    format!("{} callout", variant.title()),
                    BlockKind::Callout { variant },
                )
                .with_keywords(&["callout", "note"]),
            );
        }
        templates.push(
            BlockTemplate::new("expandable", "Expandable section", BlockKind::Expandable)
                .with_keywords(&["toggle", "details", "collapse"]),
        );
        Self { templates }
    }

    /// All templates in order.
    pub fn templates(&self) -> &[BlockTemplate] {
        &self.templates
    }

    /// Template with `id`.
    pub fn get(&self, id: &str) -> Option<&BlockTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Templates matching `query`, in catalog order.
    pub fn filter(&self, query: &str) -> Vec<&BlockTemplate> {
        self.templates.iter().filter(|t| t.matches(query)).collect()
    }

    /// Append a template.
    pub fn push(&mut self, template: BlockTemplate) {
        self.templates.push(template);
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for BlockCatalog {
    fn default() -> Self {
        Self::standard(&EditorConfig::default())
    }
}
