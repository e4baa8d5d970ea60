//! Edit-surface capability.
//!
//! The direct-manipulation editor (caret, selection, undo, command
//! execution) belongs to the host. The engine only drives it through
//! [`EditSurface`]. Hosts forward their content-changed notification by
//! calling `EditorSession::mutate` with [`EditSurface::content`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Caret location in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaretPosition {
    /// Horizontal offset in pixels.
    pub x: f64,
    /// Vertical offset in pixels.
    pub y: f64,
    /// Line height at the caret, for placing overlays below it.
    pub line_height: f64,
}

/// Host-provided direct-manipulation text area.
pub trait EditSurface {
    /// Current content as markup.
    fn content(&self) -> String;

    /// Replace the whole content.
    fn set_content(&mut self, markup: &str);

    /// Run an editing command at the caret, e.g. `insertHTML` or `delete`.
    fn exec_command(&mut self, name: &str, value: Option<&str>) -> Result<()>;

    /// Where the caret is on screen, if it is visible.
    fn caret_screen_position(&self) -> Option<CaretPosition>;

    /// Up to `max_chars` characters immediately before the caret.
    fn text_before_caret(&self, max_chars: usize) -> String;

    /// Give keyboard focus to the surface.
    fn focus(&mut self);
}

// ============================================================================
// Mock
// ============================================================================

/// In-memory edit surface for tests and headless use.
///
/// Keeps markup and a caret offset. Supports `insertHTML`, `insertText` and
/// `delete` (one character backwards); any other command fails.
#[derive(Debug, Clone, Default)]
pub struct MockEditSurface {
    content: String,
    caret: usize,
    focused: bool,
    position: Option<CaretPosition>,
    commands: Vec<(String, Option<String>)>,
}

impl MockEditSurface {
    /// A surface holding `markup` with the caret at the end.
    pub fn new(markup: impl Into<String>) -> Self {
        let content = markup.into();
        let caret = content.len();
        Self {
            content,
            caret,
            focused: true,
            position: Some(CaretPosition {
                x: 0.0,
                y: 0.0,
                line_height: 18.0,
            }),
            commands: Vec::new(),
        }
    }

    /// Place the caret at byte offset `offset`, clamped to a char boundary.
    pub fn set_caret(&mut self, offset: usize) {
        let mut offset = offset.min(self.content.len());
        while !self.content.is_char_boundary(offset) {
            offset -= 1;
        }
        self.caret = offset;
    }

    /// Caret byte offset.
    pub fn caret(&self) -> usize {
        self.caret
    }

    /// Set the reported caret screen position.
    pub fn set_caret_position(&mut self, position: Option<CaretPosition>) {
        self.position = position;
    }

    /// Simulate typing `text` at the caret.
    pub fn type_text(&mut self, text: &str) {
        self.content.insert_str(self.caret, text);
        self.caret += text.len();
    }

    /// Simulate the surface losing focus.
    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Whether the surface has focus.
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Commands run so far.
    pub fn commands(&self) -> &[(String, Option<String>)] {
        &self.commands
    }
}

impl EditSurface for MockEditSurface {
    fn content(&self) -> String {
        self.content.clone()
    }

    fn set_content(&mut self, markup: &str) {
        self.content = markup.to_string();
        self.caret = self.content.len();
    }

    fn exec_command(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        self.commands
            .push((name.to_string(), value.map(str::to_string)));
        match name {
            "insertHTML" | "insertText" => {
                let value = value.unwrap_or_default();
                self.type_text(value);
                Ok(())
            }
            "delete" => {
                if let Some(ch) = self.content[..self.caret].chars().next_back() {
                    let start = self.caret - ch.len_utf8();
                    self.content.replace_range(start..self.caret, "");
                    self.caret = start;
                }
                Ok(())
            }
            other => Err(Error::platform(format!("unsupported command: {other}"))),
        }
    }

    fn caret_screen_position(&self) -> Option<CaretPosition> {
        self.position
    }

    fn text_before_caret(&self, max_chars: usize) -> String {
        let before = &self.content[..self.caret];
        let skip = before.chars().count().saturating_sub(max_chars);
        before.chars().skip(skip).collect()
    }

    fn focus(&mut self) {
        self.focused = true;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_delete() {
        let mut surface = MockEditSurface::new("<p>ab</p>");
        surface.set_caret(5);
        surface.exec_command("delete", None).unwrap();
        assert_eq!(surface.content(), "<p>a</p>");
        surface.exec_command("insertHTML", Some("<b>x</b>")).unwrap();
        assert_eq!(surface.content(), "<p>a<b>x</b></p>");
        assert_eq!(surface.commands().len(), 2);
    }

    #[test]
    fn test_unknown_command() {
        let mut surface = MockEditSurface::new("");
        let err = surface.exec_command("bold", None).unwrap_err();
        assert!(matches!(err, Error::Platform(_)));
    }

    #[test]
    fn test_text_before_caret() {
        let mut surface = MockEditSurface::new("<p>héllo</p>");
        surface.set_caret(9);
        assert_eq!(surface.text_before_caret(3), "llo");
        assert_eq!(surface.text_before_caret(100), "<p>héllo");
    }

    #[test]
    fn test_set_caret_clamps_to_char_boundary() {
        let mut surface = MockEditSurface::new("é");
        surface.set_caret(1);
        assert_eq!(surface.caret(), 0);
    }

    #[test]
    fn test_focus() {
        let mut surface = MockEditSurface::new("");
        surface.blur();
        assert!(!surface.is_focused());
        surface.focus();
        assert!(surface.is_focused());
    }
}
