//! Slash-command menu state.
//!
//! The menu opens when the trigger character is typed at the start of a
//! block or after whitespace, and only on the edit surface. Characters typed
//! after the trigger narrow the list. Choosing an entry yields the template
//! and the number of characters (trigger plus query) to erase before the
//! fragment goes in; dismissing leaves the typed text alone.

use crate::platform::CaretPosition;
use crate::surface::Surface;

use super::catalog::{BlockCatalog, BlockTemplate};

/// Navigation input while the menu is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKey {
    /// Move the highlight up.
    Up,
    /// Move the highlight down.
    Down,
    /// Choose the highlighted entry.
    Enter,
    /// Close without inserting.
    Escape,
    /// Delete the last query character, or the trigger itself.
    Backspace,
}

/// What the menu did with an input.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuOutcome {
    /// Nothing changed.
    Ignored,
    /// The overlay opened at `anchor`.
    Opened {
        /// Caret position to anchor the overlay to.
        anchor: Option<CaretPosition>,
    },
    /// The query or highlight changed.
    Updated,
    /// The overlay closed without inserting.
    Closed,
    /// An entry was chosen.
    Selected {
        /// The chosen template.
        template: BlockTemplate,
        /// Characters before the caret to erase: the trigger plus query.
        erase: usize,
    },
}

#[derive(Debug, Clone)]
struct OpenMenu {
    anchor: Option<CaretPosition>,
    query: String,
    selected: usize,
    matches: Vec<BlockTemplate>,
}

/// Slash-command overlay state machine.
#[derive(Debug, Clone)]
pub struct BlockMenu {
    trigger: char,
    open: Option<OpenMenu>,
}

impl BlockMenu {
    /// A closed menu opened by `trigger`.
    pub fn new(trigger: char) -> Self {
        Self {
            trigger,
            open: None,
        }
    }

    /// The trigger character.
    pub fn trigger(&self) -> char {
        self.trigger
    }

    /// Whether the overlay is showing.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Text typed after the trigger.
    pub fn query(&self) -> Option<&str> {
        self.open.as_ref().map(|m| m.query.as_str())
    }

    /// Where the overlay is anchored.
    pub fn anchor(&self) -> Option<CaretPosition> {
        self.open.as_ref().and_then(|m| m.anchor)
    }

    /// Entries currently listed.
    pub fn entries(&self) -> &[BlockTemplate] {
        self.open.as_ref().map(|m| m.matches.as_slice()).unwrap_or(&[])
    }

    /// Index of the highlighted entry.
    pub fn selected(&self) -> Option<usize> {
        self.open.as_ref().map(|m| m.selected)
    }

    /// Feed a character the user just typed.
    ///
    /// `before` is the text that precedes the typed character on the
    /// surface; it decides whether the trigger sits at a block or word
    /// boundary.
    pub fn on_typed(
        &mut self,
        ch: char,
        surface: Surface,
        before: &str,
        anchor: Option<CaretPosition>,
        catalog: &BlockCatalog,
    ) -> MenuOutcome {
        if surface != Surface::Edit {
            return self.close();
        }

        let Some(menu) = self.open.as_mut() else {
            if ch == self.trigger && at_boundary(before) {
                self.open = Some(OpenMenu {
                    anchor,
                    query: String::new(),
                    selected: 0,
                    matches: catalog.templates().to_vec(),
                });
                tracing::debug!(trigger = %ch, "Block menu opened");
                return MenuOutcome::Opened { anchor };
            }
            return MenuOutcome::Ignored;
        };

        if ch.is_whitespace() {
            return self.close();
        }
        menu.query.push(ch);
        refilter(menu, catalog);
        if menu.matches.is_empty() {
            return self.close();
        }
        MenuOutcome::Updated
    }

    /// Feed a navigation key.
    pub fn on_key(&mut self, key: MenuKey, catalog: &BlockCatalog) -> MenuOutcome {
        let Some(menu) = self.open.as_mut() else {
            return MenuOutcome::Ignored;
        };

        match key {
            MenuKey::Up => {
                let len = menu.matches.len().max(1);
                menu.selected = (menu.selected + len - 1) % len;
                MenuOutcome::Updated
            }
            MenuKey::Down => {
                let len = menu.matches.len().max(1);
                menu.selected = (menu.selected + 1) % len;
                MenuOutcome::Updated
            }
            MenuKey::Enter => {
                let index = menu.selected;
                self.choose(index)
            }
            MenuKey::Escape => self.close(),
            MenuKey::Backspace => {
                if menu.query.pop().is_none() {
                    return self.close();
                }
                refilter(menu, catalog);
                MenuOutcome::Updated
            }
        }
    }

    /// Choose the entry at `index`, e.g. from a pointer click.
    pub fn choose(&mut self, index: usize) -> MenuOutcome {
        let Some(menu) = self.open.as_ref() else {
            return MenuOutcome::Ignored;
        };
        let Some(template) = menu.matches.get(index).cloned() else {
            return MenuOutcome::Ignored;
        };
        let erase = 1 + menu.query.chars().count();
        self.open = None;
        tracing::debug!(block = %template.id, "Block menu selection");
        MenuOutcome::Selected { template, erase }
    }

    /// Close without inserting, e.g. on focus loss.
    pub fn close(&mut self) -> MenuOutcome {
        match self.open.take() {
            Some(_) => MenuOutcome::Closed,
            None => MenuOutcome::Ignored,
        }
    }
}

fn refilter(menu: &mut OpenMenu, catalog: &BlockCatalog) {
    menu.matches = catalog
        .filter(&menu.query)
        .into_iter()
        .cloned()
        .collect();
    menu.selected = 0;
}

/// Start of content, after whitespace, after a tag close, or after a
/// non-breaking space entity.
fn at_boundary(before: &str) -> bool {
    match before.chars().next_back() {
        None => true,
        Some(c) if c.is_whitespace() || c == '>' => true,
        Some(';') => before.ends_with("&nbsp;"),
        Some(_) => false,
    }
}
