//! Slash-command block insertion.
//!
//! [`BlockCatalog`] lists what can be inserted, [`BlockMenu`] tracks the
//! overlay, and [`insert_fragment`] applies a selection to the host's
//! [`EditSurface`].

pub mod catalog;
pub mod menu;

pub use catalog::{BlockCatalog, BlockKind, BlockTemplate, CalloutVariant};
pub use menu::{BlockMenu, MenuKey, MenuOutcome};

use crate::error::Result;
use crate::platform::EditSurface;

/// Erase `erase` characters before the caret, insert `fragment` there and
/// hand focus back to the surface.
pub fn insert_fragment(surface: &mut dyn EditSurface, fragment: &str, erase: usize) -> Result<()> {
    for _ in 0..erase {
        surface.exec_command("delete", None)?;
    }
    surface.exec_command("insertHTML", Some(fragment))?;
    surface.focus();
    Ok(())
}
