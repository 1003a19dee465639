//! # Flowref TUI Library
//!
//! Terminal adapters for variable references: the inline tag line shown in
//! place of a `{{__...}}` value, and the modal that edits the nested path of
//! a reference to a container output.
//!
//! All state lives in `flowref-engine`; this crate only maps it to ratatui
//! text and widgets and feeds crossterm key events back into it.

mod remainder_input;
mod reference_tag;
pub mod theme;
mod variable_editor;

pub use reference_tag::{issue_line, tag_line, truncate_to_width};
pub use remainder_input::RemainderInput;
pub use variable_editor::{EditorOutcome, VariableEditorModal, run_editor};
