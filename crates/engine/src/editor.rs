//! Field-level editing of references.
//!
//! [`ReferenceField`] is the state machine behind one reference-bearing form
//! field: it is either displaying its value, waiting for the variable picker,
//! or editing the remainder of a container reference through a
//! [`VariableEditor`]. Only the field's string value survives a round trip;
//! every transition that changes it yields a [`FieldChange`] for the host to
//! write back.

use flowref_types::OutputRegistry;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::reference::{self, REFERENCE_MARKER};
use crate::render::{Translate, output_display_name};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("the nested path must not be empty")]
    EmptyRemainder,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("the field is already picking or editing")]
    Busy,
    #[error("the field does not hold a variable reference")]
    NotAReference,
    #[error("the referenced variable no longer exists")]
    Unresolved,
    #[error("only array, object and any outputs have nested paths")]
    NotEditable,
    #[error("no variable picker is open for this field")]
    NotPicking,
    #[error("no variable editor is open for this field")]
    NotEditing,
    #[error("picked value {0:?} is not a variable token")]
    InvalidPick(String),
    #[error(transparent)]
    Editor(#[from] EditorError),
}

/// Remainder editor: a fixed label plus an editable nested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEditor {
    matched_id: String,
    output_name: String,
    original: String,
    draft: String,
}

impl VariableEditor {
    pub fn new(matched_id: impl Into<String>, output_name: impl Into<String>, remainder: impl Into<String>) -> Self {
        let remainder = remainder.into();
        Self {
            matched_id: matched_id.into(),
            output_name: output_name.into(),
            draft: remainder.clone(),
            original: remainder,
        }
    }

    pub fn matched_id(&self) -> &str {
        &self.matched_id
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Immutable prefix shown before the input.
    pub fn label(&self) -> String {
        format!("{} ({})", self.matched_id, self.output_name)
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.original
    }

    /// Encoded value for the current draft: `{{<matched_id>.<draft>}}`.
    pub fn confirm(&self) -> Result<String, EditorError> {
        let remainder = self.draft.trim();
        if remainder.is_empty() {
            return Err(EditorError::EmptyRemainder);
        }
        Ok(reference::encode(&self.matched_id, remainder))
    }
}

/// Field mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMode {
    Display,
    Picking,
    Editing(VariableEditor),
}

/// New field value emitted by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceField {
    value: Value,
    mode: FieldMode,
}

impl ReferenceField {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            mode: FieldMode::Display,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn mode(&self) -> &FieldMode {
        &self.mode
    }

    pub fn editor(&self) -> Option<&VariableEditor> {
        match &self.mode {
            FieldMode::Editing(editor) => Some(editor),
            _ => None,
        }
    }

    pub fn editor_mut(&mut self) -> Option<&mut VariableEditor> {
        match &mut self.mode {
            FieldMode::Editing(editor) => Some(editor),
            _ => None,
        }
    }

    pub fn begin_pick(&mut self) -> Result<(), FieldError> {
        self.ensure_display()?;
        self.mode = FieldMode::Picking;
        Ok(())
    }

    /// Accepts the picker's result, either a registry key (`__3.slices`) or
    /// an already encoded value.
    pub fn finish_pick(&mut self, picked: &str) -> Result<FieldChange, FieldError> {
        if self.mode != FieldMode::Picking {
            return Err(FieldError::NotPicking);
        }
        let encoded = if picked.starts_with(REFERENCE_MARKER) {
            reference::encode(picked, "")
        } else {
            picked.to_string()
        };
        if reference::parse_str(&encoded).is_none() {
            return Err(FieldError::InvalidPick(picked.to_string()));
        }
        self.mode = FieldMode::Display;
        Ok(self.replace_value(encoded))
    }

    pub fn cancel_pick(&mut self) {
        if self.mode == FieldMode::Picking {
            self.mode = FieldMode::Display;
        }
    }

    /// Opens the remainder editor. Only resolved references to container
    /// outputs can be edited, and only from display mode.
    pub fn begin_edit(&mut self, registry: &OutputRegistry, translator: &dyn Translate) -> Result<&mut VariableEditor, FieldError> {
        self.ensure_display()?;
        let parsed = reference::parse(&self.value).ok_or(FieldError::NotAReference)?;
        let resolved = reference::resolve(&parsed.raw, registry).ok_or(FieldError::Unresolved)?;
        let descriptor = resolved.descriptor;
        if !descriptor.r#type.is_container() {
            return Err(FieldError::NotEditable);
        }
        let output_name = output_display_name(descriptor, translator);
        self.mode = FieldMode::Editing(VariableEditor::new(resolved.matched_id, output_name, resolved.remainder));
        match &mut self.mode {
            FieldMode::Editing(editor) => Ok(editor),
            _ => Err(FieldError::NotEditing),
        }
    }

    /// Commits the draft. An empty draft keeps the editor open.
    pub fn confirm_edit(&mut self) -> Result<FieldChange, FieldError> {
        let editor = self.editor().ok_or(FieldError::NotEditing)?;
        let encoded = editor.confirm()?;
        self.mode = FieldMode::Display;
        Ok(self.replace_value(encoded))
    }

    /// Discards the draft; the value is unchanged.
    pub fn cancel_edit(&mut self) {
        if matches!(self.mode, FieldMode::Editing(_)) {
            self.mode = FieldMode::Display;
        }
    }

    fn ensure_display(&self) -> Result<(), FieldError> {
        match self.mode {
            FieldMode::Display => Ok(()),
            _ => Err(FieldError::Busy),
        }
    }

    fn replace_value(&mut self, encoded: String) -> FieldChange {
        debug!(previous = %self.value, value = %encoded, "Field value changed");
        self.value = Value::String(encoded.clone());
        FieldChange { value: encoded }
    }
}
