//! Step output descriptors.
//!
//! A descriptor names one value a workflow step produces. Descriptors are
//! produced by the action catalog (either as a static list or computed from
//! the step's current parameters) and are never mutated in place: a changed
//! step yields fresh descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type tag attached to a step output.
///
/// The tag set is open. Tags this crate does not know about are preserved
/// verbatim in [`OutputType::Other`] so catalogs authored for newer editors
/// still round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputType {
    String,
    Number,
    Datetime,
    Array,
    Object,
    Any,
    AsUser,
    Other(String),
}

impl OutputType {
    pub fn as_str(&self) -> &str {
        match self {
            OutputType::String => "string",
            OutputType::Number => "number",
            OutputType::Datetime => "datetime",
            OutputType::Array => "array",
            OutputType::Object => "object",
            OutputType::Any => "any",
            OutputType::AsUser => "asUser",
            OutputType::Other(tag) => tag.as_str(),
        }
    }

    /// Container outputs can be drilled into with a nested path, which is
    /// what makes a reference tag editable.
    pub fn is_container(&self) -> bool {
        matches!(self, OutputType::Array | OutputType::Object | OutputType::Any)
    }
}

impl From<&str> for OutputType {
    fn from(tag: &str) -> Self {
        match tag {
            "string" => OutputType::String,
            "number" => OutputType::Number,
            "datetime" => OutputType::Datetime,
            "array" => OutputType::Array,
            "object" => OutputType::Object,
            "any" => OutputType::Any,
            "asUser" => OutputType::AsUser,
            other => OutputType::Other(other.to_string()),
        }
    }
}

impl From<String> for OutputType {
    fn from(tag: String) -> Self {
        OutputType::from(tag.as_str())
    }
}

impl From<OutputType> for String {
    fn from(output_type: OutputType) -> Self {
        output_type.as_str().to_string()
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes one output field a workflow step can produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutputDescriptor {
    /// Suffix path appended to the step id, for example `.slices`.
    pub key: String,
    /// Display name, or a translation key when `is_custom` is false.
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: OutputType,
    /// True when `name` is a user-authored label rather than a translation key.
    #[serde(default, rename = "isCustom", alias = "is_custom")]
    pub is_custom: bool,
}

impl StepOutputDescriptor {
    pub fn new(key: impl Into<String>, name: impl Into<String>, r#type: impl Into<OutputType>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            r#type: r#type.into(),
            is_custom: false,
        }
    }

    /// Same as [`StepOutputDescriptor::new`] but flags the name as user-authored.
    pub fn custom(key: impl Into<String>, name: impl Into<String>, r#type: impl Into<OutputType>) -> Self {
        Self {
            is_custom: true,
            ..Self::new(key, name, r#type)
        }
    }
}
