//! Reference tags: what a field holding a reference displays.
//!
//! A tag names the source step (ordinal or icon plus action name), the
//! output and the nested remainder. Display strings pass through a
//! [`Translate`] implementation supplied by the host; custom output names are
//! shown verbatim.

use std::{collections::HashMap, fs, path::Path};

use flowref_types::{FlowDocument, StepOutputDescriptor, StepPath};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::assess::{Assessment, ReferenceIssue, assess};
use crate::graph::StepGraph;
use crate::scope::ScopeRules;
use crate::validate::join_location;

/// Translation key of the "variable not found" placeholder.
pub const NOT_FOUND_KEY: &str = "variableNotFound";

/// Display string lookup.
pub trait Translate {
    /// Text for `key`, or `fallback` when the key is unknown.
    fn translate(&self, key: &str, fallback: &str) -> String;
}

/// Returns every fallback unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translate for IdentityTranslator {
    fn translate(&self, _key: &str, fallback: &str) -> String {
        fallback.to_string()
    }
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("failed to read translations {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse translations {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Flat key → text dictionary.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: HashMap<String, String>,
}

impl Dictionary {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Loads a flat YAML or JSON mapping.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let entries: HashMap<String, String> = serde_yaml::from_str(&content).map_err(|source| DictionaryError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), entries = entries.len(), "Loaded translations");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Translate for Dictionary {
    fn translate(&self, key: &str, fallback: &str) -> String {
        self.entries.get(key).cloned().unwrap_or_else(|| fallback.to_string())
    }
}

/// Rendered form of one reference-bearing field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceTag {
    /// Token between the braces.
    pub token: String,
    /// One-based ordinal of the source step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub step_name: String,
    pub output_name: String,
    pub remainder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<ReferenceIssue>,
    /// Activating the tag opens the remainder editor.
    pub editable: bool,
}

impl ReferenceTag {
    pub fn is_valid(&self) -> bool {
        self.issue.is_none()
    }

    /// Ordinal when the step has one, icon otherwise.
    pub fn badge(&self) -> Option<String> {
        self.ordinal.map(|ordinal| ordinal.to_string()).or_else(|| self.icon.clone())
    }

    /// `.remainder`, or empty.
    pub fn suffix(&self) -> String {
        if self.remainder.is_empty() {
            String::new()
        } else {
            format!(".{}", self.remainder)
        }
    }

    /// Single-line text form: `2 Split text / Slices.0`.
    pub fn display_text(&self) -> String {
        let mut text = String::new();
        if let Some(badge) = self.badge() {
            text.push_str(&badge);
            text.push(' ');
        }
        if !self.step_name.is_empty() {
            text.push_str(&self.step_name);
            text.push_str(" / ");
        }
        text.push_str(&self.output_name);
        text.push_str(&self.suffix());
        text
    }
}

/// Display name of an output: custom names are user labels and shown as
/// written, built-in names are translation keys.
pub fn output_display_name(descriptor: &StepOutputDescriptor, translator: &dyn Translate) -> String {
    if descriptor.is_custom {
        descriptor.name.clone()
    } else {
        translator.translate(&descriptor.name, &descriptor.name)
    }
}

/// Builds the tag for `value` as seen from `scope`. `None` for literals.
pub fn render_tag(value: &Value, scope: &StepPath, graph: &StepGraph, rules: &dyn ScopeRules, translator: &dyn Translate) -> Option<ReferenceTag> {
    assess(value, scope, graph, rules).map(|assessment| tag_from(assessment, translator))
}

/// Tag for a field of the step `scope_step_id`. Unknown steps see only globals.
pub fn render_step_tag(
    value: &Value,
    scope_step_id: &str,
    graph: &StepGraph,
    rules: &dyn ScopeRules,
    translator: &dyn Translate,
) -> Option<ReferenceTag> {
    let scope = graph.node(scope_step_id).map(|node| node.path.clone()).unwrap_or_else(StepPath::root);
    render_tag(value, &scope, graph, rules, translator)
}

/// A tag with the step and parameter it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedTag {
    pub step_id: String,
    pub location: String,
    pub tag: ReferenceTag,
}

/// Every reference tag in `flow`, in document order.
pub fn flow_tags(flow: &FlowDocument, graph: &StepGraph, rules: &dyn ScopeRules, translator: &dyn Translate) -> Vec<LocatedTag> {
    let mut tags = Vec::new();
    for step in flow.all_steps() {
        let Some(parameters) = step.parameters.as_ref() else {
            continue;
        };
        let mut leaves = Vec::new();
        string_leaves(parameters, String::new(), &mut leaves);
        for (location, value) in leaves {
            if let Some(tag) = render_step_tag(value, &step.id, graph, rules, translator) {
                tags.push(LocatedTag {
                    step_id: step.id.clone(),
                    location,
                    tag,
                });
            }
        }
    }
    tags
}

fn tag_from(assessment: Assessment<'_>, translator: &dyn Translate) -> ReferenceTag {
    let Assessment {
        reference,
        matched,
        node,
        issue,
    } = assessment;

    let step_name = node
        .and_then(|node| node.action_name.as_deref().map(|name| translator.translate(name, name)).or_else(|| node.operator.clone()))
        .unwrap_or_default();
    let (output_name, remainder, editable) = match &matched {
        Some(matched) => {
            let descriptor = matched.descriptor;
            (output_display_name(descriptor, translator), matched.remainder.clone(), descriptor.r#type.is_container())
        }
        None => (translator.translate(NOT_FOUND_KEY, "variable not found"), String::new(), false),
    };

    ReferenceTag {
        token: reference.raw,
        ordinal: node.and_then(|node| node.index).map(|index| index + 1),
        icon: node.and_then(|node| node.icon.clone()),
        step_name,
        output_name,
        remainder,
        issue,
        editable,
    }
}

fn string_leaves<'v>(value: &'v Value, location: String, leaves: &mut Vec<(String, &'v Value)>) {
    match value {
        Value::String(_) => leaves.push((location, value)),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                string_leaves(item, join_location(&location, &index.to_string()), leaves);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                string_leaves(item, join_location(&location, key), leaves);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
