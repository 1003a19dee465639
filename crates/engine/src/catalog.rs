//! Action catalog: what each operator is called and which outputs it publishes.
//!
//! Outputs are either a fixed list or computed from the step's current
//! parameters (form triggers publish one output per form field, python tool
//! steps one per declared output parameter). The built-in catalog covers the
//! internal actions; hosts can layer additional static definitions from a
//! YAML or JSON catalog file.

use std::{fs, path::Path};

use flowref_types::{FlowStep, OutputType, StepOutputDescriptor};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Computes outputs from the step being edited.
pub type OutputsFn = fn(&FlowStep) -> Vec<StepOutputDescriptor>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read action catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse action catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// How an action declares its outputs.
#[derive(Debug, Clone)]
pub enum ActionOutputs {
    Static(Vec<StepOutputDescriptor>),
    Dynamic(OutputsFn),
}

/// Parameter check run before a step counts as valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParameterRule {
    /// No check.
    #[default]
    None,
    /// The parameters object must be present and non-null.
    Present,
    /// Every listed dotted path must hold a truthy value.
    Truthy(Vec<String>),
}

impl ParameterRule {
    pub fn check(&self, step: &FlowStep) -> bool {
        match self {
            ParameterRule::None => true,
            ParameterRule::Present => step.parameters.as_ref().is_some_and(is_truthy),
            ParameterRule::Truthy(paths) => paths.iter().all(|path| step.parameter(path).is_some_and(is_truthy)),
        }
    }
}

/// One operator known to the editor.
#[derive(Debug, Clone)]
pub struct ActionDefinition {
    pub operator: String,
    /// Display name or translation key.
    pub name: String,
    pub icon: Option<String>,
    pub outputs: ActionOutputs,
    /// Triggers only: whether a data source step may be attached.
    pub allow_data_source: bool,
    pub rule: ParameterRule,
}

impl ActionDefinition {
    fn fixed(operator: &str, name: &str, outputs: Vec<StepOutputDescriptor>) -> Self {
        Self {
            operator: operator.to_string(),
            name: name.to_string(),
            icon: None,
            outputs: ActionOutputs::Static(outputs),
            allow_data_source: false,
            rule: ParameterRule::None,
        }
    }

    fn dynamic(operator: &str, name: &str, outputs: OutputsFn) -> Self {
        Self {
            outputs: ActionOutputs::Dynamic(outputs),
            ..Self::fixed(operator, name, Vec::new())
        }
    }

    fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    fn with_rule(mut self, rule: ParameterRule) -> Self {
        self.rule = rule;
        self
    }

    /// Outputs of `step` under this action.
    pub fn outputs_for(&self, step: &FlowStep) -> Vec<StepOutputDescriptor> {
        match &self.outputs {
            ActionOutputs::Static(outputs) => outputs.clone(),
            ActionOutputs::Dynamic(compute) => compute(step),
        }
    }
}

/// Operator → action lookup table.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    actions: IndexMap<String, ActionDefinition>,
}

impl ActionCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog of the internal actions shipped with the editor.
    pub fn builtin() -> Self {
        let truthy = |paths: &[&str]| ParameterRule::Truthy(paths.iter().map(|path| path.to_string()).collect());
        let mut catalog = Self::empty();
        for action in [
            ActionDefinition {
                allow_data_source: true,
                ..ActionDefinition::fixed("@trigger/manual", "TAManual", Vec::new()).with_icon("manual")
            },
            ActionDefinition::dynamic("@trigger/form", "TAForm", form_trigger_outputs).with_icon("form"),
            ActionDefinition::fixed(
                "@internal/text/split",
                "EATextSplit",
                vec![StepOutputDescriptor::new(".slices", "EATextSplitOutputSlices", "string")],
            )
            .with_icon("text")
            .with_rule(truthy(&["text"])),
            ActionDefinition::fixed(
                "@internal/text/join",
                "EATextJoin",
                vec![StepOutputDescriptor::new(".text", "EATextJoinOutputText", "string")],
            )
            .with_icon("text")
            .with_rule(truthy(&["texts.0"])),
            ActionDefinition::fixed(
                "@internal/text/match",
                "EATextMatch",
                vec![StepOutputDescriptor::new(".matched", "EATextMatchOutputExtracts", "string")],
            )
            .with_icon("text")
            .with_rule(truthy(&["text"])),
            ActionDefinition::dynamic("@internal/tool/py3", "EAToolPy3", python_tool_outputs)
                .with_icon("python")
                .with_rule(truthy(&["code"])),
            ActionDefinition::fixed(
                "@internal/time/now",
                "EATimeNow",
                vec![StepOutputDescriptor::new(".curtime", "EATimeNowOutputTime", "datetime")],
            )
            .with_icon("time"),
            ActionDefinition::fixed(
                "@internal/time/relative",
                "EATimeRelative",
                vec![StepOutputDescriptor::new(".new_time", "EATimeRelativeOutputTime", "datetime")],
            )
            .with_icon("time"),
            ActionDefinition::fixed("@internal/return", "EAReturns", Vec::new())
                .with_icon("return")
                .with_rule(ParameterRule::Present),
        ] {
            catalog.register(action);
        }
        catalog
    }

    /// Adds or replaces the definition for `action.operator`.
    pub fn register(&mut self, action: ActionDefinition) {
        if self.actions.contains_key(&action.operator) {
            debug!(operator = %action.operator, "Replacing action definition");
        }
        self.actions.insert(action.operator.clone(), action);
    }

    pub fn get(&self, operator: &str) -> Option<&ActionDefinition> {
        self.actions.get(operator)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Layers the static definitions of a YAML/JSON catalog file on top of
    /// this catalog. Returns the number of actions read.
    pub fn extend_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize, CatalogError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let entries: Vec<CatalogFileEntry> = serde_yaml::from_str(&content).map_err(|source| CatalogError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        let count = entries.len();
        for entry in entries {
            self.register(entry.into_definition());
        }
        debug!(path = %path.display(), count, "Loaded action catalog file");
        Ok(count)
    }
}

/// Catalog file entry. File-defined actions always declare static outputs.
#[derive(Debug, Deserialize)]
struct CatalogFileEntry {
    operator: String,
    name: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    outputs: Vec<StepOutputDescriptor>,
    #[serde(default, alias = "allowDataSource")]
    allow_data_source: bool,
    /// Dotted parameter paths that must be truthy.
    #[serde(default)]
    required: Vec<String>,
    #[serde(default)]
    requires_parameters: bool,
}

impl CatalogFileEntry {
    fn into_definition(self) -> ActionDefinition {
        let rule = if !self.required.is_empty() {
            ParameterRule::Truthy(self.required)
        } else if self.requires_parameters {
            ParameterRule::Present
        } else {
            ParameterRule::None
        };
        ActionDefinition {
            operator: self.operator,
            name: self.name,
            icon: self.icon,
            outputs: ActionOutputs::Static(self.outputs),
            allow_data_source: self.allow_data_source,
            rule,
        }
    }
}

/// Form triggers publish the submitter plus one output per form field.
fn form_trigger_outputs(step: &FlowStep) -> Vec<StepOutputDescriptor> {
    let Some(Value::Array(fields)) = step.parameter("fields") else {
        return Vec::new();
    };
    let mut outputs = vec![StepOutputDescriptor::new(".accessor", "TAFormOutputAccessor", OutputType::AsUser)];
    outputs.extend(fields.iter().filter_map(|field| {
        let key = field.get("key")?.as_str()?;
        let name = field.get("name").and_then(Value::as_str).unwrap_or(key);
        let r#type = field.get("type").and_then(Value::as_str).unwrap_or("string");
        Some(StepOutputDescriptor::custom(format!(".fields.{key}"), name, r#type))
    }));
    outputs
}

/// Python tool steps publish one output per declared output parameter;
/// `int` parameters surface as numbers.
fn python_tool_outputs(step: &FlowStep) -> Vec<StepOutputDescriptor> {
    let Some(Value::Array(params)) = step.parameter("output_params") else {
        return Vec::new();
    };
    params
        .iter()
        .filter_map(|param| {
            let key = param.get("key")?.as_str()?;
            let r#type = match param.get("type").and_then(Value::as_str) {
                Some("int") => "number",
                Some(other) => other,
                None => "any",
            };
            Some(StepOutputDescriptor::custom(format!(".{key}"), key, r#type))
        })
        .collect()
}

/// Loose truthiness as the editor's validators apply it.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
