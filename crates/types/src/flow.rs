//! Flow document model as authored in the editor.
//!
//! A flow is an ordered list of steps. The first step is always the trigger;
//! branches steps hold condition groups and nested step lists, loop steps hold
//! a nested step list. Field names follow the editor's camelCase wire format
//! and accept snake_case aliases for hand-written YAML.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Operator of the loop control step.
pub const LOOP_OPERATOR: &str = "@control/flow/loop";
/// Operator of the branches control step.
pub const BRANCHES_OPERATOR: &str = "@control/flow/branches";

/// Complete flow document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Trigger first, then executor and control steps in execution order.
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

impl FlowDocument {
    pub fn trigger(&self) -> Option<&FlowStep> {
        self.steps.first()
    }

    /// Depth-first search over every step, branch condition and data source.
    pub fn find_step(&self, step_id: &str) -> Option<&FlowStep> {
        self.steps.iter().find_map(|step| step.find(step_id))
    }

    pub fn find_step_mut(&mut self, step_id: &str) -> Option<&mut FlowStep> {
        self.steps.iter_mut().find_map(|step| step.find_mut(step_id))
    }

    /// Every step in document order: each step, then its data source, branch
    /// conditions and nested steps.
    pub fn all_steps(&self) -> Vec<&FlowStep> {
        let mut collected = Vec::new();
        for step in &self.steps {
            step.collect_into(&mut collected);
        }
        collected
    }
}

/// One authored step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Empty when the author has not picked an action yet.
    #[serde(default)]
    pub operator: String,
    /// `None` when the key is absent; `Some(Value::Null)` when explicitly null.
    #[serde(default, deserialize_with = "present_value", skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    /// Loop body.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<FlowStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<FlowBranch>,
    /// Trigger data source, only honoured when the trigger action allows it.
    #[serde(default, rename = "dataSource", alias = "data_source", skip_serializing_if = "Option::is_none")]
    pub data_source: Option<Box<FlowStep>>,
}

impl FlowStep {
    pub fn is_loop(&self) -> bool {
        self.operator == LOOP_OPERATOR
    }

    pub fn is_branches(&self) -> bool {
        self.operator == BRANCHES_OPERATOR
    }

    /// Parameter at a dotted path (`texts.0`, `outputs`), if present.
    pub fn parameter(&self, path: &str) -> Option<&Value> {
        let mut current = self.parameters.as_ref()?;
        for segment in path.split('.').filter(|segment| !segment.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn parameter_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut current = self.parameters.as_mut()?;
        for segment in path.split('.').filter(|segment| !segment.is_empty()) {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn collect_into<'a>(&'a self, collected: &mut Vec<&'a FlowStep>) {
        collected.push(self);
        if let Some(data_source) = self.data_source.as_deref() {
            collected.push(data_source);
        }
        for branch in &self.branches {
            for condition in branch.conditions.iter().flatten() {
                condition.collect_into(collected);
            }
            for step in &branch.steps {
                step.collect_into(collected);
            }
        }
        for step in &self.steps {
            step.collect_into(collected);
        }
    }

    fn find(&self, step_id: &str) -> Option<&FlowStep> {
        if self.id == step_id {
            return Some(self);
        }
        if let Some(data_source) = self.data_source.as_deref()
            && data_source.id == step_id
        {
            return Some(data_source);
        }
        self.steps.iter().find_map(|step| step.find(step_id)).or_else(|| {
            self.branches.iter().find_map(|branch| {
                branch
                    .conditions
                    .iter()
                    .flatten()
                    .chain(branch.steps.iter())
                    .find_map(|step| step.find(step_id))
            })
        })
    }

    fn find_mut(&mut self, step_id: &str) -> Option<&mut FlowStep> {
        if self.id == step_id {
            return Some(self);
        }
        if let Some(data_source) = self.data_source.as_deref_mut()
            && data_source.id == step_id
        {
            return Some(data_source);
        }
        if let Some(found) = self.steps.iter_mut().find_map(|step| step.find_mut(step_id)) {
            return Some(found);
        }
        self.branches.iter_mut().find_map(|branch| {
            branch
                .conditions
                .iter_mut()
                .flatten()
                .chain(branch.steps.iter_mut())
                .find_map(|step| step.find_mut(step_id))
        })
    }
}

/// One arm of a branches step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowBranch {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Condition groups: the branch runs when every condition of any group holds.
    #[serde(default)]
    pub conditions: Vec<Vec<FlowStep>>,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

/// Position of a step node in execution order.
///
/// Segments follow the editor layout: the trigger sits at `[0]`, top-level
/// steps at `[1]`, `[2]`, ...; a branch arm appends its index, a nested
/// step appends its position, and branch conditions append `-1` before
/// their group and position. The global variable node has the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepPath(Vec<i32>);

impl StepPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(segments: impl Into<Vec<i32>>) -> Self {
        Self(segments.into())
    }

    pub fn child(&self, segment: i32) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    pub fn segments(&self) -> &[i32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &StepPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<Vec<i32>> for StepPath {
    fn from(segments: Vec<i32>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for StepPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(|segment| segment.to_string()).collect::<Vec<_>>().join(".");
        write!(f, "[{joined}]")
    }
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!("expected a string or number id, found {other}"))),
    }
}
