//! Flow validation.
//!
//! Every step's parameters are walked recursively. A step is invalid when it
//! has no operator, when one of its references is not found or out of scope,
//! when a parameter is `null` (set-template steps tolerate nulls except
//! directly under their top-level parameters), or when its action's parameter
//! rule fails. Condition groups of a branch are reported under the branch id.

use flowref_types::{FlowDocument, FlowStep, StepPath};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::assess::{ReferenceIssue, assess};
use crate::catalog::ActionCatalog;
use crate::graph::StepGraph;
use crate::scope::ScopeRules;

/// Operators containing this marker accept nulls below the top level.
const SET_TEMPLATE_MARKER: &str = "settemplate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepErrorCode {
    InvalidOperator,
    InvalidParameters,
}

/// One rejected reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceDiagnostic {
    /// Step whose parameters hold the reference.
    pub step_id: String,
    /// Dotted parameter path, empty when the parameters value itself is the reference.
    pub location: String,
    pub token: String,
    pub issue: ReferenceIssue,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowReport {
    /// Step id (or branch id for condition groups) → error code.
    pub errors: IndexMap<String, StepErrorCode>,
    pub references: Vec<ReferenceDiagnostic>,
}

impl FlowReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_for(&self, id: &str) -> Option<StepErrorCode> {
        self.errors.get(id).copied()
    }

    fn flag(&mut self, id: &str, code: StepErrorCode) {
        self.errors.entry(id.to_string()).or_insert(code);
    }
}

/// Validates every step of `flow` against its graph.
pub fn validate_flow(flow: &FlowDocument, graph: &StepGraph, catalog: &ActionCatalog, rules: &dyn ScopeRules) -> FlowReport {
    let mut validator = Validator {
        graph,
        catalog,
        rules,
        report: FlowReport::default(),
    };
    for step in &flow.steps {
        validator.step(step);
    }
    let report = validator.report;
    debug!(errors = report.errors.len(), references = report.references.len(), "Validated flow");
    report
}

struct Validator<'a> {
    graph: &'a StepGraph,
    catalog: &'a ActionCatalog,
    rules: &'a dyn ScopeRules,
    report: FlowReport,
}

impl Validator<'_> {
    fn step(&mut self, step: &FlowStep) {
        if step.is_branches() {
            for branch in &step.branches {
                let mut conditions_valid = true;
                for condition in branch.conditions.iter().flatten() {
                    if !self.executable(condition) {
                        conditions_valid = false;
                    }
                }
                if !conditions_valid {
                    self.report.flag(&branch.id, StepErrorCode::InvalidParameters);
                }
                for nested in &branch.steps {
                    self.step(nested);
                }
            }
            return;
        }
        if step.is_loop() {
            for nested in &step.steps {
                self.step(nested);
            }
            return;
        }
        if step.operator.is_empty() {
            self.report.flag(&step.id, StepErrorCode::InvalidOperator);
            return;
        }

        let mut valid = self.executable(step);
        if let Some(data_source) = step.data_source.as_deref() {
            valid &= self.executable(data_source);
        }
        if !valid {
            self.report.flag(&step.id, StepErrorCode::InvalidParameters);
        }
    }

    /// Checks operator, references, nulls and the action rule of one step.
    fn executable(&mut self, step: &FlowStep) -> bool {
        if step.operator.is_empty() {
            return false;
        }
        let scope = self.graph.node(&step.id).map(|node| node.path.clone()).unwrap_or_else(StepPath::root);
        let variables_valid = match step.parameters.as_ref() {
            Some(parameters) => self.variables(step, &scope, parameters, String::new(), 1),
            None => true,
        };
        let rule_holds = self.catalog.get(&step.operator).is_none_or(|action| action.rule.check(step));
        if !rule_holds {
            debug!(step = %step.id, operator = %step.operator, "Action parameter rule failed");
        }
        variables_valid && rule_holds
    }

    fn variables(&mut self, step: &FlowStep, scope: &StepPath, value: &Value, location: String, depth: usize) -> bool {
        match value {
            Value::String(_) => match assess(value, scope, self.graph, self.rules) {
                Some(assessment) => match assessment.issue {
                    Some(issue) => {
                        self.report.references.push(ReferenceDiagnostic {
                            step_id: step.id.clone(),
                            location,
                            token: assessment.reference.raw,
                            issue,
                        });
                        false
                    }
                    None => true,
                },
                None => true,
            },
            Value::Array(items) => items.iter().enumerate().fold(true, |valid, (index, item)| {
                self.variables(step, scope, item, join_location(&location, &index.to_string()), depth + 1) && valid
            }),
            Value::Object(map) => map.iter().fold(true, |valid, (key, item)| {
                self.variables(step, scope, item, join_location(&location, key), depth + 1) && valid
            }),
            Value::Null => {
                let tolerated = step.operator.contains(SET_TEMPLATE_MARKER) && depth != 2;
                if !tolerated {
                    debug!(step = %step.id, location = %location, "Null parameter");
                }
                tolerated
            }
            Value::Bool(_) | Value::Number(_) => true,
        }
    }
}

/// Appends `segment` to a dotted parameter location.
pub(crate) fn join_location(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ExecutionOrder;
    use serde_json::json;

    fn check(flow: Value) -> FlowReport {
        let flow: FlowDocument = serde_json::from_value(flow).unwrap();
        let catalog = ActionCatalog::builtin();
        let graph = StepGraph::build(&flow, &catalog).unwrap();
        validate_flow(&flow, &graph, &catalog, &ExecutionOrder)
    }

    #[test]
    fn valid_flow_has_no_errors() {
        let report = check(json!({
            "steps": [
                { "id": "0", "operator": "@trigger/manual" },
                { "id": "1", "operator": "@internal/time/now" },
                { "id": "2", "operator": "@internal/text/split", "parameters": { "text": "{{__1.curtime}}", "separator": "," } }
            ]
        }));
        assert!(report.is_valid(), "{report:?}");
        assert!(report.references.is_empty());
    }

    #[test]
    fn missing_operator_and_failed_rules_get_distinct_codes() {
        let report = check(json!({
            "steps": [
                { "id": "0", "operator": "@trigger/manual" },
                { "id": "1", "operator": "" },
                { "id": "2", "operator": "@internal/text/split", "parameters": { "text": "" } },
                { "id": "3", "operator": "@internal/return" }
            ]
        }));
        assert_eq!(report.error_for("1"), Some(StepErrorCode::InvalidOperator));
        assert_eq!(report.error_for("2"), Some(StepErrorCode::InvalidParameters));
        assert_eq!(report.error_for("3"), Some(StepErrorCode::InvalidParameters));
        assert!(!report.is_valid());
    }

    #[test]
    fn reference_issues_are_reported_with_locations() {
        let report = check(json!({
            "steps": [
                { "id": "0", "operator": "@trigger/manual" },
                { "id": "1", "operator": "@internal/text/join", "parameters": { "texts": ["{{__2.slices}}", "{{__7.gone}}"] } },
                { "id": "2", "operator": "@internal/text/split", "parameters": { "text": "a,b" } }
            ]
        }));
        assert_eq!(report.error_for("1"), Some(StepErrorCode::InvalidParameters));
        assert_eq!(
            report.references,
            vec![
                ReferenceDiagnostic {
                    step_id: "1".into(),
                    location: "texts.0".into(),
                    token: "__2.slices".into(),
                    issue: ReferenceIssue::OutOfScope,
                },
                ReferenceDiagnostic {
                    step_id: "1".into(),
                    location: "texts.1".into(),
                    token: "__7.gone".into(),
                    issue: ReferenceIssue::NotFound,
                },
            ]
        );
    }

    #[test]
    fn nulls_are_tolerated_only_deep_inside_set_template_steps() {
        let report = check(json!({
            "steps": [
                { "id": "0", "operator": "@trigger/manual" },
                { "id": "1", "operator": "@vendor/doc/settemplate", "parameters": { "templates": { "size": null } } },
                { "id": "2", "operator": "@vendor/doc/settemplate", "parameters": { "docid": null } },
                { "id": "3", "operator": "@vendor/doc/settemplate", "parameters": null },
                { "id": "4", "operator": "@vendor/doc/update", "parameters": { "templates": { "size": null } } }
            ]
        }));
        assert_eq!(report.error_for("1"), None);
        assert_eq!(report.error_for("2"), Some(StepErrorCode::InvalidParameters));
        assert_eq!(report.error_for("3"), None);
        assert_eq!(report.error_for("4"), Some(StepErrorCode::InvalidParameters));
    }

    #[test]
    fn conditions_are_reported_under_their_branch_and_loops_recurse() {
        let report = check(json!({
            "steps": [
                { "id": "0", "operator": "@trigger/manual" },
                { "id": "1", "operator": "@control/flow/branches", "branches": [
                    { "id": "2",
                      "conditions": [[ { "id": "3", "operator": "@internal/cmp/string-eq",
                                         "parameters": { "a": "{{__5.curtime}}" } } ]],
                      "steps": [ { "id": "5", "operator": "@internal/time/now" } ] },
                    { "id": "6", "conditions": [], "steps": [] }
                ] },
                { "id": "7", "operator": "@control/flow/loop", "parameters": { "outputs": [] }, "steps": [
                    { "id": "8", "operator": "" }
                ] }
            ]
        }));
        assert_eq!(report.error_for("2"), Some(StepErrorCode::InvalidParameters));
        assert_eq!(report.error_for("6"), None);
        assert_eq!(report.error_for("8"), Some(StepErrorCode::InvalidOperator));
        assert_eq!(report.error_for("7"), None);
        assert_eq!(report.references[0].issue, ReferenceIssue::OutOfScope);
    }

    #[test]
    fn data_source_problems_invalidate_the_trigger() {
        let report = check(json!({
            "steps": [
                { "id": "0", "operator": "@trigger/manual",
                  "dataSource": { "id": "9", "operator": "@internal/text/split", "parameters": { "text": "" } } },
                { "id": "1", "operator": "@internal/time/now" }
            ]
        }));
        assert_eq!(report.error_for("0"), Some(StepErrorCode::InvalidParameters));
    }
}
