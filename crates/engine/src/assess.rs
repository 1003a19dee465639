//! Reference assessment shared by the validator, the tag renderer and the
//! variable picker.

use std::fmt;

use flowref_types::{StepOutputDescriptor, StepPath, VariableReference};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::graph::{StepGraph, StepNode};
use crate::reference;
use crate::scope::ScopeRules;

/// Why a reference cannot be used where it appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceIssue {
    /// No node for the lookup id, or no registry key prefixes the token.
    NotFound,
    /// Resolves, but the owning step does not run before the referencing one.
    OutOfScope,
}

impl ReferenceIssue {
    pub fn message(self) -> &'static str {
        match self {
            ReferenceIssue::NotFound => "selected variable no longer exists",
            ReferenceIssue::OutOfScope => "cannot reference a variable from a later step; please reselect",
        }
    }
}

impl fmt::Display for ReferenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Registry match of an assessed reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'g> {
    pub matched_id: &'g str,
    pub descriptor: &'g StepOutputDescriptor,
    pub remainder: String,
}

impl Match<'_> {
    pub fn encode(&self) -> String {
        reference::encode(self.matched_id, &self.remainder)
    }
}

/// A parsed reference judged against a step graph from one scope.
#[derive(Debug, Clone)]
pub struct Assessment<'g> {
    pub reference: VariableReference,
    pub matched: Option<Match<'g>>,
    /// Node named by the reference's lookup id.
    pub node: Option<&'g StepNode>,
    pub issue: Option<ReferenceIssue>,
}

impl Assessment<'_> {
    pub fn is_valid(&self) -> bool {
        self.issue.is_none()
    }
}

/// Parses `value` and judges it from `scope`. `None` for literal values.
pub fn assess<'g>(value: &Value, scope: &StepPath, graph: &'g StepGraph, rules: &dyn ScopeRules) -> Option<Assessment<'g>> {
    let reference = reference::parse(value)?;
    let node = graph.node(&reference.lookup_id);
    let matched = reference::longest_prefix(&reference.raw, graph.outputs()).map(|(matched_id, descriptor)| Match {
        matched_id,
        descriptor,
        remainder: reference::remainder_after(&reference.raw, matched_id).to_string(),
    });

    let issue = match (node, &matched) {
        (Some(node), Some(_)) if rules.admits(scope, &node.path, node.is_loop()) => None,
        (Some(_), Some(_)) => Some(ReferenceIssue::OutOfScope),
        _ => Some(ReferenceIssue::NotFound),
    };
    if let Some(issue) = issue {
        debug!(token = %reference.raw, scope = %scope, ?issue, "Reference rejected");
    }
    Some(Assessment {
        reference,
        matched,
        node,
        issue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ActionCatalog;
    use crate::scope::ExecutionOrder;
    use flowref_types::FlowDocument;
    use serde_json::json;

    fn graph() -> StepGraph {
        let flow: FlowDocument = serde_json::from_value(json!({
            "steps": [
                { "id": "0", "operator": "@trigger/manual" },
                { "id": "1", "operator": "@internal/time/now" },
                { "id": "2", "operator": "@internal/text/split", "parameters": { "text": "x" } },
                { "id": "3", "operator": "@control/flow/loop", "parameters": { "outputs": [] },
                  "steps": [ { "id": "4", "operator": "@internal/time/now" } ] }
            ]
        }))
        .unwrap();
        StepGraph::build(&flow, &ActionCatalog::builtin()).unwrap()
    }

    #[test]
    fn literals_are_not_assessed() {
        let graph = graph();
        assert!(assess(&json!("plain"), &StepPath::new(vec![2]), &graph, &ExecutionOrder).is_none());
        assert!(assess(&json!(7), &StepPath::new(vec![2]), &graph, &ExecutionOrder).is_none());
    }

    #[test]
    fn earlier_outputs_are_valid_with_remainder() {
        let graph = graph();
        let assessment = assess(&json!("{{__1.curtime.year}}"), &StepPath::new(vec![2]), &graph, &ExecutionOrder).unwrap();
        assert!(assessment.is_valid());
        let matched = assessment.matched.unwrap();
        assert_eq!(matched.matched_id, "__1.curtime");
        assert_eq!(matched.remainder, "year");
        assert_eq!(assessment.node.unwrap().id, "1");
    }

    #[test]
    fn later_outputs_are_out_of_scope() {
        let graph = graph();
        let assessment = assess(&json!("{{__2.slices}}"), &StepPath::new(vec![1]), &graph, &ExecutionOrder).unwrap();
        assert_eq!(assessment.issue, Some(ReferenceIssue::OutOfScope));
        assert!(assessment.matched.is_some());
    }

    #[test]
    fn missing_nodes_and_outputs_are_not_found() {
        let graph = graph();
        let scope = StepPath::new(vec![2]);
        let missing_node = assess(&json!("{{__8.curtime}}"), &scope, &graph, &ExecutionOrder).unwrap();
        assert_eq!(missing_node.issue, Some(ReferenceIssue::NotFound));
        let missing_output = assess(&json!("{{__1.elapsed}}"), &scope, &graph, &ExecutionOrder).unwrap();
        assert_eq!(missing_output.issue, Some(ReferenceIssue::NotFound));
        assert_eq!(missing_output.issue.unwrap().message(), "selected variable no longer exists");
    }

    #[test]
    fn globals_and_loop_variables_resolve_from_their_scopes() {
        let graph = graph();
        let global = assess(&json!("{{__g_authorization}}"), &StepPath::new(vec![0]), &graph, &ExecutionOrder).unwrap();
        assert!(global.is_valid());
        assert_eq!(global.node.unwrap().id, "1000");

        let inside = assess(&json!("{{__3.value}}"), &StepPath::new(vec![3, 0]), &graph, &ExecutionOrder).unwrap();
        assert!(inside.is_valid());
        let after = assess(&json!("{{__3.index}}"), &StepPath::new(vec![4]), &graph, &ExecutionOrder).unwrap();
        assert!(after.is_valid());
        let before = assess(&json!("{{__3.index}}"), &StepPath::new(vec![2]), &graph, &ExecutionOrder).unwrap();
        assert_eq!(before.issue, Some(ReferenceIssue::OutOfScope));
    }
}
