//! Variable picker: the references a step may insert.

use flowref_types::{OutputType, StepOutputDescriptor};
use serde::Serialize;

use crate::graph::{StepGraph, StepNode, StepNodeKind};
use crate::reference::{encode, output_token};
use crate::scope::ScopeRules;

/// One pickable output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate<'g> {
    /// Registry key, e.g. `__3.slices`.
    pub token: String,
    pub node: &'g StepNode,
    pub descriptor: &'g StepOutputDescriptor,
}

impl Candidate<'_> {
    /// Field value written back when the candidate is picked.
    pub fn encoded(&self) -> String {
        encode(&self.token, "")
    }
}

/// Outputs visible from `scope_step_id` whose type is in `types`.
///
/// An empty filter admits every type; `any` outputs always pass. Returns an
/// empty list when the scope step is not part of the graph.
pub fn candidates<'g>(graph: &'g StepGraph, scope_step_id: &str, types: &[OutputType], rules: &dyn ScopeRules) -> Vec<Candidate<'g>> {
    let Some(scope) = graph.node(scope_step_id) else {
        return Vec::new();
    };
    graph
        .nodes()
        .filter(|node| node.id != scope.id && rules.admits(&scope.path, &node.path, node.is_loop()))
        .flat_map(|node| {
            node.outputs.iter().map(move |descriptor| Candidate {
                token: global_or_step_token(node, descriptor),
                node,
                descriptor,
            })
        })
        .filter(|candidate| {
            types.is_empty() || candidate.descriptor.r#type == OutputType::Any || types.contains(&candidate.descriptor.r#type)
        })
        .collect()
}

fn global_or_step_token(node: &StepNode, descriptor: &StepOutputDescriptor) -> String {
    if node.kind == StepNodeKind::Global {
        format!("__{}", descriptor.key)
    } else {
        output_token(&node.id, &descriptor.key)
    }
}
