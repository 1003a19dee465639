//! Applying remainder edits to stored flows.

use flowref_types::{FlowDocument, OutputRegistry};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::editor::{FieldChange, FieldError, ReferenceField};
use crate::render::Translate;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("step '{0}' does not exist")]
    UnknownStep(String),
    #[error("step '{step_id}' has no parameter at '{path}'")]
    UnknownParameter { step_id: String, path: String },
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Re-encodes `value` with `remainder` as its nested path, going through the
/// same edit cycle a form field uses.
pub fn rewrite_remainder(value: &Value, registry: &OutputRegistry, remainder: &str, translator: &dyn Translate) -> Result<FieldChange, FieldError> {
    let mut field = ReferenceField::new(value.clone());
    field.begin_edit(registry, translator)?.set_draft(remainder);
    field.confirm_edit()
}

/// Rewrites the reference stored at `path` (dotted) in the parameters of
/// `step_id` and writes the new value back into `flow`.
pub fn rewrite_step_parameter(
    flow: &mut FlowDocument,
    step_id: &str,
    path: &str,
    registry: &OutputRegistry,
    remainder: &str,
    translator: &dyn Translate,
) -> Result<FieldChange, RewriteError> {
    let step = flow.find_step_mut(step_id).ok_or_else(|| RewriteError::UnknownStep(step_id.to_string()))?;
    let slot = step.parameter_mut(path).ok_or_else(|| RewriteError::UnknownParameter {
        step_id: step_id.to_string(),
        path: path.to_string(),
    })?;
    let change = rewrite_remainder(slot, registry, remainder, translator)?;
    *slot = Value::String(change.value.clone());
    info!(step = step_id, parameter = path, value = %change.value, "Rewrote reference");
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ActionCatalog;
    use crate::graph::StepGraph;
    use crate::render::IdentityTranslator;
    use serde_json::json;

    fn flow() -> FlowDocument {
        serde_json::from_value(json!({
            "steps": [
                { "id": "0", "operator": "@trigger/manual" },
                { "id": "1", "operator": "@control/flow/loop", "parameters": { "outputs": [ { "key": "rows" } ] },
                  "steps": [ { "id": "2", "operator": "@internal/text/join", "parameters": { "texts": ["{{__1.value.id}}"] } } ] }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn rewrites_a_nested_parameter_in_place() {
        let mut flow = flow();
        let graph = StepGraph::build(&flow, &ActionCatalog::builtin()).unwrap();
        let change = rewrite_step_parameter(&mut flow, "2", "texts.0", graph.outputs(), "name.first", &IdentityTranslator).unwrap();
        assert_eq!(change.value, "{{__1.value.name.first}}");
        assert_eq!(flow.find_step("2").unwrap().parameter("texts.0"), Some(&json!("{{__1.value.name.first}}")));
    }

    #[test]
    fn reports_missing_steps_parameters_and_field_errors() {
        let mut flow = flow();
        let graph = StepGraph::build(&flow, &ActionCatalog::builtin()).unwrap();
        let registry = graph.outputs();
        assert!(matches!(
            rewrite_step_parameter(&mut flow, "9", "texts.0", registry, "x", &IdentityTranslator),
            Err(RewriteError::UnknownStep(_))
        ));
        assert!(matches!(
            rewrite_step_parameter(&mut flow, "2", "texts.4", registry, "x", &IdentityTranslator),
            Err(RewriteError::UnknownParameter { .. })
        ));
        assert!(matches!(
            rewrite_step_parameter(&mut flow, "2", "texts.0", registry, "", &IdentityTranslator),
            Err(RewriteError::Field(FieldError::Editor(_)))
        ));
    }

    #[test]
    fn rewrite_remainder_refuses_scalar_outputs() {
        let registry = OutputRegistry::from_entries([("__1.index", flowref_types::StepOutputDescriptor::custom(".index", "index", "number"))]).unwrap();
        assert_eq!(
            rewrite_remainder(&json!("{{__1.index}}"), &registry, "x", &IdentityTranslator),
            Err(FieldError::NotEditable)
        );
    }
}
