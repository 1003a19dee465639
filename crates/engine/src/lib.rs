//! # Flowref Engine
//!
//! The Flowref Engine decodes, resolves, validates and edits the variable
//! references that workflow editors embed in step parameters as
//! `{{__<id>[.<path>]}}` strings.
//!
//! ## Key Features
//!
//! - **Reference Resolution**: Longest-prefix lookup of a token against the output registry
//! - **Step Graph**: Ordinals, execution paths and published outputs of every step
//! - **Validation**: Per-step error codes plus distinct "not found" and "out of scope" diagnostics
//! - **Tags and Editing**: Display tags for reference fields and a remainder editor state machine
//!
//! ## Usage
//!
//! ```rust
//! use flowref_engine::{ActionCatalog, ExecutionOrder, StepGraph, parse_flow_file, validate_flow};
//!
//! let temp_dir = tempfile::tempdir()?;
//! let flow_path = temp_dir.path().join("flow.yaml");
//! std::fs::write(&flow_path, r#"
//! steps:
//!   - { id: "0", operator: "@trigger/manual" }
//!   - { id: "1", operator: "@internal/time/now" }
//!   - { id: "2", operator: "@internal/text/split", parameters: { text: "{{__1.curtime}}" } }
//! "#)?;
//!
//! let flow = parse_flow_file(&flow_path)?;
//! let catalog = ActionCatalog::builtin();
//! let graph = StepGraph::build(&flow, &catalog)?;
//! let report = validate_flow(&flow, &graph, &catalog, &ExecutionOrder);
//! assert!(report.is_valid());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`reference`**: Parsing, longest-prefix resolution and encoding of tokens
//! - **`catalog`**: Operator → action definitions and their outputs
//! - **`graph`**: Step graph and output registry construction
//! - **`scope`**: Execution-order visibility rules
//! - **`assess`**, **`validate`**, **`picker`**: Consumers of resolution plus scope
//! - **`render`**, **`editor`**, **`rewrite`**: Field display and editing

use std::{fs, path::Path};

use anyhow::{Context, Result};
use flowref_types::FlowDocument;

pub mod assess;
pub mod catalog;
pub mod editor;
pub mod graph;
pub mod picker;
pub mod reference;
pub mod render;
pub mod rewrite;
pub mod scope;
pub mod validate;

pub use assess::{Assessment, Match, ReferenceIssue, assess};
pub use catalog::{ActionCatalog, ActionDefinition, ActionOutputs, CatalogError, ParameterRule};
pub use editor::{EditorError, FieldChange, FieldError, FieldMode, ReferenceField, VariableEditor};
pub use graph::{FlowError, StepGraph, StepNode, StepNodeKind};
pub use picker::{Candidate, candidates};
pub use reference::{ResolvedReference, encode, parse, parse_str, resolve};
pub use render::{
    Dictionary, DictionaryError, IdentityTranslator, LocatedTag, ReferenceTag, Translate, flow_tags, output_display_name, render_step_tag,
    render_tag,
};
pub use rewrite::{RewriteError, rewrite_remainder, rewrite_step_parameter};
pub use scope::{ExecutionOrder, ScopeRules};
pub use validate::{FlowReport, ReferenceDiagnostic, StepErrorCode, validate_flow};

/// Loads a flow document from a YAML or JSON file.
///
/// YAML is a superset of JSON, so both formats go through the YAML parser.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not describe a flow.
pub fn parse_flow_file(file_path: impl AsRef<Path>) -> Result<FlowDocument> {
    let file_path = file_path.as_ref();
    let file_content = fs::read(file_path).with_context(|| format!("Failed to read flow file: {}", file_path.display()))?;
    let content_string = String::from_utf8_lossy(&file_content);
    let flow: FlowDocument =
        serde_yaml::from_str(&content_string).with_context(|| format!("Failed to parse flow file: {}", file_path.display()))?;
    Ok(flow)
}

/// Serializes a flow back to YAML or JSON, matching the file extension.
pub fn render_flow(flow: &FlowDocument, file_path: impl AsRef<Path>) -> Result<String> {
    let is_json = file_path
        .as_ref()
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::to_string_pretty(flow).context("Failed to serialize flow as JSON")
    } else {
        serde_yaml::to_string(flow).context("Failed to serialize flow as YAML")
    }
}
