//! Shared type definitions for flowref: flow documents, step output
//! descriptors, the output registry and parsed variable references.

pub mod flow;
pub mod output;
pub mod reference;
pub mod registry;

pub use flow::{BRANCHES_OPERATOR, FlowBranch, FlowDocument, FlowStep, LOOP_OPERATOR, StepPath};
pub use output::{OutputType, StepOutputDescriptor};
pub use reference::{GLOBAL_VARIABLE_ID, VariableReference};
pub use registry::{OutputRegistry, RegistryError};
