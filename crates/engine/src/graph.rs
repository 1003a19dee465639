//! Step graph: step nodes and the output registry derived from a flow.
//!
//! The graph is rebuilt whenever the flow changes. Building it walks the
//! flow in execution order, assigns every node its ordinal and execution
//! path, asks the action catalog for each node's outputs and publishes them
//! in the [`OutputRegistry`] under `__<step_id><output.key>`.

use flowref_types::{
    FlowDocument, FlowStep, GLOBAL_VARIABLE_ID, OutputRegistry, OutputType, RegistryError, StepOutputDescriptor, StepPath,
};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::ActionCatalog;
use crate::reference::output_token;

/// Display name key of loop steps.
pub const LOOP_ACTION_NAME: &str = "loop";
/// Display name key of the global variable node.
pub const GLOBAL_ACTION_NAME: &str = "globalVariables";

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow has no steps; the first step must be a trigger")]
    MissingTrigger,
    #[error("step id '{id}' is used more than once")]
    DuplicateStepId { id: String },
    #[error("step id '{id}' is reserved for global variables")]
    ReservedStepId { id: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Role of a node in the step graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepNodeKind {
    Trigger,
    DataSource,
    Executor,
    Loop,
    Branches,
    Branch,
    Comparator,
    Global,
}

/// One addressable node of the flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepNode {
    pub id: String,
    pub kind: StepNodeKind,
    /// Ordinal shown next to the step, `None` for nodes without one
    /// (branches containers and conditions).
    pub index: Option<usize>,
    pub path: StepPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Action display name or translation key, `None` for unknown operators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub outputs: Vec<StepOutputDescriptor>,
}

impl StepNode {
    pub fn is_loop(&self) -> bool {
        self.kind == StepNodeKind::Loop
    }
}

/// Nodes keyed by step id plus the registry of every published output.
#[derive(Debug, Clone, Default)]
pub struct StepGraph {
    nodes: IndexMap<String, StepNode>,
    outputs: OutputRegistry,
}

impl StepGraph {
    /// Builds the graph of `flow`, resolving actions through `catalog`.
    pub fn build(flow: &FlowDocument, catalog: &ActionCatalog) -> Result<Self, FlowError> {
        let (trigger, steps) = flow.steps.split_first().ok_or(FlowError::MissingTrigger)?;
        let mut builder = GraphBuilder {
            catalog,
            graph: StepGraph::default(),
            next_index: 0,
        };

        let global_outputs = vec![StepOutputDescriptor::new("g_authorization", "Authorization", OutputType::String)];
        for output in &global_outputs {
            builder.graph.outputs.insert(format!("__{}", output.key), output.clone())?;
        }

        builder.add_trigger(trigger)?;
        for (position, step) in steps.iter().enumerate() {
            builder.traverse(step, StepPath::new(vec![position as i32 + 1]))?;
        }

        let mut graph = builder.graph;
        if graph.nodes.contains_key(GLOBAL_VARIABLE_ID) {
            return Err(FlowError::ReservedStepId {
                id: GLOBAL_VARIABLE_ID.to_string(),
            });
        }
        graph.nodes.insert(
            GLOBAL_VARIABLE_ID.to_string(),
            StepNode {
                id: GLOBAL_VARIABLE_ID.to_string(),
                kind: StepNodeKind::Global,
                index: None,
                path: StepPath::root(),
                operator: None,
                action_name: Some(GLOBAL_ACTION_NAME.to_string()),
                icon: Some("global".to_string()),
                outputs: global_outputs,
            },
        );
        debug!(nodes = graph.nodes.len(), outputs = graph.outputs.len(), "Built step graph");
        Ok(graph)
    }

    pub fn node(&self, id: &str) -> Option<&StepNode> {
        self.nodes.get(id)
    }

    /// Nodes in traversal order; the global node comes last.
    pub fn nodes(&self) -> impl Iterator<Item = &StepNode> {
        self.nodes.values()
    }

    pub fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }
}

struct GraphBuilder<'a> {
    catalog: &'a ActionCatalog,
    graph: StepGraph,
    next_index: usize,
}

impl GraphBuilder<'_> {
    fn take_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn add_trigger(&mut self, trigger: &FlowStep) -> Result<(), FlowError> {
        let index = self.take_index();
        let action = self.catalog.get(&trigger.operator);
        self.add_action_node(trigger, StepNodeKind::Trigger, Some(index), StepPath::new(vec![0]))?;

        if let Some(data_source) = trigger.data_source.as_deref()
            && !data_source.id.is_empty()
            && action.is_some_and(|action| action.allow_data_source)
        {
            // Data sources share the trigger's ordinal and position.
            self.add_action_node(data_source, StepNodeKind::DataSource, Some(index), StepPath::new(vec![0]))?;
        }
        Ok(())
    }

    fn traverse(&mut self, step: &FlowStep, path: StepPath) -> Result<(), FlowError> {
        if step.is_branches() {
            return self.add_branches(step, path);
        }
        if step.is_loop() {
            return self.add_loop(step, path);
        }
        let index = self.take_index();
        self.add_action_node(step, StepNodeKind::Executor, Some(index), path)
    }

    fn add_branches(&mut self, step: &FlowStep, path: StepPath) -> Result<(), FlowError> {
        self.insert_node(StepNode {
            id: step.id.clone(),
            kind: StepNodeKind::Branches,
            index: None,
            path: path.clone(),
            operator: Some(step.operator.clone()),
            action_name: None,
            icon: None,
            outputs: Vec::new(),
        })?;

        for (branch_position, branch) in step.branches.iter().enumerate() {
            let branch_path = path.child(branch_position as i32);
            let index = self.take_index();
            self.insert_node(StepNode {
                id: branch.id.clone(),
                kind: StepNodeKind::Branch,
                index: Some(index),
                path: branch_path.clone(),
                operator: None,
                action_name: None,
                icon: None,
                outputs: Vec::new(),
            })?;

            for (group, conditions) in branch.conditions.iter().enumerate() {
                for (position, condition) in conditions.iter().enumerate() {
                    let condition_path = branch_path.child(-1).child(group as i32).child(position as i32);
                    self.insert_node(StepNode {
                        id: condition.id.clone(),
                        kind: StepNodeKind::Comparator,
                        index: None,
                        path: condition_path,
                        operator: Some(condition.operator.clone()),
                        action_name: None,
                        icon: None,
                        outputs: Vec::new(),
                    })?;
                }
            }

            for (position, nested) in branch.steps.iter().enumerate() {
                self.traverse(nested, branch_path.child(position as i32))?;
            }
        }
        Ok(())
    }

    fn add_loop(&mut self, step: &FlowStep, path: StepPath) -> Result<(), FlowError> {
        let index = self.take_index();
        let outputs = self.publish(&step.id, loop_outputs(step))?;
        self.insert_node(StepNode {
            id: step.id.clone(),
            kind: StepNodeKind::Loop,
            index: Some(index),
            path: path.clone(),
            operator: Some(step.operator.clone()),
            action_name: Some(LOOP_ACTION_NAME.to_string()),
            icon: Some("loop".to_string()),
            outputs,
        })?;

        for (position, nested) in step.steps.iter().enumerate() {
            self.traverse(nested, path.child(position as i32))?;
        }
        Ok(())
    }

    fn add_action_node(&mut self, step: &FlowStep, kind: StepNodeKind, index: Option<usize>, path: StepPath) -> Result<(), FlowError> {
        let action = self.catalog.get(&step.operator);
        if action.is_none() && !step.operator.is_empty() {
            warn!(step = %step.id, operator = %step.operator, "No action definition for operator; step publishes no outputs");
        }
        let outputs = self.publish(&step.id, action.map(|action| action.outputs_for(step)).unwrap_or_default())?;
        self.insert_node(StepNode {
            id: step.id.clone(),
            kind,
            index,
            path,
            operator: Some(step.operator.clone()).filter(|operator| !operator.is_empty()),
            action_name: action.map(|action| action.name.clone()),
            icon: action.and_then(|action| action.icon.clone()),
            outputs,
        })
    }

    /// Registers the outputs of one step and returns them deduplicated.
    ///
    /// A key repeated within the step keeps its first position and takes the
    /// last descriptor. Collisions with other steps' outputs are errors.
    fn publish(&mut self, step_id: &str, outputs: Vec<StepOutputDescriptor>) -> Result<Vec<StepOutputDescriptor>, FlowError> {
        let mut unique: IndexMap<String, StepOutputDescriptor> = IndexMap::with_capacity(outputs.len());
        for output in outputs {
            if unique.contains_key(&output.key) {
                warn!(step = %step_id, key = %output.key, "Output key declared more than once; keeping the last declaration");
            }
            unique.insert(output.key.clone(), output);
        }
        for output in unique.values() {
            self.graph.outputs.insert(output_token(step_id, &output.key), output.clone())?;
        }
        Ok(unique.into_values().collect())
    }

    fn insert_node(&mut self, node: StepNode) -> Result<(), FlowError> {
        if self.graph.nodes.contains_key(&node.id) {
            return Err(FlowError::DuplicateStepId { id: node.id });
        }
        self.graph.nodes.insert(node.id.clone(), node);
        Ok(())
    }
}

/// Loop steps publish their iteration variables and one array per declared
/// output, but only once outputs have been declared.
fn loop_outputs(step: &FlowStep) -> Vec<StepOutputDescriptor> {
    let Some(Value::Array(declared)) = step.parameter("outputs") else {
        return Vec::new();
    };
    let mut outputs = vec![
        StepOutputDescriptor::custom(".value", "value", OutputType::Any),
        StepOutputDescriptor::custom(".index", "index", OutputType::Number),
    ];
    outputs.extend(declared.iter().filter_map(|field| {
        let key = field.get("key")?.as_str()?;
        let name = field.get("name").and_then(Value::as_str).filter(|name| !name.is_empty()).unwrap_or(key);
        Some(StepOutputDescriptor::custom(format!(".outputs.{key}"), name, OutputType::Array))
    }));
    outputs
}
