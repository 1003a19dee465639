//! Reference scope rules.
//!
//! A step may reference outputs of steps that run before it, and the
//! iteration variables of a loop it is nested in. Hosts with different
//! ordering semantics plug their own [`ScopeRules`]; resolution never depends
//! on these checks, they only decide whether a resolved reference is valid.

use flowref_types::StepPath;

pub trait ScopeRules {
    /// True when the step at `target` has finished before the step at `scope` runs.
    fn is_accessible(&self, scope: &StepPath, target: &StepPath) -> bool;

    /// True when `target` is a loop whose iteration variables are visible
    /// from `scope`.
    fn is_loop_var_accessible(&self, scope: &StepPath, target: &StepPath, target_is_loop: bool) -> bool;

    /// Either rule admits the reference.
    fn admits(&self, scope: &StepPath, target: &StepPath, target_is_loop: bool) -> bool {
        self.is_accessible(scope, target) || self.is_loop_var_accessible(scope, target, target_is_loop)
    }
}

/// Execution-order rules of the editor's step layout.
///
/// `target` is accessible when it shares every segment with `scope` except
/// the last one, where it sorts strictly earlier. The empty path (global
/// variables) is accessible from everywhere. Branch conditions carry a `-1`
/// segment and therefore see nothing inside their own branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionOrder;

impl ScopeRules for ExecutionOrder {
    fn is_accessible(&self, scope: &StepPath, target: &StepPath) -> bool {
        let target_segments = target.segments();
        let scope_segments = scope.segments();
        let Some((last, parents)) = target_segments.split_last() else {
            return true;
        };
        if target_segments.len() > scope_segments.len() {
            return false;
        }
        scope_segments.starts_with(parents) && *last < scope_segments[parents.len()]
    }

    fn is_loop_var_accessible(&self, scope: &StepPath, target: &StepPath, target_is_loop: bool) -> bool {
        target_is_loop && scope.len() > target.len() && scope.starts_with(target)
    }
}
