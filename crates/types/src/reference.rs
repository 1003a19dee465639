//! Parsed variable reference.

use serde::{Deserialize, Serialize};

/// Lookup id used for global variables and every non-numeric identifier.
pub const GLOBAL_VARIABLE_ID: &str = "1000";

/// A field value of the form `{{__<token>}}` after parsing.
///
/// The persisted form is always the encoded string; this value is re-derived
/// from it whenever it is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableReference {
    /// Token between the braces, including the `__` marker (`__1000.result.items`).
    pub raw: String,
    /// Identifier fragment directly after the marker (`1000`).
    pub fragment: String,
    /// Step node id the reference belongs to: the fragment when it is an
    /// integer, [`GLOBAL_VARIABLE_ID`] otherwise.
    pub lookup_id: String,
}
