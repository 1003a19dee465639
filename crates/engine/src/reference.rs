//! # Variable Reference Parsing and Resolution
//!
//! Form fields carry variable references in-band as plain strings of the form
//! `{{__<id>[.<path>]}}`. This module is the single place that decodes them:
//!
//! - [`parse`] decides whether a value is a reference and extracts the token
//!   and the step lookup id.
//! - [`resolve`] finds the longest registry key that prefixes the token and
//!   splits off the nested remainder path.
//! - [`encode`] turns a `(matched_id, remainder)` pair back into field form.
//!
//! All three are pure and cheap (a linear scan over a small registry), so
//! callers are free to recompute them on every render or keystroke.
//!
//! ```rust
//! use flowref_engine::reference::{parse_str, resolve};
//! use flowref_types::{OutputRegistry, StepOutputDescriptor};
//!
//! let registry = OutputRegistry::from_entries([
//!     ("__1", StepOutputDescriptor::new("", "Step A", "string")),
//!     ("__10", StepOutputDescriptor::new("", "Step B", "array")),
//! ])?;
//! let reference = parse_str("{{__10.field}}").expect("reference");
//! let resolved = resolve(&reference.raw, &registry).expect("resolved");
//! assert_eq!(resolved.matched_id, "__10");
//! assert_eq!(resolved.remainder, "field");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use flowref_types::{GLOBAL_VARIABLE_ID, OutputRegistry, StepOutputDescriptor, VariableReference};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Marker placed between the opening braces and the step identifier.
pub const REFERENCE_MARKER: &str = "__";

// `\w` in the editor is ASCII-only; spell the class out so Unicode word
// characters do not widen the match.
static REFERENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{(__([0-9A-Za-z_]+).*)\}\}$").expect("reference pattern compiles"));

/// Outcome of a successful longest-prefix lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedReference<'a> {
    /// Registry key that matched (the longest prefix of the token).
    pub matched_id: &'a str,
    pub descriptor: &'a StepOutputDescriptor,
    /// Token after `matched_id`, with one leading `.` removed. May be empty.
    pub remainder: &'a str,
}

impl ResolvedReference<'_> {
    /// Re-encodes the reference in field form.
    pub fn encode(&self) -> String {
        encode(self.matched_id, self.remainder)
    }
}

/// Parses an arbitrary field value.
///
/// Only strings can be references; numbers, arrays, objects and strings that
/// do not match the pattern yield `None` and should be treated as literals.
pub fn parse(value: &Value) -> Option<VariableReference> {
    value.as_str().and_then(parse_str)
}

/// Parses a string field value. See [`parse`].
pub fn parse_str(text: &str) -> Option<VariableReference> {
    let captures = REFERENCE_PATTERN.captures(text)?;
    let raw = captures.get(1)?.as_str();
    let fragment = captures.get(2)?.as_str();
    let lookup_id = if is_integer(fragment) { fragment } else { GLOBAL_VARIABLE_ID };
    Some(VariableReference {
        raw: raw.to_string(),
        fragment: fragment.to_string(),
        lookup_id: lookup_id.to_string(),
    })
}

/// True when the value is an encoded reference.
pub fn is_reference(value: &Value) -> bool {
    value.as_str().is_some_and(|text| REFERENCE_PATTERN.is_match(text))
}

/// Finds the longest registry key that is a prefix of `raw`.
///
/// Keys of equal length keep the first one in registry order. `None` means
/// the value points at a variable that no longer exists; callers must surface
/// that state rather than fall back to a literal.
pub fn resolve<'a>(raw: &'a str, registry: &'a OutputRegistry) -> Option<ResolvedReference<'a>> {
    let (matched_id, descriptor) = longest_prefix(raw, registry)?;
    Some(ResolvedReference {
        matched_id,
        descriptor,
        remainder: remainder_after(raw, matched_id),
    })
}

/// Registry entry whose key is the longest prefix of `raw`.
pub fn longest_prefix<'r>(raw: &str, registry: &'r OutputRegistry) -> Option<(&'r str, &'r StepOutputDescriptor)> {
    let mut best: Option<(&'r str, &'r StepOutputDescriptor)> = None;
    for (key, descriptor) in registry.iter() {
        if !raw.starts_with(key) {
            continue;
        }
        if best.is_none_or(|(current, _)| key.len() > current.len()) {
            best = Some((key, descriptor));
        }
    }
    best
}

/// `raw` after `matched_id`, with one leading `.` removed.
pub fn remainder_after<'s>(raw: &'s str, matched_id: &str) -> &'s str {
    let rest = raw.get(matched_id.len()..).unwrap_or_default();
    rest.strip_prefix('.').unwrap_or(rest)
}

/// Encodes `matched_id` and an optional nested path in field form.
pub fn encode(matched_id: &str, remainder: &str) -> String {
    if remainder.is_empty() {
        format!("{{{{{matched_id}}}}}")
    } else {
        format!("{{{{{matched_id}.{remainder}}}}}")
    }
}

/// Registry key under which a step output is published: `__<step_id><output.key>`.
pub fn output_token(step_id: &str, output_key: &str) -> String {
    format!("{REFERENCE_MARKER}{step_id}{output_key}")
}

/// Only all-digit fragments count as step ids. Numeric spellings such as
/// `1e3`, `0x1F` or `Infinity` are deliberately treated as names and looked
/// up under the global node; no step can publish them either way.
fn is_integer(fragment: &str) -> bool {
    !fragment.is_empty() && fragment.bytes().all(|byte| byte.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(name: &str, r#type: &str) -> StepOutputDescriptor {
        StepOutputDescriptor::new("", name, r#type)
    }

    fn registry(keys: &[&str]) -> OutputRegistry {
        OutputRegistry::from_entries(keys.iter().map(|key| (*key, output(key, "any")))).unwrap()
    }

    #[test]
    fn only_matching_strings_are_references() {
        assert!(parse(&json!("{{__3.result}}")).is_some());
        assert!(parse(&json!("{{3.result}}")).is_none());
        assert!(parse(&json!("{{__}}")).is_none());
        assert!(parse(&json!("{{ __3 }}")).is_none());
        assert!(parse(&json!("prefix {{__3}}")).is_none());
        assert!(parse(&json!("{{__3.result")).is_none());
        assert!(parse(&json!(42)).is_none());
        assert!(parse(&json!(["{{__3}}"])).is_none());
        assert!(parse(&json!({ "value": "{{__3}}" })).is_none());
        assert!(parse(&Value::Null).is_none());
    }

    #[test]
    fn parse_extracts_raw_token_and_fragment() {
        let reference = parse_str("{{__1000.result.items}}").unwrap();
        assert_eq!(reference.raw, "__1000.result.items");
        assert_eq!(reference.fragment, "1000");
        assert_eq!(reference.lookup_id, "1000");

        let reference = parse_str("{{__12[0].name}}").unwrap();
        assert_eq!(reference.fragment, "12");
        assert_eq!(reference.raw, "__12[0].name");
    }

    #[test]
    fn non_numeric_fragments_fall_back_to_the_global_id() {
        let reference = parse_str("{{__abc}}").unwrap();
        assert_eq!(reference.fragment, "abc");
        assert_eq!(reference.lookup_id, GLOBAL_VARIABLE_ID);

        let reference = parse_str("{{__g_authorization}}").unwrap();
        assert_eq!(reference.lookup_id, GLOBAL_VARIABLE_ID);

        let reference = parse_str("{{__3abc.x}}").unwrap();
        assert_eq!(reference.lookup_id, GLOBAL_VARIABLE_ID);
    }

    #[test]
    fn numeric_spellings_are_not_step_ids() {
        let registry = registry(&["__1.a", "__1000.a"]);
        for value in ["{{__1e3}}", "{{__0x1F.a}}", "{{__Infinity}}"] {
            let reference = parse_str(value).unwrap();
            assert_eq!(reference.lookup_id, GLOBAL_VARIABLE_ID, "{value}");
            assert!(resolve(&reference.raw, &registry).is_none(), "{value}");
        }
    }

    #[test]
    fn non_ascii_word_characters_do_not_extend_the_fragment() {
        let reference = parse_str("{{__7é}}").unwrap();
        assert_eq!(reference.fragment, "7");
        assert_eq!(reference.lookup_id, "7");
    }

    #[test]
    fn single_prefix_key_is_selected() {
        let registry = registry(&["__1.text", "__2.slices"]);
        let resolved = resolve("__2.slices", &registry).unwrap();
        assert_eq!(resolved.matched_id, "__2.slices");
        assert_eq!(resolved.remainder, "");
    }

    #[test]
    fn longest_prefix_wins() {
        let registry = OutputRegistry::from_entries([("1", output("Step A", "string")), ("10", output("Step B", "array"))]).unwrap();
        let resolved = resolve("10.field", &registry).unwrap();
        assert_eq!(resolved.matched_id, "10");
        assert_eq!(resolved.descriptor.name, "Step B");
        assert_eq!(resolved.remainder, "field");

        let reversed = OutputRegistry::from_entries([("10", output("Step B", "array")), ("1", output("Step A", "string"))]).unwrap();
        assert_eq!(resolve("10.field", &reversed).unwrap().matched_id, "10");
    }

    #[test]
    fn nested_output_keys_beat_their_parents() {
        let registry = registry(&["__2.outputs", "__2.outputs.items", "__2"]);
        let resolved = resolve("__2.outputs.items.0.name", &registry).unwrap();
        assert_eq!(resolved.matched_id, "__2.outputs.items");
        assert_eq!(resolved.remainder, "0.name");
    }

    #[test]
    fn no_prefix_is_no_match() {
        let registry = OutputRegistry::from_entries([("1", output("d1", "string"))]).unwrap();
        assert!(resolve("2.foo", &registry).is_none());
        assert!(resolve("2.foo", &OutputRegistry::new()).is_none());
    }

    #[test]
    fn only_one_leading_dot_is_stripped() {
        let registry = registry(&["__3"]);
        assert_eq!(resolve("__3..x", &registry).unwrap().remainder, ".x");
        assert_eq!(resolve("__3x", &registry).unwrap().remainder, "x");
    }

    #[test]
    fn encode_parse_resolve_round_trip() {
        let registry = registry(&["__1", "__10", "__10.result", "__g_authorization"]);
        for token in ["__10.result.items", "__1.a.b", "__10", "__g_authorization"] {
            let first = resolve(token, &registry).unwrap();
            let encoded = first.encode();
            let reparsed = parse_str(&encoded).unwrap();
            let second = resolve(&reparsed.raw, &registry).unwrap();
            assert_eq!((first.matched_id, first.remainder), (second.matched_id, second.remainder), "{token}");
        }
    }

    #[test]
    fn encode_omits_the_separator_for_empty_remainders() {
        assert_eq!(encode("3", "result.items"), "{{3.result.items}}");
        assert_eq!(encode("__3.result", ""), "{{__3.result}}");
        assert_eq!(output_token("3", ".result"), "__3.result");
    }

    #[test]
    fn resolution_is_deterministic() {
        let registry = registry(&["__1", "__1.a", "__1.b"]);
        let first = resolve("__1.a.z", &registry);
        for _ in 0..4 {
            assert_eq!(resolve("__1.a.z", &registry), first);
        }
    }
}
