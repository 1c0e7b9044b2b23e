//! Structural comparison of tool-call argument trees.
//!
//! An expected tree may contain the [`WILDCARD`] string at any value position
//! (whole arguments, a map value, a list element) to accept whatever the agent
//! produced there. Map keys are always compared literally.

use serde_json::{Number, Value};

/// Expected-side value that matches any actual value, including null and subtrees.
pub const WILDCARD: &str = "ANY";

/// Match `actual` against `expected`, honoring [`WILDCARD`] in `expected`.
pub fn matches(actual: &Value, expected: &Value) -> bool {
	match_value(actual, expected, true)
}

/// Match with wildcard support switched off; `"ANY"` is then an ordinary string.
pub fn matches_exact(actual: &Value, expected: &Value) -> bool {
	match_value(actual, expected, false)
}

pub(crate) fn match_value(actual: &Value, expected: &Value, wildcard: bool) -> bool {
	if wildcard && is_wildcard(expected) {
		return true;
	}

	match (expected, actual) {
		(Value::Object(e), Value::Object(a)) => {
			// Same key set: every expected key present and nothing extra.
			if e.len() != a.len() {
				return false;
			}
			e.iter().all(|(key, e_val)| match a.get(key) {
				Some(a_val) => match_value(a_val, e_val, wildcard),
				None => false,
			})
		}
		(Value::Array(e), Value::Array(a)) => {
			if e.len() != a.len() {
				return false;
			}
			e.iter()
				.zip(a.iter())
				.all(|(e_item, a_item)| match_value(a_item, e_item, wildcard))
		}
		(Value::Object(_), _) | (Value::Array(_), _) => false,
		(Value::Number(e), Value::Number(a)) => numbers_equal(a, e),
		(e, a) => e == a,
	}
}

/// Equality by value: integers compare exactly, `1 == 1.0`, and an integer only
/// equals a float that represents it exactly.
fn numbers_equal(actual: &Number, expected: &Number) -> bool {
	match (as_integer(actual), as_integer(expected)) {
		(Some(a), Some(e)) => a == e,
		(Some(i), None) => expected.as_f64().is_some_and(|f| integer_equals_float(i, f)),
		(None, Some(i)) => actual.as_f64().is_some_and(|f| integer_equals_float(i, f)),
		(None, None) => actual.as_f64() == expected.as_f64(),
	}
}

fn as_integer(n: &Number) -> Option<i128> {
	n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from))
}

fn integer_equals_float(i: i128, f: f64) -> bool {
	// Out-of-range casts saturate and cannot equal an i64/u64 value.
	f.fract() == 0.0 && f as i128 == i
}

fn is_wildcard(value: &Value) -> bool {
	matches!(value, Value::String(s) if s == WILDCARD)
}
