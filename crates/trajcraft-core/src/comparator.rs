use trajcraft_types::ToolCall;

use crate::matcher::match_value;

/// Ordered tool-call comparison: same length, and at every position the same
/// name with arguments accepted by [`crate::matcher::matches`].
pub fn tool_calls_match(actual: &[ToolCall], expected: &[ToolCall]) -> bool {
	compare_with(actual, expected, true)
}

/// Like [`tool_calls_match`] but without wildcard arguments.
pub fn tool_calls_match_exact(actual: &[ToolCall], expected: &[ToolCall]) -> bool {
	compare_with(actual, expected, false)
}

pub(crate) fn compare_with(actual: &[ToolCall], expected: &[ToolCall], wildcard: bool) -> bool {
	if actual.len() != expected.len() {
		return false;
	}
	actual
		.iter()
		.zip(expected.iter())
		.all(|(a, e)| a.name == e.name && match_value(&a.args, &e.args, wildcard))
}
