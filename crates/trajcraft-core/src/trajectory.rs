//! Per-invocation scoring and whole-trajectory aggregation.

pub use trajcraft_types::LengthPolicy;
use trajcraft_types::{EvaluationResult, Invocation, PerInvocationResult};

use crate::comparator::compare_with;
use crate::error::{EvalError, Result};

/// Binary score for one pair: 1.0 when the tool-call sequences match, else 0.0.
pub fn score_invocation(actual: &Invocation, expected: &Invocation, threshold: f64) -> PerInvocationResult {
	score_pair(actual, expected, threshold, true)
}

fn score_pair(actual: &Invocation, expected: &Invocation, threshold: f64, wildcard: bool) -> PerInvocationResult {
	let matched = compare_with(&actual.tool_calls, &expected.tool_calls, wildcard);
	let score = if matched { 1.0 } else { 0.0 };
	PerInvocationResult::new(actual.clone(), expected.clone(), score, threshold)
}

#[derive(Debug, Clone)]
pub struct TrajectoryEvaluator {
	threshold: f64,
	wildcard: bool,
	length_policy: LengthPolicy,
}

impl TrajectoryEvaluator {
	pub fn new(threshold: f64) -> Self {
		Self { threshold, wildcard: true, length_policy: LengthPolicy::default() }
	}

	/// Treat `"ANY"` in expected arguments as an ordinary string.
	pub fn without_wildcard(mut self) -> Self {
		self.wildcard = false;
		self
	}

	pub fn length_policy(mut self, policy: LengthPolicy) -> Self {
		self.length_policy = policy;
		self
	}

	pub fn threshold(&self) -> f64 {
		self.threshold
	}

	/// Pair `actual[i]` with `expected[i]`, score each pair and average.
	///
	/// `expected` is required; `None` is a configuration error.
	pub fn evaluate(&self, actual: &[Invocation], expected: Option<&[Invocation]>) -> Result<EvaluationResult> {
		let expected = expected
			.ok_or_else(|| EvalError::config("expected invocations are required by the trajectory metric"))?;

		let per_invocation: Vec<PerInvocationResult> = actual
			.iter()
			.zip(expected.iter())
			.map(|(a, e)| score_pair(a, e, self.threshold, self.wildcard))
			.collect();

		if self.length_policy == LengthPolicy::Strict && actual.len() != expected.len() {
			tracing::debug!(
				actual = actual.len(),
				expected = expected.len(),
				"invocation count mismatch, failing trajectory"
			);
			return Ok(EvaluationResult::new(0.0, self.threshold, per_invocation));
		}

		Ok(EvaluationResult::from_per_invocation(per_invocation, self.threshold))
	}
}

/// [`TrajectoryEvaluator`] with wildcard support and the given threshold.
pub fn evaluate_trajectory(
	actual: &[Invocation],
	expected: Option<&[Invocation]>,
	threshold: f64,
) -> Result<EvaluationResult> {
	TrajectoryEvaluator::new(threshold).evaluate(actual, expected)
}
