use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use trajcraft_types::{EvaluationResult, Invocation, LengthPolicy};

use crate::error::Result;

/// Scores one trajectory against its reference.
///
/// `scenario` is optional conversation-level context; metrics that only look at
/// tool calls ignore it. A metric whose [`Metric::requires_expected`] is true
/// must return [`crate::EvalError::Config`] when `expected` is `None`.
#[async_trait]
pub trait Metric: Send + Sync {
	fn name(&self) -> &'static str;

	fn requires_expected(&self) -> bool {
		true
	}

	/// This metric with `policy` applied, for cases that override it.
	/// `None` when the metric has no notion of a length policy.
	fn for_length_policy(&self, _policy: LengthPolicy) -> Option<Arc<dyn Metric>> {
		None
	}

	async fn evaluate(
		&self,
		actual: &[Invocation],
		expected: Option<&[Invocation]>,
		scenario: Option<&Value>,
		threshold: f64,
	) -> Result<EvaluationResult>;
}
