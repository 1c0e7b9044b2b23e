use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use trajcraft_types::{EvaluationResult, Invocation};

use crate::error::Result;
use crate::metric::Metric;
use crate::trajectory::{LengthPolicy, TrajectoryEvaluator};

/// Tool trajectory match with literal argument comparison.
#[derive(Debug, Clone, Default)]
pub struct ExactMatchTrajectoryMetric {
	length_policy: LengthPolicy,
}

impl ExactMatchTrajectoryMetric {
	pub const NAME: &'static str = "tool_trajectory_exact_match";

	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_length_policy(length_policy: LengthPolicy) -> Self {
		Self { length_policy }
	}
}

#[async_trait]
impl Metric for ExactMatchTrajectoryMetric {
	fn name(&self) -> &'static str {
		Self::NAME
	}

	fn for_length_policy(&self, policy: LengthPolicy) -> Option<Arc<dyn Metric>> {
		Some(Arc::new(Self::with_length_policy(policy)))
	}

	async fn evaluate(
		&self,
		actual: &[Invocation],
		expected: Option<&[Invocation]>,
		_scenario: Option<&Value>,
		threshold: f64,
	) -> Result<EvaluationResult> {
		TrajectoryEvaluator::new(threshold)
			.without_wildcard()
			.length_policy(self.length_policy)
			.evaluate(actual, expected)
	}
}
