use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{EvalError, Result};
use crate::metric::Metric;
use crate::metrics::{any_match::AnyMatchTrajectoryMetric, exact_match::ExactMatchTrajectoryMetric};

/// Maps metric names used in criteria to their evaluators.
#[derive(Clone, Default)]
pub struct MetricRegistry {
	metrics: BTreeMap<String, Arc<dyn Metric>>,
}

impl MetricRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registry with the built-in trajectory metrics.
	pub fn with_defaults() -> Self {
		let mut registry = Self::new();
		registry.register(Arc::new(AnyMatchTrajectoryMetric::new()));
		registry.register(Arc::new(ExactMatchTrajectoryMetric::new()));
		registry
	}

	/// Register under the metric's own name, replacing any previous entry.
	pub fn register(&mut self, metric: Arc<dyn Metric>) -> &mut Self {
		self.metrics.insert(metric.name().to_string(), metric);
		self
	}

	pub fn register_as(&mut self, name: impl Into<String>, metric: Arc<dyn Metric>) -> &mut Self {
		self.metrics.insert(name.into(), metric);
		self
	}

	pub fn get(&self, name: &str) -> Result<Arc<dyn Metric>> {
		self.metrics
			.get(name)
			.cloned()
			.ok_or_else(|| EvalError::config(format!("metric '{}' is not registered", name)))
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.metrics.keys().map(String::as_str)
	}
}

impl std::fmt::Debug for MetricRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MetricRegistry").field("metrics", &self.metrics.keys().collect::<Vec<_>>()).finish()
	}
}
