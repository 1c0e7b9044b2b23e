use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use trajcraft_types::{summary_table, EvalCase, FailureRecord, Invocation, RunResult};

use crate::config::{EvalConfig, NUM_RUNS};
use crate::datasource::EvalSetSource;
use crate::error::{EvalError, Result};
use crate::inference::{InferenceProvider, SessionGuard};
use crate::metric::Metric;
use crate::metrics::{any_match::AnyMatchTrajectoryMetric, exact_match::ExactMatchTrajectoryMetric};
use crate::observer::RunObserver;
use crate::registry::MetricRegistry;

/// What a collaborator failure (inference or metric) does to the batch.
/// Configuration errors always abort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorPolicy {
	#[default]
	Abort,
	/// Record the run as an `execution` failure and keep going.
	RecordFailure,
}

pub struct RunAggregatorBuilder {
	provider: Option<Arc<dyn InferenceProvider>>,
	registry: MetricRegistry,
	observers: Vec<Arc<dyn RunObserver>>,
	num_runs: usize,
	concurrency: usize,
	on_run_error: RunErrorPolicy,
}

impl RunAggregatorBuilder {
	pub fn new() -> Self {
		Self {
			provider: None,
			registry: MetricRegistry::with_defaults(),
			observers: Vec::new(),
			num_runs: NUM_RUNS,
			concurrency: 1,
			on_run_error: RunErrorPolicy::Abort,
		}
	}

	pub fn provider(mut self, provider: Arc<dyn InferenceProvider>) -> Self {
		self.provider = Some(provider);
		self
	}

	pub fn registry(mut self, registry: MetricRegistry) -> Self {
		self.registry = registry;
		self
	}

	pub fn add_metric(mut self, metric: Arc<dyn Metric>) -> Self {
		self.registry.register(metric);
		self
	}

	pub fn add_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
		self.observers.push(observer);
		self
	}

	pub fn num_runs(mut self, n: usize) -> Self {
		self.num_runs = n.max(1);
		self
	}

	/// Runs in flight at once. Results keep submission order either way.
	pub fn concurrency(mut self, n: usize) -> Self {
		self.concurrency = n.max(1);
		self
	}

	pub fn on_run_error(mut self, policy: RunErrorPolicy) -> Self {
		self.on_run_error = policy;
		self
	}

	/// Take `num_runs`, `concurrency` and the built-in metrics' length policy
	/// from a loaded config.
	pub fn config(mut self, config: &EvalConfig) -> Self {
		self.registry.register(Arc::new(AnyMatchTrajectoryMetric::with_length_policy(config.length_policy)));
		self.registry.register(Arc::new(ExactMatchTrajectoryMetric::with_length_policy(config.length_policy)));
		self.num_runs(config.num_runs).concurrency(config.concurrency)
	}

	pub fn build(self) -> anyhow::Result<RunAggregator> {
		Ok(RunAggregator {
			provider: self.provider.ok_or_else(|| anyhow::anyhow!("provider must be set"))?,
			registry: self.registry,
			observers: self.observers,
			num_runs: self.num_runs,
			concurrency: self.concurrency,
			on_run_error: self.on_run_error,
		})
	}
}

impl Default for RunAggregatorBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Drives repeated inference and evaluation for eval cases and compiles the
/// failure report.
pub struct RunAggregator {
	provider: Arc<dyn InferenceProvider>,
	registry: MetricRegistry,
	observers: Vec<Arc<dyn RunObserver>>,
	num_runs: usize,
	concurrency: usize,
	on_run_error: RunErrorPolicy,
}

struct ResolvedMetric {
	name: String,
	threshold: f64,
	metric: Arc<dyn Metric>,
}

impl RunAggregator {
	pub fn builder() -> RunAggregatorBuilder {
		RunAggregatorBuilder::new()
	}

	pub async fn run_source(&self, source: &dyn EvalSetSource) -> anyhow::Result<EvalOutcome> {
		let cases = source.load().await?;
		Ok(self.run_cases(&cases).await?)
	}

	pub async fn run_case(&self, case: &EvalCase) -> Result<EvalOutcome> {
		self.run_cases(std::slice::from_ref(case)).await
	}

	/// Run every case `num_runs` times and group the results by case id.
	///
	/// Runs are scheduled case by case, run index ascending, with up to
	/// `concurrency` in flight. Results are appended in that submission order
	/// no matter which run finishes first.
	pub async fn run_cases(&self, cases: &[EvalCase]) -> Result<EvalOutcome> {
		let mut seen = BTreeSet::new();
		for case in cases {
			if !seen.insert(case.eval_id.as_str()) {
				return Err(EvalError::config(format!(
					"case id '{}' appears more than once; run eval sets that share ids separately",
					case.eval_id
				)));
			}
		}

		let resolved = cases
			.iter()
			.map(|case| self.resolve_metrics(case))
			.collect::<Result<Vec<_>>>()?;

		let jobs = cases.iter().zip(resolved.iter()).flat_map(|(case, metrics)| {
			(0..self.run_count(case)).map(move |run_index| (case, metrics, run_index))
		});

		let mut runs = stream::iter(jobs)
			.map(|(case, metrics, run_index)| async move {
				(case, run_index, self.execute_run(case, metrics, run_index).await)
			})
			.buffered(self.concurrency);

		let mut outcome = EvalOutcome::default();
		while let Some((case, run_index, result)) = runs.next().await {
			match result {
				Ok(run_results) => outcome.record(&case.eval_id, run_results),
				Err(err @ EvalError::Config(_)) => return Err(err),
				Err(err) => match self.on_run_error {
					RunErrorPolicy::Abort => return Err(err),
					RunErrorPolicy::RecordFailure => {
						tracing::warn!(eval_id = %case.eval_id, run_index, error = %err, "run failed, recording");
						outcome.errors.push(RunError {
							eval_id: case.eval_id.clone(),
							run_index,
							message: err.to_string(),
						});
					}
				},
			}
		}

		outcome.compile_failures();
		for (eval_id, results) in &outcome.groups {
			let failed = results.iter().filter(|rr| !rr.passed()).count();
			tracing::info!(eval_id = %eval_id, results = results.len(), failed, "case evaluated");
		}
		tracing::info!(
			cases = cases.len(),
			runs = cases.iter().map(|case| self.run_count(case)).sum::<usize>(),
			failures = outcome.failures.len(),
			"evaluation finished"
		);
		Ok(outcome)
	}

	fn run_count(&self, case: &EvalCase) -> usize {
		case.num_runs.unwrap_or(self.num_runs).max(1)
	}

	fn resolve_metrics(&self, case: &EvalCase) -> Result<Vec<ResolvedMetric>> {
		if case.criteria.is_empty() {
			return Err(EvalError::config(format!("case '{}' has no criteria configured", case.eval_id)));
		}
		let has_expected = !case.conversation.is_empty() || case.conversation_scenario.is_none();
		case.criteria
			.iter()
			.map(|(name, criterion)| {
				let metric = self.registry.get(name)?;
				let metric = match case.length_policy {
					Some(policy) => metric.for_length_policy(policy).unwrap_or(metric),
					None => metric,
				};
				if metric.requires_expected() && !has_expected {
					return Err(EvalError::config(format!(
						"metric '{}' needs expected invocations but case '{}' only has a scenario",
						name, case.eval_id
					)));
				}
				Ok(ResolvedMetric { name: name.clone(), threshold: criterion.threshold, metric })
			})
			.collect()
	}

	async fn execute_run(&self, case: &EvalCase, metrics: &[ResolvedMetric], run_index: usize) -> Result<Vec<RunResult>> {
		tracing::debug!(eval_id = %case.eval_id, run_index, "starting run");
		for observer in &self.observers {
			observer.on_run_start(case, run_index);
		}

		let result = self.infer_and_score(case, metrics, run_index).await;

		for observer in &self.observers {
			observer.on_run_complete(case, run_index);
		}
		result
	}

	async fn infer_and_score(
		&self,
		case: &EvalCase,
		metrics: &[ResolvedMetric],
		run_index: usize,
	) -> Result<Vec<RunResult>> {
		let actual = self.infer(case, run_index).await?;

		// Scenario-driven cases have no fixed conversation to compare against.
		let expected = if case.conversation.is_empty() && case.conversation_scenario.is_some() {
			None
		} else {
			Some(case.conversation.as_slice())
		};

		let mut results = Vec::with_capacity(metrics.len());
		for m in metrics {
			let result = m
				.metric
				.evaluate(&actual, expected, case.conversation_scenario.as_ref(), m.threshold)
				.await?;
			tracing::debug!(
				eval_id = %case.eval_id,
				run_index,
				metric = %m.name,
				score = result.overall_score(),
				status = %result.overall_status(),
				"metric evaluated"
			);
			results.push(RunResult {
				eval_id: case.eval_id.clone(),
				run_index,
				metric_name: m.name.clone(),
				threshold: m.threshold,
				result,
				actual_invocations: actual.len(),
				expected_invocations: case.conversation.len(),
				completed_at: chrono::Utc::now(),
			});
		}
		Ok(results)
	}

	async fn infer(&self, case: &EvalCase, run_index: usize) -> Result<Vec<Invocation>> {
		let wrap = |source: anyhow::Error| EvalError::Inference {
			eval_id: case.eval_id.clone(),
			run_index,
			source,
		};

		let session = self.provider.open(case, run_index).await.map_err(wrap)?;
		let mut guard = SessionGuard::new(session);
		let mut invocations = Vec::new();
		while let Some(invocation) = guard.next().await.map_err(wrap)? {
			for observer in &self.observers {
				observer.on_invocation(case, run_index, &invocation);
			}
			invocations.push(invocation);
		}
		guard.close();
		Ok(invocations)
	}
}

/// A run that failed with a collaborator error under [`RunErrorPolicy::RecordFailure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
	pub eval_id: String,
	pub run_index: usize,
	pub message: String,
}

/// Every run result grouped by case id, plus the failures derived from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalOutcome {
	pub groups: BTreeMap<String, Vec<RunResult>>,
	pub failures: Vec<FailureRecord>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub errors: Vec<RunError>,
}

impl EvalOutcome {
	fn record(&mut self, eval_id: &str, run_results: Vec<RunResult>) {
		self.groups.entry(eval_id.to_string()).or_default().extend(run_results);
	}

	fn compile_failures(&mut self) {
		let mut failures = Vec::new();
		for results in self.groups.values() {
			for rr in results.iter().filter(|rr| !rr.passed()) {
				failures.push(describe_failure(rr));
			}
		}
		for err in &self.errors {
			failures.push(FailureRecord {
				eval_id: err.eval_id.clone(),
				run_index: Some(err.run_index),
				metric_name: "execution".to_string(),
				score: None,
				threshold: None,
				expected: "a completed run".to_string(),
				actual: err.message.clone(),
			});
		}
		self.failures = failures;
	}

	/// True iff no failure was recorded.
	pub fn passed(&self) -> bool {
		self.failures.is_empty()
	}

	pub fn runs_for(&self, eval_id: &str) -> &[RunResult] {
		self.groups.get(eval_id).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn run_results(&self) -> impl Iterator<Item = &RunResult> {
		self.groups.values().flatten()
	}

	/// Mean overall score per case and metric, across runs.
	pub fn metric_means(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
		let mut means = BTreeMap::new();
		for (eval_id, results) in &self.groups {
			let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
			for rr in results {
				let entry = sums.entry(rr.metric_name.clone()).or_insert((0.0, 0));
				entry.0 += rr.result.overall_score();
				entry.1 += 1;
			}
			let per_metric = sums
				.into_iter()
				.map(|(metric, (sum, count))| (metric, sum / count as f64))
				.collect();
			means.insert(eval_id.clone(), per_metric);
		}
		means
	}

	pub fn failure_message(&self) -> String {
		let mut message = String::from("Following are all the test failures.");
		for failure in &self.failures {
			message.push('\n');
			message.push_str(&failure.to_string());
		}
		message
	}

	pub fn summary_table(&self) -> String {
		summary_table(self.run_results())
	}
}

fn describe_failure(rr: &RunResult) -> FailureRecord {
	let failing: Vec<(usize, &trajcraft_types::PerInvocationResult)> = rr
		.result
		.per_invocation_results()
		.iter()
		.enumerate()
		.filter(|(_, r)| !r.status().is_passed())
		.collect();

	let (mut expected, mut actual) = if failing.is_empty() {
		(String::new(), String::new())
	} else {
		let expected = failing
			.iter()
			.map(|(i, r)| format!("invocation {}: {}", i + 1, r.expected().describe_tool_calls()))
			.collect::<Vec<_>>()
			.join("; ");
		let actual = failing
			.iter()
			.map(|(i, r)| format!("invocation {}: {}", i + 1, r.actual().describe_tool_calls()))
			.collect::<Vec<_>>()
			.join("; ");
		(expected, actual)
	};

	if rr.actual_invocations != rr.expected_invocations || failing.is_empty() {
		let prefix_expected = format!("{} invocation(s)", rr.expected_invocations);
		let prefix_actual = format!("{} invocation(s)", rr.actual_invocations);
		expected = join_nonempty(prefix_expected, expected);
		actual = join_nonempty(prefix_actual, actual);
	}

	FailureRecord {
		eval_id: rr.eval_id.clone(),
		run_index: Some(rr.run_index),
		metric_name: rr.metric_name.clone(),
		score: Some(rr.result.overall_score()),
		threshold: Some(rr.threshold),
		expected,
		actual,
	}
}

fn join_nonempty(head: String, tail: String) -> String {
	if tail.is_empty() {
		head
	} else {
		format!("{}; {}", head, tail)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::inference::from_async_fn;
	use crate::trajectory::LengthPolicy;
	use serde_json::json;
	use std::time::Duration;

	fn case(id: &str) -> EvalCase {
		EvalCase::new(
			id,
			vec![Invocation::new("1").with_tool_call("set_device_info", json!({"device_id": "device_2", "status": "ANY"}))],
		)
		.with_criterion("tool_trajectory_any_match", 1.0)
	}

	fn good_actual() -> Vec<Invocation> {
		vec![Invocation::new("1").with_tool_call("set_device_info", json!({"device_id": "device_2", "status": "OFF"}))]
	}

	#[tokio::test]
	async fn test_three_identical_runs_group_under_one_case() {
		let provider = from_async_fn(|_case, _run| async { Ok(good_actual()) });
		let aggregator = RunAggregator::builder().provider(provider).num_runs(3).build().unwrap();
		let outcome = aggregator.run_case(&case("home")).await.unwrap();

		assert_eq!(outcome.groups.len(), 1);
		let runs = outcome.runs_for("home");
		assert_eq!(runs.len(), 3);
		assert!(runs.iter().all(|rr| rr.result.overall_score() == 1.0));
		assert!(outcome.failures.is_empty());
		assert!(outcome.passed());
	}

	#[tokio::test]
	async fn test_failures_listed_per_run() {
		let provider = from_async_fn(|_case, run| async move {
			if run == 1 {
				Ok(vec![Invocation::new("1").with_tool_call("get_device_info", json!({"device_id": "device_2"}))])
			} else {
				Ok(good_actual())
			}
		});
		let aggregator = RunAggregator::builder().provider(provider).num_runs(3).build().unwrap();
		let outcome = aggregator.run_case(&case("home")).await.unwrap();

		assert!(!outcome.passed());
		assert_eq!(outcome.failures.len(), 1);
		let failure = &outcome.failures[0];
		assert_eq!(failure.run_index, Some(1));
		assert_eq!(failure.metric_name, "tool_trajectory_any_match");
		assert!(failure.expected.contains("set_device_info"));
		assert!(failure.actual.contains("get_device_info"));
		assert!(outcome.failure_message().starts_with("Following are all the test failures."));
		let means = outcome.metric_means();
		assert!((means["home"]["tool_trajectory_any_match"] - 2.0 / 3.0).abs() < 1e-12);
	}

	#[tokio::test]
	async fn test_concurrent_runs_keep_submission_order() {
		// Earlier runs sleep longer, so they complete last.
		let provider = from_async_fn(|_case, run| async move {
			tokio::time::sleep(Duration::from_millis(30 * (4 - run as u64))).await;
			Ok(good_actual())
		});
		let aggregator = RunAggregator::builder()
			.provider(provider)
			.num_runs(4)
			.concurrency(4)
			.build()
			.unwrap();
		let outcome = aggregator.run_cases(&[case("a"), case("b")]).await.unwrap();

		for id in ["a", "b"] {
			let order: Vec<usize> = outcome.runs_for(id).iter().map(|rr| rr.run_index).collect();
			assert_eq!(order, vec![0, 1, 2, 3]);
			assert!(outcome.runs_for(id).iter().all(|rr| rr.eval_id == id));
		}
		assert_eq!(outcome.run_results().count(), 8);
	}

	#[tokio::test]
	async fn test_inference_error_aborts_by_default() {
		let provider = from_async_fn(|_case, run| async move {
			if run == 1 {
				anyhow::bail!("model unavailable");
			}
			Ok(good_actual())
		});
		let aggregator = RunAggregator::builder().provider(provider).num_runs(2).build().unwrap();
		let err = aggregator.run_case(&case("home")).await.unwrap_err();
		match err {
			EvalError::Inference { eval_id, run_index, source } => {
				assert_eq!(eval_id, "home");
				assert_eq!(run_index, 1);
				assert_eq!(source.to_string(), "model unavailable");
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test]
	async fn test_inference_error_recorded_when_requested() {
		let provider = from_async_fn(|_case, run| async move {
			if run == 0 {
				anyhow::bail!("model unavailable");
			}
			Ok(good_actual())
		});
		let aggregator = RunAggregator::builder()
			.provider(provider)
			.num_runs(2)
			.on_run_error(RunErrorPolicy::RecordFailure)
			.build()
			.unwrap();
		let outcome = aggregator.run_case(&case("home")).await.unwrap();
		assert_eq!(outcome.runs_for("home").len(), 1);
		assert_eq!(outcome.errors.len(), 1);
		assert_eq!(outcome.failures.len(), 1);
		assert_eq!(outcome.failures[0].metric_name, "execution");
		assert!(outcome.failures[0].actual.contains("model unavailable"));
	}

	#[tokio::test]
	async fn test_case_without_criteria_is_config_error() {
		let provider = from_async_fn(|_case, _run| async { Ok(Vec::new()) });
		let aggregator = RunAggregator::builder().provider(provider).build().unwrap();
		let bare = EvalCase::new("bare", Vec::new());
		assert!(matches!(aggregator.run_case(&bare).await, Err(EvalError::Config(_))));
	}

	#[tokio::test]
	async fn test_unknown_metric_is_config_error_even_when_recording() {
		let provider = from_async_fn(|_case, _run| async { Ok(Vec::new()) });
		let aggregator = RunAggregator::builder()
			.provider(provider)
			.on_run_error(RunErrorPolicy::RecordFailure)
			.build()
			.unwrap();
		let case = EvalCase::new("c", Vec::new()).with_criterion("response_match_score", 0.8);
		assert!(matches!(aggregator.run_case(&case).await, Err(EvalError::Config(_))));
	}

	#[tokio::test]
	async fn test_scenario_case_without_expected_fails_trajectory_metric() {
		let provider = from_async_fn(|_case, _run| async { Ok(good_actual()) });
		let aggregator = RunAggregator::builder()
			.provider(provider)
			.on_run_error(RunErrorPolicy::RecordFailure)
			.build()
			.unwrap();
		let case = EvalCase::new("scenario", Vec::new())
			.with_scenario(json!({"starting_prompt": "hi"}))
			.with_criterion("tool_trajectory_any_match", 1.0);
		assert!(matches!(aggregator.run_case(&case).await, Err(EvalError::Config(_))));
	}

	#[tokio::test]
	async fn test_length_mismatch_failure_description() {
		let provider = from_async_fn(|_case, _run| async {
			let mut actual = good_actual();
			actual.push(Invocation::new("2"));
			Ok(actual)
		});
		let aggregator = RunAggregator::builder().provider(provider).num_runs(1).build().unwrap();
		let outcome = aggregator.run_case(&case("home")).await.unwrap();
		assert_eq!(outcome.failures.len(), 1);
		assert_eq!(outcome.failures[0].expected, "1 invocation(s)");
		assert_eq!(outcome.failures[0].actual, "2 invocation(s)");
	}

	struct BrokenMetric;

	#[async_trait::async_trait]
	impl Metric for BrokenMetric {
		fn name(&self) -> &'static str {
			"broken"
		}

		async fn evaluate(
			&self,
			_actual: &[Invocation],
			_expected: Option<&[Invocation]>,
			_scenario: Option<&serde_json::Value>,
			_threshold: f64,
		) -> Result<trajcraft_types::EvaluationResult> {
			Err(EvalError::Metric { metric: "broken".to_string(), message: "judge timed out".to_string() })
		}
	}

	#[tokio::test]
	async fn test_metric_error_follows_policy() {
		let provider = from_async_fn(|_case, _run| async { Ok(good_actual()) });
		let case = case("home").with_criterion("broken", 0.5);

		let aborting = RunAggregator::builder()
			.provider(provider.clone())
			.add_metric(Arc::new(BrokenMetric))
			.num_runs(1)
			.build()
			.unwrap();
		assert!(matches!(aborting.run_case(&case).await, Err(EvalError::Metric { .. })));

		let recording = RunAggregator::builder()
			.provider(provider)
			.add_metric(Arc::new(BrokenMetric))
			.num_runs(2)
			.on_run_error(RunErrorPolicy::RecordFailure)
			.build()
			.unwrap();
		let outcome = recording.run_case(&case).await.unwrap();
		assert_eq!(outcome.errors.len(), 2);
		assert!(outcome.runs_for("home").is_empty());
		assert!(outcome.failures.iter().all(|f| f.actual.contains("judge timed out")));
	}

	#[tokio::test]
	async fn test_duplicate_case_ids_are_config_error() {
		let provider = from_async_fn(|_case, _run| async { Ok(good_actual()) });
		let aggregator = RunAggregator::builder().provider(provider).build().unwrap();
		let err = aggregator.run_cases(&[case("case_1"), case("case_1")]).await.unwrap_err();
		assert!(matches!(err, EvalError::Config(_)));
	}

	#[tokio::test]
	async fn test_case_overrides_runs_and_length_policy() {
		let provider = from_async_fn(|_case, _run| async {
			let mut actual = good_actual();
			actual.push(Invocation::new("2"));
			Ok(actual)
		});
		let aggregator = RunAggregator::builder().provider(provider).num_runs(3).build().unwrap();
		let cases = [
			case("overridden").with_num_runs(1).with_length_policy(LengthPolicy::Truncate),
			case("inherited"),
		];
		let outcome = aggregator.run_cases(&cases).await.unwrap();

		assert_eq!(outcome.runs_for("overridden").len(), 1);
		assert_eq!(outcome.runs_for("overridden")[0].result.overall_score(), 1.0);
		assert_eq!(outcome.runs_for("inherited").len(), 3);
		assert!(outcome.runs_for("inherited").iter().all(|rr| rr.result.overall_score() == 0.0));
	}

	#[derive(Default)]
	struct EventLog(std::sync::Mutex<Vec<String>>);

	impl EventLog {
		fn push(&self, event: String) {
			self.0.lock().unwrap().push(event);
		}

		fn events(&self) -> Vec<String> {
			self.0.lock().unwrap().clone()
		}
	}

	impl RunObserver for EventLog {
		fn on_run_start(&self, _case: &EvalCase, run_index: usize) {
			self.push(format!("start {run_index}"));
		}

		fn on_run_complete(&self, _case: &EvalCase, run_index: usize) {
			self.push(format!("complete {run_index}"));
		}
	}

	struct LoggingMetric(Arc<EventLog>);

	#[async_trait::async_trait]
	impl Metric for LoggingMetric {
		fn name(&self) -> &'static str {
			"logging"
		}

		async fn evaluate(
			&self,
			_actual: &[Invocation],
			_expected: Option<&[Invocation]>,
			_scenario: Option<&serde_json::Value>,
			threshold: f64,
		) -> Result<trajcraft_types::EvaluationResult> {
			self.0.push("metric".to_string());
			Ok(trajcraft_types::EvaluationResult::vacuous(threshold))
		}
	}

	#[tokio::test]
	async fn test_run_complete_follows_scoring_and_failures() {
		let log = Arc::new(EventLog::default());
		let provider = from_async_fn(|_case, run| async move {
			if run == 1 {
				anyhow::bail!("model unavailable");
			}
			Ok(good_actual())
		});
		let aggregator = RunAggregator::builder()
			.provider(provider)
			.registry(MetricRegistry::new())
			.add_metric(Arc::new(LoggingMetric(log.clone())))
			.add_observer(log.clone())
			.num_runs(2)
			.on_run_error(RunErrorPolicy::RecordFailure)
			.build()
			.unwrap();
		let case = EvalCase::new("logged", Vec::new()).with_criterion("logging", 1.0);
		aggregator.run_case(&case).await.unwrap();

		assert_eq!(log.events(), vec!["start 0", "metric", "complete 0", "start 1", "complete 1"]);
	}

	#[test]
	fn test_build_requires_provider() {
		assert!(RunAggregator::builder().build().is_err());
	}
}
