use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::{Table, Tabled};

/// A named action with a structured argument tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
	pub name: String,
	#[serde(default)]
	pub args: Value,
}

impl ToolCall {
	pub fn new(name: impl Into<String>, args: Value) -> Self {
		Self { name: name.into(), args }
	}

	/// Short human-readable form, e.g. `get_weather({"city":"Paris"})`.
	pub fn describe(&self) -> String {
		match &self.args {
			Value::Null => format!("{}()", self.name),
			args => format!("{}({})", self.name, args),
		}
	}
}

/// One conversational turn: what the user sent, what the agent answered and
/// the tool calls it made on the way, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
	#[serde(default)]
	pub invocation_id: String,
	#[serde(default)]
	pub user_content: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub final_response: Option<Value>,
	#[serde(default)]
	pub tool_calls: Vec<ToolCall>,
}

impl Invocation {
	pub fn new(invocation_id: impl Into<String>) -> Self {
		Self { invocation_id: invocation_id.into(), ..Default::default() }
	}

	pub fn with_user_content(mut self, content: Value) -> Self {
		self.user_content = content;
		self
	}

	pub fn with_final_response(mut self, response: Value) -> Self {
		self.final_response = Some(response);
		self
	}

	pub fn with_tool_call(mut self, name: impl Into<String>, args: Value) -> Self {
		self.tool_calls.push(ToolCall::new(name, args));
		self
	}

	pub fn with_tool_calls<I>(mut self, calls: I) -> Self
	where
		I: IntoIterator<Item = ToolCall>,
	{
		self.tool_calls.extend(calls);
		self
	}

	pub fn describe_tool_calls(&self) -> String {
		if self.tool_calls.is_empty() {
			return "no tool calls".to_string();
		}
		self.tool_calls.iter().map(ToolCall::describe).collect::<Vec<_>>().join(", ")
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalStatus {
	Passed,
	Failed,
}

impl EvalStatus {
	/// `Passed` iff `score >= threshold`.
	pub fn from_score(score: f64, threshold: f64) -> Self {
		if score >= threshold {
			EvalStatus::Passed
		} else {
			EvalStatus::Failed
		}
	}

	pub fn is_passed(self) -> bool {
		self == EvalStatus::Passed
	}
}

impl fmt::Display for EvalStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EvalStatus::Passed => f.write_str("PASSED"),
			EvalStatus::Failed => f.write_str("FAILED"),
		}
	}
}

/// Score for one (actual, expected) invocation pair. Built once; read-only afterwards.
///
/// Deserializing rejects a status that disagrees with the score and threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PerInvocationResultRepr")]
pub struct PerInvocationResult {
	actual: Invocation,
	expected: Invocation,
	score: f64,
	threshold: f64,
	status: EvalStatus,
}

impl PerInvocationResult {
	pub fn new(actual: Invocation, expected: Invocation, score: f64, threshold: f64) -> Self {
		let score = clamp_score(score);
		Self { actual, expected, score, threshold, status: EvalStatus::from_score(score, threshold) }
	}

	pub fn actual(&self) -> &Invocation {
		&self.actual
	}

	pub fn expected(&self) -> &Invocation {
		&self.expected
	}

	pub fn score(&self) -> f64 {
		self.score
	}

	pub fn threshold(&self) -> f64 {
		self.threshold
	}

	pub fn status(&self) -> EvalStatus {
		self.status
	}
}

#[derive(Deserialize)]
struct PerInvocationResultRepr {
	actual: Invocation,
	expected: Invocation,
	score: f64,
	threshold: f64,
	status: EvalStatus,
}

impl TryFrom<PerInvocationResultRepr> for PerInvocationResult {
	type Error = String;

	fn try_from(repr: PerInvocationResultRepr) -> Result<Self, Self::Error> {
		check_status(repr.score, repr.threshold, repr.status)?;
		Ok(Self {
			actual: repr.actual,
			expected: repr.expected,
			score: repr.score,
			threshold: repr.threshold,
			status: repr.status,
		})
	}
}

/// Outcome of one metric over one trajectory.
///
/// `Default` is the vacuous pass: score `1.0`, `Passed`, no per-invocation results.
/// Deserializing rejects a status that disagrees with the score and threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EvaluationResultRepr")]
pub struct EvaluationResult {
	overall_score: f64,
	threshold: f64,
	overall_status: EvalStatus,
	per_invocation_results: Vec<PerInvocationResult>,
}

impl Default for EvaluationResult {
	fn default() -> Self {
		Self::vacuous(1.0)
	}
}

impl EvaluationResult {
	pub fn new(overall_score: f64, threshold: f64, per_invocation_results: Vec<PerInvocationResult>) -> Self {
		let overall_score = clamp_score(overall_score);
		Self {
			overall_score,
			threshold,
			overall_status: EvalStatus::from_score(overall_score, threshold),
			per_invocation_results,
		}
	}

	/// Score `1.0`, `Passed`, no per-invocation results.
	pub fn vacuous(threshold: f64) -> Self {
		Self {
			overall_score: 1.0,
			threshold,
			overall_status: EvalStatus::Passed,
			per_invocation_results: Vec::new(),
		}
	}

	/// Arithmetic mean of the per-invocation scores; vacuous pass when empty.
	pub fn from_per_invocation(per_invocation_results: Vec<PerInvocationResult>, threshold: f64) -> Self {
		if per_invocation_results.is_empty() {
			return Self::vacuous(threshold);
		}
		let total: f64 = per_invocation_results.iter().map(|r| r.score).sum();
		let mean = total / per_invocation_results.len() as f64;
		Self::new(mean, threshold, per_invocation_results)
	}

	pub fn overall_score(&self) -> f64 {
		self.overall_score
	}

	pub fn threshold(&self) -> f64 {
		self.threshold
	}

	pub fn overall_status(&self) -> EvalStatus {
		self.overall_status
	}

	pub fn per_invocation_results(&self) -> &[PerInvocationResult] {
		&self.per_invocation_results
	}
}

#[derive(Deserialize)]
struct EvaluationResultRepr {
	overall_score: f64,
	threshold: f64,
	overall_status: EvalStatus,
	#[serde(default)]
	per_invocation_results: Vec<PerInvocationResult>,
}

impl TryFrom<EvaluationResultRepr> for EvaluationResult {
	type Error = String;

	fn try_from(repr: EvaluationResultRepr) -> Result<Self, Self::Error> {
		// The vacuous pass holds for any threshold.
		let vacuous = repr.per_invocation_results.is_empty()
			&& repr.overall_score == 1.0
			&& repr.overall_status.is_passed();
		if !vacuous {
			check_status(repr.overall_score, repr.threshold, repr.overall_status)?;
		}
		Ok(Self {
			overall_score: repr.overall_score,
			threshold: repr.threshold,
			overall_status: repr.overall_status,
			per_invocation_results: repr.per_invocation_results,
		})
	}
}

fn check_status(score: f64, threshold: f64, status: EvalStatus) -> Result<(), String> {
	if !(0.0..=1.0).contains(&score) {
		return Err(format!("score {} is outside [0, 1]", score));
	}
	let derived = EvalStatus::from_score(score, threshold);
	if derived != status {
		return Err(format!("status {} contradicts score {} with threshold {}", status, score, threshold));
	}
	Ok(())
}

fn clamp_score(score: f64) -> f64 {
	if score.is_nan() {
		0.0
	} else {
		score.clamp(0.0, 1.0)
	}
}

/// Minimum score for a metric to pass.
///
/// Deserializes from either a bare number (`0.8`) or `{ "threshold": 0.8 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "CriterionRepr")]
pub struct Criterion {
	pub threshold: f64,
}

impl Criterion {
	pub fn new(threshold: f64) -> Self {
		Self { threshold }
	}
}

impl Default for Criterion {
	fn default() -> Self {
		Self { threshold: 1.0 }
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CriterionRepr {
	Bare(f64),
	Object { threshold: f64 },
}

impl From<CriterionRepr> for Criterion {
	fn from(repr: CriterionRepr) -> Self {
		match repr {
			CriterionRepr::Bare(threshold) | CriterionRepr::Object { threshold } => Self { threshold },
		}
	}
}

/// What to do when the actual and expected conversations differ in length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthPolicy {
	/// Score the paired positions; a count mismatch forces the overall score to 0.0.
	#[default]
	Strict,
	/// Score the paired positions and ignore the surplus.
	Truncate,
}

/// A named test unit: the expected conversation plus the metrics (and their
/// thresholds) it is scored with.
///
/// `num_runs` and `length_policy`, when set, override the aggregator's settings
/// for this case only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
	pub eval_id: String,
	#[serde(default)]
	pub conversation: Vec<Invocation>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub conversation_scenario: Option<Value>,
	#[serde(default)]
	pub criteria: BTreeMap<String, Criterion>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub num_runs: Option<usize>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub length_policy: Option<LengthPolicy>,
}

impl EvalCase {
	pub fn new(eval_id: impl Into<String>, conversation: Vec<Invocation>) -> Self {
		Self {
			eval_id: eval_id.into(),
			conversation,
			conversation_scenario: None,
			criteria: BTreeMap::new(),
			num_runs: None,
			length_policy: None,
		}
	}

	pub fn with_criterion(mut self, metric_name: impl Into<String>, threshold: f64) -> Self {
		self.criteria.insert(metric_name.into(), Criterion::new(threshold));
		self
	}

	pub fn with_criteria(mut self, criteria: BTreeMap<String, Criterion>) -> Self {
		self.criteria = criteria;
		self
	}

	pub fn with_scenario(mut self, scenario: Value) -> Self {
		self.conversation_scenario = Some(scenario);
		self
	}

	pub fn with_num_runs(mut self, num_runs: usize) -> Self {
		self.num_runs = Some(num_runs);
		self
	}

	pub fn with_length_policy(mut self, policy: LengthPolicy) -> Self {
		self.length_policy = Some(policy);
		self
	}
}

/// One metric's result for one run of one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
	pub eval_id: String,
	pub run_index: usize,
	pub metric_name: String,
	pub threshold: f64,
	pub result: EvaluationResult,
	pub actual_invocations: usize,
	pub expected_invocations: usize,
	pub completed_at: DateTime<Utc>,
}

impl RunResult {
	pub fn passed(&self) -> bool {
		self.result.overall_status().is_passed()
	}
}

/// Human-readable description of one sub-threshold metric result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
	pub eval_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub run_index: Option<usize>,
	pub metric_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub score: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub threshold: Option<f64>,
	pub expected: String,
	pub actual: String,
}

impl fmt::Display for FailureRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}", self.eval_id)?;
		if let Some(run) = self.run_index {
			write!(f, " run {}", run)?;
		}
		write!(f, "] {}", self.metric_name)?;
		if let (Some(score), Some(threshold)) = (self.score, self.threshold) {
			write!(f, " score {:.3} < threshold {:.3}", score, threshold)?;
		}
		write!(f, "\n  expected: {}\n  actual:   {}", self.expected, self.actual)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
struct SummaryRow {
	eval_id: String,
	run: usize,
	metric: String,
	score: String,
	threshold: String,
	status: String,
	invocations: usize,
}

/// Render run results as a table with a one-line footer.
pub fn summary_table<'a, I>(results: I) -> String
where
	I: IntoIterator<Item = &'a RunResult>,
{
	let mut total = 0usize;
	let mut passed = 0usize;
	let rows: Vec<SummaryRow> = results
		.into_iter()
		.map(|rr| {
			total += 1;
			if rr.passed() {
				passed += 1;
			}
			SummaryRow {
				eval_id: truncate(rr.eval_id.clone(), 40),
				run: rr.run_index,
				metric: rr.metric_name.clone(),
				score: format!("{:.3}", rr.result.overall_score()),
				threshold: format!("{:.3}", rr.threshold),
				status: rr.result.overall_status().to_string(),
				invocations: rr.result.per_invocation_results().len(),
			}
		})
		.collect();

	let table = Table::new(rows);
	let pass_rate = if total == 0 { 0.0 } else { passed as f64 / total as f64 };
	format!(
		"{}\n\nRun results: {}  Passed: {}  Pass rate: {:.1}%\n",
		table,
		total,
		passed,
		pass_rate * 100.0
	)
}

pub fn truncate(s: String, max_len: usize) -> String {
	if s.chars().count() <= max_len {
		return s;
	}
	let mut truncated = s.chars().take(max_len.saturating_sub(1)).collect::<String>();
	truncated.push('…');
	truncated
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn pair(score: f64) -> PerInvocationResult {
		PerInvocationResult::new(Invocation::default(), Invocation::default(), score, 1.0)
	}

	#[test]
	fn test_default_is_vacuous_pass() {
		let result = EvaluationResult::default();
		assert_eq!(result.overall_score(), 1.0);
		assert_eq!(result.overall_status(), EvalStatus::Passed);
		assert!(result.per_invocation_results().is_empty());
	}

	#[test]
	fn test_mean_of_per_invocation_scores() {
		let result = EvaluationResult::from_per_invocation(vec![pair(1.0), pair(0.0), pair(1.0), pair(1.0)], 0.7);
		assert_eq!(result.overall_score(), 0.75);
		assert_eq!(result.overall_status(), EvalStatus::Passed);
		assert_eq!(result.per_invocation_results()[1].status(), EvalStatus::Failed);
	}

	#[test]
	fn test_deserialize_round_trips_consistent_results() {
		let result = EvaluationResult::from_per_invocation(vec![pair(1.0), pair(0.0)], 0.5);
		let back: EvaluationResult = serde_json::from_str(&serde_json::to_string(&result).unwrap()).unwrap();
		assert_eq!(back, result);
		let vacuous: EvaluationResult = serde_json::from_value(json!({
			"overall_score": 1.0, "threshold": 1.0, "overall_status": "passed"
		}))
		.unwrap();
		assert_eq!(vacuous, EvaluationResult::default());
	}

	#[test]
	fn test_deserialize_rejects_contradicting_status() {
		let forged = json!({"overall_score": 0.2, "threshold": 0.9, "overall_status": "passed", "per_invocation_results": []});
		assert!(serde_json::from_value::<EvaluationResult>(forged).is_err());

		let mut pair_json = serde_json::to_value(pair(0.0)).unwrap();
		pair_json["status"] = json!("passed");
		assert!(serde_json::from_value::<PerInvocationResult>(pair_json).is_err());

		let mut out_of_range = serde_json::to_value(pair(1.0)).unwrap();
		out_of_range["score"] = json!(3.0);
		assert!(serde_json::from_value::<PerInvocationResult>(out_of_range).is_err());
	}

	#[test]
	fn test_status_boundary_is_inclusive() {
		assert_eq!(EvalStatus::from_score(0.5, 0.5), EvalStatus::Passed);
		assert_eq!(EvalStatus::from_score(0.49, 0.5), EvalStatus::Failed);
	}

	#[test]
	fn test_scores_are_clamped() {
		assert_eq!(pair(1.5).score(), 1.0);
		assert_eq!(pair(-0.2).score(), 0.0);
		assert_eq!(pair(f64::NAN).score(), 0.0);
	}

	#[test]
	fn test_criterion_accepts_bare_number_and_object() {
		let criteria: BTreeMap<String, Criterion> = serde_json::from_value(json!({
			"tool_trajectory_any_match": 1.0,
			"tool_trajectory_exact_match": {"threshold": 0.5}
		}))
		.unwrap();
		assert_eq!(criteria["tool_trajectory_any_match"].threshold, 1.0);
		assert_eq!(criteria["tool_trajectory_exact_match"].threshold, 0.5);
	}

	#[test]
	fn test_invocation_deserializes_with_defaults() {
		let inv: Invocation = serde_json::from_value(json!({
			"tool_calls": [{"name": "turn_on", "args": {"device": "lamp"}}, {"name": "ping"}]
		}))
		.unwrap();
		assert_eq!(inv.tool_calls.len(), 2);
		assert_eq!(inv.tool_calls[1].args, Value::Null);
		assert_eq!(inv.describe_tool_calls(), r#"turn_on({"device":"lamp"}), ping()"#);
	}

	#[test]
	fn test_failure_record_display() {
		let record = FailureRecord {
			eval_id: "case-1".to_string(),
			run_index: Some(2),
			metric_name: "tool_trajectory_any_match".to_string(),
			score: Some(0.5),
			threshold: Some(1.0),
			expected: "f()".to_string(),
			actual: "g()".to_string(),
		};
		let text = record.to_string();
		assert!(text.starts_with("[case-1 run 2] tool_trajectory_any_match score 0.500 < threshold 1.000"));
		assert!(text.contains("expected: f()"));
		assert!(text.contains("actual:   g()"));
	}

	#[test]
	fn test_summary_table_counts() {
		let ok = RunResult {
			eval_id: "a".to_string(),
			run_index: 0,
			metric_name: "m".to_string(),
			threshold: 1.0,
			result: EvaluationResult::default(),
			actual_invocations: 0,
			expected_invocations: 0,
			completed_at: Utc::now(),
		};
		let bad = RunResult { run_index: 1, result: EvaluationResult::new(0.0, 1.0, Vec::new()), ..ok.clone() };
		let table = summary_table([&ok, &bad]);
		assert!(table.contains("Run results: 2  Passed: 1  Pass rate: 50.0%"));
		assert!(table.contains("FAILED"));
	}
}
