use std::sync::atomic::{AtomicUsize, Ordering};

use trajcraft_types::{EvalCase, Invocation};

/// Hooks called by the run aggregator. All methods default to no-ops.
///
/// Observers are shared across concurrent runs, so any state must live in the
/// observer instance and be safe to update from several runs at once.
pub trait RunObserver: Send + Sync {
	fn on_run_start(&self, _case: &EvalCase, _run_index: usize) {}

	fn on_invocation(&self, _case: &EvalCase, _run_index: usize, _invocation: &Invocation) {}

	/// Called once per started run after its metrics are scored, including runs
	/// that failed during inference or scoring.
	fn on_run_complete(&self, _case: &EvalCase, _run_index: usize) {}
}

/// Counts runs, invocations and tool calls seen by one aggregator.
#[derive(Debug, Default)]
pub struct InvocationCounter {
	runs: AtomicUsize,
	invocations: AtomicUsize,
	tool_calls: AtomicUsize,
}

impl InvocationCounter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn runs(&self) -> usize {
		self.runs.load(Ordering::Relaxed)
	}

	pub fn invocations(&self) -> usize {
		self.invocations.load(Ordering::Relaxed)
	}

	pub fn tool_calls(&self) -> usize {
		self.tool_calls.load(Ordering::Relaxed)
	}
}

impl RunObserver for InvocationCounter {
	fn on_run_start(&self, case: &EvalCase, run_index: usize) {
		let count = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
		tracing::debug!(eval_id = %case.eval_id, run_index, count, "run started");
	}

	fn on_invocation(&self, _case: &EvalCase, _run_index: usize, invocation: &Invocation) {
		let count = self.invocations.fetch_add(1, Ordering::Relaxed) + 1;
		let tools = self.tool_calls.fetch_add(invocation.tool_calls.len(), Ordering::Relaxed) + invocation.tool_calls.len();
		tracing::debug!(invocations = count, tool_calls = tools, "invocation received");
	}
}
