//! The contract with whatever produces actual invocations for a case.
//!
//! A provider opens one [`InferenceSession`] per (case, run). Sessions are
//! pulled one invocation at a time and always closed through [`SessionGuard`],
//! whether the run drains normally, fails, or is dropped mid-flight.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use trajcraft_types::{EvalCase, Invocation};

#[async_trait]
pub trait InferenceSession: Send {
	/// Next invocation, or `None` once the run is finished.
	async fn next(&mut self) -> Result<Option<Invocation>>;

	/// Release the underlying resources. Called exactly once by [`SessionGuard`].
	fn close(&mut self) {}
}

#[async_trait]
pub trait InferenceProvider: Send + Sync {
	async fn open(&self, case: &EvalCase, run_index: usize) -> Result<Box<dyn InferenceSession>>;
}

/// Owns an open session and closes it on drop.
pub struct SessionGuard {
	session: Box<dyn InferenceSession>,
	closed: bool,
}

impl SessionGuard {
	pub fn new(session: Box<dyn InferenceSession>) -> Self {
		Self { session, closed: false }
	}

	pub async fn next(&mut self) -> Result<Option<Invocation>> {
		if self.closed {
			return Ok(None);
		}
		self.session.next().await
	}

	/// Pull every remaining invocation, then close.
	pub async fn drain(mut self) -> Result<Vec<Invocation>> {
		let mut invocations = Vec::new();
		while let Some(invocation) = self.next().await? {
			invocations.push(invocation);
		}
		self.close();
		Ok(invocations)
	}

	pub fn close(&mut self) {
		if !self.closed {
			self.closed = true;
			self.session.close();
		}
	}
}

impl Drop for SessionGuard {
	fn drop(&mut self) {
		self.close();
	}
}

struct VecSession {
	invocations: std::vec::IntoIter<Invocation>,
}

#[async_trait]
impl InferenceSession for VecSession {
	async fn next(&mut self) -> Result<Option<Invocation>> {
		Ok(self.invocations.next())
	}
}

struct StreamSession {
	stream: Option<BoxStream<'static, Result<Invocation>>>,
}

#[async_trait]
impl InferenceSession for StreamSession {
	async fn next(&mut self) -> Result<Option<Invocation>> {
		match self.stream.as_mut() {
			Some(stream) => stream.next().await.transpose(),
			None => Ok(None),
		}
	}

	fn close(&mut self) {
		self.stream = None;
	}
}

/// Wrap an async closure returning a whole trajectory as a provider.
pub fn from_async_fn<F, Fut>(f: F) -> Arc<dyn InferenceProvider>
where
	F: Send + Sync + 'static + Fn(&EvalCase, usize) -> Fut,
	Fut: Future<Output = Result<Vec<Invocation>>> + Send + 'static,
{
	struct ClosureProvider<F> {
		f: F,
	}

	#[async_trait]
	impl<F, Fut> InferenceProvider for ClosureProvider<F>
	where
		F: Send + Sync + 'static + Fn(&EvalCase, usize) -> Fut,
		Fut: Future<Output = Result<Vec<Invocation>>> + Send + 'static,
	{
		async fn open(&self, case: &EvalCase, run_index: usize) -> Result<Box<dyn InferenceSession>> {
			let invocations = (self.f)(case, run_index).await?;
			Ok(Box::new(VecSession { invocations: invocations.into_iter() }))
		}
	}

	Arc::new(ClosureProvider { f })
}

/// Wrap a closure returning an incremental stream of invocations as a provider.
/// Dropping the session drops the stream.
pub fn from_stream<F, S>(f: F) -> Arc<dyn InferenceProvider>
where
	F: Send + Sync + 'static + Fn(&EvalCase, usize) -> S,
	S: Stream<Item = Result<Invocation>> + Send + 'static,
{
	struct StreamProvider<F> {
		f: F,
	}

	#[async_trait]
	impl<F, S> InferenceProvider for StreamProvider<F>
	where
		F: Send + Sync + 'static + Fn(&EvalCase, usize) -> S,
		S: Stream<Item = Result<Invocation>> + Send + 'static,
	{
		async fn open(&self, case: &EvalCase, run_index: usize) -> Result<Box<dyn InferenceSession>> {
			let stream = (self.f)(case, run_index).boxed();
			Ok(Box::new(StreamSession { stream: Some(stream) }))
		}
	}

	Arc::new(StreamProvider { f })
}

/// Replays recorded trajectories instead of calling an agent.
///
/// Recordings are keyed by case id; run `i` replays recording `i % n`.
/// [`ReplayProvider::expected`] replays each case's own expected conversation.
#[derive(Debug, Clone, Default)]
pub struct ReplayProvider {
	recordings: HashMap<String, Vec<Vec<Invocation>>>,
	replay_expected: bool,
}

impl ReplayProvider {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn expected() -> Self {
		Self { recordings: HashMap::new(), replay_expected: true }
	}

	pub fn record(mut self, eval_id: impl Into<String>, trajectory: Vec<Invocation>) -> Self {
		self.recordings.entry(eval_id.into()).or_default().push(trajectory);
		self
	}

	/// Load `{"eval_id": "...", "invocations": [...]}` lines.
	pub fn from_jsonl(content: &str) -> Result<Self> {
		#[derive(serde::Deserialize)]
		struct Line {
			eval_id: String,
			#[serde(default)]
			invocations: Vec<Invocation>,
		}

		let mut provider = Self::new();
		for (idx, line) in content.lines().enumerate() {
			let line = line.trim();
			if line.is_empty() {
				continue;
			}
			let parsed: Line = serde_json::from_str(line)
				.map_err(|e| anyhow!("Invalid replay record on line {}: {}", idx + 1, e))?;
			provider = provider.record(parsed.eval_id, parsed.invocations);
		}
		Ok(provider)
	}
}

#[async_trait]
impl InferenceProvider for ReplayProvider {
	async fn open(&self, case: &EvalCase, run_index: usize) -> Result<Box<dyn InferenceSession>> {
		let invocations = match self.recordings.get(&case.eval_id) {
			Some(runs) if !runs.is_empty() => runs[run_index % runs.len()].clone(),
			_ if self.replay_expected => case.conversation.clone(),
			_ => return Err(anyhow!("no recorded trajectory for case '{}'", case.eval_id)),
		};
		Ok(Box::new(VecSession { invocations: invocations.into_iter() }))
	}
}
