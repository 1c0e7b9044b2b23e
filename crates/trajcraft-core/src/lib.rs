//! trajcraft-core: tool-trajectory evaluation for Rust agents.
//! Replay or run your agent several times per eval case, score each run's tool
//! calls against the expected conversation, and collect every failure.
//! See `examples/simple.rs` for a quickstart.

pub mod comparator;
pub mod config;
pub mod datasource;
pub mod error;
pub mod inference;
pub mod matcher;
pub mod metric;
pub mod observer;
pub mod registry;
pub mod runner;
pub mod testing;
pub mod trajectory;

pub mod metrics {
    pub mod any_match;
    pub mod exact_match;
}

pub use comparator::{tool_calls_match, tool_calls_match_exact};
pub use config::{CaseOverrides, EvalConfig, LocalConfig, CONFIG_FILE_NAME, NUM_RUNS};
pub use datasource::{EvalSetSource, TestFileSource, VecEvalSetSource};
pub use error::{EvalError, Result};
pub use inference::{from_async_fn, from_stream, InferenceProvider, InferenceSession, ReplayProvider, SessionGuard};
pub use matcher::{matches, matches_exact, WILDCARD};
pub use metric::Metric;
pub use metrics::{any_match::AnyMatchTrajectoryMetric, exact_match::ExactMatchTrajectoryMetric};
pub use observer::{InvocationCounter, RunObserver};
pub use registry::MetricRegistry;
pub use runner::{EvalOutcome, RunAggregator, RunAggregatorBuilder, RunError, RunErrorPolicy};
pub use testing::{assert_all_runs_passed, assert_no_failures};
pub use trajectory::{evaluate_trajectory, score_invocation, LengthPolicy, TrajectoryEvaluator};

pub use trajcraft_types::{
    EvalCase, EvalStatus, EvaluationResult, FailureRecord, Invocation, PerInvocationResult, RunResult, ToolCall,
    Criterion,
};
