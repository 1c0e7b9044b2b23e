use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum EvalError {
	/// A required input (expected invocations, criteria, a registered metric) is missing.
	#[error("configuration error: {0}")]
	Config(String),

	/// The inference collaborator failed; the original error is kept as the source.
	#[error("inference failed for {eval_id} run {run_index}: {source:#}")]
	Inference {
		eval_id: String,
		run_index: usize,
		#[source]
		source: anyhow::Error,
	},

	#[error("metric {metric} failed: {message}")]
	Metric { metric: String, message: String },

	#[error("failed to load {path}: {message}")]
	Load { path: String, message: String },

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("YAML error: {0}")]
	Yaml(#[from] serde_yaml::Error),
}

impl EvalError {
	pub fn config(message: impl Into<String>) -> Self {
		EvalError::Config(message.into())
	}
}
