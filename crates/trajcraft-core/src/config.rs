use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trajcraft_types::Criterion;

use crate::datasource::read_to_string;
use crate::error::{EvalError, Result};
use crate::metrics::any_match::AnyMatchTrajectoryMetric;
use crate::trajectory::LengthPolicy;

/// Runs per case when nothing else is configured.
pub const NUM_RUNS: usize = 2;

/// File looked up next to a test file for its criteria.
pub const CONFIG_FILE_NAME: &str = "test_config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
	/// Metric name to threshold.
	#[serde(default = "default_criteria")]
	pub criteria: BTreeMap<String, Criterion>,
	#[serde(default = "default_num_runs")]
	pub num_runs: usize,
	#[serde(default = "default_concurrency")]
	pub concurrency: usize,
	#[serde(default)]
	pub length_policy: LengthPolicy,
}

impl Default for EvalConfig {
	fn default() -> Self {
		Self {
			criteria: default_criteria(),
			num_runs: default_num_runs(),
			concurrency: default_concurrency(),
			length_policy: LengthPolicy::default(),
		}
	}
}

fn default_criteria() -> BTreeMap<String, Criterion> {
	BTreeMap::from([(AnyMatchTrajectoryMetric::NAME.to_string(), Criterion::new(1.0))])
}

fn default_num_runs() -> usize {
	NUM_RUNS
}

fn default_concurrency() -> usize {
	1
}

impl EvalConfig {
	pub fn with_criterion(mut self, metric_name: impl Into<String>, threshold: f64) -> Self {
		self.criteria.insert(metric_name.into(), Criterion::new(threshold));
		self
	}

	/// Parse JSON, or YAML when the extension is `.yaml`/`.yml`.
	pub fn parse(content: &str, path: &Path) -> Result<Self> {
		let config: EvalConfig = match path.extension().and_then(|e| e.to_str()) {
			Some("yaml") | Some("yml") => serde_yaml::from_str(content)?,
			_ => serde_json::from_str(content)?,
		};
		config.validate()?;
		Ok(config)
	}

	pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = read_to_string(path).await?;
		Self::parse(&content, path)
	}

	/// `test_config.json` beside `test_file`, or the default config when absent.
	pub async fn find_for_test_file(test_file: impl AsRef<Path>) -> Result<Self> {
		Ok(Self::find_local(test_file).await?.map(|local| local.config).unwrap_or_default())
	}

	/// `test_config.json` beside `test_file` along with the settings it sets explicitly.
	pub async fn find_local(test_file: impl AsRef<Path>) -> Result<Option<LocalConfig>> {
		let candidate: PathBuf = test_file
			.as_ref()
			.parent()
			.map(|dir| dir.join(CONFIG_FILE_NAME))
			.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
		if !tokio::fs::try_exists(&candidate).await? {
			return Ok(None);
		}
		tracing::debug!(path = %candidate.display(), "using eval config");
		let content = read_to_string(&candidate).await?;
		let config = Self::parse(&content, &candidate)?;
		let overrides: CaseOverrides = serde_json::from_str(&content)?;
		Ok(Some(LocalConfig { config, overrides }))
	}

	pub fn validate(&self) -> Result<()> {
		if self.criteria.is_empty() {
			return Err(EvalError::config("`criteria` must name at least one metric"));
		}
		for (name, criterion) in &self.criteria {
			if !(0.0..=1.0).contains(&criterion.threshold) {
				return Err(EvalError::config(format!(
					"threshold for '{}' must be within [0, 1], got {}",
					name, criterion.threshold
				)));
			}
		}
		if self.num_runs == 0 {
			return Err(EvalError::config("`num_runs` must be at least 1"));
		}
		Ok(())
	}
}

/// Settings a config file states explicitly, as opposed to serde defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CaseOverrides {
	#[serde(default)]
	pub num_runs: Option<usize>,
	#[serde(default)]
	pub length_policy: Option<LengthPolicy>,
}

#[derive(Debug, Clone)]
pub struct LocalConfig {
	pub config: EvalConfig,
	pub overrides: CaseOverrides,
}
