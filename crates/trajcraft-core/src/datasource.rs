use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use trajcraft_types::{EvalCase, Invocation, ToolCall};

use crate::config::{CaseOverrides, EvalConfig};
use crate::error::EvalError;

/// Supplies the cases to evaluate. Cases are treated as immutable inputs.
#[async_trait]
pub trait EvalSetSource: Send + Sync {
    async fn load(&self) -> Result<Vec<EvalCase>>;
}

pub struct VecEvalSetSource {
    cases: Vec<EvalCase>,
}

impl VecEvalSetSource {
    pub fn new(cases: Vec<EvalCase>) -> Self {
        Self { cases }
    }
}

#[async_trait]
impl EvalSetSource for VecEvalSetSource {
    async fn load(&self) -> Result<Vec<EvalCase>> {
        Ok(self.cases.clone())
    }
}

/// Reads `*.test.json` files, either a single file or every match under a directory.
///
/// Two layouts are accepted:
/// - an eval set: `{"eval_set_id": ..., "eval_cases": [{"eval_id": ..., "conversation": [...]}]}`
///   where each turn carries `intermediate_data.tool_uses`;
/// - a bare list of turns `[{"query": ..., "expected_tool_use": [{"tool_name", "tool_input"}]}]`,
///   loaded as one case named after the file.
///
/// Cases without their own criteria take them from the explicit config, or from
/// `test_config.json` beside the file.
pub struct TestFileSource {
    path: PathBuf,
    config: Option<EvalConfig>,
}

impl TestFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), config: None }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub async fn test_files(&self) -> Result<Vec<PathBuf>> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .with_context(|| format!("Failed to stat {:?}", self.path))?;
        if !meta.is_dir() {
            return Ok(vec![self.path.clone()]);
        }

        let mut files = Vec::new();
        let mut pending = vec![self.path.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("Failed to read directory {:?}", dir))?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if path.to_string_lossy().ends_with(".test.json") {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl EvalSetSource for TestFileSource {
    async fn load(&self) -> Result<Vec<EvalCase>> {
        let mut cases = Vec::new();
        for file in self.test_files().await? {
            // An explicit config is applied by the aggregator itself; only a
            // config found beside the file overrides runs and length policy.
            let (config, overrides) = match &self.config {
                Some(config) => (config.clone(), CaseOverrides::default()),
                None => match EvalConfig::find_local(&file).await? {
                    Some(local) => (local.config, local.overrides),
                    None => (EvalConfig::default(), CaseOverrides::default()),
                },
            };
            let content = read_to_string(&file).await?;
            let loaded = parse_test_file(&content, &file)?;
            tracing::debug!(path = %file.display(), cases = loaded.len(), "loaded test file");
            cases.extend(loaded.into_iter().map(|mut case| {
                if case.criteria.is_empty() {
                    case.criteria = config.criteria.clone();
                }
                case.num_runs = case.num_runs.or(overrides.num_runs);
                case.length_policy = case.length_policy.or(overrides.length_policy);
                case
            }));
        }
        Ok(cases)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TestFileDoc {
    EvalSet(EvalSetDoc),
    Turns(Vec<LegacyTurn>),
}

#[derive(Deserialize)]
struct EvalSetDoc {
    #[serde(default)]
    eval_set_id: String,
    eval_cases: Vec<EvalCaseDoc>,
}

#[derive(Deserialize)]
struct EvalCaseDoc {
    eval_id: String,
    #[serde(default)]
    conversation: Vec<TurnDoc>,
    #[serde(default)]
    conversation_scenario: Option<Value>,
}

#[derive(Deserialize)]
struct TurnDoc {
    #[serde(default)]
    invocation_id: String,
    #[serde(default)]
    user_content: Value,
    #[serde(default)]
    final_response: Option<Value>,
    #[serde(default)]
    intermediate_data: Option<IntermediateDataDoc>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct IntermediateDataDoc {
    #[serde(default)]
    tool_uses: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct LegacyTurn {
    query: String,
    #[serde(default)]
    expected_tool_use: Vec<LegacyToolUse>,
    #[serde(default)]
    reference: Option<String>,
}

#[derive(Deserialize)]
struct LegacyToolUse {
    tool_name: String,
    #[serde(default)]
    tool_input: Value,
}

impl From<TurnDoc> for Invocation {
    fn from(turn: TurnDoc) -> Self {
        let mut tool_calls = turn.intermediate_data.map(|d| d.tool_uses).unwrap_or_default();
        tool_calls.extend(turn.tool_calls);
        Invocation {
            invocation_id: turn.invocation_id,
            user_content: turn.user_content,
            final_response: turn.final_response,
            tool_calls,
        }
    }
}

pub(crate) fn parse_test_file(content: &str, path: &Path) -> Result<Vec<EvalCase>> {
    let doc: TestFileDoc = serde_json::from_str(content)
        .with_context(|| format!("Invalid test file {:?}", path))?;
    let cases = match doc {
        TestFileDoc::EvalSet(set) => {
            tracing::trace!(eval_set_id = %set.eval_set_id, "parsed eval set");
            set.eval_cases
                .into_iter()
                .map(|case| {
                    let conversation = case.conversation.into_iter().map(Invocation::from).collect();
                    let loaded = EvalCase::new(case.eval_id, conversation);
                    match case.conversation_scenario {
                        Some(scenario) => loaded.with_scenario(scenario),
                        None => loaded,
                    }
                })
                .collect()
        }
        TestFileDoc::Turns(turns) => {
            let eval_id = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.trim_end_matches(".test.json").to_string())
                .unwrap_or_else(|| "case".to_string());
            let conversation = turns
                .into_iter()
                .enumerate()
                .map(|(idx, turn)| {
                    let invocation = Invocation::new(format!("{}-{}", eval_id, idx))
                        .with_user_content(Value::String(turn.query))
                        .with_tool_calls(
                            turn.expected_tool_use
                                .into_iter()
                                .map(|t| ToolCall::new(t.tool_name, t.tool_input)),
                        );
                    match turn.reference {
                        Some(reference) => invocation.with_final_response(Value::String(reference)),
                        None => invocation,
                    }
                })
                .collect();
            vec![EvalCase::new(eval_id, conversation)]
        }
    };
    Ok(cases)
}

#[cfg(not(feature = "sync-fs"))]
pub(crate) async fn read_to_string(path: &Path) -> crate::error::Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| EvalError::Load {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(feature = "sync-fs")]
pub(crate) async fn read_to_string(path: &Path) -> crate::error::Result<String> {
    let path_clone = path.to_path_buf();
    let content = tokio::task::spawn_blocking(move || std::fs::read_to_string(&path_clone))
        .await
        .map_err(|e| EvalError::Load { path: path.display().to_string(), message: e.to_string() })?;
    content.map_err(|e| EvalError::Load { path: path.display().to_string(), message: e.to_string() })
}
