use anyhow::Result;

use crate::runner::EvalOutcome;

/// Fail with every recorded failure if any run of any case missed its threshold.
///
/// Use this in your `#[tokio::test]` functions.
///
/// # Example
/// ```ignore
/// #[tokio::test]
/// async fn test_home_agent() -> anyhow::Result<()> {
///     let aggregator = RunAggregator::builder()
///         .provider(provider)
///         .num_runs(2)
///         .build()?;
///
///     let outcome = aggregator.run_source(&TestFileSource::new("tests/fixture")).await?;
///     assert_no_failures(&outcome)?;
///     Ok(())
/// }
/// ```
pub fn assert_no_failures(outcome: &EvalOutcome) -> Result<()> {
    if !outcome.passed() {
        anyhow::bail!("{}\n{}", outcome.failure_message(), outcome.summary_table());
    }
    Ok(())
}

/// Fail unless `eval_id` has exactly `num_runs` results and every one passed.
pub fn assert_all_runs_passed(outcome: &EvalOutcome, eval_id: &str, num_runs: usize) -> Result<()> {
    let runs = outcome.runs_for(eval_id);
    let run_count = runs
        .iter()
        .map(|rr| rr.run_index)
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    if run_count != num_runs {
        anyhow::bail!("Case {} completed {}/{} runs\n{}", eval_id, run_count, num_runs, outcome.summary_table());
    }
    let failed = runs.iter().filter(|rr| !rr.passed()).count();
    if failed > 0 {
        anyhow::bail!(
            "Case {}: {}/{} metric results failed\n{}",
            eval_id,
            failed,
            runs.len(),
            outcome.summary_table()
        );
    }
    Ok(())
}
