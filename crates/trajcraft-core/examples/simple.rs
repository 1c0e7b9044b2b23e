use trajcraft_core::{
    from_async_fn, EvalCase, InvocationCounter, Invocation, RunAggregator, RunErrorPolicy,
    TestFileSource,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Example 1: Inline case, "ANY" accepts whatever location the agent picks
    let cases = vec![EvalCase::new(
        "turn_off_device",
        vec![Invocation::new("1")
            .with_user_content(json!("Turn off device_2"))
            .with_tool_call("set_device_info", json!({"device_id": "device_2", "status": "OFF", "location": "ANY"}))],
    )
    .with_criterion("tool_trajectory_any_match", 1.0)];

    // Agent stand-in: second run forgets the tool call
    let provider = from_async_fn(|_case, run_index| async move {
        let invocation = Invocation::new("1").with_final_response(json!("Done."));
        let invocation = if run_index == 1 {
            invocation
        } else {
            invocation.with_tool_call(
                "set_device_info",
                json!({"device_id": "device_2", "status": "OFF", "location": "Bedroom"}),
            )
        };
        Ok(vec![invocation])
    });

    let counter = Arc::new(InvocationCounter::new());
    let aggregator = RunAggregator::builder()
        .provider(provider)
        .add_observer(counter.clone())
        .num_runs(3)
        .concurrency(3)
        .build()?;

    let outcome = aggregator.run_cases(&cases).await?;
    println!("{}", outcome.summary_table());
    if !outcome.passed() {
        println!("{}", outcome.failure_message());
    }
    println!("runs: {}  tool calls: {}", counter.runs(), counter.tool_calls());

    // Example 2: Load *.test.json files if a path is provided, replaying the expected conversation
    if let Some(path) = std::env::args().nth(1) {
        let aggregator = RunAggregator::builder()
            .provider(Arc::new(trajcraft_core::ReplayProvider::expected()))
            .on_run_error(RunErrorPolicy::RecordFailure)
            .build()?;
        let outcome = aggregator.run_source(&TestFileSource::new(path)).await?;
        println!("{}", outcome.summary_table());
    }

    Ok(())
}
