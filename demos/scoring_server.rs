//! Scoring server with a linked-in script.
//!
//! ```text
//! SCOREHOST_ENTRY_SCRIPT=score.py SCOREHOST_PORT=31311 cargo run --example scoring_server
//! curl -X POST localhost:31311/score -H 'Content-Type: application/json' -d '{"values": [1, 2, 3]}'
//! curl 'localhost:31311/swagger.json?version=3'
//! ```

use scorehost::BoxError;
use scorehost::response::ScoreResponse;
use scorehost::script::{ParamSpec, RunFunction, ScriptModule};
use serde_json::{Value, json};

/// Sums `values`, scaled by `factor`.
fn load_score() -> Result<ScriptModule, BoxError> {
    let run = RunFunction::new(|args| {
        let values = args
            .json("values")
            .and_then(Value::as_array)
            .ok_or("values must be an array")?;
        let factor = args.json("factor").and_then(Value::as_f64).unwrap_or(1.0);

        if values.is_empty() {
            return Ok(ScoreResponse::message("values must not be empty", 422).into());
        }

        let total: f64 = values.iter().filter_map(Value::as_f64).sum();
        Ok(json!({ "total": total * factor }).into())
    })
    .param(ParamSpec::named("values").with_type(json!({"type": "array", "items": {"type": "number"}})))
    .param(ParamSpec::named("factor").with_default(json!(1.0)))
    .input_schema()
    .output_schema(json!({
        "type": "object",
        "properties": { "total": { "type": "number" } }
    }));

    Ok(ScriptModule::new("demos/scoring_server.rs")
        .with_init(|| {
            tracing::info!("Model loaded");
            Ok(())
        })
        .with_run(run))
}

scorehost::register_script!("score", load_score);

#[tokio::main]
async fn main() {
    scorehost::serve().await;
}
