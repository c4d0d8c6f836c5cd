//! Pre/post-processing server in front of a stand-in model server.
//!
//! ```text
//! cargo run --example prepost_server
//! curl -X POST localhost:5001/score -d 'hello world'
//! ```

use async_trait::async_trait;
use scorehost::log::LogConfig;
use scorehost::prepost::{ModelHandler, ModelServerClient, PrePostContext, PrePostPipeline, ProcessedOutput};
use scorehost::{Application, BoxError};
use serde_json::{Value, json};
use std::sync::Arc;

/// Splits text into words, then reports the model's word count.
struct WordHandler;

impl ModelHandler for WordHandler {
    fn preprocess(&self, body: &[u8], ctx: &mut PrePostContext) -> Result<Value, BoxError> {
        let text = std::str::from_utf8(body)?;
        if text.trim().is_empty() {
            ctx.skip_inference = true;
        }
        Ok(json!({ "inputs": text.split_whitespace().collect::<Vec<_>>() }))
    }

    fn postprocess(&self, data: Value, ctx: &PrePostContext) -> Result<ProcessedOutput, BoxError> {
        if ctx.skip_inference {
            return Ok(ProcessedOutput::Text("nothing to count".to_string()));
        }
        Ok(ProcessedOutput::Json(json!({ "words": data["outputs"] })))
    }
}

/// Answers in process instead of calling out.
struct CountingModel;

#[async_trait]
impl ModelServerClient for CountingModel {
    async fn infer(&self, input: Value) -> Result<Value, BoxError> {
        let count = input["inputs"].as_array().map(Vec::len).unwrap_or(0);
        Ok(json!({ "outputs": count }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = LogConfig::from_env().init()?;

    let pipeline = Arc::new(PrePostPipeline::new(Arc::new(WordHandler), Arc::new(CountingModel)));
    Application::new(pipeline.router()).listen(5001).await?;
    Ok(())
}
