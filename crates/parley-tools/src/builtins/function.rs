//! Function Tool
//!
//! Wraps a synchronous closure as a [`Tool`]. Most demo tools and every
//! transfer tool are built this way.

use crate::error::{Error, Result};
use crate::registry::{Tool, ToolDefinition, ToolResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

type ToolFn = dyn Fn(serde_json::Value) -> Result<serde_json::Value> + Send + Sync;

/// A tool backed by a closure
#[derive(Clone)]
pub struct FunctionTool {
    definition: ToolDefinition,
    function: Arc<ToolFn>,
}

impl FunctionTool {
    /// Wrap `function` under `definition`
    pub fn new<F>(definition: ToolDefinition, function: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<serde_json::Value> + Send + Sync + 'static,
    {
        Self {
            definition,
            function: Arc::new(function),
        }
    }

    /// Wrap a closure taking typed arguments and returning text
    pub fn typed<A, F>(definition: ToolDefinition, function: F) -> Self
    where
        A: DeserializeOwned,
        F: Fn(A) -> Result<String> + Send + Sync + 'static,
    {
        Self::new(definition, move |input| {
            let args: A = parse_input(input)?;
            function(args).map(serde_json::Value::String)
        })
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.definition.name)
            .finish()
    }
}

/// Deserialize tool input into its argument struct
pub fn parse_input<A: DeserializeOwned>(input: serde_json::Value) -> Result<A> {
    serde_json::from_value(input).map_err(|e| Error::InvalidInput(e.to_string()))
}

#[async_trait::async_trait]
impl Tool for FunctionTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _cancel: &CancellationToken,
    ) -> Result<ToolResult> {
        let start = Instant::now();
        let output = (self.function)(input)?;
        Ok(ToolResult::success(
            output,
            start.elapsed().as_millis() as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Args {
        airplane: String,
    }

    #[tokio::test]
    async fn test_typed_function_tool() {
        let tool = FunctionTool::typed(ToolDefinition::new("query_price", ""), |args: Args| {
            Ok(format!("{} costs $1234", args.airplane))
        });

        let result = tool
            .execute(
                serde_json::json!({"airplane": "Boeing 737"}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.content(), "Boeing 737 costs $1234");

        let err = tool
            .execute(serde_json::json!({"plane": 1}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
