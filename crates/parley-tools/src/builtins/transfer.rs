//! Transfer (delegate) tools
//!
//! A transfer tool takes no arguments and returns the topic type of the
//! agent that should take over the conversation.

use super::function::FunctionTool;
use crate::registry::{ToolCategory, ToolDefinition, ToolResult};

/// Build a delegate tool named `name` that hands control to `target`
#[must_use]
pub fn transfer_tool(
    name: impl Into<String>,
    description: impl Into<String>,
    target: impl Into<String>,
) -> FunctionTool {
    let target = target.into();
    let definition = ToolDefinition::new(name, description).with_category(ToolCategory::Delegate);
    FunctionTool::new(definition, move |_| {
        Ok(serde_json::Value::String(target.clone()))
    })
}

/// Topic type returned by a delegate tool, if the result carries one
#[must_use]
pub fn delegate_target(result: &ToolResult) -> Option<&str> {
    if !result.success {
        return None;
    }
    result.output.as_str().filter(|topic| !topic.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Tool;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_transfer_returns_topic() {
        let tool = transfer_tool(
            "transfer_to_sales_agent",
            "Use for anything sales or buying related.",
            "SalesAgent",
        );
        assert_eq!(tool.definition().category, ToolCategory::Delegate);

        let result = tool
            .execute(serde_json::json!({}), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(delegate_target(&result), Some("SalesAgent"));
    }

    #[test]
    fn test_delegate_target_of_failure() {
        assert_eq!(delegate_target(&ToolResult::failure("boom", 0)), None);
        assert_eq!(
            delegate_target(&ToolResult::success(serde_json::json!(42), 0)),
            None
        );
    }
}
