//! Customer-support tools for the ACME triage scenario
//!
//! - `look_up_item`: find an item ID from a description
//! - `execute_refund`: refund an item
//! - `execute_order`: place an order after the customer confirms

use super::function::FunctionTool;
use crate::registry::{ToolCategory, ToolDefinition};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Item ID every lookup resolves to
pub const DEMO_ITEM_ID: &str = "item_132612938";

/// Asks the customer to confirm an order of `product` at `price` USD
pub type OrderConfirmation = Arc<dyn Fn(&str, u64) -> bool + Send + Sync>;

#[derive(Debug, Deserialize)]
struct LookUpInput {
    search_query: String,
}

#[derive(Debug, Deserialize)]
struct RefundInput {
    item_id: String,
    #[serde(default = "default_reason")]
    reason: String,
}

fn default_reason() -> String {
    "not provided".to_string()
}

#[derive(Debug, Deserialize)]
struct OrderInput {
    product: String,
    price: u64,
}

/// `look_up_item(search_query)`
#[must_use]
pub fn look_up_item_tool() -> FunctionTool {
    let definition = ToolDefinition::new(
        "look_up_item",
        "Use to find item ID.\nSearch query can be a description or keywords.",
    )
    .with_parameters(serde_json::json!({
        "type": "object",
        "properties": {
            "search_query": {"type": "string", "description": "Description or keywords"}
        },
        "required": ["search_query"]
    }))
    .with_category(ToolCategory::Support);

    FunctionTool::typed(definition, |input: LookUpInput| {
        info!(query = %input.search_query, item = DEMO_ITEM_ID, "Found item");
        Ok(DEMO_ITEM_ID.to_string())
    })
}

/// `execute_refund(item_id, reason = "not provided")`
#[must_use]
pub fn execute_refund_tool() -> FunctionTool {
    let definition = ToolDefinition::new("execute_refund", "Refund an item by its ID.")
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "item_id": {"type": "string"},
                "reason": {"type": "string"}
            },
            "required": ["item_id"]
        }))
        .with_category(ToolCategory::Support);

    FunctionTool::typed(definition, |input: RefundInput| {
        info!(item = %input.item_id, reason = %input.reason, "Refund executed");
        Ok("success".to_string())
    })
}

/// `execute_order(product, price)`; `confirm` decides whether it goes through
#[must_use]
pub fn execute_order_tool(confirm: OrderConfirmation) -> FunctionTool {
    let definition = ToolDefinition::new("execute_order", "Price should be in USD.")
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "product": {"type": "string"},
                "price": {"type": "integer", "minimum": 0}
            },
            "required": ["product", "price"]
        }))
        .with_category(ToolCategory::Support);

    FunctionTool::typed(definition, move |input: OrderInput| {
        if confirm(&input.product, input.price) {
            info!(product = %input.product, price = input.price, "Order executed");
            Ok("Success".to_string())
        } else {
            info!(product = %input.product, "Order cancelled by user");
            Ok("User cancelled order.".to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Tool;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_refund_defaults_reason() {
        let result = execute_refund_tool()
            .execute(
                serde_json::json!({"item_id": DEMO_ITEM_ID}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.content(), "success");
    }

    #[tokio::test]
    async fn test_order_respects_confirmation() {
        let declined = execute_order_tool(Arc::new(|_, _| false));
        let result = declined
            .execute(
                serde_json::json!({"product": "Rocket skates", "price": 9999}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.content(), "User cancelled order.");

        let accepted = execute_order_tool(Arc::new(|product, price| {
            product == "Rocket skates" && price < 10_000
        }));
        let result = accepted
            .execute(
                serde_json::json!({"product": "Rocket skates", "price": 9999}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.content(), "Success");
    }
}
