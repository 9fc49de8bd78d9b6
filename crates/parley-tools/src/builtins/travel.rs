//! Travel desk tools: flight lookup, pricing, and refunds.

use super::function::FunctionTool;
use crate::registry::{ToolCategory, ToolDefinition};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FlightInput {
    date: String,
}

#[derive(Debug, Deserialize)]
struct PriceInput {
    airplane: String,
}

#[derive(Debug, Deserialize)]
struct RefundInput {
    flight_id: String,
}

fn string_param(name: &str, description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            name: {"type": "string", "description": description}
        },
        "required": [name]
    })
}

/// `query_flight(date)`
#[must_use]
pub fn query_flight_tool() -> FunctionTool {
    let definition = ToolDefinition::new("query_flight", "Find the flight on a given date.")
        .with_parameters(string_param("date", "Travel date, e.g. 2025-05-01"))
        .with_category(ToolCategory::Travel);
    FunctionTool::typed(definition, |input: FlightInput| {
        Ok(format!("{}: Boeing 737 airplane", input.date))
    })
}

/// `query_price(airplane)`
#[must_use]
pub fn query_price_tool() -> FunctionTool {
    let definition = ToolDefinition::new("query_price", "Look up the ticket price for an airplane.")
        .with_parameters(string_param("airplane", "Airplane model"))
        .with_category(ToolCategory::Travel);
    FunctionTool::typed(definition, |_: PriceInput| Ok("The price is $1234".to_string()))
}

/// `refund_flight(flight_id)`
#[must_use]
pub fn refund_flight_tool() -> FunctionTool {
    let definition = ToolDefinition::new("refund_flight", "Refund a booked flight.")
        .with_parameters(string_param("flight_id", "Flight identifier"))
        .with_category(ToolCategory::Travel);
    FunctionTool::typed(definition, |input: RefundInput| {
        Ok(format!("Flight {} refunded", input.flight_id))
    })
}
