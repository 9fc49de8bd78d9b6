//! Research helpers used by the planner group chat demo.

use super::function::FunctionTool;
use crate::error::Error;
use crate::registry::{ToolCategory, ToolDefinition};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
}

#[derive(Debug, Deserialize)]
struct ChangeInput {
    start: f64,
    end: f64,
}

/// `search_web(query)` over a fixed set of season statistics
#[must_use]
pub fn search_web_tool() -> FunctionTool {
    let definition = ToolDefinition::new("search_web", "Searches for information")
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        }))
        .with_category(ToolCategory::Analysis);

    FunctionTool::typed(definition, |input: SearchInput| {
        let answer = if input.query.contains("2006-2007") {
            "Here are the total points scored by Miami Heat players in the 2006-2007 season:\n\
             Udonis Haslem: 844 points\n\
             Dwayne Wade: 1397 points\n\
             James Posey: 550 points"
        } else if input.query.contains("2007-2008") {
            "The number of total rebounds for Dwayne Wade in the Miami Heat season 2007-2008 is 214."
        } else if input.query.contains("2008-2009") {
            "The number of total rebounds for Dwayne Wade in the Miami Heat season 2008-2009 is 398."
        } else {
            "No data found."
        };
        Ok(answer.to_string())
    })
}

/// `percentage_change(start, end)`
#[must_use]
pub fn percentage_change_tool() -> FunctionTool {
    let definition = ToolDefinition::new(
        "percentage_change",
        "Percentage change from start to end.",
    )
    .with_parameters(serde_json::json!({
        "type": "object",
        "properties": {
            "start": {"type": "number"},
            "end": {"type": "number"}
        },
        "required": ["start", "end"]
    }))
    .with_category(ToolCategory::Analysis);

    FunctionTool::new(definition, |input| {
        let args: ChangeInput = super::function::parse_input(input)?;
        if args.start == 0.0 {
            return Err(Error::InvalidInput("start must be non-zero".into()));
        }
        Ok(serde_json::json!(((args.end - args.start) / args.start) * 100.0))
    })
}
