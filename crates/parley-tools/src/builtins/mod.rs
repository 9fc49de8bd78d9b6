//! Builtins - Built-in tools for Parley
//!
//! - Function tool: wrap any closure
//! - Transfer tools: delegate a conversation to another agent
//! - Support tools: look_up_item, execute_refund, execute_order
//! - Travel tools: query_flight, query_price, refund_flight
//! - Analysis tools: search_web, percentage_change
//! - Memory tools: remember, recall, forget

mod analysis;
mod function;
mod memory;
mod support;
mod transfer;
mod travel;

pub use analysis::{percentage_change_tool, search_web_tool};
pub use function::{parse_input, FunctionTool};
pub use memory::{ForgetTool, RecallTool, RememberTool};
pub use support::{
    execute_order_tool, execute_refund_tool, look_up_item_tool, OrderConfirmation, DEMO_ITEM_ID,
};
pub use transfer::{delegate_target, transfer_tool};
pub use travel::{query_flight_tool, query_price_tool, refund_flight_tool};

use crate::registry::ToolRegistry;
use parley_memory::SharedMemoryStore;
use std::sync::Arc;

/// Register the customer-support tools
pub fn register_support_tools(registry: &mut ToolRegistry, confirm: OrderConfirmation) {
    registry.register(Arc::new(look_up_item_tool()));
    registry.register(Arc::new(execute_refund_tool()));
    registry.register(Arc::new(execute_order_tool(confirm)));
}

/// Register the travel tools
pub fn register_travel_tools(registry: &mut ToolRegistry) {
    registry.register(Arc::new(query_flight_tool()));
    registry.register(Arc::new(query_price_tool()));
    registry.register(Arc::new(refund_flight_tool()));
}

/// Register the analysis tools
pub fn register_analysis_tools(registry: &mut ToolRegistry) {
    registry.register(Arc::new(search_web_tool()));
    registry.register(Arc::new(percentage_change_tool()));
}

/// Register the memory tools over `store`
pub fn register_memory_tools(registry: &mut ToolRegistry, store: SharedMemoryStore) {
    registry.register(Arc::new(RememberTool::new(store.clone())));
    registry.register(Arc::new(RecallTool::new(store.clone())));
    registry.register(Arc::new(ForgetTool::new(store)));
}
