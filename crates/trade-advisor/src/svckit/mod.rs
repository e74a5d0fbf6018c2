//! Service Kit - Agent Tools
//!
//! Domain-specific tools that implement `agent_core::Tool` for the trade advisor.

mod price_history;

pub use price_history::{HISTORY_TAIL, PriceHistoryPayload, PriceHistoryTool, RECENT_DECISIONS};

use agent_core::ToolName;

/// Closed catalog of tools the model may call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdvisorTool {
    GetPriceHistory,
}

impl ToolName for AdvisorTool {
    const ALL: &'static [Self] = &[AdvisorTool::GetPriceHistory];

    fn as_str(self) -> &'static str {
        match self {
            AdvisorTool::GetPriceHistory => "get_price_history",
        }
    }
}
