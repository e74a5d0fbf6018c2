//! Application State

use std::sync::Arc;

use tokio::sync::Mutex;

use trade_advisor::TradeAgent;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<TradeAgent>,

    /// Serialises decision runs; one agent handles one invocation at a time
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(agent: TradeAgent) -> Self {
        Self {
            agent: Arc::new(agent),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}
