//! TRADAgent
//!
//! `decide` and `history` print JSON on stdout; `serve` exposes the same
//! operations over HTTP. Logs always go to stderr.

mod app;
mod handlers;
mod state;

use std::collections::HashMap;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trade_advisor::model::normalize_ticker;
use trade_advisor::{DecisionStore, PortfolioState, TickerDecision, TradagentConfig};

use crate::app::{Backends, MarketKind, ProviderKind};
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(
    name = "tradagent",
    about = "Risk-bounded BUY/SELL/HOLD decisions from a tool-calling LLM agent",
    version,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Flags layered over the environment configuration
#[derive(Args, Debug)]
struct Overrides {
    /// SQLite path for decision memory (`:memory:` allowed)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Model identifier
    #[arg(long, global = true)]
    model: Option<String>,

    /// Chat-completions base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[arg(long, global = true)]
    max_tool_rounds: Option<usize>,

    #[arg(long, global = true, value_enum, env = "TRADAGENT_PROVIDER", default_value_t = ProviderKind::Mistral)]
    provider: ProviderKind,

    #[arg(long, global = true, value_enum, env = "TRADAGENT_MARKET", default_value_t = MarketKind::Yahoo)]
    market: MarketKind,

    #[arg(long, global = true, env = "OLLAMA_HOST", default_value = "http://localhost")]
    ollama_host: String,

    #[arg(long, global = true, env = "OLLAMA_PORT", default_value_t = 11434)]
    ollama_port: u16,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one decision session and print `{ticker, decision}`
    Decide {
        #[arg(long)]
        ticker: String,

        /// Cash balance
        #[arg(long)]
        cash: Decimal,

        /// JSON object mapping ticker to current weight
        #[arg(long, default_value = "{}")]
        positions: String,
    },

    /// Print recent recorded decisions for a ticker, newest first
    History {
        #[arg(long)]
        ticker: String,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
        bind: String,
    },
}

impl Overrides {
    fn apply(&self, config: &mut TradagentConfig) {
        if let Some(db_path) = &self.db_path {
            config.db_path.clone_from(db_path);
        }
        if let Some(model) = &self.model {
            config.model.clone_from(model);
        }
        if let Some(api_base) = &self.api_base {
            config.api_base.clone_from(api_base);
        }
        if let Some(rounds) = self.max_tool_rounds {
            config.max_tool_rounds = rounds;
        }
    }

    fn backends(&self) -> Backends {
        Backends {
            provider: self.provider,
            market: self.market,
            ollama_host: self.ollama_host.clone(),
            ollama_port: self.ollama_port,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before the filter so RUST_LOG from .env applies
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = TradagentConfig::from_env()?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    let backends = cli.overrides.backends();

    match cli.command {
        Command::Decide { ticker, cash, positions } => {
            let portfolio = PortfolioState::new(cash, parse_positions(&positions)?)?;
            let agent = app::build_agent(&config, &backends)?;

            tracing::info!(%ticker, %cash, positions = portfolio.positions.len(), "Starting TRADAgent");
            let result: TickerDecision = agent.run(&ticker, &portfolio).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::History { ticker, limit } => {
            let memory = app::open_memory(&config)?;
            let ticker = normalize_ticker(&ticker)?;
            memory.init()?;
            let records = memory.recent_decisions(&ticker, limit)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Serve { bind } => serve(&config, &backends, &bind).await?,
    }

    Ok(())
}

async fn serve(config: &TradagentConfig, backends: &Backends, bind: &str) -> anyhow::Result<()> {
    let agent = app::build_agent(config, backends)?;

    match agent.provider().health_check().await {
        Ok(true) => tracing::info!(provider = agent.provider().name(), "Model provider reachable"),
        Ok(false) | Err(_) => {
            tracing::warn!(provider = agent.provider().name(), "Model provider not reachable - decisions will fail");
        }
    }

    let state = AppState::new(agent);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = handlers::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!("tradagent server running on http://{bind}");
    tracing::info!("  GET  /health                  - Health check");
    tracing::info!("  POST /api/decide              - Run one decision");
    tracing::info!("  GET  /api/decisions/{{ticker}}  - Recent decisions");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Parse `--positions` as a ticker to weight JSON object
fn parse_positions(raw: &str) -> anyhow::Result<HashMap<String, f64>> {
    serde_json::from_str(raw).context("invalid --positions: expected a JSON object mapping ticker to weight")
}
