//! # Reqrep Node Runtime
//!
//! Runs the demo request/reply exchange over the in-memory transport.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Install the tracing subscriber
//! 3. Run the exchange and print each reply

use anyhow::Result;
use node_runtime::{init_logging, run_demo, NodeConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env();
    init_logging(&config)?;

    info!("===========================================");
    info!("  {} v{}", config.service_name, env!("CARGO_PKG_VERSION"));
    info!("  Dispatch: {}", config.replier.dispatch);
    info!("===========================================");

    for reply in run_demo(&config).await? {
        println!("{reply}");
    }

    info!("Shutdown complete");
    Ok(())
}
