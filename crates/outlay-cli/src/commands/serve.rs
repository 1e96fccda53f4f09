//! Server command implementation

use anyhow::Result;
use outlay_core::OutlayConfig;

pub async fn cmd_serve(
    config: OutlayConfig,
    host: &str,
    port: u16,
    allowed_origins: Vec<String>,
) -> Result<()> {
    println!("🚀 Starting Outlay query server...");
    println!("   History: {}", config.paths.history.display());
    println!("   Forecasts: {}", config.paths.forecasts.display());
    println!("   Listening: http://{}:{}", host, port);
    if !allowed_origins.is_empty() {
        println!("   CORS origins: {}", allowed_origins.join(", "));
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let server = outlay_server::ServerConfig { allowed_origins };
    outlay_server::serve(config, host, port, server).await
}
