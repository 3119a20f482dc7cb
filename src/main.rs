// Firecrawl MCP server
//
// Serves the Firecrawl tools over stdio. stdout carries the protocol, so all
// logging goes to stderr.

use anyhow::Result;
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use kodegen_tools_firecrawl::{DispatchConfig, Dispatcher, FirecrawlServer, HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = DispatchConfig::from_env()?;
    tracing::info!(api_url = %config.api_url(), "starting firecrawl MCP server");

    let transport = Arc::new(HttpTransport::new(&config)?);
    let dispatcher = Arc::new(Dispatcher::new(&config, transport));

    // Start cleanup after the dispatcher owns the tracker
    let cleanup = Arc::clone(dispatcher.jobs()).start_cleanup_task();

    let service = FirecrawlServer::new(dispatcher).serve(stdio()).await?;
    service.waiting().await?;

    cleanup.abort();
    tracing::info!("client disconnected, shutting down");
    Ok(())
}
