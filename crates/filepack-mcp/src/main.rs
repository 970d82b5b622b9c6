#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use filepack_mcp::packager::LibPackager;
use filepack_mcp::server::McpServer;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(
    name = "filepack-mcp",
    about = "File packaging tools over an MCP stdio server",
    version
)]
struct Cli {
    /// Logging filter (overrides FILEPACK_LOG)
    #[arg(long = "log", default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = std::env::var("FILEPACK_LOG").unwrap_or_else(|_| cli.verbosity.clone());

    // stdout carries the protocol; all diagnostics go to stderr.
    fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .init();

    McpServer::new(LibPackager::new()).run_stdio().await
}
