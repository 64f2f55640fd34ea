//! MCP tool server for edgequake-pdf2img, speaking JSON-RPC over stdio.
//!
//! stdout carries protocol messages only; every log line goes to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2img::mcp::{run_stdio, McpServer};
use edgequake_pdf2img::{Converter, PoolConfig};
use std::io;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Serve PDF conversion tools over the Model Context Protocol (stdio).
#[derive(Parser, Debug)]
#[command(name = "pdf2img-mcp", version)]
struct Cli {
    /// Maximum live pdfium instances shared by all tool calls.
    #[arg(long, env = "PDF2IMG_POOL_SIZE", default_value_t = 2)]
    pool_size: usize,

    /// Seconds a tool call waits for a free pdfium instance.
    #[arg(long, env = "PDF2IMG_ACQUIRE_TIMEOUT", default_value_t = 30)]
    acquire_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let pool = PoolConfig::default()
        .max_instances(cli.pool_size)
        .acquire_timeout(Duration::from_secs(cli.acquire_timeout));
    let converter = Converter::with_pdfium(pool);
    info!(
        "Starting pdf2img MCP server v{} (pool size {})",
        env!("CARGO_PKG_VERSION"),
        converter.pool().config().max_instances
    );

    let server = McpServer::new(converter);
    let served = run_stdio(&server).await.context("stdio transport failed");
    server.converter().shutdown();
    served
}
