//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! One request per line in, one response per line out. Nothing but protocol
//! messages may be written to stdout; logs go to stderr.

use crate::engine::EngineBackend;
use crate::mcp::server::McpServer;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};

/// Serve requests from `reader` until it reaches end of input.
pub async fn serve<B, R, W>(server: &McpServer<B>, reader: R, mut writer: W) -> std::io::Result<()>
where
    B: EngineBackend,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(response) = server.handle_line(&line).await else {
            continue;
        };
        let mut out = match serde_json::to_string(&response) {
            Ok(out) => out,
            Err(e) => {
                error!("Failed to serialise response: {}", e);
                continue;
            }
        };
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Serve on the process's stdin and stdout.
pub async fn run_stdio<B: EngineBackend>(server: &McpServer<B>) -> std::io::Result<()> {
    info!("MCP server listening on stdio");
    let reader = BufReader::new(tokio::io::stdin());
    serve(server, reader, tokio::io::stdout()).await?;
    info!("stdin closed; shutting down");
    Ok(())
}
