//! MCP tool server: the conversion pipeline and its companions exposed as
//! JSON-RPC tools over stdio.
//!
//! ```text
//! stdin ─▶ stdio::serve ─▶ McpServer::handle_line ─▶ tools::handle_tool_call
//!                                                          │
//! stdout ◀──────────── JsonRpcResponse ◀───────────────────┘
//! ```

pub mod protocol;
pub mod server;
pub mod stdio;
pub mod tools;

pub use server::McpServer;
pub use stdio::{run_stdio, serve};
