//! Model Context Protocol server.
//!
//! Exposes note operations as MCP tools to LLM clients over stdio.

pub mod protocol;
pub mod server;

pub use server::McpServer;
