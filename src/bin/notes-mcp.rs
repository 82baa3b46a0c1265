//! MCP server entry point.
//!
//! Speaks JSON-RPC on stdin/stdout, so logs go to
//! `<config dir>/logs/notes-mcp.log` instead of the terminal.
//!
//! # Usage
//!
//! Register the binary as a stdio server in the MCP client, e.g.:
//! ```json
//! {"mcpServers": {"notes": {"command": "notes-mcp"}}}
//! ```

use std::path::Path;

use tokio::io::BufReader;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use notes::config::ConfigStore;
use notes::mcp::McpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let store = ConfigStore::from_env()?;
    let _guard = init_logging(&store.dir().join("logs"));

    tracing::info!("notes-mcp v{} starting", env!("CARGO_PKG_VERSION"));

    let mut server = McpServer::new(store);
    let mut stdout = tokio::io::stdout();
    if let Err(e) = server
        .run(BufReader::new(tokio::io::stdin()), &mut stdout)
        .await
    {
        tracing::error!("MCP server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to a daily rolling file, or to stderr if the directory is unusable.
///
/// The returned guard flushes buffered lines on drop and must outlive the server.
fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Failed to create log directory {:?}: {}", log_dir, e);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, "notes-mcp.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter())
        .with_ansi(false)
        .init();

    tracing::info!("Logging initialized to {:?}", log_dir);
    Some(guard)
}
