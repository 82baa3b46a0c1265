//! Notes - Gmail-style search and management for notes kept in a remote
//! tabular backend.
//!
//! The `search` module holds the query language and selector compilers.
//! `config`, `provider`, and `mcp` wrap it with configuration, the AppSheet
//! HTTP client, and an MCP tool server.

pub mod config;
pub mod mcp;
pub mod provider;
pub mod search;

use thiserror::Error;

/// Notes error types covering all failure modes.
#[derive(Error, Debug)]
pub enum NotesError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider name not in the registry
    #[error("Unknown provider: {name}. Available: {available}")]
    UnknownProvider { name: String, available: String },

    /// Sort argument without a field name
    #[error("Invalid sort field: {0:?}")]
    InvalidSort(String),

    /// Backend answered with a non-success status
    #[error("AppSheet API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// Transport errors (connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Unexpected message shape from a peer
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O errors (config files, stdio)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using NotesError
pub type Result<T> = std::result::Result<T, NotesError>;
