//! MCP tool server exposing notes over stdio.
//!
//! Handles `initialize`, `ping`, `tools/list`, and `tools/call`. Each tool
//! call opens the configured provider afresh, so config edits made through
//! the CLI apply without restarting the server.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};

use super::protocol::{
    read_message, write_message, Incoming, Request, Response, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, NOT_INITIALIZED, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::config::ConfigStore;
use crate::provider::{
    open_provider, process_env, EnvLookup, ListRequest, NewNote, NoteUpdate, Provider,
    DEFAULT_LIST_LIMIT,
};
use crate::search::SortSpec;
use crate::Result;

/// Server name reported by `initialize`.
pub const SERVER_NAME: &str = "notes";

struct ToolField {
    name: &'static str,
    field_type: &'static str,
    description: &'static str,
    required: bool,
}

struct ToolDefinition {
    name: &'static str,
    description: &'static str,
    fields: &'static [ToolField],
}

const NOTE_ID_FIELD: ToolField = ToolField {
    name: "note_id",
    field_type: "string",
    description: "Note ID (from list_notes results).",
    required: true,
};

const TOOLS: &[ToolDefinition] = &[
    ToolDefinition {
        name: "show_config",
        description: "Show current notes configuration. API keys are never included.",
        fields: &[],
    },
    ToolDefinition {
        name: "list_notes",
        description: "List and search notes using Gmail-style query syntax. \
            Words search title and content (implicit AND), \"quoted phrases\" match exactly, \
            label:work filters by label, -term excludes, a OR b matches either, \
            and parentheses group, e.g. (label:work OR label:home) meeting -label:archived.",
        fields: &[
            ToolField {
                name: "query",
                field_type: "string",
                description: "Gmail-style search query. Empty lists every note.",
                required: false,
            },
            ToolField {
                name: "limit",
                field_type: "integer",
                description: "Maximum notes to return (default 50).",
                required: false,
            },
            ToolField {
                name: "sort",
                field_type: "string",
                description: "Sort field, prefix with - for descending: modified, -modified, created, -created.",
                required: false,
            },
        ],
    },
    ToolDefinition {
        name: "add_note",
        description: "Create a new note.",
        fields: &[
            ToolField {
                name: "title",
                field_type: "string",
                description: "Note title.",
                required: true,
            },
            ToolField {
                name: "content",
                field_type: "string",
                description: "Note body.",
                required: false,
            },
            ToolField {
                name: "labels",
                field_type: "string",
                description: "Comma-separated labels, e.g. Work,Todo.",
                required: false,
            },
        ],
    },
    ToolDefinition {
        name: "read_note",
        description: "Read a single note by ID.",
        fields: &[NOTE_ID_FIELD],
    },
    ToolDefinition {
        name: "update_note",
        description: "Update an existing note. Only the given fields change.",
        fields: &[
            NOTE_ID_FIELD,
            ToolField {
                name: "title",
                field_type: "string",
                description: "New title.",
                required: false,
            },
            ToolField {
                name: "content",
                field_type: "string",
                description: "New body.",
                required: false,
            },
            ToolField {
                name: "labels",
                field_type: "string",
                description: "New comma-separated labels.",
                required: false,
            },
        ],
    },
    ToolDefinition {
        name: "list_attachments",
        description: "List attachments (images and links) of a note.",
        fields: &[NOTE_ID_FIELD],
    },
];

#[derive(Deserialize)]
struct ListNotesArgs {
    #[serde(default)]
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    sort: String,
}

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

#[derive(Deserialize)]
struct AddNoteArgs {
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    labels: String,
}

#[derive(Deserialize)]
struct NoteIdArgs {
    note_id: String,
}

#[derive(Deserialize)]
struct UpdateNoteArgs {
    note_id: String,
    title: Option<String>,
    content: Option<String>,
    labels: Option<String>,
}

/// Failure of a `tools/call` before the tool ran.
struct CallError {
    code: i64,
    message: String,
}

impl CallError {
    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
        }
    }
}

/// MCP server state.
pub struct McpServer {
    store: ConfigStore,
    provider_name: Option<String>,
    env: EnvLookup,
    initialized: bool,
}

impl McpServer {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store,
            provider_name: None,
            env: process_env,
            initialized: false,
        }
    }

    /// Force a provider instead of the configured one.
    pub fn with_provider(mut self, name: Option<String>) -> Self {
        self.provider_name = name;
        self
    }

    /// Replace the environment lookup used for provider settings.
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Serve requests from `reader` until it closes.
    pub async fn run<R, W>(&mut self, mut reader: R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("MCP server ready (protocol {})", PROTOCOL_VERSION);

        while let Some(incoming) = read_message(&mut reader).await? {
            let response = match incoming {
                Incoming::Message(line) => self.handle_line(&line).await,
                Incoming::Malformed(reason) => {
                    tracing::warn!("Rejected MCP message: {}", reason);
                    Some(Response::error(None, PARSE_ERROR, reason))
                }
            };
            if let Some(response) = response {
                write_message(writer, &response).await?;
            }
        }

        tracing::info!("MCP input closed, shutting down");
        Ok(())
    }

    /// Handle one raw message. Notifications produce no response.
    pub async fn handle_line(&mut self, line: &str) -> Option<Response> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                return Some(Response::error(None, PARSE_ERROR, format!("invalid JSON: {}", e)))
            }
        };
        if !value.is_object() {
            return Some(Response::error(
                None,
                INVALID_REQUEST,
                "top-level message must be an object",
            ));
        }

        let id = value.get("id").cloned();
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(Response::error(id, INVALID_REQUEST, format!("invalid request: {}", e)))
            }
        };

        self.handle_request(request).await
    }

    async fn handle_request(&mut self, request: Request) -> Option<Response> {
        tracing::debug!("MCP request: {}", request.method);

        if request.is_notification() {
            if request.method != "notifications/initialized" {
                tracing::debug!("Ignoring notification {}", request.method);
            }
            return None;
        }

        let id = request.id;
        let response = match request.method.as_str() {
            "initialize" => Response::result(id, self.handle_initialize()),
            "ping" => Response::result(id, json!({})),
            "tools/list" if !self.initialized => {
                Response::error(id, NOT_INITIALIZED, "call initialize before listing tools")
            }
            "tools/list" => Response::result(id, list_tools()),
            "tools/call" if !self.initialized => {
                Response::error(id, NOT_INITIALIZED, "call initialize before invoking tools")
            }
            "tools/call" => match self.handle_tool_call(&request.params).await {
                Ok(result) => Response::result(id, result),
                Err(e) => Response::error(id, e.code, e.message),
            },
            other => Response::error(id, METHOD_NOT_FOUND, format!("unsupported method '{}'", other)),
        };
        Some(response)
    }

    fn handle_initialize(&mut self) -> Value {
        self.initialized = true;
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {
                "tools": {},
            },
        })
    }

    async fn handle_tool_call(&self, params: &Value) -> std::result::Result<Value, CallError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| CallError::invalid_params("tool invocation missing name"))?;
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args) => args.clone(),
        };

        tracing::info!("Tool call: {}", name);

        let outcome = match name {
            "show_config" => self.show_config(),
            "list_notes" => self.list_notes(parse_args(arguments)?).await,
            "add_note" => self.add_note(parse_args(arguments)?).await,
            "read_note" => self.read_note(parse_args(arguments)?).await,
            "update_note" => self.update_note(parse_args(arguments)?).await,
            "list_attachments" => self.list_attachments(parse_args(arguments)?).await,
            other => return Err(CallError::invalid_params(format!("unknown tool '{}'", other))),
        };

        Ok(match outcome {
            Ok(value) => tool_result(&value, false),
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", name, e);
                tool_result(&json!({ "error": e.to_string() }), true)
            }
        })
    }

    fn provider(&self) -> Result<Provider> {
        open_provider(&self.store, self.provider_name.as_deref(), self.env)
    }

    fn show_config(&self) -> Result<Value> {
        Ok(match self.store.load()? {
            Some(config) => config.redacted(),
            None => json!({
                "error": "No config found. Run 'notes config import <file>' via CLI."
            }),
        })
    }

    async fn list_notes(&self, args: ListNotesArgs) -> Result<Value> {
        let request = ListRequest {
            limit: args.limit,
            query: Some(args.query).filter(|q| !q.trim().is_empty()),
            sort: SortSpec::parse_optional(Some(&args.sort))?,
        };
        let notes = self.provider()?.list(&request).await?;
        Ok(serde_json::to_value(notes)?)
    }

    async fn add_note(&self, args: AddNoteArgs) -> Result<Value> {
        let note = NewNote {
            title: args.title,
            content: args.content,
            labels: args.labels,
            ..Default::default()
        };
        let row = self.provider()?.add(&note).await?;
        Ok(Value::Object(row))
    }

    async fn read_note(&self, args: NoteIdArgs) -> Result<Value> {
        Ok(match self.provider()?.get(&args.note_id).await? {
            Some(row) => Value::Object(row),
            None => json!({ "error": "Note not found", "note_id": args.note_id }),
        })
    }

    async fn update_note(&self, args: UpdateNoteArgs) -> Result<Value> {
        let update = NoteUpdate {
            title: args.title,
            content: args.content,
            labels: args.labels,
        };
        if update.is_empty() {
            return Ok(json!({
                "error": "At least one of title, content, or labels must be provided"
            }));
        }
        let row = self.provider()?.update(&args.note_id, &update).await?;
        Ok(Value::Object(row))
    }

    async fn list_attachments(&self, args: NoteIdArgs) -> Result<Value> {
        let rows = self.provider()?.list_attachments(&args.note_id).await?;
        Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
    }
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> std::result::Result<T, CallError> {
    serde_json::from_value(arguments)
        .map_err(|e| CallError::invalid_params(format!("invalid arguments: {}", e)))
}

fn tool_result(value: &Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

fn list_tools() -> Value {
    let tools: Vec<Value> = TOOLS
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": input_schema(tool.fields),
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn input_schema(fields: &[ToolField]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for field in fields {
        properties.insert(
            field.name.to_string(),
            json!({ "type": field.field_type, "description": field.description }),
        );
        if field.required {
            required.push(Value::String(field.name.to_string()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}
