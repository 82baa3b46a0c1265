//! AppSheet-backed note provider.
//!
//! Stateless over HTTP: every call is one `Action` request against the
//! note or attachment table.

use std::time::Duration;

use serde_json::Value;

use super::protocol::{action_url, rows_from_body, ActionRequest, Row, ACCESS_KEY_HEADER};
use super::{ConnectionReport, ListRequest, NewNote, NoteList, NoteUpdate};
use crate::search::{parse_query, SelectorBackend};
use crate::{NotesError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Key column of the note table.
const ID_COLUMN: &str = "ID";

/// Resolved AppSheet connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSheetSettings {
    pub app_id: String,
    pub api_key: String,
    pub note_table: String,
    pub attachment_table: Option<String>,
    pub attachment_note_column: String,
}

/// HTTP client for one AppSheet app.
pub struct AppSheetClient {
    http: reqwest::Client,
    settings: AppSheetSettings,
    selector: &'static dyn SelectorBackend,
}

impl AppSheetClient {
    /// Create a client compiling its selectors with `selector`.
    pub fn new(settings: AppSheetSettings, selector: &'static dyn SelectorBackend) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            settings,
            selector,
        })
    }

    pub fn settings(&self) -> &AppSheetSettings {
        &self.settings
    }

    pub fn selector_backend(&self) -> &'static dyn SelectorBackend {
        self.selector
    }

    /// Selector for a list request, or `None` to fetch every row.
    pub fn list_selector(&self, request: &ListRequest) -> Option<String> {
        let expr = request.query.as_deref().and_then(parse_query);
        self.selector
            .compile(&self.settings.note_table, expr.as_ref(), request.sort.as_ref())
            .into_selector()
    }

    fn note_selector(&self, note_id: &str) -> String {
        self.selector.filter(
            &self.settings.note_table,
            &self.selector.field_equals(ID_COLUMN, note_id),
        )
    }

    async fn execute(&self, table: &str, request: &ActionRequest) -> Result<Vec<Row>> {
        tracing::debug!(
            "AppSheet {:?} on {} (selector: {:?})",
            request.action,
            table,
            request.properties.selector
        );

        let response = self
            .http
            .post(action_url(&self.settings.app_id, table))
            .header(ACCESS_KEY_HEADER, self.settings.api_key.as_str())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != reqwest::StatusCode::OK {
            tracing::warn!("AppSheet returned HTTP {} for {}", status.as_u16(), table);
            return Err(NotesError::Api {
                status: status.as_u16(),
                body,
            });
        }

        rows_from_body(&body)
    }

    /// List notes matching an optional query, truncated to `request.limit`.
    pub async fn list(&self, request: &ListRequest) -> Result<NoteList> {
        let find = ActionRequest::find(self.list_selector(request));
        let mut rows = self.execute(&self.settings.note_table, &find).await?;

        let total_count = rows.len();
        rows.truncate(request.limit);
        Ok(NoteList {
            results: rows,
            total_count,
        })
    }

    /// Create a note and return the stored row.
    pub async fn add(&self, note: &NewNote) -> Result<Row> {
        let mut row = note.extra.clone();
        row.insert("Title".to_string(), Value::String(note.title.clone()));
        row.insert("Content".to_string(), Value::String(note.content.clone()));
        row.insert("Labels".to_string(), Value::String(note.labels.clone()));

        let rows = self
            .execute(&self.settings.note_table, &ActionRequest::add(vec![row]))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| NotesError::Protocol("Add returned no rows".to_string()))
    }

    /// Fetch one note by ID.
    pub async fn get(&self, note_id: &str) -> Result<Option<Row>> {
        let find = ActionRequest::find(Some(self.note_selector(note_id)));
        let rows = self.execute(&self.settings.note_table, &find).await?;
        Ok(rows.into_iter().next())
    }

    /// Change the given fields of a note and return the updated row.
    pub async fn update(&self, note_id: &str, update: &NoteUpdate) -> Result<Row> {
        if update.is_empty() {
            return Err(NotesError::Config(
                "At least one of title, content, or labels must be provided".to_string(),
            ));
        }

        let mut row = Row::new();
        row.insert(ID_COLUMN.to_string(), Value::String(note_id.to_string()));
        for (column, value) in [
            ("Title", &update.title),
            ("Content", &update.content),
            ("Labels", &update.labels),
        ] {
            if let Some(value) = value {
                row.insert(column.to_string(), Value::String(value.clone()));
            }
        }

        let rows = self
            .execute(&self.settings.note_table, &ActionRequest::edit(vec![row]))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| NotesError::Protocol(format!("Note not found: {}", note_id)))
    }

    /// Attachments belonging to a note.
    pub async fn list_attachments(&self, note_id: &str) -> Result<Vec<Row>> {
        let table = self.settings.attachment_table.as_deref().ok_or_else(|| {
            NotesError::Config("No attachment_table configured for AppSheet".to_string())
        })?;
        let selector = self.selector.filter(
            table,
            &self.selector.field_equals(&self.settings.attachment_note_column, note_id),
        );
        self.execute(table, &ActionRequest::find(Some(selector)))
            .await
    }

    /// Probe the note table and, if configured, the attachment table.
    pub async fn check_connection(&self) -> Result<ConnectionReport> {
        let notes = self
            .execute(&self.settings.note_table, &ActionRequest::find(None))
            .await?;

        let mut report = ConnectionReport {
            note_count: notes.len(),
            ..Default::default()
        };

        if let Some(table) = &self.settings.attachment_table {
            match self.execute(table, &ActionRequest::find(None)).await {
                Ok(rows) => report.attachment_count = Some(rows.len()),
                Err(NotesError::Api { status, .. }) => {
                    report.attachment_error = Some(format!("HTTP {}", status))
                }
                Err(e) => report.attachment_error = Some(e.to_string()),
            }
        }

        Ok(report)
    }
}
