//! Note providers - remote backends that store notes.
//!
//! A provider is chosen by name (explicit argument, `NOTES_PROVIDER`, then
//! the config file) and executes selectors compiled by [`crate::search`].

pub mod appsheet;
pub mod protocol;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub use appsheet::{AppSheetClient, AppSheetSettings};
pub use protocol::Row;

use crate::config::{api_key_preview, ConfigStore, NotesConfig};
use crate::search::{AppSheetSelector, SelectorBackend, SortSpec};
use crate::{NotesError, Result};

/// Environment variable selecting the provider.
pub const PROVIDER_ENV_VAR: &str = "NOTES_PROVIDER";

pub const APP_ID_ENV_VAR: &str = "APPSHEET_APP_ID";
pub const API_KEY_ENV_VAR: &str = "APPSHEET_API_KEY";
pub const TABLE_NAME_ENV_VAR: &str = "APPSHEET_TABLE_NAME";

const DEFAULT_NOTE_TABLE: &str = "Note";
const DEFAULT_ATTACHMENT_NOTE_COLUMN: &str = "Note";

/// Default number of notes returned by a listing.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Environment lookup, injectable for tests.
pub type EnvLookup = fn(&str) -> Option<String>;

/// Reads the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Known providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    AppSheet,
}

impl ProviderKind {
    pub const ALL: &'static [ProviderKind] = &[ProviderKind::AppSheet];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::AppSheet => "appsheet",
        }
    }

    /// Selector dialect spoken by this provider.
    pub fn selector_backend(&self) -> &'static dyn SelectorBackend {
        match self {
            ProviderKind::AppSheet => &AppSheetSelector,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = NotesError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| NotesError::UnknownProvider {
                name: wanted,
                available: ProviderKind::ALL
                    .iter()
                    .map(ProviderKind::name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Provider settings after config and environment fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSettings {
    AppSheet(AppSheetSettings),
}

impl ProviderSettings {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderSettings::AppSheet(_) => ProviderKind::AppSheet,
        }
    }

    /// Resolve settings.
    ///
    /// Provider priority: `explicit`, `NOTES_PROVIDER`, config `provider`,
    /// then `appsheet`. AppSheet fields fall back to their environment
    /// variables when the config leaves them out.
    pub fn resolve(
        config: Option<&NotesConfig>,
        explicit: Option<&str>,
        env: EnvLookup,
    ) -> Result<Self> {
        let kind = match explicit
            .map(str::to_string)
            .or_else(|| env(PROVIDER_ENV_VAR))
            .or_else(|| config.and_then(|c| c.provider.clone()))
        {
            Some(name) => name.parse()?,
            None => ProviderKind::default(),
        };

        match kind {
            ProviderKind::AppSheet => {
                let section = config.and_then(|c| c.appsheet.clone()).unwrap_or_default();
                let configured = |value: Option<String>| value.filter(|v| !v.is_empty());

                let app_id = configured(section.app_id).or_else(|| env(APP_ID_ENV_VAR)).ok_or_else(|| {
                    NotesError::Config(format!(
                        "AppSheet app_id is required. Set {} env var or configure via 'notes config import'.",
                        APP_ID_ENV_VAR
                    ))
                })?;
                let api_key = configured(section.api_key).or_else(|| env(API_KEY_ENV_VAR)).ok_or_else(|| {
                    NotesError::Config(format!(
                        "AppSheet api_key is required. Set {} env var or configure via 'notes config import'.",
                        API_KEY_ENV_VAR
                    ))
                })?;
                let note_table = configured(section.note_table)
                    .or_else(|| env(TABLE_NAME_ENV_VAR))
                    .unwrap_or_else(|| DEFAULT_NOTE_TABLE.to_string());

                Ok(ProviderSettings::AppSheet(AppSheetSettings {
                    app_id,
                    api_key,
                    note_table,
                    attachment_table: configured(section.attachment_table),
                    attachment_note_column: configured(section.attachment_note_column)
                        .unwrap_or_else(|| DEFAULT_ATTACHMENT_NOTE_COLUMN.to_string()),
                }))
            }
        }
    }
}

/// Parameters of a note listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub limit: usize,
    /// Gmail-style query; blank means every note
    pub query: Option<String>,
    pub sort: Option<SortSpec>,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            query: None,
            sort: None,
        }
    }
}

/// One page of notes plus the number of matches before truncation.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct NoteList {
    pub results: Vec<Row>,
    pub total_count: usize,
}

/// Fields of a note to create.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    /// Comma-separated labels
    pub labels: String,
    /// Additional columns passed through unchanged
    pub extra: Row,
}

/// Fields to change on an existing note. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub labels: Option<String>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.labels.is_none()
    }
}

/// Result of probing a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionReport {
    pub note_count: usize,
    pub attachment_count: Option<usize>,
    pub attachment_error: Option<String>,
}

/// A connected provider.
pub enum Provider {
    AppSheet(AppSheetClient),
}

impl Provider {
    /// Connect using the selector dialect registered for the settings' kind.
    pub fn open(settings: ProviderSettings) -> Result<Self> {
        let selector = settings.kind().selector_backend();
        match settings {
            ProviderSettings::AppSheet(settings) => {
                Ok(Provider::AppSheet(AppSheetClient::new(settings, selector)?))
            }
        }
    }

    /// Selector dialect the provider compiles queries with.
    pub fn selector_backend(&self) -> &'static dyn SelectorBackend {
        match self {
            Provider::AppSheet(client) => client.selector_backend(),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::AppSheet(_) => ProviderKind::AppSheet,
        }
    }

    pub async fn list(&self, request: &ListRequest) -> Result<NoteList> {
        match self {
            Provider::AppSheet(client) => client.list(request).await,
        }
    }

    pub async fn add(&self, note: &NewNote) -> Result<Row> {
        match self {
            Provider::AppSheet(client) => client.add(note).await,
        }
    }

    pub async fn get(&self, note_id: &str) -> Result<Option<Row>> {
        match self {
            Provider::AppSheet(client) => client.get(note_id).await,
        }
    }

    pub async fn update(&self, note_id: &str, update: &NoteUpdate) -> Result<Row> {
        match self {
            Provider::AppSheet(client) => client.update(note_id, update).await,
        }
    }

    pub async fn list_attachments(&self, note_id: &str) -> Result<Vec<Row>> {
        match self {
            Provider::AppSheet(client) => client.list_attachments(note_id).await,
        }
    }

    pub async fn check_connection(&self) -> Result<ConnectionReport> {
        match self {
            Provider::AppSheet(client) => client.check_connection().await,
        }
    }
}

/// Open the provider described by the stored config and environment.
pub fn open_provider(store: &ConfigStore, explicit: Option<&str>, env: EnvLookup) -> Result<Provider> {
    let config = store.load()?;
    let settings = ProviderSettings::resolve(config.as_ref(), explicit, env)?;
    tracing::debug!("Opening {} provider", settings.kind());
    Provider::open(settings)
}

/// Outcome of validating a proposed config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub success: bool,
    pub message: String,
    /// Display pairs in insertion order
    pub stats: Vec<(String, String)>,
}

impl ValidationReport {
    fn failed(message: impl Into<String>, stats: Vec<(String, String)>) -> Self {
        Self {
            success: false,
            message: message.into(),
            stats,
        }
    }
}

/// Validate a config and test its connection.
///
/// Only the config itself is consulted; environment fallbacks do not apply,
/// since a config being imported has to stand on its own.
pub async fn validate_config(config: &NotesConfig) -> ValidationReport {
    let Some(name) = config.provider.as_deref() else {
        return ValidationReport::failed("Missing 'provider' field in config", Vec::new());
    };
    let kind = match name.parse::<ProviderKind>() {
        Ok(kind) => kind,
        Err(e) => return ValidationReport::failed(e.to_string(), Vec::new()),
    };

    match kind {
        ProviderKind::AppSheet => validate_appsheet(config).await,
    }
}

async fn validate_appsheet(config: &NotesConfig) -> ValidationReport {
    let missing = config.missing_fields();
    if !missing.is_empty() {
        return ValidationReport::failed(
            format!("Missing required fields: {}", missing.join(", ")),
            Vec::new(),
        );
    }

    let section = config.appsheet.clone().unwrap_or_default();
    let mut stats = vec![
        ("app_id".to_string(), section.app_id.clone().unwrap_or_default()),
        ("api_key_preview".to_string(), api_key_preview(section.api_key.as_deref())),
        ("note_table".to_string(), section.note_table.clone().unwrap_or_default()),
        (
            "attachment_table".to_string(),
            section
                .attachment_table
                .clone()
                .unwrap_or_else(|| "(not configured)".to_string()),
        ),
    ];

    let provider = match ProviderSettings::resolve(Some(config), Some(ProviderKind::AppSheet.name()), |_| None)
        .and_then(Provider::open)
    {
        Ok(provider) => provider,
        Err(e) => return ValidationReport::failed(e.to_string(), stats),
    };

    match provider.check_connection().await {
        Ok(report) => {
            stats.push(("note_count".to_string(), report.note_count.to_string()));
            if let Some(count) = report.attachment_count {
                stats.push(("attachment_count".to_string(), count.to_string()));
            }
            if let Some(error) = report.attachment_error {
                stats.push(("attachment_error".to_string(), error));
            }
            ValidationReport {
                success: true,
                message: "Connection successful".to_string(),
                stats,
            }
        }
        Err(NotesError::Api { status, .. }) => {
            ValidationReport::failed(format!("Note table error: HTTP {}", status), stats)
        }
        Err(e) => ValidationReport::failed(format!("Connection failed: {}", e), stats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppSheetConfig;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn fake_env(key: &str) -> Option<String> {
        match key {
            APP_ID_ENV_VAR => Some("env-app".to_string()),
            API_KEY_ENV_VAR => Some("env-key".to_string()),
            TABLE_NAME_ENV_VAR => Some("EnvNotes".to_string()),
            _ => None,
        }
    }

    fn config() -> NotesConfig {
        NotesConfig {
            provider: Some("AppSheet".to_string()),
            appsheet: Some(AppSheetConfig {
                app_id: Some("cfg-app".to_string()),
                api_key: Some("cfg-key".to_string()),
                note_table: None,
                attachment_table: Some("Attachment".to_string()),
                attachment_note_column: None,
            }),
        }
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("appsheet".parse::<ProviderKind>().unwrap(), ProviderKind::AppSheet);
        assert_eq!(" APPSHEET ".parse::<ProviderKind>().unwrap(), ProviderKind::AppSheet);

        let err = "sheets".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown provider: sheets. Available: appsheet");
    }

    #[test]
    fn test_selector_backend_by_kind() {
        assert_eq!(ProviderKind::AppSheet.selector_backend().name(), "appsheet");
    }

    #[test]
    fn test_resolve_from_config() {
        let settings = ProviderSettings::resolve(Some(&config()), None, no_env).unwrap();
        assert_eq!(
            settings,
            ProviderSettings::AppSheet(AppSheetSettings {
                app_id: "cfg-app".to_string(),
                api_key: "cfg-key".to_string(),
                note_table: "Note".to_string(),
                attachment_table: Some("Attachment".to_string()),
                attachment_note_column: "Note".to_string(),
            })
        );
    }

    #[test]
    fn test_config_wins_over_env_fields() {
        let ProviderSettings::AppSheet(settings) =
            ProviderSettings::resolve(Some(&config()), None, fake_env).unwrap();
        assert_eq!(settings.app_id, "cfg-app");
        assert_eq!(settings.note_table, "EnvNotes");
    }

    #[test]
    fn test_env_only() {
        let ProviderSettings::AppSheet(settings) =
            ProviderSettings::resolve(None, None, fake_env).unwrap();
        assert_eq!(settings.app_id, "env-app");
        assert_eq!(settings.api_key, "env-key");
        assert_eq!(settings.attachment_table, None);
    }

    #[test]
    fn test_missing_credentials() {
        let err = ProviderSettings::resolve(None, None, no_env).unwrap_err();
        assert!(err.to_string().contains(APP_ID_ENV_VAR));
    }

    #[test]
    fn test_explicit_provider_beats_config() {
        let mut config = config();
        config.provider = Some("nope".to_string());
        assert!(ProviderSettings::resolve(Some(&config), Some("appsheet"), no_env).is_ok());
        assert!(matches!(
            ProviderSettings::resolve(Some(&config), None, no_env),
            Err(NotesError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn test_open_provider_without_config_or_env() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(matches!(
            open_provider(&store, None, no_env),
            Err(NotesError::Config(_))
        ));
    }

    #[test]
    fn test_opened_provider_uses_registered_backend() {
        let provider = Provider::open(ProviderSettings::resolve(Some(&config()), None, no_env).unwrap())
            .unwrap();
        assert_eq!(provider.kind(), ProviderKind::AppSheet);
        assert_eq!(
            provider.selector_backend().name(),
            ProviderKind::AppSheet.selector_backend().name()
        );
    }

    #[test]
    fn test_note_update_is_empty() {
        assert!(NoteUpdate::default().is_empty());
        assert!(!NoteUpdate {
            labels: Some(String::new()),
            ..Default::default()
        }
        .is_empty());
    }

    #[tokio::test]
    async fn test_validate_missing_provider() {
        let report = validate_config(&NotesConfig::default()).await;
        assert!(!report.success);
        assert_eq!(report.message, "Missing 'provider' field in config");
    }

    #[tokio::test]
    async fn test_validate_unknown_provider() {
        let config = NotesConfig {
            provider: Some("json".to_string()),
            appsheet: None,
        };
        let report = validate_config(&config).await;
        assert!(!report.success);
        assert!(report.message.starts_with("Unknown provider: json"));
    }

    #[tokio::test]
    async fn test_validate_missing_fields() {
        let config = NotesConfig {
            provider: Some("appsheet".to_string()),
            appsheet: Some(AppSheetConfig {
                app_id: Some("a".to_string()),
                ..Default::default()
            }),
        };
        let report = validate_config(&config).await;
        assert!(!report.success);
        assert_eq!(report.message, "Missing required fields: api_key, note_table");
    }
}
