//! Configuration loading and storage.
//!
//! The config lives in `config.toml` under `NOTES_CONFIG_DIR`, or the
//! platform config directory when that variable is unset.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{NotesError, Result};

/// Overrides the config directory.
pub const CONFIG_DIR_ENV_VAR: &str = "NOTES_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Placeholder shown for unset fields.
const NOT_SET: &str = "(not set)";

/// Top-level configuration file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesConfig {
    /// Backend name, e.g. `appsheet`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// AppSheet provider settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appsheet: Option<AppSheetConfig>,
}

/// AppSheet section of the config file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSheetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_table: Option<String>,
    /// Attachment column referencing the owning note (defaults to `Note`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_note_column: Option<String>,
}

impl NotesConfig {
    /// Example shown when no config exists.
    pub fn example() -> Self {
        Self {
            provider: Some("appsheet".to_string()),
            appsheet: Some(AppSheetConfig {
                app_id: Some("your-app-id-guid".to_string()),
                api_key: Some("your-api-key".to_string()),
                note_table: Some("Note".to_string()),
                attachment_table: Some("Attachment".to_string()),
                attachment_note_column: None,
            }),
        }
    }

    /// Required AppSheet fields that are absent or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let section = self.appsheet.clone().unwrap_or_default();
        [
            ("app_id", &section.app_id),
            ("api_key", &section.api_key),
            ("note_table", &section.note_table),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect()
    }

    /// JSON view with secrets removed.
    pub fn redacted(&self) -> Value {
        let provider = self.provider.as_deref().unwrap_or("unknown");
        let mut view = json!({ "provider": provider });

        if provider.eq_ignore_ascii_case("appsheet") {
            let section = self.appsheet.clone().unwrap_or_default();
            let shown = |v: &Option<String>| v.clone().unwrap_or_else(|| NOT_SET.to_string());
            view["appsheet"] = json!({
                "app_id": shown(&section.app_id),
                "note_table": shown(&section.note_table),
                "attachment_table": shown(&section.attachment_table),
            });
        }

        view
    }
}

/// Masked form of an API key: eight stars plus its last eight characters.
pub fn api_key_preview(api_key: Option<&str>) -> String {
    match api_key {
        Some(key) if !key.is_empty() => {
            let tail: String = {
                let chars: Vec<char> = key.chars().collect();
                chars[chars.len().saturating_sub(8)..].iter().collect()
            };
            format!("********...{}", tail)
        }
        _ => NOT_SET.to_string(),
    }
}

/// Location of the config file and operations on it.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolve the config directory from `NOTES_CONFIG_DIR` or platform defaults.
    pub fn from_env() -> Result<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV_VAR).filter(|d| !d.is_empty()) {
            return Ok(Self::new(dir));
        }
        let dirs = ProjectDirs::from("", "", "notes").ok_or_else(|| {
            NotesError::Config(format!(
                "Cannot determine config directory; set {}",
                CONFIG_DIR_ENV_VAR
            ))
        })?;
        Ok(Self::new(dirs.config_dir()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    /// Load the config, or `None` if no config file exists.
    pub fn load(&self) -> Result<Option<NotesConfig>> {
        let path = self.path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let config = toml::from_str(&text)?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(Some(config))
    }

    /// Write the config, replacing any existing file in one rename.
    pub fn save(&self, config: &NotesConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let text = toml::to_string_pretty(config)?;
        let path = self.path();
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;

        tracing::info!("Config saved to {:?}", path);
        Ok(())
    }
}

/// Read a config file for import: `.toml` as TOML, anything else as JSON.
pub fn read_config_file(path: &Path) -> Result<NotesConfig> {
    let text = fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        Ok(toml::from_str(&text)?)
    } else {
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> NotesConfig {
        NotesConfig {
            provider: Some("appsheet".to_string()),
            appsheet: Some(AppSheetConfig {
                app_id: Some("app-123".to_string()),
                api_key: Some("secret-key-0123456789".to_string()),
                note_table: Some("Note".to_string()),
                attachment_table: None,
                attachment_note_column: None,
            }),
        }
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested"));

        store.save(&full_config()).unwrap();

        assert!(store.path().exists());
        assert!(!store.path().with_extension("toml.tmp").exists());
        assert_eq!(store.load().unwrap(), Some(full_config()));
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        fs::write(store.path(), "provider = [").unwrap();
        assert!(matches!(store.load(), Err(NotesError::TomlDe(_))));
    }

    #[test]
    fn test_read_json_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.json");
        fs::write(
            &path,
            r#"{"provider": "appsheet", "appsheet": {"app_id": "a", "api_key": "k", "note_table": "Note", "attachment_table": "Attachment"}}"#,
        )
        .unwrap();

        let config = read_config_file(&path).unwrap();
        let section = config.appsheet.unwrap();
        assert_eq!(config.provider.as_deref(), Some("appsheet"));
        assert_eq!(section.attachment_table.as_deref(), Some("Attachment"));
    }

    #[test]
    fn test_read_toml_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.toml");
        fs::write(&path, "provider = \"appsheet\"\n\n[appsheet]\napp_id = \"a\"\n").unwrap();

        let config = read_config_file(&path).unwrap();
        assert_eq!(config.appsheet.unwrap().app_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_missing_fields() {
        assert!(full_config().missing_fields().is_empty());
        assert_eq!(
            NotesConfig::default().missing_fields(),
            vec!["app_id", "api_key", "note_table"]
        );

        let mut config = full_config();
        config.appsheet.as_mut().unwrap().api_key = Some(String::new());
        assert_eq!(config.missing_fields(), vec!["api_key"]);
    }

    #[test]
    fn test_redacted_hides_api_key() {
        let view = full_config().redacted();
        assert_eq!(view["provider"], "appsheet");
        assert_eq!(view["appsheet"]["app_id"], "app-123");
        assert_eq!(view["appsheet"]["attachment_table"], NOT_SET);
        assert!(!view.to_string().contains("secret-key"));
    }

    #[test]
    fn test_redacted_unknown_provider() {
        let view = NotesConfig::default().redacted();
        assert_eq!(view, json!({ "provider": "unknown" }));
    }

    #[test]
    fn test_api_key_preview() {
        assert_eq!(api_key_preview(Some("secret-key-0123456789")), "********...23456789");
        assert_eq!(api_key_preview(Some("abc")), "********...abc");
        assert_eq!(api_key_preview(None), NOT_SET);
    }
}
