//! AppSheet API wire types.
//!
//! Every table operation is a POST to `.../tables/{table}/Action` with a
//! JSON body naming the action:
//!
//! ```json
//! {"Action": "Find", "Properties": {"Locale": "en-US", "Selector": "..."}, "Rows": []}
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{NotesError, Result};

/// AppSheet REST API root.
pub const BASE_URL: &str = "https://api.appsheet.com/api/v2/apps";

/// Header carrying the application access key.
pub const ACCESS_KEY_HEADER: &str = "ApplicationAccessKey";

const LOCALE: &str = "en-US";

/// A table row. Columns vary per app, so rows stay untyped.
pub type Row = Map<String, Value>;

/// Table action verbs.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Find,
    Add,
    Edit,
}

/// Body of a table action request.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ActionRequest {
    pub action: Action,
    pub properties: Properties,
    pub rows: Vec<Row>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct Properties {
    pub locale: String,
    /// Row selector expression; `Find` returns every row without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl ActionRequest {
    fn new(action: Action, selector: Option<String>, rows: Vec<Row>) -> Self {
        Self {
            action,
            properties: Properties {
                locale: LOCALE.to_string(),
                selector,
            },
            rows,
        }
    }

    pub fn find(selector: Option<String>) -> Self {
        Self::new(Action::Find, selector, Vec::new())
    }

    pub fn add(rows: Vec<Row>) -> Self {
        Self::new(Action::Add, None, rows)
    }

    pub fn edit(rows: Vec<Row>) -> Self {
        Self::new(Action::Edit, None, rows)
    }
}

/// URL for actions on `table` of app `app_id`.
pub fn action_url(app_id: &str, table: &str) -> String {
    format!("{}/{}/tables/{}/Action", BASE_URL, app_id, table)
}

/// Extract rows from a response body.
///
/// AppSheet answers with either a bare array of rows or an object with a
/// `Rows` array; an empty body means no rows.
pub fn rows_from_body(body: &str) -> Result<Vec<Row>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows = match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("Rows") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(NotesError::Protocol(
                    "response object has no Rows array".to_string(),
                ))
            }
        },
        other => {
            return Err(NotesError::Protocol(format!(
                "unexpected response body: {}",
                other
            )))
        }
    };

    rows.into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            other => Err(NotesError::Protocol(format!("row is not an object: {}", other))),
        })
        .collect()
}
