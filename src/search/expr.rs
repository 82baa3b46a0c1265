//! Query expression tree and sort specifier.
//!
//! `QueryExpr` is what the parser produces and what selector backends lower.
//! `SortSpec` travels alongside it, never inside it.

use std::str::FromStr;

use serde::Serialize;

use crate::NotesError;

/// A parsed search expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QueryExpr {
    /// Free text matched against title and content: `meeting`, `"exact phrase"`
    TextSearch(String),
    /// Label match: `label:work`
    LabelFilter(String),
    /// Negation: `-label:archived`
    Not(Box<QueryExpr>),
    /// Conjunction, implicit between adjacent terms
    And(Box<QueryExpr>, Box<QueryExpr>),
    /// Disjunction: `a OR b`
    Or(Box<QueryExpr>, Box<QueryExpr>),
}

impl QueryExpr {
    pub fn text(value: impl Into<String>) -> Self {
        QueryExpr::TextSearch(value.into())
    }

    pub fn label(value: impl Into<String>) -> Self {
        QueryExpr::LabelFilter(value.into())
    }

    pub fn negate(inner: QueryExpr) -> Self {
        QueryExpr::Not(Box::new(inner))
    }

    pub fn and(left: QueryExpr, right: QueryExpr) -> Self {
        QueryExpr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: QueryExpr, right: QueryExpr) -> Self {
        QueryExpr::Or(Box::new(left), Box::new(right))
    }
}

/// Ordering request such as `-modified` (descending) or `created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    /// Field name as the user typed it, without leading dashes
    pub field: String,
    /// Set by a leading `-`
    pub descending: bool,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parse an optional sort argument, treating empty input as no sort.
    pub fn parse_optional(input: Option<&str>) -> crate::Result<Option<SortSpec>> {
        match input.map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some),
        }
    }
}

impl FromStr for SortSpec {
    type Err = NotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let field = s.trim_start_matches('-');
        if field.is_empty() {
            return Err(NotesError::InvalidSort(s.to_string()));
        }
        Ok(Self {
            field: field.to_string(),
            descending: s.starts_with('-'),
        })
    }
}
