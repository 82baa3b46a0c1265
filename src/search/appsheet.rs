//! AppSheet selector dialect.
//!
//! Renders expressions for the `Selector` property of AppSheet `Find`
//! actions, e.g. `Filter(Note, AND(CONTAINS([Labels], "work"), ...))`.

use super::expr::{QueryExpr, SortSpec};
use super::query::SelectorBackend;

/// Lowers queries into AppSheet expression syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppSheetSelector;

impl SelectorBackend for AppSheetSelector {
    fn name(&self) -> &'static str {
        "appsheet"
    }

    fn condition(&self, expr: &QueryExpr) -> String {
        match expr {
            QueryExpr::TextSearch(value) => format!(
                r#"CONTAINS(CONCATENATE([Title], " ", [Content]), "{}")"#,
                escape(value)
            ),
            QueryExpr::LabelFilter(value) => format!(r#"CONTAINS([Labels], "{}")"#, escape(value)),
            QueryExpr::Not(inner) => format!("NOT({})", self.condition(inner)),
            QueryExpr::And(left, right) => {
                format!("AND({}, {})", self.condition(left), self.condition(right))
            }
            QueryExpr::Or(left, right) => {
                format!("OR({}, {})", self.condition(left), self.condition(right))
            }
        }
    }

    fn filter(&self, table: &str, condition: &str) -> String {
        format!("Filter({}, {})", table, condition)
    }

    fn order_by(&self, base: &str, sort: &SortSpec) -> String {
        format!(
            "OrderBy({}, [{}], {})",
            base,
            column_name(&sort.field),
            if sort.descending { "TRUE" } else { "FALSE" }
        )
    }

    fn field_equals(&self, field: &str, value: &str) -> String {
        format!(r#"[{}] = "{}""#, field, escape(value))
    }
}

/// Escape `"` for embedding inside an AppSheet string literal.
fn escape(value: &str) -> String {
    value.replace('"', r#"\""#)
}

/// AppSheet column naming: `modified` -> `Modified`, `CREATED` -> `Created`.
fn column_name(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::parse_query;
    use crate::search::parser::MAX_TERMS;

    fn condition(query: &str) -> String {
        AppSheetSelector.condition(&parse_query(query).unwrap())
    }

    #[test]
    fn test_label() {
        assert_eq!(condition("label:work"), r#"CONTAINS([Labels], "work")"#);
    }

    #[test]
    fn test_text() {
        assert_eq!(
            condition("meeting"),
            r#"CONTAINS(CONCATENATE([Title], " ", [Content]), "meeting")"#
        );
    }

    #[test]
    fn test_text_escapes_quotes() {
        let expr = QueryExpr::text(r#"say "hi""#);
        assert_eq!(
            AppSheetSelector.condition(&expr),
            r#"CONTAINS(CONCATENATE([Title], " ", [Content]), "say \"hi\"")"#
        );
    }

    #[test]
    fn test_label_escapes_quotes() {
        let expr = QueryExpr::label(r#"a"b"#);
        assert_eq!(AppSheetSelector.condition(&expr), r#"CONTAINS([Labels], "a\"b")"#);
    }

    #[test]
    fn test_negation_and_conjunction() {
        assert_eq!(
            condition("meeting -label:archived"),
            r#"AND(CONTAINS(CONCATENATE([Title], " ", [Content]), "meeting"), NOT(CONTAINS([Labels], "archived")))"#
        );
    }

    #[test]
    fn test_grouped_or() {
        assert_eq!(
            condition("(label:work OR label:home) meeting"),
            r#"AND(OR(CONTAINS([Labels], "work"), CONTAINS([Labels], "home")), CONTAINS(CONCATENATE([Title], " ", [Content]), "meeting"))"#
        );
    }

    #[test]
    fn test_filter_wraps_table() {
        let compiled = AppSheetSelector.compile("Note", parse_query("label:work").as_ref(), None);
        assert_eq!(
            compiled.selector(),
            Some(r#"Filter(Note, CONTAINS([Labels], "work"))"#)
        );
    }

    #[test]
    fn test_sort_only_descending() {
        let sort: SortSpec = "-modified".parse().unwrap();
        let compiled = AppSheetSelector.compile("Note", None, Some(&sort));
        assert_eq!(compiled.selector(), Some("OrderBy(Note, [Modified], TRUE)"));
    }

    #[test]
    fn test_sort_only_ascending() {
        let sort: SortSpec = "modified".parse().unwrap();
        let compiled = AppSheetSelector.compile("Note", None, Some(&sort));
        assert_eq!(compiled.selector(), Some("OrderBy(Note, [Modified], FALSE)"));
    }

    #[test]
    fn test_sort_with_filter() {
        let sort: SortSpec = "-created".parse().unwrap();
        let compiled =
            AppSheetSelector.compile("Note", parse_query("-label:done").as_ref(), Some(&sort));
        assert_eq!(
            compiled.filter.as_deref(),
            Some(r#"Filter(Note, NOT(CONTAINS([Labels], "done")))"#)
        );
        assert_eq!(
            compiled.selector(),
            Some(r#"OrderBy(Filter(Note, NOT(CONTAINS([Labels], "done"))), [Created], TRUE)"#)
        );
    }

    #[test]
    fn test_long_query_compiles() {
        let compiled = AppSheetSelector.compile("Note", parse_query(&"a ".repeat(100_000)).as_ref(), None);
        let selector = compiled.selector().unwrap();
        assert_eq!(selector.matches("CONTAINS(").count(), MAX_TERMS);
    }

    #[test]
    fn test_deeply_nested_query_compiles() {
        let query = format!("{}label:x OR y", "(".repeat(10_000));
        assert_eq!(
            condition(&query),
            r#"OR(CONTAINS([Labels], "x"), CONTAINS(CONCATENATE([Title], " ", [Content]), "y"))"#
        );
    }

    #[test]
    fn test_column_name() {
        assert_eq!(column_name("modified"), "Modified");
        assert_eq!(column_name("lastEdited"), "Lastedited");
        assert_eq!(column_name("ÉTAT"), "État");
        assert_eq!(column_name(""), "");
    }

    #[test]
    fn test_field_equals() {
        assert_eq!(AppSheetSelector.field_equals("ID", "f157"), r#"[ID] = "f157""#);
        assert_eq!(AppSheetSelector.field_equals("Note", r#"x"y"#), r#"[Note] = "x\"y""#);
    }
}
