//! Selector compilation for search queries.
//!
//! Lowers a [`QueryExpr`] and an optional [`SortSpec`] into the string
//! selector syntax of a storage backend. Each backend implements
//! [`SelectorBackend`]; the tokenizer and parser are shared.

use super::expr::{QueryExpr, SortSpec};

/// Target dialect for compiled selectors.
pub trait SelectorBackend: Send + Sync {
    /// Backend name as used in configuration.
    fn name(&self) -> &'static str;

    /// Lower an expression into a row predicate.
    fn condition(&self, expr: &QueryExpr) -> String;

    /// Restrict `table` to the rows matching `condition`.
    fn filter(&self, table: &str, condition: &str) -> String;

    /// Order `base`, either a table name or a filtered set.
    fn order_by(&self, base: &str, sort: &SortSpec) -> String;

    /// Predicate matching rows whose `field` equals `value` exactly.
    fn field_equals(&self, field: &str, value: &str) -> String;

    /// Compile an optional expression and sort into selectors.
    ///
    /// # Examples
    ///
    /// ```
    /// use notes::search::{parse_query, AppSheetSelector, SelectorBackend, SortSpec};
    ///
    /// let expr = parse_query("label:work");
    /// let sort = SortSpec::descending("modified");
    /// let compiled = AppSheetSelector.compile("Note", expr.as_ref(), Some(&sort));
    /// assert_eq!(
    ///     compiled.selector(),
    ///     Some(r#"OrderBy(Filter(Note, CONTAINS([Labels], "work")), [Modified], TRUE)"#)
    /// );
    /// ```
    fn compile(
        &self,
        table: &str,
        expr: Option<&QueryExpr>,
        sort: Option<&SortSpec>,
    ) -> CompiledSelector {
        let filter = expr.map(|expr| self.filter(table, &self.condition(expr)));
        let ordered = sort.map(|sort| self.order_by(filter.as_deref().unwrap_or(table), sort));
        CompiledSelector { filter, ordered }
    }
}

/// Output of [`SelectorBackend::compile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledSelector {
    /// Filtered table, present when the query had an expression
    pub filter: Option<String>,
    /// Ordering clause wrapping the filter (or the bare table), present when sorted
    pub ordered: Option<String>,
}

impl CompiledSelector {
    /// The selector to send: ordered if sorted, else the filter, else none.
    pub fn selector(&self) -> Option<&str> {
        self.ordered.as_deref().or(self.filter.as_deref())
    }

    pub fn into_selector(self) -> Option<String> {
        self.ordered.or(self.filter)
    }
}
