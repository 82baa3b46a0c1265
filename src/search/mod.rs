//! Search module - query tokenizing, parsing, and selector compilation.
//!
//! Gmail-style queries such as `meeting -label:archived` or
//! `(label:work OR label:home) "status report"` flow through
//! `tokenize -> parse -> SelectorBackend::compile`.

pub mod appsheet;
pub mod expr;
pub mod parser;
pub mod query;
pub mod tokenizer;

pub use appsheet::AppSheetSelector;
pub use expr::{QueryExpr, SortSpec};
pub use parser::{parse_query, parse_tokens};
pub use query::{CompiledSelector, SelectorBackend};
pub use tokenizer::{tokenize, Token};
