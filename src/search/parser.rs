//! Recursive-descent parser for Gmail-style note queries.
//!
//! Parses queries like `meeting -label:archived` or
//! `(label:work OR label:home) "status report"` into a [`QueryExpr`].
//!
//! Precedence from loosest to tightest: `OR`, implicit AND (adjacency),
//! `-` negation, atoms. Malformed input never errors; the parser keeps
//! whatever tree it has built so far.
//!
//! Both recursion depth and tree size are bounded: groups nested deeper than
//! [`MAX_NESTING`] are flattened into their parent, and input past
//! [`MAX_TERMS`] atoms is ignored.

use super::expr::QueryExpr;
use super::tokenizer::{tokenize, Token};

/// Prefix selecting the labels field, matched ASCII case-insensitively.
const LABEL_PREFIX: &str = "label:";

/// Deepest parenthesized group that opens a new level.
pub const MAX_NESTING: usize = 32;

/// Most atoms kept from one query.
pub const MAX_TERMS: usize = 256;

/// Parse a search query string into an expression tree.
///
/// Returns `None` for empty or whitespace-only input, which callers treat
/// as "no filter".
///
/// # Examples
///
/// ```
/// use notes::search::{parse_query, QueryExpr};
///
/// let expr = parse_query("meeting -label:archived").unwrap();
/// assert_eq!(
///     expr,
///     QueryExpr::and(
///         QueryExpr::text("meeting"),
///         QueryExpr::negate(QueryExpr::label("archived")),
///     )
/// );
/// assert_eq!(parse_query("   "), None);
/// ```
pub fn parse_query(input: &str) -> Option<QueryExpr> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    parse_tokens(&tokenize(input))
}

/// Parse an already tokenized query.
pub fn parse_tokens(tokens: &[Token<'_>]) -> Option<QueryExpr> {
    Parser {
        tokens,
        pos: 0,
        depth: 0,
        terms: 0,
    }
    .parse_or()
}

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    /// Open groups
    depth: usize,
    /// Atoms produced so far
    terms: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    /// Next token, or `None` once the term budget is spent.
    fn peek(&self) -> Option<&'t Token<'a>> {
        if self.terms >= MAX_TERMS {
            return None;
        }
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'t Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Option<QueryExpr> {
        let mut left = self.parse_and()?;

        while self.peek().is_some_and(Token::is_or_keyword) {
            self.advance();
            match self.parse_and() {
                Some(right) => left = QueryExpr::or(left, right),
                // Dangling OR
                None => break,
            }
        }

        Some(left)
    }

    fn parse_and(&mut self) -> Option<QueryExpr> {
        let mut left = self.parse_unary()?;

        while self
            .peek()
            .is_some_and(|token| !token.is_or_keyword() && *token != Token::RParen)
        {
            match self.parse_unary() {
                Some(right) => left = QueryExpr::and(left, right),
                None => break,
            }
        }

        Some(left)
    }

    fn parse_unary(&mut self) -> Option<QueryExpr> {
        if self.depth >= MAX_NESTING {
            // Too deep: these parens group nothing.
            while self.peek() == Some(&Token::LParen) {
                self.advance();
            }
        }

        if let Some(Token::Word(word)) = self.peek() {
            if let Some(rest) = word.strip_prefix('-').filter(|rest| !rest.is_empty()) {
                self.advance();
                self.terms += 1;
                return Some(QueryExpr::negate(classify_word(rest)));
            }
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Option<QueryExpr> {
        let leaf = match self.advance()? {
            Token::LParen => {
                self.depth += 1;
                let inner = self.parse_or();
                self.depth -= 1;
                // A missing `)` just ends the group.
                if self.peek() == Some(&Token::RParen) {
                    self.advance();
                }
                return inner;
            }
            Token::QuotedPhrase(raw) => QueryExpr::TextSearch(strip_quotes(raw).to_string()),
            Token::Word(word) => classify_word(word),
            Token::RParen => QueryExpr::text(")"),
        };
        self.terms += 1;
        Some(leaf)
    }
}

fn classify_word(word: &str) -> QueryExpr {
    match word.get(..LABEL_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(LABEL_PREFIX) => {
            QueryExpr::label(&word[LABEL_PREFIX.len()..])
        }
        _ => QueryExpr::text(word),
    }
}

/// Drop one leading quote and, if the phrase was terminated, one trailing quote.
fn strip_quotes(raw: &str) -> &str {
    let inner = raw.strip_prefix('"').unwrap_or(raw);
    inner.strip_suffix('"').unwrap_or(inner)
}
