//! Query tokenizer built on a pest grammar.
//!
//! Splits a raw query like `meeting -label:archived ("a b" OR c)` into words,
//! raw quoted phrases, and parentheses. Negation and keywords are left for
//! the parser to resolve.

use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "search/grammar.pest"]
struct QueryGrammar;

/// A lexical unit of the query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Bare word, including any leading `-` and `label:` prefix
    Word(&'a str),
    /// Quoted phrase exactly as written, quotes included
    QuotedPhrase(&'a str),
    /// `(`
    LParen,
    /// `)`
    RParen,
}

impl Token<'_> {
    /// True for the `OR` keyword (ASCII case-insensitive, bare words only).
    pub fn is_or_keyword(&self) -> bool {
        matches!(self, Token::Word(word) if word.eq_ignore_ascii_case("OR"))
    }
}

/// Tokenize a query string.
///
/// Never fails: an unterminated quote takes the rest of the input as its
/// phrase, and whitespace-only input yields no tokens.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let query = match QueryGrammar::parse(Rule::query, input) {
        Ok(mut pairs) => pairs.next(),
        // Every character begins one of the token rules.
        Err(e) => unreachable!("query grammar rejected {:?}: {}", input, e),
    };

    let mut tokens = Vec::new();
    for pair in query.into_iter().flat_map(|query| query.into_inner()) {
        match pair.as_rule() {
            Rule::word => tokens.push(Token::Word(pair.as_str())),
            Rule::phrase => tokens.push(Token::QuotedPhrase(pair.as_str())),
            Rule::lparen => tokens.push(Token::LParen),
            Rule::rparen => tokens.push(Token::RParen),
            _ => {}
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use Token::*;

    #[test]
    fn test_empty_and_whitespace() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n ").is_empty());
    }

    #[test]
    fn test_words() {
        assert_eq!(
            tokenize("  meeting   project "),
            vec![Word("meeting"), Word("project")]
        );
    }

    #[test]
    fn test_dash_and_label_stay_in_word() {
        assert_eq!(
            tokenize("-label:archived - x"),
            vec![Word("-label:archived"), Word("-"), Word("x")]
        );
    }

    #[test]
    fn test_parens_split_words() {
        assert_eq!(
            tokenize("(label:work OR label:home)meeting"),
            vec![
                LParen,
                Word("label:work"),
                Word("OR"),
                Word("label:home"),
                RParen,
                Word("meeting"),
            ]
        );
    }

    #[test]
    fn test_quoted_phrase_keeps_quotes() {
        assert_eq!(
            tokenize(r#""exact phrase" label:work"#),
            vec![QuotedPhrase(r#""exact phrase""#), Word("label:work")]
        );
    }

    #[test]
    fn test_quote_ends_word() {
        assert_eq!(
            tokenize(r#"say"hello world"done"#),
            vec![Word("say"), QuotedPhrase(r#""hello world""#), Word("done")]
        );
    }

    #[test]
    fn test_unterminated_quote_takes_rest() {
        assert_eq!(
            tokenize(r#"a "b c (d"#),
            vec![Word("a"), QuotedPhrase(r#""b c (d"#)]
        );
        assert_eq!(tokenize(r#"""#), vec![QuotedPhrase(r#"""#)]);
    }

    #[test]
    fn test_backslash_does_not_escape_quote() {
        // Known limitation: no escape sequences inside phrases.
        assert_eq!(
            tokenize(r#""say \"hi\"""#),
            vec![
                QuotedPhrase(r#""say \""#),
                Word("hi\\"),
                QuotedPhrase(r#""""#),
            ]
        );
    }

    #[test]
    fn test_or_keyword() {
        assert!(Word("or").is_or_keyword());
        assert!(Word("Or").is_or_keyword());
        assert!(!Word("ORDER").is_or_keyword());
        assert!(!QuotedPhrase("\"OR\"").is_or_keyword());
    }
}
