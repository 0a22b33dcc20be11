//! Link filter expressions
//!
//! Combines quoted regular expressions with boolean connectives to decide
//! whether a link (or any other subject string) should be accepted.
//!
//! # Syntax
//!
//! ```text
//! "regex"              Accept subjects containing a match for the regex
//! A AND B              Both sides must accept
//! A OR B               Either side must accept
//! NOT A                Accept what A rejects
//! A NOT B              Shorthand for A AND NOT B
//! ( ... )              Grouping
//! NAME                 A named pattern defined in the config or with --define
//! ```
//!
//! Keywords are case-insensitive. `OR` binds loosest, `AND` and infix `NOT`
//! share the next level, prefix `NOT` binds tightest. Inside a literal `\"`
//! stands for a quote and `\\` for a backslash; every other escape is handed
//! to the regex engine unchanged. Expressions may nest at most
//! [`MAX_DEPTH`] levels.
//!
//! # Examples
//!
//! ```text
//! "\.pdf$"                                   # PDF links
//! "\.(jpe?g|png)$" NOT "thumb"               # Images that aren't thumbnails
//! (("dogs" NOT "cats") AND "pet" AND "\.html$")
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod matcher;
pub mod parser;
pub mod table;

pub use ast::{Expr, Node};
pub use error::{ExprError, InvalidPatternError, LexError, ParseError, ParseErrorReason};
pub use eval::evaluate;
pub use lexer::{Spanned, Token, tokenize, tokenize_with};
pub use matcher::{InvalidPatternPolicy, MatchOptions, Matcher};
pub use parser::{MAX_DEPTH, parse};
pub use table::{Definition, DefinitionError, PatternTable};

use log::debug;
use std::fmt;

/// A parsed expression with every pattern compiled, ready to test subjects
///
/// Compilation happens once, in the constructor. Afterwards the filter is
/// immutable and can be shared between threads.
#[derive(Debug, Clone)]
pub struct Filter {
    expr: Expr,
    root: Node<Matcher>,
    options: MatchOptions,
}

impl Filter {
    /// Compile the leaves of an already parsed expression
    pub fn new(expr: Expr, options: MatchOptions) -> Result<Self, InvalidPatternError> {
        let root = expr.try_map(&mut |source: &String| Matcher::compile(source, &options))?;
        debug!(
            "compiled filter {expr} ({} patterns, depth {}, case {})",
            expr.leaves().len(),
            expr.depth(),
            if options.case_sensitive {
                "sensitive"
            } else {
                "insensitive"
            }
        );
        Ok(Self {
            expr,
            root,
            options,
        })
    }

    /// Tokenize, parse and compile `expression`
    pub fn parse(expression: &str, options: MatchOptions) -> Result<Self, ExprError> {
        Self::parse_with(expression, &PatternTable::default(), options)
    }

    /// Like [`Filter::parse`], resolving bare words through `table`
    pub fn parse_with(
        expression: &str,
        table: &PatternTable,
        options: MatchOptions,
    ) -> Result<Self, ExprError> {
        let tokens = tokenize_with(expression, table)?;
        let expr = parse(&tokens)?;
        Ok(Self::new(expr, options)?)
    }

    pub fn matches(&self, subject: &str) -> bool {
        evaluate(&self.root, subject)
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Patterns that were swapped for never-matching placeholders
    pub fn disabled_patterns(&self) -> Vec<&str> {
        self.root
            .leaves()
            .into_iter()
            .filter(|m| !m.is_compiled())
            .map(Matcher::source)
            .collect()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.expr, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Filter>();
    }

    #[test]
    fn test_parse_reports_each_error_kind() {
        let options = MatchOptions::new();
        assert!(matches!(
            Filter::parse("\"(A", options),
            Err(ExprError::Lex(_))
        ));
        assert!(matches!(
            Filter::parse("\"A\" AND", options),
            Err(ExprError::Parse(_))
        ));
        assert!(matches!(
            Filter::parse("\"[\"", options),
            Err(ExprError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_disabled_patterns_are_reported() {
        let options = MatchOptions::new().on_invalid_pattern(InvalidPatternPolicy::NeverMatch);
        let filter = Filter::parse(r#""ok" OR "[" OR "(x""#, options).unwrap();
        assert_eq!(filter.disabled_patterns(), vec!["[", "(x"]);
        assert!(filter.matches("ok"));
    }

    #[test]
    fn test_display_is_canonical() {
        let filter = Filter::parse(r#""a" not "b" or "c""#, MatchOptions::new()).unwrap();
        assert_eq!(filter.to_string(), r#"(("a" AND NOT "b") OR "c")"#);
    }
}
