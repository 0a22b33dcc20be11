use super::ast::{Expr, Node};
use super::error::{ParseError, ParseErrorReason};
use super::lexer::{Spanned, Token};

/// Deepest tree (and deepest parenthesis or `NOT` nesting) the parser accepts
pub const MAX_DEPTH: usize = 256;

/// Build an expression tree from a token sequence
///
/// Precedence, loosest first: `OR`, then `AND` together with infix `NOT`
/// (`a NOT b` reads as `a AND NOT b`), then prefix `NOT`. Both binary levels
/// are left-associative and parentheses override everything.
///
/// ```text
/// expr     ::= or_term
/// or_term  ::= and_term ( OR and_term )*
/// and_term ::= not_term ( ( AND | NOT ) not_term )*
/// not_term ::= NOT not_term | primary
/// primary  ::= pattern | '(' expr ')'
/// ```
///
/// Trees deeper than [`MAX_DEPTH`] are rejected with
/// [`ParseErrorReason::TooDeep`], so walking a parsed tree never exhausts
/// the stack.
pub fn parse(tokens: &[Spanned]) -> Result<Expr, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::new(0, ParseErrorReason::EmptyExpression));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };
    let (expr, _) = parser.parse_or_term()?;

    match parser.peek() {
        None => Ok(expr),
        Some(Spanned {
            token: Token::RParen,
            offset,
            ..
        }) => Err(ParseError::new(*offset, ParseErrorReason::UnmatchedParen)),
        Some(spanned) => Err(unexpected(spanned, "an operator or end of expression")),
    }
}

/// A subtree together with its depth
type Parsed = (Expr, usize);

struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    /// Open parentheses and prefix `NOT`s around the current position
    nesting: usize,
}

impl<'t> Parser<'t> {
    fn parse_or_term(&mut self) -> Result<Parsed, ParseError> {
        let (mut acc, mut depth) = self.parse_and_term()?;
        while let Some(at) = self.accept(&Token::Or) {
            let (rhs, rhs_depth) = self.parse_and_term()?;
            depth = grow(depth.max(rhs_depth), at)?;
            acc = Node::or(acc, rhs);
        }
        Ok((acc, depth))
    }

    fn parse_and_term(&mut self) -> Result<Parsed, ParseError> {
        let (mut acc, mut depth) = self.parse_not_term()?;
        loop {
            if let Some(at) = self.accept(&Token::And) {
                let (rhs, rhs_depth) = self.parse_not_term()?;
                depth = grow(depth.max(rhs_depth), at)?;
                acc = Node::and(acc, rhs);
            } else if let Some(at) = self.accept(&Token::Not) {
                let (rhs, rhs_depth) = self.parse_not_term()?;
                depth = grow(depth.max(grow(rhs_depth, at)?), at)?;
                acc = Node::and(acc, Node::not(rhs));
            } else {
                return Ok((acc, depth));
            }
        }
    }

    fn parse_not_term(&mut self) -> Result<Parsed, ParseError> {
        if let Some(at) = self.accept(&Token::Not) {
            self.enter(at)?;
            let (operand, depth) = self.parse_not_term()?;
            self.nesting -= 1;
            return Ok((Node::not(operand), grow(depth, at)?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Parsed, ParseError> {
        let Some(current) = self.peek() else {
            return Err(self.missing_operand_or(|end| {
                ParseError::new(
                    end,
                    ParseErrorReason::UnexpectedEnd {
                        expected: "a pattern or '('",
                    },
                )
            }));
        };

        match &current.token {
            Token::Pattern(text) => {
                if text.is_empty() {
                    return Err(ParseError::new(
                        current.offset,
                        ParseErrorReason::EmptyPattern,
                    ));
                }
                self.pos += 1;
                Ok((Node::Pattern(text.clone()), 1))
            }
            Token::LParen => {
                let open = current.offset;
                self.enter(open)?;
                self.pos += 1;
                let inner = self.parse_or_term()?;
                self.nesting -= 1;
                match self.peek() {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    None => Err(ParseError::new(open, ParseErrorReason::UnclosedParen)),
                    Some(spanned) => Err(unexpected(spanned, "an operator or ')'")),
                }
            }
            // A binary operator where an operand belongs
            Token::And | Token::Or => Err(ParseError::new(
                current.offset,
                ParseErrorReason::MissingOperand {
                    operator: current.token.label(),
                },
            )),
            Token::RParen => {
                let found = unexpected(current, "a pattern or '('");
                Err(self.missing_operand_or(|_| found))
            }
            Token::Not => self.parse_not_term(),
        }
    }

    /// Step one level deeper into parentheses or prefix `NOT`
    fn enter(&mut self, at: usize) -> Result<(), ParseError> {
        if self.nesting >= MAX_DEPTH {
            return Err(ParseError::new(at, ParseErrorReason::TooDeep { limit: MAX_DEPTH }));
        }
        self.nesting += 1;
        Ok(())
    }

    /// When an operand is absent, blame the operator just consumed if there is one
    fn missing_operand_or(&self, otherwise: impl FnOnce(usize) -> ParseError) -> ParseError {
        let end = self.tokens.last().map(|t| t.end).unwrap_or(0);
        match self.pos.checked_sub(1).map(|idx| &self.tokens[idx]) {
            Some(prev) if matches!(prev.token, Token::And | Token::Or | Token::Not) => {
                ParseError::new(
                    prev.offset,
                    ParseErrorReason::MissingOperand {
                        operator: prev.token.label(),
                    },
                )
            }
            _ => otherwise(end),
        }
    }

    fn peek(&self) -> Option<&'t Spanned> {
        self.tokens.get(self.pos)
    }

    /// Consume `expected` if it is next, returning its offset
    fn accept(&mut self, expected: &Token) -> Option<usize> {
        match self.peek() {
            Some(spanned) if &spanned.token == expected => {
                self.pos += 1;
                Some(spanned.offset)
            }
            _ => None,
        }
    }
}

/// Depth of a node whose deepest child has depth `child`
fn grow(child: usize, at: usize) -> Result<usize, ParseError> {
    let depth = child + 1;
    if depth > MAX_DEPTH {
        return Err(ParseError::new(at, ParseErrorReason::TooDeep { limit: MAX_DEPTH }));
    }
    Ok(depth)
}

fn unexpected(spanned: &Spanned, expected: &'static str) -> ParseError {
    ParseError::new(
        spanned.offset,
        ParseErrorReason::UnexpectedToken {
            found: spanned.token.to_string(),
            expected,
        },
    )
}
