use super::error::LexError;
use super::table::PatternTable;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// A lexical unit of a filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Regex source taken from between a pair of double quotes, escapes resolved
    Pattern(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl Token {
    /// Short description used in parse errors
    pub fn label(&self) -> &'static str {
        match self {
            Token::Pattern(_) => "pattern",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::LParen => "'('",
            Token::RParen => "')'",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Pattern(text) => write!(f, "pattern \"{text}\""),
            Token::And => f.write_str("AND"),
            Token::Or => f.write_str("OR"),
            Token::Not => f.write_str("NOT"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

/// A token together with the byte range it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
    pub end: usize,
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub(crate) fn is_keyword(word: &str) -> bool {
    keyword(word).is_some()
}

fn keyword(word: &str) -> Option<Token> {
    if word.eq_ignore_ascii_case("and") {
        Some(Token::And)
    } else if word.eq_ignore_ascii_case("or") {
        Some(Token::Or)
    } else if word.eq_ignore_ascii_case("not") {
        Some(Token::Not)
    } else {
        None
    }
}

/// Split `expression` into tokens
///
/// Bare words other than the keywords are rejected; see [`tokenize_with`] to
/// resolve them against named patterns.
pub fn tokenize(expression: &str) -> Result<Vec<Spanned>, LexError> {
    tokenize_with(expression, &PatternTable::default())
}

/// Split `expression` into tokens, resolving bare words through `table`
pub fn tokenize_with(expression: &str, table: &PatternTable) -> Result<Vec<Spanned>, LexError> {
    let mut lexer = Lexer {
        input: expression,
        chars: expression.char_indices().peekable(),
        table,
    };
    let mut tokens = Vec::new();
    while let Some(spanned) = lexer.next_token()? {
        tokens.push(spanned);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    table: &'a PatternTable,
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Spanned>, LexError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((offset, c)) = self.chars.next() else {
            return Ok(None);
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '"' => Token::Pattern(self.literal(offset)?),
            c if is_word_char(c) => self.word(offset)?,
            ch => return Err(LexError::UnexpectedChar { position: offset, ch }),
        };

        let end = self
            .chars
            .peek()
            .map(|&(idx, _)| idx)
            .unwrap_or(self.input.len());
        Ok(Some(Spanned { token, offset, end }))
    }

    /// Consume a quoted literal whose opening quote sits at `start`
    fn literal(&mut self, start: usize) -> Result<String, LexError> {
        let mut text = String::new();
        loop {
            match self.chars.next() {
                None => return Err(LexError::UnterminatedLiteral { position: start }),
                Some((_, '"')) => return Ok(text),
                Some((_, '\\')) => match self.chars.next() {
                    None => return Err(LexError::UnterminatedLiteral { position: start }),
                    Some((_, '"')) => text.push('"'),
                    Some((_, '\\')) => text.push('\\'),
                    // Regex escapes such as `\.` pass through untouched
                    Some((_, other)) => {
                        text.push('\\');
                        text.push(other);
                    }
                },
                Some((_, c)) => text.push(c),
            }
        }
    }

    fn word(&mut self, start: usize) -> Result<Token, LexError> {
        let mut end = self.input.len();
        while let Some(&(idx, c)) = self.chars.peek() {
            if !is_word_char(c) {
                end = idx;
                break;
            }
            self.chars.next();
        }
        let word = &self.input[start..end];

        if let Some(token) = keyword(word) {
            return Ok(token);
        }
        match self.table.get(word) {
            Some(pattern) => Ok(Token::Pattern(pattern.to_string())),
            None => Err(LexError::UnknownWord {
                position: start,
                word: word.to_string(),
            }),
        }
    }
}
