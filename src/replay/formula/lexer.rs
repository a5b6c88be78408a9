// SPDX-License-Identifier: MIT

//! Tokenizer for formula strings
//!
//! Produces identifier, string, number and punctuation tokens. Quoting is
//! resolved here, so a comma inside `'a,b'` never reaches the parser as a
//! separator.

use crate::runtime::error::FormulaError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Number(f64),
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset in the source
    pub offset: usize,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier '{}'", s),
            TokenKind::Str(s) => write!(f, "string {:?}", s),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
        }
    }
}

/// Split a formula into tokens
pub fn tokenize(input: &str) -> Result<Vec<Token>, FormulaError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let kind = match c {
            '(' => {
                i += 1;
                TokenKind::LParen
            }
            ')' => {
                i += 1;
                TokenKind::RParen
            }
            ',' => {
                i += 1;
                TokenKind::Comma
            }
            '\'' | '"' => {
                let (text, next) = read_string(&chars, i, c)?;
                i = next;
                TokenKind::Str(text)
            }
            _ if starts_number(&chars, i) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|(_, ch)| ch).collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber(text.clone()))?;
                TokenKind::Number(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '.')
                {
                    i += 1;
                }
                TokenKind::Ident(chars[start..i].iter().map(|(_, ch)| ch).collect())
            }
            other => {
                return Err(FormulaError::UnexpectedChar { ch: other, offset });
            }
        };

        tokens.push(Token { kind, offset });
    }

    Ok(tokens)
}

/// Digits, a leading dot, or a sign directly followed by either
fn starts_number(chars: &[(usize, char)], i: usize) -> bool {
    let is_body = |idx: usize| {
        chars
            .get(idx)
            .is_some_and(|(_, ch)| ch.is_ascii_digit() || *ch == '.')
    };
    match chars[i].1 {
        '-' | '+' => is_body(i + 1),
        _ => is_body(i),
    }
}

/// Read a quoted string starting at `start`; returns the text and the index after the closing quote
fn read_string(
    chars: &[(usize, char)],
    start: usize,
    quote: char,
) -> Result<(String, usize), FormulaError> {
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i].1;
        if c == '\\' {
            if let Some(&(_, next)) = chars.get(i + 1) {
                if next == quote || next == '\\' {
                    text.push(next);
                    i += 2;
                    continue;
                }
            }
            text.push(c);
            i += 1;
        } else if c == quote {
            return Ok((text, i + 1));
        } else {
            text.push(c);
            i += 1;
        }
    }

    Err(FormulaError::UnterminatedString(chars[start].0))
}
