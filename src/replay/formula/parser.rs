// SPDX-License-Identifier: MIT

//! Formula parser
//!
//! Grammar:
//! - `formula := IDENT | call`
//! - `call    := IDENT '(' [arg (',' arg)*] ')'`
//! - `arg     := IDENT | STRING | NUMBER | call`

use super::ast::{Expr, Literal};
use super::lexer::{tokenize, Token, TokenKind};
use crate::runtime::error::FormulaError;

/// Parse a formula string into an AST
pub fn parse(input: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };

    let expr = parser.parse_expr()?;
    if let Some(token) = parser.peek() {
        return Err(FormulaError::UnexpectedToken {
            expected: "end of formula".to_string(),
            found: token.kind.to_string(),
        });
    }

    match expr {
        Expr::Literal(lit) => Err(FormulaError::NotAnExpression(format!("{:?}", lit))),
        other => Ok(other),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        let token = self.next().ok_or_else(|| FormulaError::UnexpectedToken {
            expected: "field, literal or function call".to_string(),
            found: "end of formula".to_string(),
        })?;

        match token.kind {
            TokenKind::Ident(name) => {
                if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::LParen)) {
                    self.pos += 1;
                    let args = self.parse_args()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Field(name))
                }
            }
            TokenKind::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            TokenKind::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            other => Err(FormulaError::UnexpectedToken {
                expected: "field, literal or function call".to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Arguments after the opening parenthesis, through the closing one
    fn parse_args(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = Vec::new();

        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::RParen)) {
            self.pos += 1;
            return Ok(args);
        }

        loop {
            args.push(self.parse_expr()?);

            match self.next().map(|t| t.kind) {
                Some(TokenKind::Comma) => continue,
                Some(TokenKind::RParen) => return Ok(args),
                Some(other) => {
                    return Err(FormulaError::UnexpectedToken {
                        expected: "',' or ')'".to_string(),
                        found: other.to_string(),
                    })
                }
                None => {
                    return Err(FormulaError::UnexpectedToken {
                        expected: "',' or ')'".to_string(),
                        found: "end of formula".to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: &str) -> Expr {
        Expr::Field(id.to_string())
    }

    #[test]
    fn test_parse_bare_identifier() {
        assert_eq!(parse("  total "), Ok(field("total")));
    }

    #[test]
    fn test_parse_call_with_mixed_args() {
        let expr = parse(r#"concat(first, " ", 'x', 3)"#).unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                name: "concat".to_string(),
                args: vec![
                    field("first"),
                    Expr::Literal(Literal::String(" ".to_string())),
                    Expr::Literal(Literal::String("x".to_string())),
                    Expr::Literal(Literal::Number(3.0)),
                ],
            }
        );
    }

    #[test]
    fn test_parse_nested_call() {
        let expr = parse("round(sum(1.005, 2), 2)").unwrap();
        match expr {
            Expr::Call { name, args } => {
                assert_eq!(name, "round");
                assert_eq!(args.len(), 2);
                assert!(matches!(&args[0], Expr::Call { name, .. } if name == "sum"));
            }
            _ => panic!("Expected Call expression"),
        }
    }

    #[test]
    fn test_parse_empty_call() {
        assert_eq!(
            parse("concat()"),
            Ok(Expr::Call {
                name: "concat".to_string(),
                args: vec![]
            })
        );
    }

    #[test]
    fn test_parse_rejects_top_level_literal() {
        assert!(matches!(
            parse("'hello'"),
            Err(FormulaError::NotAnExpression(_))
        ));
    }

    #[test]
    fn test_parse_rejects_trailing_tokens() {
        assert!(parse("a b").is_err());
        assert!(parse("sum(a))").is_err());
    }

    #[test]
    fn test_parse_rejects_unclosed_call() {
        assert!(parse("sum(a, b").is_err());
        assert!(parse("sum(a,)").is_err());
        assert!(parse("sum(,a)").is_err());
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse("").is_err());
    }
}
