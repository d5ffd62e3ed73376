//! Recursive descent parser for criteria strings.
//!
//! ```text
//! expr   := term (OR term)*
//! term   := factor (AND factor)*
//! factor := '(' expr ')' | path op value
//! ```

use ormap_proto::Value;

use super::criteria::{ComparisonOp, Criteria};
use super::error::{ParseError, Span};
use super::field::QueryField;
use super::lexer::{Lexer, SpannedToken, Token};

/// Parser for criteria strings.
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    source: &'source str,
}

impl<'source> Parser<'source> {
    /// Create a new parser for the given source.
    pub fn new(source: &'source str) -> Self {
        Self {
            lexer: Lexer::new(source),
            source,
        }
    }

    /// Parse the whole input. Blank input yields `None`.
    pub fn parse_criteria(&mut self) -> Result<Option<Criteria>, ParseError> {
        if self.lexer.peek()?.is_none() {
            return Ok(None);
        }
        let criteria = self.parse_or()?;
        if let Some(tok) = self.lexer.next_token()? {
            return Err(ParseError::new(
                format!("unexpected {:?} after end of criteria", tok.token),
                tok.span,
            )
            .with_hint("join conditions with AND or OR"));
        }
        Ok(Some(criteria))
    }

    fn parse_or(&mut self) -> Result<Criteria, ParseError> {
        let mut left = self.parse_and()?;
        while self.peek_is(&Token::Or)? {
            self.next_token()?;
            let right = self.parse_and()?;
            left = Criteria::or(left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Criteria, ParseError> {
        let mut left = self.parse_factor()?;
        while self.peek_is(&Token::And)? {
            self.next_token()?;
            let right = self.parse_factor()?;
            left = Criteria::and(left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Criteria, ParseError> {
        if self.peek_is(&Token::LParen)? {
            self.next_token()?;
            let inner = self.parse_or()?;
            self.expect_token(Token::RParen)?;
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Criteria, ParseError> {
        let path = self.next_token()?;
        let field = match path.token {
            Token::Ident(name) => QueryField::from_path(&name),
            other => {
                return Err(ParseError::new(
                    format!("expected property name, found {:?}", other),
                    path.span,
                ))
            }
        };

        let op_tok = self.next_token()?;
        let op = match op_tok.token {
            Token::Eq => ComparisonOp::Equals,
            Token::Ne => ComparisonOp::NotEquals,
            Token::Gt => ComparisonOp::GreaterThan,
            Token::Ge => ComparisonOp::GreaterThanEqual,
            Token::Lt => ComparisonOp::LessThan,
            Token::Le => ComparisonOp::LessThanEqual,
            Token::Like => ComparisonOp::Like,
            Token::Not => {
                self.expect_token(Token::Like)?;
                ComparisonOp::NotLike
            }
            Token::Is => {
                let negated = self.peek_is(&Token::Not)?;
                if negated {
                    self.next_token()?;
                }
                self.expect_token(Token::Null)?;
                let op = if negated {
                    ComparisonOp::IsNot
                } else {
                    ComparisonOp::Is
                };
                return Ok(Criteria::for_field(field, op, Value::Null));
            }
            Token::In => {
                let values = self.parse_list()?;
                return Ok(Criteria::for_field(field, ComparisonOp::In, Value::List(values)));
            }
            other => {
                return Err(ParseError::new(
                    format!("expected comparison operator, found {:?}", other),
                    op_tok.span,
                )
                .with_hint("operators are =, <>, !=, <, <=, >, >=, LIKE, NOT LIKE, IS, IN"))
            }
        };

        let value = self.parse_value()?;
        Ok(Criteria::for_field(field, op, value))
    }

    /// Parse `(value, ...)`.
    fn parse_list(&mut self) -> Result<Vec<Value>, ParseError> {
        self.expect_token(Token::LParen)?;
        let mut values = Vec::new();
        if self.peek_is(&Token::RParen)? {
            self.next_token()?;
            return Ok(values);
        }
        values.push(self.parse_value()?);
        loop {
            let tok = self.next_token()?;
            match tok.token {
                Token::Comma => values.push(self.parse_value()?),
                Token::RParen => return Ok(values),
                other => {
                    return Err(ParseError::new(
                        format!("expected ',' or ')' in list, found {:?}", other),
                        tok.span,
                    ))
                }
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::String(s) | Token::Ident(s) => Ok(Value::String(s)),
            Token::Int(i) => Ok(i32::try_from(i).map(Value::Int32).unwrap_or(Value::Int64(i))),
            Token::Float(f) => Ok(Value::Float64(f)),
            Token::Null => Ok(Value::Null),
            Token::True => Ok(Value::Bool(true)),
            Token::False => Ok(Value::Bool(false)),
            other => Err(ParseError::new(
                format!("expected a value, found {:?}", other),
                tok.span,
            )),
        }
    }

    fn peek_is(&mut self, expected: &Token) -> Result<bool, ParseError> {
        Ok(self
            .lexer
            .peek()?
            .is_some_and(|tok| std::mem::discriminant(&tok.token) == std::mem::discriminant(expected)))
    }

    /// Expect and consume a specific token.
    fn expect_token(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if std::mem::discriminant(&tok.token) == std::mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {:?}, found {:?}", expected, tok.token),
                tok.span,
            ))
        }
    }

    /// Get the next token or error if EOF.
    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        self.lexer.next_token()?.ok_or_else(|| {
            ParseError::new(
                "unexpected end of input",
                Span::new(self.source.len(), self.source.len()),
            )
        })
    }
}

/// Parse a criteria string. Blank input yields `None`.
pub fn parse(source: &str) -> Result<Option<Criteria>, ParseError> {
    Parser::new(source).parse_criteria()
}
