//! Lexer for criteria strings using logos.

use logos::Logos;

use super::error::{ParseError, Span};

/// Token types of the criteria language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Logical operators
    #[token("and", ignore(ascii_case))]
    And,
    #[token("or", ignore(ascii_case))]
    Or,
    #[token("not", ignore(ascii_case))]
    Not,

    // Keyword operators
    #[token("like", ignore(ascii_case))]
    Like,
    #[token("is", ignore(ascii_case))]
    Is,
    #[token("in", ignore(ascii_case))]
    In,

    // Literals
    #[token("null", ignore(ascii_case))]
    Null,
    #[token("true", ignore(ascii_case))]
    True,
    #[token("false", ignore(ascii_case))]
    False,

    // Comparison operators
    #[token("=")]
    Eq,
    #[token("<>")]
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    /// Property path or bare word (`Car.Owner.Surname`, `Smith`).
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*", |lex| lex.slice().to_string())]
    Ident(String),

    /// Quoted string; the quote character is escaped by doubling it.
    #[regex(r#""([^"]|"")*""#, |lex| unquote(lex.slice(), '"'))]
    #[regex(r#"'([^']|'')*'"#, |lex| unquote(lex.slice(), '\''))]
    String(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    // Punctuation
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

/// Strip the surrounding quotes and collapse doubled quote characters.
fn unquote(slice: &str, quote: char) -> String {
    let inner = &slice[1..slice.len() - 1];
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Lexer that produces spanned tokens and reports unrecognised input.
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    peeked: Option<Option<SpannedToken>>,
}

impl<'source> Lexer<'source> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            peeked: None,
        }
    }

    /// Peek at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<&SpannedToken>, ParseError> {
        if self.peeked.is_none() {
            let next = self.next_inner()?;
            self.peeked = Some(next);
        }
        Ok(self.peeked.as_ref().and_then(|o| o.as_ref()))
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, ParseError> {
        match self.peeked.take() {
            Some(peeked) => Ok(peeked),
            None => self.next_inner(),
        }
    }

    fn next_inner(&mut self) -> Result<Option<SpannedToken>, ParseError> {
        match self.inner.next() {
            Some(Ok(token)) => Ok(Some(SpannedToken {
                token,
                span: self.inner.span().into(),
            })),
            Some(Err(())) => Err(ParseError::new(
                format!("unrecognised input '{}'", self.inner.slice()),
                self.inner.span().into(),
            )),
            None => Ok(None),
        }
    }

    /// Get the source string.
    pub fn source(&self) -> &'source str {
        self.inner.source()
    }
}

/// Tokenize a source string into a vector of spanned tokens.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}
