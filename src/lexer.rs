//! Splits template source into tokens.
//!
//! Templates have two lexical modes: literal text, and expressions delimited by
//! `[%` and `%]`. Each mode is its own [`logos`] lexer, and the scanner morphs
//! one into the other whenever it crosses a delimiter.
use core::fmt;

pub use logos::Span;
use logos::{Lexer, Logos};
use tracing::trace;

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
pub enum ScanError {
    #[error("unrecognized token `{text}` in expression at {span:?}")]
    UnrecognizedToken { text: Box<str>, span: Span },
}

impl ScanError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnrecognizedToken { span, .. } => span.clone(),
        }
    }
}

/// Tokens own their payload, and carry no position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// A run of literal text outside of `[% %]`
    Text(Box<str>),
    /// `[%`
    Open,
    /// `%]`
    Close,
    If,
    For,
    In,
    End,
    Nil,
    /// Decimal digits, as written
    Integer(Box<str>),
    Identifier(Box<str>),
    LBracket,
    RBracket,
    Comma,
    Star,
    Plus,
    Slash,
    Minus,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Text(text) => write!(f, "{text:?}"),
            Token::Open => write!(f, "[%"),
            Token::Close => write!(f, "%]"),
            Token::If => write!(f, "if"),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::End => write!(f, "end"),
            Token::Nil => write!(f, "nil"),
            Token::Integer(digits) => write!(f, "{digits}"),
            Token::Identifier(name) => write!(f, "{name}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Star => write!(f, "*"),
            Token::Plus => write!(f, "+"),
            Token::Slash => write!(f, "/"),
            Token::Minus => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Logos)]
enum TextToken {
    #[token("[%")]
    Open,
    // A `[` that does not open an expression is just text
    #[regex(r"[^\[]+")]
    #[token("[")]
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Logos)]
#[logos(skip r"[ \t\r\n\f\x0B]+")]
enum ExprToken {
    #[token("%]")]
    Close,
    #[token("if")]
    If,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("end")]
    End,
    #[token("nil")]
    Nil,
    #[regex("0|[1-9][0-9]*")]
    Integer,
    #[regex("[a-z][a-z0-9]*")]
    Identifier,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("/")]
    Slash,
    #[token("-")]
    Minus,
}

impl ExprToken {
    fn into_token(self, slice: &str) -> Token {
        match self {
            ExprToken::Close => Token::Close,
            ExprToken::If => Token::If,
            ExprToken::For => Token::For,
            ExprToken::In => Token::In,
            ExprToken::End => Token::End,
            ExprToken::Nil => Token::Nil,
            ExprToken::Integer => Token::Integer(Box::from(slice)),
            ExprToken::Identifier => Token::Identifier(Box::from(slice)),
            ExprToken::LBracket => Token::LBracket,
            ExprToken::RBracket => Token::RBracket,
            ExprToken::Comma => Token::Comma,
            ExprToken::Star => Token::Star,
            ExprToken::Plus => Token::Plus,
            ExprToken::Slash => Token::Slash,
            ExprToken::Minus => Token::Minus,
        }
    }
}

enum Mode<'s> {
    Text(Lexer<'s, TextToken>),
    Expr(Lexer<'s, ExprToken>),
}

/// Streams spanned tokens out of a template, switching modes at `[%` and `%]`.
///
/// Stops after the first error.
pub struct Scanner<'s> {
    mode: Option<Mode<'s>>,
}

impl<'s> Scanner<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            mode: Some(Mode::Text(TextToken::lexer(source))),
        }
    }
}

impl<'s> Iterator for Scanner<'s> {
    type Item = Result<(Token, Span), ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.mode.take()? {
            Mode::Text(mut lexer) => {
                let token = lexer.next()?;
                let span = lexer.span();
                match token {
                    Ok(TextToken::Open) => {
                        trace!(?span, "entering expression");
                        self.mode = Some(Mode::Expr(lexer.morph()));
                        Some(Ok((Token::Open, span)))
                    }
                    Ok(TextToken::Literal) => {
                        let text = Box::from(lexer.slice());
                        self.mode = Some(Mode::Text(lexer));
                        Some(Ok((Token::Text(text), span)))
                    }
                    Err(()) => Some(Err(ScanError::UnrecognizedToken {
                        text: Box::from(lexer.slice()),
                        span,
                    })),
                }
            }
            Mode::Expr(mut lexer) => {
                let token = lexer.next()?;
                let span = lexer.span();
                match token {
                    Ok(ExprToken::Close) => {
                        trace!(?span, "leaving expression");
                        self.mode = Some(Mode::Text(lexer.morph()));
                        Some(Ok((Token::Close, span)))
                    }
                    Ok(token) => {
                        let token = token.into_token(lexer.slice());
                        self.mode = Some(Mode::Expr(lexer));
                        Some(Ok((token, span)))
                    }
                    Err(()) => Some(Err(ScanError::UnrecognizedToken {
                        text: Box::from(lexer.slice()),
                        span,
                    })),
                }
            }
        }
    }
}

/// Scans a template, keeping the byte span each token came from.
///
/// Adjacent runs of literal text are merged, so a lone `[` does not split the text around it.
pub fn scan_spanned(source: &str) -> Result<Vec<(Token, Span)>, ScanError> {
    let mut tokens: Vec<(Token, Span)> = vec![];
    for item in Scanner::new(source) {
        let (token, span) = item?;
        if let (Token::Text(_), Some((Token::Text(prev), prev_span))) = (&token, tokens.last_mut())
        {
            prev_span.end = span.end;
            *prev = Box::from(&source[prev_span.clone()]);
            continue;
        }
        tokens.push((token, span));
    }
    Ok(tokens)
}

pub fn scan(source: &str) -> Result<Vec<Token>, ScanError> {
    Ok(scan_spanned(source)?
        .into_iter()
        .map(|(token, _)| token)
        .collect())
}
