//! Parsing picks up where the lexer left off: a single left-to-right pass over the
//! tokens, building an [`ast::Node`] tree whose root is always a [`Node::Sequence`].
//!
//! ```text
//! sequence  := (TEXT | expr_part)*
//! expr_part := "[%" ( "if" additive "%]" body
//!                   | "for" IDENT "in" additive "%]" body
//!                   | additive "%]" )
//! body      := sequence "[%" "end" "%]"
//! additive  := term (("+" | "-") term)*
//! term      := primary (("*" | "/") primary)*
//! primary   := INT | "nil" | IDENT | "[" (primary ("," primary)*)? ","? "]"
//! ```
use core::fmt;

use tracing::trace;

use crate::lexer::Token;

pub mod ast;

use ast::{BinaryOp, Node};

/// What the parser was looking for when it gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expected {
    Statement,
    Primary,
    Close,
    In,
    LoopVariable,
    ArrayDelimiter,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Statement => write!(f, "text or `[%`"),
            Expected::Primary => write!(f, "a value"),
            Expected::Close => write!(f, "`%]`"),
            Expected::In => write!(f, "`in`"),
            Expected::LoopVariable => write!(f, "a loop variable"),
            Expected::ArrayDelimiter => write!(f, "`,` or `]`"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    If,
    For,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::If => write!(f, "if"),
            BlockKind::For => write!(f, "for"),
        }
    }
}

struct Found<'a>(&'a Option<Token>);

impl fmt::Display for Found<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(token) => write!(f, "`{token}`"),
            None => write!(f, "end of input"),
        }
    }
}

/// Positions are token indices; `found: None` means the tokens ran out.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("expected {expected}, found {} at token {position}", Found(.found))]
    Unexpected {
        position: usize,
        expected: Expected,
        found: Option<Token>,
    },
    #[error("missing expression after `[%` at token {position}")]
    MissingExpression {
        position: usize,
        found: Option<Token>,
    },
    #[error("unterminated array literal starting at token {position}")]
    UnterminatedArray { position: usize },
    #[error("`{kind}` block starting at token {position} is missing `[% end %]`")]
    UnterminatedBlock { kind: BlockKind, position: usize },
    #[error("integer literal `{literal}` at token {position} does not fit in 64 bits")]
    IntegerTooBig { position: usize, literal: Box<str> },
    #[error("blocks and arrays nest more than {} levels deep at token {position}", MAX_DEPTH)]
    TooDeep { position: usize },
}

impl SyntaxError {
    /// Index of the token the error points at (may be one past the last token)
    pub fn position(&self) -> usize {
        match self {
            Self::Unexpected { position, .. }
            | Self::MissingExpression { position, .. }
            | Self::UnterminatedArray { position }
            | Self::UnterminatedBlock { position, .. }
            | Self::IntegerTooBig { position, .. }
            | Self::TooDeep { position } => *position,
        }
    }
}

/// How many blocks and array literals may enclose each other
pub const MAX_DEPTH: usize = 256;

pub fn parse(tokens: &[Token]) -> Result<Node, SyntaxError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let statements = parser.parse_sequence(None)?;
    trace!(statements = statements.len(), "parsed template");
    Ok(Node::Sequence(statements))
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    /// Blocks and arrays currently open
    depth: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Runs `f` one nesting level deeper. Parsing and compiling recurse per level,
    /// so the depth is capped.
    fn nested<T>(
        &mut self,
        position: usize,
        f: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_DEPTH {
            return Err(SyntaxError::TooDeep { position });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: Expected) -> SyntaxError {
        SyntaxError::Unexpected {
            position: self.pos,
            expected,
            found: self.peek().cloned(),
        }
    }

    fn expect_close(&mut self) -> Result<(), SyntaxError> {
        if self.eat(&Token::Close) {
            Ok(())
        } else {
            Err(self.unexpected(Expected::Close))
        }
    }

    // `[% end %]` is the only place the parser looks more than one token ahead
    fn eat_end_marker(&mut self) -> bool {
        match self.tokens.get(self.pos..self.pos + 3) {
            Some([Token::Open, Token::End, Token::Close]) => {
                self.pos += 3;
                true
            }
            _ => false,
        }
    }

    /// Inside a block (`block` is `Some`) the sequence must end at a matching `[% end %]`;
    /// at the top level it ends with the tokens.
    fn parse_sequence(
        &mut self,
        block: Option<(BlockKind, usize)>,
    ) -> Result<Vec<Node>, SyntaxError> {
        let mut statements = vec![];
        loop {
            match self.peek() {
                None => {
                    return match block {
                        None => Ok(statements),
                        Some((kind, position)) => {
                            Err(SyntaxError::UnterminatedBlock { kind, position })
                        }
                    }
                }
                Some(Token::Text(text)) => {
                    self.pos += 1;
                    statements.push(Node::Text(text.clone()));
                }
                Some(Token::Open) => {
                    if block.is_some() && self.eat_end_marker() {
                        return Ok(statements);
                    }
                    statements.push(self.parse_expr_part()?);
                }
                Some(_) => return Err(self.unexpected(Expected::Statement)),
            }
        }
    }

    fn parse_expr_part(&mut self) -> Result<Node, SyntaxError> {
        let open = self.pos;
        self.bump();

        match self.peek() {
            None | Some(Token::Close) => Err(SyntaxError::MissingExpression {
                position: self.pos,
                found: self.peek().cloned(),
            }),
            Some(Token::If) => {
                self.pos += 1;
                let condition = self.parse_additive()?;
                self.expect_close()?;
                let body = self.nested(open, |p| p.parse_sequence(Some((BlockKind::If, open))))?;
                Ok(Node::If {
                    condition: Box::new(condition),
                    body: Box::new(Node::Sequence(body)),
                })
            }
            Some(Token::For) => {
                self.pos += 1;
                let variable = match self.peek() {
                    Some(Token::Identifier(name)) => {
                        self.pos += 1;
                        name.clone()
                    }
                    _ => return Err(self.unexpected(Expected::LoopVariable)),
                };
                if !self.eat(&Token::In) {
                    return Err(self.unexpected(Expected::In));
                }
                let iterable = self.parse_additive()?;
                self.expect_close()?;
                let body = self.nested(open, |p| p.parse_sequence(Some((BlockKind::For, open))))?;
                Ok(Node::For {
                    variable,
                    iterable: Box::new(iterable),
                    body: Box::new(Node::Sequence(body)),
                })
            }
            Some(_) => {
                let expr = self.parse_additive()?;
                self.expect_close()?;
                Ok(Node::Print(Box::new(expr)))
            }
        }
    }

    fn parse_additive(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_term()?;
        while let Some(op) = self.peek().and_then(BinaryOp::additive) {
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Node::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_primary()?;
        while let Some(op) = self.peek().and_then(BinaryOp::multiplicative) {
            self.pos += 1;
            let rhs = self.parse_primary()?;
            lhs = Node::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Node, SyntaxError> {
        let position = self.pos;
        match self.peek() {
            Some(Token::Integer(digits)) => {
                self.pos += 1;
                digits
                    .parse()
                    .map(Node::Integer)
                    .map_err(|_| SyntaxError::IntegerTooBig {
                        position,
                        literal: digits.clone(),
                    })
            }
            Some(Token::Nil) => {
                self.pos += 1;
                Ok(Node::Nil)
            }
            Some(Token::Identifier(name)) => {
                self.pos += 1;
                Ok(Node::Variable(name.clone()))
            }
            Some(Token::LBracket) => self.nested(position, Self::parse_array),
            _ => Err(self.unexpected(Expected::Primary)),
        }
    }

    fn parse_array(&mut self) -> Result<Node, SyntaxError> {
        let start = self.pos;
        self.bump();

        let mut elements = vec![];
        loop {
            match self.peek() {
                None => return Err(SyntaxError::UnterminatedArray { position: start }),
                Some(Token::RBracket) => {
                    self.pos += 1;
                    return Ok(Node::Array(elements));
                }
                Some(_) => {}
            }

            elements.push(self.parse_primary()?);

            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RBracket) => {}
                None => return Err(SyntaxError::UnterminatedArray { position: start }),
                Some(_) => return Err(self.unexpected(Expected::ArrayDelimiter)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ast::{BinaryOp, Node},
        parse, BlockKind, Expected, SyntaxError,
    };
    use crate::lexer::{scan, Token};
    use assert2::{check, let_assert};

    fn parse_str(source: &str) -> Result<Node, SyntaxError> {
        parse(&scan(source).unwrap())
    }

    fn int(value: i64) -> Node {
        Node::Integer(value)
    }

    #[test]
    fn text_only() {
        check!(parse_str("hello").unwrap() == Node::Sequence(vec![Node::Text(Box::from("hello"))]));
        check!(parse_str("").unwrap() == Node::Sequence(vec![]));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let_assert!(Ok(Node::Sequence(statements)) = parse_str("[% 3-2-4 %]"));
        let_assert!([Node::Print(expr)] = statements.as_slice());
        check!(
            **expr
                == Node::binary(
                    BinaryOp::Sub,
                    Node::binary(BinaryOp::Sub, int(3), int(2)),
                    int(4)
                )
        );
    }

    #[test]
    fn multiplication_binds_tighter() {
        let_assert!(Ok(Node::Sequence(statements)) = parse_str("[% 1+2*3-8/4 %]"));
        let_assert!([Node::Print(expr)] = statements.as_slice());
        check!(
            **expr
                == Node::binary(
                    BinaryOp::Sub,
                    Node::binary(
                        BinaryOp::Add,
                        int(1),
                        Node::binary(BinaryOp::Mul, int(2), int(3))
                    ),
                    Node::binary(BinaryOp::Div, int(8), int(4)),
                )
        );
    }

    #[test]
    fn arrays() {
        let_assert!(Ok(Node::Sequence(statements)) = parse_str("[% [] %][% [1,] %][% [x, [nil]] %]"));
        check!(
            statements
                == [
                    Node::Print(Box::new(Node::Array(vec![]))),
                    Node::Print(Box::new(Node::Array(vec![int(1)]))),
                    Node::Print(Box::new(Node::Array(vec![
                        Node::Variable(Box::from("x")),
                        Node::Array(vec![Node::Nil]),
                    ]))),
                ]
        );
    }

    #[test]
    fn nested_blocks() {
        let_assert!(
            Ok(Node::Sequence(statements)) =
                parse_str("[% for i in xs %]<[% if i %]y[% end %]>[% end %]!")
        );
        let_assert!([Node::For { variable, iterable, body }, Node::Text(bang)] = statements.as_slice());
        check!(variable.as_ref() == "i");
        check!(**iterable == Node::Variable(Box::from("xs")));
        check!(bang.as_ref() == "!");
        let_assert!(Some([Node::Text(lt), Node::If { condition, body }, Node::Text(gt)]) = body.statements());
        check!(lt.as_ref() == "<");
        check!(gt.as_ref() == ">");
        check!(**condition == Node::Variable(Box::from("i")));
        let_assert!(Some([Node::Text(y)]) = body.statements());
        check!(y.as_ref() == "y");
    }

    #[test]
    fn missing_primary_after_operator() {
        let_assert!(Err(err) = parse_str("[% 3+ %]"));
        check!(
            err == SyntaxError::Unexpected {
                position: 3,
                expected: Expected::Primary,
                found: Some(Token::Close),
            }
        );
        check!(err.to_string() == "expected a value, found `%]` at token 3");
    }

    #[test]
    fn unterminated_block() {
        check!(
            parse_str("[% if 1 %]e")
                == Err(SyntaxError::UnterminatedBlock {
                    kind: BlockKind::If,
                    position: 0
                })
        );
        check!(
            parse_str("x[% for i in [] %][% if 1 %][% end %]")
                == Err(SyntaxError::UnterminatedBlock {
                    kind: BlockKind::For,
                    position: 1
                })
        );
    }

    #[test]
    fn stray_end_is_rejected() {
        let_assert!(Err(SyntaxError::Unexpected { expected, found, .. }) = parse_str("[% end %]"));
        check!(expected == Expected::Primary);
        check!(found == Some(Token::End));
    }

    #[test]
    fn missing_close_and_expression() {
        check!(
            parse_str("[% 1 2 %]")
                == Err(SyntaxError::Unexpected {
                    position: 2,
                    expected: Expected::Close,
                    found: Some(Token::Integer(Box::from("2"))),
                })
        );
        check!(
            parse_str("[% 1")
                == Err(SyntaxError::Unexpected {
                    position: 2,
                    expected: Expected::Close,
                    found: None,
                })
        );
        check!(
            parse_str("a[% %]")
                == Err(SyntaxError::MissingExpression {
                    position: 2,
                    found: Some(Token::Close),
                })
        );
        check!(
            parse_str("[%")
                == Err(SyntaxError::MissingExpression {
                    position: 1,
                    found: None,
                })
        );
    }

    #[test]
    fn malformed_loops() {
        let_assert!(Err(SyntaxError::Unexpected { expected, .. }) = parse_str("[% for 1 in x %][% end %]"));
        check!(expected == Expected::LoopVariable);
        let_assert!(Err(SyntaxError::Unexpected { expected, .. }) = parse_str("[% for i x %][% end %]"));
        check!(expected == Expected::In);
    }

    #[test]
    fn malformed_arrays() {
        check!(parse_str("[% [1, 2") == Err(SyntaxError::UnterminatedArray { position: 1 }));
        check!(parse_str("[% [") == Err(SyntaxError::UnterminatedArray { position: 1 }));
        let_assert!(Err(SyntaxError::Unexpected { expected, .. }) = parse_str("[% [1 2] %]"));
        check!(expected == Expected::ArrayDelimiter);
        let_assert!(Err(SyntaxError::Unexpected { expected, .. }) = parse_str("[% [,] %]"));
        check!(expected == Expected::Primary);
        // elements are primaries, not full expressions
        let_assert!(Err(SyntaxError::Unexpected { expected, .. }) = parse_str("[% [1+2] %]"));
        check!(expected == Expected::ArrayDelimiter);
    }

    #[test]
    fn integer_overflow() {
        let_assert!(Err(SyntaxError::IntegerTooBig { literal, .. }) = parse_str("[% 99999999999999999999 %]"));
        check!(literal.as_ref() == "99999999999999999999");
    }

    #[test]
    fn nesting_is_capped() {
        let depth = super::MAX_DEPTH;
        let blocks = |n: usize| format!("{}x{}", "[% if 1 %]".repeat(n), "[% end %]".repeat(n));
        check!(parse_str(&blocks(depth)).is_ok());
        // each opening `[% if 1 %]` is four tokens
        check!(parse_str(&blocks(1000)) == Err(SyntaxError::TooDeep { position: 4 * depth }));

        let arrays = |n: usize| format!("[% {}1{} %]", "[".repeat(n), "]".repeat(n));
        check!(parse_str(&arrays(depth)).is_ok());
        check!(parse_str(&arrays(5000)) == Err(SyntaxError::TooDeep { position: depth + 1 }));
    }

    #[test]
    fn stray_token_at_statement_position() {
        check!(
            parse(&[Token::Comma])
                == Err(SyntaxError::Unexpected {
                    position: 0,
                    expected: Expected::Statement,
                    found: Some(Token::Comma),
                })
        );
    }
}
