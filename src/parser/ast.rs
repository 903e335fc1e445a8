//! The tree a template parses into. Nodes own their children outright.
use core::fmt;

use crate::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// `+` and `-`, the loosest binding level
    pub(crate) fn additive(token: &Token) -> Option<Self> {
        match token {
            Token::Plus => Some(Self::Add),
            Token::Minus => Some(Self::Sub),
            _ => None,
        }
    }

    /// `*` and `/`
    pub(crate) fn multiplicative(token: &Token) -> Option<Self> {
        match token {
            Token::Star => Some(Self::Mul),
            Token::Slash => Some(Self::Div),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Statements in order. Template roots and block bodies are always sequences.
    Sequence(Vec<Node>),
    /// Literal text, printed as is
    Text(Box<str>),
    /// `[% expr %]`
    Print(Box<Node>),
    Integer(i64),
    Nil,
    Variable(Box<str>),
    Array(Vec<Node>),
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// `[% if condition %] body [% end %]`, there is no else branch
    If {
        condition: Box<Node>,
        body: Box<Node>,
    },
    /// `[% for variable in iterable %] body [% end %]`
    For {
        variable: Box<str>,
        iterable: Box<Node>,
        body: Box<Node>,
    },
}

impl Node {
    pub(crate) fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// The statements of a sequence, or `None` for any other node
    pub fn statements(&self) -> Option<&[Node]> {
        match self {
            Self::Sequence(nodes) => Some(nodes),
            _ => None,
        }
    }
}
