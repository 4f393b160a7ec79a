//! Cypher-inspired query language for Kubernetes resource graphs: lexer,
//! recursive-descent parser, AST, and a canonical formatter.

mod ast;
mod format;
mod lexer;
mod parser;
mod token;

pub use ast::*;
pub use format::format_expression;
pub use lexer::Lexer;
pub use parser::parse;
pub use token::{Token, TokenKind};

use thiserror::Error;

/// A lexing or parsing failure, positioned at the offending token. The
/// input is never partially consumed: a statement either parses into an
/// [`Expression`] or fails as a whole.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error at {span}: {message}")]
    Syntax { span: Span, message: String },
    #[error("unexpected {found} at {span}, expected {expected}")]
    Unexpected {
        span: Span,
        found: String,
        expected: String,
    },
    #[error("unknown variable `{name}` at {span}")]
    UnknownVariable { span: Span, name: String },
    #[error("variable `{name}` is defined twice at {span}")]
    DuplicateVariable { span: Span, name: String },
    #[error("adjacent kindless nodes at {span}")]
    KindlessChain { span: Span },
    #[error("kindless node `{name}` at {span} is not part of any relationship")]
    DanglingKindless { span: Span, name: String },
    #[error("invalid sub-match at {span}: {message}")]
    InvalidSubMatch { span: Span, message: String },
    #[error("array index at {span} must be a non-negative integer or `*`")]
    InvalidIndex { span: Span },
    #[error("{clause} at {span} requires a preceding MATCH")]
    MissingMatch { span: Span, clause: String },
    #[error("RETURN must be the final clause (at {span})")]
    ReturnNotLast { span: Span },
}

/// True when the input holds nothing but whitespace and `//` comments.
/// The CLI treats such input as an empty statement rather than an error.
pub fn is_blank(input: &str) -> bool {
    Lexer::tokenize(input)
        .iter()
        .all(|t| t.kind == TokenKind::Eof)
}
