use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords, matched case-insensitively.
    Match,
    Create,
    Set,
    Delete,
    Return,
    Where,
    In,
    As,
    Contains,
    Not,
    And,
    Order,
    By,
    Limit,
    Skip,
    Desc,
    Asc,
    Count,
    Sum,
    True,
    False,
    Null,

    Ident,
    String,
    Int,
    Float,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Dot,
    Star,
    Plus,
    Minus,

    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    RegexMatch,

    // Relationship arrows. `RelOpen`/`RelCloseRight` bracket a typed
    // relationship going right, `RelOpenLeft`/`RelClose` one going left.
    ArrowRight,
    ArrowLeft,
    Undirected,
    RelOpen,
    RelCloseRight,
    RelClose,
    RelOpenLeft,

    Illegal,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Match => "MATCH",
            TokenKind::Create => "CREATE",
            TokenKind::Set => "SET",
            TokenKind::Delete => "DELETE",
            TokenKind::Return => "RETURN",
            TokenKind::Where => "WHERE",
            TokenKind::In => "IN",
            TokenKind::As => "AS",
            TokenKind::Contains => "CONTAINS",
            TokenKind::Not => "NOT",
            TokenKind::And => "AND",
            TokenKind::Order => "ORDER",
            TokenKind::By => "BY",
            TokenKind::Limit => "LIMIT",
            TokenKind::Skip => "SKIP",
            TokenKind::Desc => "DESC",
            TokenKind::Asc => "ASC",
            TokenKind::Count => "COUNT",
            TokenKind::Sum => "SUM",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::Null => "NULL",
            TokenKind::Ident => "identifier",
            TokenKind::String => "string",
            TokenKind::Int => "integer",
            TokenKind::Float => "float",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Star => "*",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Eq => "=",
            TokenKind::NotEq => "!=",
            TokenKind::Gt => ">",
            TokenKind::Lt => "<",
            TokenKind::GtEq => ">=",
            TokenKind::LtEq => "<=",
            TokenKind::RegexMatch => "=~",
            TokenKind::ArrowRight => "->",
            TokenKind::ArrowLeft => "<-",
            TokenKind::Undirected => "--",
            TokenKind::RelOpen => "-[",
            TokenKind::RelCloseRight => "]->",
            TokenKind::RelClose => "]-",
            TokenKind::RelOpenLeft => "<-[",
            TokenKind::Illegal => "illegal token",
            TokenKind::Eof => "end of input",
        };
        f.write_str(s)
    }
}

/// Keyword lookup for a raw identifier. Reserved words are
/// case-insensitive; identifiers containing `.`, `-` or `/` never match.
pub fn keyword_from_str(ident: &str) -> Option<TokenKind> {
    let kind = match ident.to_ascii_uppercase().as_str() {
        "MATCH" => TokenKind::Match,
        "CREATE" => TokenKind::Create,
        "SET" => TokenKind::Set,
        "DELETE" => TokenKind::Delete,
        "RETURN" => TokenKind::Return,
        "WHERE" => TokenKind::Where,
        "IN" => TokenKind::In,
        "AS" => TokenKind::As,
        "CONTAINS" => TokenKind::Contains,
        "NOT" => TokenKind::Not,
        "AND" => TokenKind::And,
        "ORDER" => TokenKind::Order,
        "BY" => TokenKind::By,
        "LIMIT" => TokenKind::Limit,
        "SKIP" => TokenKind::Skip,
        "DESC" => TokenKind::Desc,
        "ASC" => TokenKind::Asc,
        "COUNT" => TokenKind::Count,
        "SUM" => TokenKind::Sum,
        "TRUE" => TokenKind::True,
        "FALSE" => TokenKind::False,
        "NULL" => TokenKind::Null,
        _ => return None,
    };
    Some(kind)
}

/// A lexed token. `literal` holds the raw text with string quotes and
/// escapes already processed, except that `\.` inside a path identifier is
/// preserved so the parser can tell a literal dot from a path separator.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub line: u32,
    pub col: u32,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, line: u32, col: u32) -> Self {
        Token {
            kind,
            literal: literal.into(),
            line,
            col,
        }
    }
}
