use crate::token::{keyword_from_str, Token, TokenKind};

/// Single-pass scanner with one-char lookahead.
///
/// Identifiers follow `[A-Za-z_][A-Za-z0-9_.\-/]*` with two wrinkles: a
/// dash is only consumed when it cannot start a relationship arrow, and a
/// `\.` pair is kept verbatim so downstream path splitting can treat it as
/// a literal dot (`metadata.annotations.meta\.helm\.sh/name`).
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the entire input, ending with an `Eof` token.
    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if let Some(c) = c {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        c
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                // `//` line comment, skipped to end of line.
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let line = self.line;
        let col = self.col;
        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, "", line, col);
        };

        match c {
            '(' => self.single(TokenKind::LParen, line, col),
            ')' => self.single(TokenKind::RParen, line, col),
            '{' => self.single(TokenKind::LBrace, line, col),
            '}' => self.single(TokenKind::RBrace, line, col),
            '[' => self.single(TokenKind::LBracket, line, col),
            ':' => self.single(TokenKind::Colon, line, col),
            ',' => self.single(TokenKind::Comma, line, col),
            '.' => self.single(TokenKind::Dot, line, col),
            '*' => self.single(TokenKind::Star, line, col),
            '+' => self.single(TokenKind::Plus, line, col),
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::GtEq, ">=", line, col)
                } else {
                    Token::new(TokenKind::Gt, ">", line, col)
                }
            }
            '=' => {
                self.advance();
                if self.peek() == Some('~') {
                    self.advance();
                    Token::new(TokenKind::RegexMatch, "=~", line, col)
                } else {
                    Token::new(TokenKind::Eq, "=", line, col)
                }
            }
            '!' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::NotEq, "!=", line, col)
                } else {
                    Token::new(TokenKind::Illegal, "!", line, col)
                }
            }
            '<' => self.lex_lt(line, col),
            '-' => self.lex_dash(line, col),
            ']' => self.lex_rbracket(line, col),
            '"' => self.lex_string(line, col),
            '0'..='9' => self.lex_number(line, col),
            c if is_ident_start(c) => self.lex_ident(line, col),
            other => {
                self.advance();
                Token::new(TokenKind::Illegal, other.to_string(), line, col)
            }
        }
    }

    fn single(&mut self, kind: TokenKind, line: u32, col: u32) -> Token {
        let c = self.advance().unwrap_or_default();
        Token::new(kind, c.to_string(), line, col)
    }

    /// `<-[` | `<-` | `<=` | `<`
    fn lex_lt(&mut self, line: u32, col: u32) -> Token {
        self.advance();
        match self.peek() {
            Some('-') => {
                self.advance();
                if self.peek() == Some('[') {
                    self.advance();
                    Token::new(TokenKind::RelOpenLeft, "<-[", line, col)
                } else {
                    Token::new(TokenKind::ArrowLeft, "<-", line, col)
                }
            }
            Some('=') => {
                self.advance();
                Token::new(TokenKind::LtEq, "<=", line, col)
            }
            _ => Token::new(TokenKind::Lt, "<", line, col),
        }
    }

    /// `-[` | `->` | `--` | `-`
    fn lex_dash(&mut self, line: u32, col: u32) -> Token {
        self.advance();
        match self.peek() {
            Some('[') => {
                self.advance();
                Token::new(TokenKind::RelOpen, "-[", line, col)
            }
            Some('>') => {
                self.advance();
                Token::new(TokenKind::ArrowRight, "->", line, col)
            }
            Some('-') => {
                self.advance();
                Token::new(TokenKind::Undirected, "--", line, col)
            }
            _ => Token::new(TokenKind::Minus, "-", line, col),
        }
    }

    /// `]->` | `]-` | `]`
    fn lex_rbracket(&mut self, line: u32, col: u32) -> Token {
        self.advance();
        if self.peek() == Some('-') {
            self.advance();
            if self.peek() == Some('>') {
                self.advance();
                Token::new(TokenKind::RelCloseRight, "]->", line, col)
            } else {
                Token::new(TokenKind::RelClose, "]-", line, col)
            }
        } else {
            Token::new(TokenKind::RBracket, "]", line, col)
        }
    }

    fn lex_string(&mut self, line: u32, col: u32) -> Token {
        self.advance(); // opening quote
        let mut literal = String::new();
        loop {
            match self.advance() {
                None => return Token::new(TokenKind::Illegal, literal, line, col),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('"') => literal.push('"'),
                    Some('\\') => literal.push('\\'),
                    Some(other) => {
                        literal.push('\\');
                        literal.push(other);
                    }
                    None => return Token::new(TokenKind::Illegal, literal, line, col),
                },
                Some(c) => literal.push(c),
            }
        }
        Token::new(TokenKind::String, literal, line, col)
    }

    fn lex_number(&mut self, line: u32, col: u32) -> Token {
        let mut literal = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                literal.push(c);
                self.advance();
            } else if c == '.' && !is_float && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit())
            {
                is_float = true;
                literal.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Int
        };
        Token::new(kind, literal, line, col)
    }

    fn lex_ident(&mut self, line: u32, col: u32) -> Token {
        let mut literal = String::new();
        literal.push(self.advance().unwrap_or_default());
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                    literal.push(c);
                    self.advance();
                }
                // Literal dot escape, preserved for the path splitter.
                Some('\\') if self.peek_at(1) == Some('.') => {
                    literal.push('\\');
                    literal.push('.');
                    self.advance();
                    self.advance();
                }
                // A dash continues the identifier only when it cannot be
                // the start of a relationship arrow.
                Some('-') => match self.peek_at(1) {
                    Some(next) if is_ident_continue(next) => {
                        literal.push('-');
                        self.advance();
                    }
                    _ => break,
                },
                // A single slash carries annotation-style keys
                // (`app.kubernetes.io/name`); `//` starts a comment.
                Some('/') => match self.peek_at(1) {
                    Some(next) if next != '/' && is_ident_continue(next) => {
                        literal.push('/');
                        self.advance();
                    }
                    _ => break,
                },
                _ => break,
            }
        }

        match keyword_from_str(&literal) {
            Some(kind) => Token::new(kind, literal, line, col),
            None => Token::new(TokenKind::Ident, literal, line, col),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
