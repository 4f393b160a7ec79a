use crate::ast::*;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use crate::ParseError;
use serde_json::{Map, Number, Value};

/// Parse a full statement into an [`Expression`].
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    Parser::new(input).parse_expression()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    anon_counter: usize,
    /// Variables defined by MATCH/CREATE clauses seen so far, in order.
    defined: Vec<String>,
}

impl Parser {
    fn new(input: &str) -> Self {
        Parser {
            tokens: Lexer::tokenize(input),
            pos: 0,
            anon_counter: 0,
            defined: Vec::new(),
        }
    }

    fn cur(&self) -> &Token {
        // The token stream always ends with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn span(&self) -> Span {
        let tok = self.cur();
        Span {
            line: tok.line,
            col: tok.col,
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    fn bump(&mut self) -> Token {
        let tok = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.cur();
        ParseError::Unexpected {
            span: self.span(),
            found: if tok.kind == TokenKind::Eof || tok.kind == TokenKind::Illegal {
                tok.kind.to_string()
            } else {
                format!("`{}`", tok.literal)
            },
            expected: expected.to_string(),
        }
    }

    fn next_anon(&mut self) -> String {
        let name = format!("_anon{}", self.anon_counter);
        self.anon_counter += 1;
        name
    }

    fn is_defined(&self, name: &str) -> bool {
        self.defined.iter().any(|v| v == name)
    }

    fn define(&mut self, name: &str, span: Span) -> Result<(), ParseError> {
        if self.is_defined(name) {
            return Err(ParseError::DuplicateVariable {
                span,
                name: name.to_string(),
            });
        }
        self.defined.push(name.to_string());
        Ok(())
    }

    // ── Statement ──────────────────────────────────────────────────────

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let contexts = self.parse_contexts()?;

        let mut clauses = Vec::new();
        let mut seen_match = false;
        loop {
            match self.cur().kind {
                TokenKind::Eof => break,
                TokenKind::Match => {
                    let clause = self.parse_match()?;
                    seen_match = true;
                    clauses.push(Clause::Match(clause));
                }
                TokenKind::Create => {
                    clauses.push(Clause::Create(self.parse_create()?));
                }
                TokenKind::Set => {
                    if !seen_match {
                        return Err(ParseError::MissingMatch {
                            span: self.span(),
                            clause: "SET".to_string(),
                        });
                    }
                    clauses.push(Clause::Set(self.parse_set()?));
                }
                TokenKind::Delete => {
                    if !seen_match {
                        return Err(ParseError::MissingMatch {
                            span: self.span(),
                            clause: "DELETE".to_string(),
                        });
                    }
                    clauses.push(Clause::Delete(self.parse_delete()?));
                }
                TokenKind::Return => {
                    clauses.push(Clause::Return(self.parse_return()?));
                    if !self.at(TokenKind::Eof) {
                        return Err(ParseError::ReturnNotLast { span: self.span() });
                    }
                }
                TokenKind::Illegal => {
                    return Err(ParseError::Syntax {
                        span: self.span(),
                        message: format!("illegal token `{}`", self.cur().literal),
                    });
                }
                _ => return Err(self.unexpected("a clause keyword")),
            }
        }

        if clauses.is_empty() {
            return Err(ParseError::Syntax {
                span: self.span(),
                message: "statement contains no clauses".to_string(),
            });
        }

        Ok(Expression { contexts, clauses })
    }

    fn parse_contexts(&mut self) -> Result<Vec<String>, ParseError> {
        if !self.eat(TokenKind::In) {
            return Ok(Vec::new());
        }
        let mut contexts = Vec::new();
        loop {
            let tok = self.expect(TokenKind::Ident)?;
            contexts.push(tok.literal);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(contexts)
    }

    // ── MATCH / CREATE patterns ────────────────────────────────────────

    fn parse_match(&mut self) -> Result<MatchClause, ParseError> {
        let span = self.span();
        self.expect(TokenKind::Match)?;

        let mut nodes = Vec::new();
        let mut relationships = Vec::new();
        self.parse_pattern(&mut nodes, &mut relationships, true)?;

        let filters = if self.eat(TokenKind::Where) {
            self.parse_filters()?
        } else {
            Vec::new()
        };

        validate_kindless(&nodes, &relationships)?;

        Ok(MatchClause {
            nodes,
            relationships,
            filters,
            span,
        })
    }

    fn parse_create(&mut self) -> Result<CreateClause, ParseError> {
        let span = self.span();
        self.expect(TokenKind::Create)?;

        let mut nodes = Vec::new();
        let mut relationships = Vec::new();
        self.parse_pattern(&mut nodes, &mut relationships, true)?;

        Ok(CreateClause {
            nodes,
            relationships,
            span,
        })
    }

    /// `pattern := chain (',' chain)*` where `chain := node (relOp node)*`.
    /// With `register`, node names are added to the statement scope;
    /// sub-match patterns pass false and resolve names themselves.
    fn parse_pattern(
        &mut self,
        nodes: &mut Vec<NodePattern>,
        relationships: &mut Vec<Relationship>,
        register: bool,
    ) -> Result<(), ParseError> {
        loop {
            let mut prev = self.parse_node(nodes, register)?;
            loop {
                let Some((direction, variable, rel_type, properties, rel_span)) =
                    self.parse_rel_op()?
                else {
                    break;
                };
                let next = self.parse_node(nodes, register)?;
                relationships.push(Relationship {
                    direction,
                    left: prev,
                    right: next,
                    variable,
                    rel_type,
                    properties,
                    span: rel_span,
                });
                prev = next;
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(())
    }

    /// `node := '(' name? (':' kind)? props? ')'`. Returns the arena index;
    /// a repeated variable name resolves to the existing node.
    fn parse_node(
        &mut self,
        nodes: &mut Vec<NodePattern>,
        register: bool,
    ) -> Result<usize, ParseError> {
        let span = self.span();
        self.expect(TokenKind::LParen)?;

        let (name, anonymous) = if self.at(TokenKind::Ident) {
            (self.bump().literal, false)
        } else {
            (self.next_anon(), true)
        };

        let kind = if self.eat(TokenKind::Colon) {
            self.expect(TokenKind::Ident)?.literal
        } else {
            String::new()
        };

        let properties = if self.at(TokenKind::LBrace) {
            Some(self.parse_properties()?)
        } else {
            None
        };

        self.expect(TokenKind::RParen)?;

        if !anonymous {
            if let Some(idx) = nodes.iter().position(|n| n.name == name) {
                // Reference to an earlier node in the same pattern.
                if !kind.is_empty() {
                    if nodes[idx].kind.is_empty() {
                        nodes[idx].kind = kind;
                    } else if nodes[idx].kind != kind {
                        return Err(ParseError::Syntax {
                            span,
                            message: format!(
                                "variable `{name}` is already bound to kind `{}`",
                                nodes[idx].kind
                            ),
                        });
                    }
                }
                if properties.is_some() && nodes[idx].properties.is_none() {
                    nodes[idx].properties = properties;
                }
                return Ok(idx);
            }
            // A name bound by an earlier clause is a cross-clause
            // reference (`MATCH (d:...) CREATE (d)->(s:Service)`), not a
            // new definition.
            if register && !self.is_defined(&name) {
                self.define(&name, span)?;
            }
        }

        nodes.push(NodePattern {
            name,
            kind,
            properties,
            anonymous,
            span,
        });
        Ok(nodes.len() - 1)
    }

    /// One of `->`, `<-`, `--`, `-[ v:TYPE props ]->`, `<-[ v:TYPE props ]-`.
    /// Returns None when the chain ends.
    #[allow(clippy::type_complexity)]
    fn parse_rel_op(
        &mut self,
    ) -> Result<
        Option<(
            Direction,
            Option<String>,
            Option<String>,
            Option<Map<String, Value>>,
            Span,
        )>,
        ParseError,
    > {
        let span = self.span();
        match self.cur().kind {
            TokenKind::ArrowRight => {
                self.bump();
                Ok(Some((Direction::Right, None, None, None, span)))
            }
            TokenKind::ArrowLeft => {
                self.bump();
                Ok(Some((Direction::Left, None, None, None, span)))
            }
            TokenKind::Undirected => {
                self.bump();
                Ok(Some((Direction::None, None, None, None, span)))
            }
            TokenKind::RelOpen => {
                self.bump();
                let (variable, rel_type, properties) = self.parse_rel_detail()?;
                self.expect(TokenKind::RelCloseRight)?;
                Ok(Some((Direction::Right, variable, rel_type, properties, span)))
            }
            TokenKind::RelOpenLeft => {
                self.bump();
                let (variable, rel_type, properties) = self.parse_rel_detail()?;
                self.expect(TokenKind::RelClose)?;
                Ok(Some((Direction::Left, variable, rel_type, properties, span)))
            }
            _ => Ok(None),
        }
    }

    #[allow(clippy::type_complexity)]
    fn parse_rel_detail(
        &mut self,
    ) -> Result<(Option<String>, Option<String>, Option<Map<String, Value>>), ParseError> {
        // `-[x:TYPE]->` names the relationship; `-[:TYPE]->` does not.
        let variable = if self.at(TokenKind::Ident) {
            Some(self.bump().literal)
        } else {
            None
        };
        let rel_type = if self.eat(TokenKind::Colon) {
            Some(self.expect(TokenKind::Ident)?.literal)
        } else {
            None
        };
        let properties = if self.at(TokenKind::LBrace) {
            Some(self.parse_properties()?)
        } else {
            None
        };
        Ok((variable, rel_type, properties))
    }

    /// `'{' key ':' value (',' key ':' value)* '}'` where keys are bare
    /// identifiers or quoted strings and values are JSON-shaped (scalars,
    /// nested objects, arrays), which also covers whole-object CREATE
    /// bodies.
    fn parse_properties(&mut self) -> Result<Map<String, Value>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut map = Map::new();
        if self.eat(TokenKind::RBrace) {
            return Ok(map);
        }
        loop {
            let key = match self.cur().kind {
                TokenKind::Ident | TokenKind::String => self.bump().literal,
                _ => return Err(self.unexpected("a property key")),
            };
            self.expect(TokenKind::Colon)?;
            let value = self.parse_json_value()?;
            map.insert(key, value);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(map)
    }

    fn parse_json_value(&mut self) -> Result<Value, ParseError> {
        match self.cur().kind {
            TokenKind::String => Ok(Value::String(self.bump().literal)),
            TokenKind::Int | TokenKind::Float | TokenKind::Minus => self.parse_number(),
            TokenKind::True => {
                self.bump();
                Ok(Value::Bool(true))
            }
            TokenKind::False => {
                self.bump();
                Ok(Value::Bool(false))
            }
            TokenKind::Null => {
                self.bump();
                Ok(Value::Null)
            }
            TokenKind::LBrace => {
                let map = self.parse_properties()?;
                Ok(Value::Object(map))
            }
            TokenKind::LBracket => {
                self.bump();
                let mut items = Vec::new();
                if !self.at(TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_json_value()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Value::Array(items))
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    fn parse_number(&mut self) -> Result<Value, ParseError> {
        let negative = self.eat(TokenKind::Minus);
        let tok = match self.cur().kind {
            TokenKind::Int | TokenKind::Float => self.bump(),
            _ => return Err(self.unexpected("a number")),
        };
        let text = if negative {
            format!("-{}", tok.literal)
        } else {
            tok.literal.clone()
        };
        if tok.kind == TokenKind::Int {
            let n: i64 = text.parse().map_err(|_| ParseError::Syntax {
                span: Span {
                    line: tok.line,
                    col: tok.col,
                },
                message: format!("integer out of range: {text}"),
            })?;
            Ok(Value::Number(Number::from(n)))
        } else {
            let f: f64 = text.parse().map_err(|_| ParseError::Syntax {
                span: Span {
                    line: tok.line,
                    col: tok.col,
                },
                message: format!("invalid number: {text}"),
            })?;
            Ok(Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
    }

    // ── WHERE ──────────────────────────────────────────────────────────

    fn parse_filters(&mut self) -> Result<Vec<Filter>, ParseError> {
        let mut filters = Vec::new();
        loop {
            filters.push(self.parse_filter_term()?);
            if self.eat(TokenKind::And) || self.eat(TokenKind::Comma) {
                continue;
            }
            break;
        }
        Ok(filters)
    }

    fn parse_filter_term(&mut self) -> Result<Filter, ParseError> {
        let negated = self.eat(TokenKind::Not);
        if self.at(TokenKind::LParen) {
            self.parse_sub_match(negated)
        } else {
            self.parse_comparison(negated)
        }
    }

    fn parse_comparison(&mut self, negated: bool) -> Result<Filter, ParseError> {
        let span = self.span();
        let path = self.parse_path_expr()?;
        if !self.is_defined(&path.var) {
            return Err(ParseError::UnknownVariable {
                span,
                name: path.var.clone(),
            });
        }

        let op = match self.cur().kind {
            TokenKind::Eq => Operator::Eq,
            TokenKind::NotEq => Operator::NotEq,
            TokenKind::Gt => Operator::Gt,
            TokenKind::Lt => Operator::Lt,
            TokenKind::GtEq => Operator::GtEq,
            TokenKind::LtEq => Operator::LtEq,
            TokenKind::Contains => Operator::Contains,
            TokenKind::RegexMatch => Operator::Regex,
            _ => return Err(self.unexpected("a comparison operator")),
        };
        self.bump();

        let value = self.parse_filter_value()?;

        Ok(Filter::Comparison(ComparisonFilter {
            path,
            op,
            value,
            negated,
            span,
        }))
    }

    fn parse_filter_value(&mut self) -> Result<FilterValue, ParseError> {
        if self.at(TokenKind::Ident) && self.cur().literal.eq_ignore_ascii_case("datetime") {
            return self.parse_temporal().map(FilterValue::Temporal);
        }
        self.parse_json_value().map(FilterValue::Literal)
    }

    /// `datetime() (('+'|'-') duration('"' iso '"'))?`
    fn parse_temporal(&mut self) -> Result<TemporalExpr, ParseError> {
        self.expect(TokenKind::Ident)?; // datetime
        self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::RParen)?;

        let sign = if self.eat(TokenKind::Plus) {
            Some(TemporalSign::Plus)
        } else if self.eat(TokenKind::Minus) {
            Some(TemporalSign::Minus)
        } else {
            None
        };

        let offset = match sign {
            None => None,
            Some(sign) => {
                let func = self.expect(TokenKind::Ident)?;
                if !func.literal.eq_ignore_ascii_case("duration") {
                    return Err(ParseError::Syntax {
                        span: Span {
                            line: func.line,
                            col: func.col,
                        },
                        message: format!("expected duration(...), found `{}`", func.literal),
                    });
                }
                self.expect(TokenKind::LParen)?;
                let dur = self.expect(TokenKind::String)?;
                self.expect(TokenKind::RParen)?;
                Some(TemporalOffset {
                    sign,
                    duration: dur.literal,
                })
            }
        };

        Ok(TemporalExpr { offset })
    }

    fn parse_sub_match(&mut self, negated: bool) -> Result<Filter, ParseError> {
        let span = self.span();
        let mut nodes = Vec::new();
        let mut relationships = Vec::new();
        // Chains only; a comma would end the enclosing WHERE term list.
        let mut prev = self.parse_node(&mut nodes, false)?;
        loop {
            let Some((direction, variable, rel_type, properties, rel_span)) =
                self.parse_rel_op()?
            else {
                break;
            };
            let next = self.parse_node(&mut nodes, false)?;
            relationships.push(Relationship {
                direction,
                left: prev,
                right: next,
                variable,
                rel_type,
                properties,
                span: rel_span,
            });
            prev = next;
        }

        if relationships.is_empty() {
            return Err(ParseError::InvalidSubMatch {
                span,
                message: "a sub-match must contain at least one relationship".to_string(),
            });
        }

        let references: Vec<&NodePattern> = nodes
            .iter()
            .filter(|n| !n.anonymous && self.is_defined(&n.name))
            .collect();
        match references.as_slice() {
            [reference] => {
                if !reference.kind.is_empty() || reference.properties.is_some() {
                    return Err(ParseError::InvalidSubMatch {
                        span: reference.span,
                        message: format!(
                            "reference node `{}` must carry no kind and no properties",
                            reference.name
                        ),
                    });
                }
                let reference = reference.name.clone();
                Ok(Filter::SubMatch(SubMatchFilter {
                    nodes,
                    relationships,
                    reference,
                    negated,
                    span,
                }))
            }
            [] => Err(ParseError::InvalidSubMatch {
                span,
                message: "a sub-match must reference exactly one MATCH variable".to_string(),
            }),
            many => Err(ParseError::InvalidSubMatch {
                span,
                message: format!(
                    "a sub-match must reference exactly one MATCH variable, found {}",
                    many.len()
                ),
            }),
        }
    }

    // ── Paths ──────────────────────────────────────────────────────────

    /// `v(.key)*([idx]|[*])?...` — the leading identifier token carries the
    /// variable and any dotted keys; brackets and further dotted tokens
    /// extend the path.
    fn parse_path_expr(&mut self) -> Result<PathExpr, ParseError> {
        let tok = self.expect(TokenKind::Ident)?;
        let mut raw = tok.literal.clone();
        let mut parts = split_dotted(&tok.literal);
        let var = parts.remove(0);
        let mut segments: Vec<PathSegment> = parts.into_iter().map(PathSegment::Key).collect();

        loop {
            if self.at(TokenKind::LBracket) {
                self.bump();
                match self.cur().kind {
                    TokenKind::Int => {
                        let idx_tok = self.bump();
                        let idx: usize =
                            idx_tok.literal.parse().map_err(|_| ParseError::InvalidIndex {
                                span: Span {
                                    line: idx_tok.line,
                                    col: idx_tok.col,
                                },
                            })?;
                        segments.push(PathSegment::Index(idx));
                        raw.push_str(&format!("[{idx}]"));
                    }
                    TokenKind::Star => {
                        self.bump();
                        segments.push(PathSegment::Wildcard);
                        raw.push_str("[*]");
                    }
                    _ => return Err(ParseError::InvalidIndex { span: self.span() }),
                }
                self.expect(TokenKind::RBracket)?;
            } else if self.at(TokenKind::Dot) {
                self.bump();
                let t = self.expect(TokenKind::Ident)?;
                raw.push('.');
                raw.push_str(&t.literal);
                segments.extend(split_dotted(&t.literal).into_iter().map(PathSegment::Key));
            } else {
                break;
            }
        }

        Ok(PathExpr { var, segments, raw })
    }

    // ── SET / DELETE / RETURN ──────────────────────────────────────────

    fn parse_set(&mut self) -> Result<SetClause, ParseError> {
        let span = self.span();
        self.expect(TokenKind::Set)?;
        let mut pairs = Vec::new();
        loop {
            let path_span = self.span();
            let path = self.parse_path_expr()?;
            if !self.is_defined(&path.var) {
                return Err(ParseError::UnknownVariable {
                    span: path_span,
                    name: path.var.clone(),
                });
            }
            if path.is_bare() {
                return Err(ParseError::Syntax {
                    span: path_span,
                    message: "SET requires a field path, not a bare variable".to_string(),
                });
            }
            self.expect(TokenKind::Eq)?;
            let value = self.parse_json_value()?;
            pairs.push(SetPair { path, value });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(SetClause { pairs, span })
    }

    fn parse_delete(&mut self) -> Result<DeleteClause, ParseError> {
        let span = self.span();
        self.expect(TokenKind::Delete)?;
        let mut node_ids = Vec::new();
        loop {
            let tok_span = self.span();
            let tok = self.expect(TokenKind::Ident)?;
            if !self.is_defined(&tok.literal) {
                return Err(ParseError::UnknownVariable {
                    span: tok_span,
                    name: tok.literal,
                });
            }
            node_ids.push(tok.literal);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(DeleteClause { node_ids, span })
    }

    fn parse_return(&mut self) -> Result<ReturnClause, ParseError> {
        let span = self.span();
        self.expect(TokenKind::Return)?;

        let mut items = Vec::new();
        loop {
            items.push(self.parse_return_item()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        let mut order_by = Vec::new();
        if self.eat(TokenKind::Order) {
            self.expect(TokenKind::By)?;
            loop {
                let alias = self.expect(TokenKind::Ident)?.literal;
                let direction = if self.eat(TokenKind::Desc) {
                    SortDirection::Desc
                } else {
                    self.eat(TokenKind::Asc);
                    SortDirection::Asc
                };
                order_by.push(OrderItem { alias, direction });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        let skip = if self.eat(TokenKind::Skip) {
            Some(self.parse_count_literal()?)
        } else {
            None
        };
        let limit = if self.eat(TokenKind::Limit) {
            Some(self.parse_count_literal()?)
        } else {
            None
        };

        Ok(ReturnClause {
            items,
            order_by,
            skip,
            limit,
            span,
        })
    }

    fn parse_count_literal(&mut self) -> Result<u64, ParseError> {
        let tok = self.expect(TokenKind::Int)?;
        tok.literal.parse().map_err(|_| ParseError::Syntax {
            span: Span {
                line: tok.line,
                col: tok.col,
            },
            message: format!("invalid count: {}", tok.literal),
        })
    }

    fn parse_return_item(&mut self) -> Result<ReturnItem, ParseError> {
        let aggregate = match self.cur().kind {
            TokenKind::Count => {
                self.bump();
                Some(Aggregate::Count)
            }
            TokenKind::Sum => {
                self.bump();
                Some(Aggregate::Sum)
            }
            _ => None,
        };

        let path_span = self.span();
        let path = if aggregate.is_some() {
            self.expect(TokenKind::LBrace)?;
            let path = self.parse_path_expr()?;
            self.expect(TokenKind::RBrace)?;
            path
        } else {
            self.parse_path_expr()?
        };
        if !self.is_defined(&path.var) {
            return Err(ParseError::UnknownVariable {
                span: path_span,
                name: path.var.clone(),
            });
        }

        let alias = if self.eat(TokenKind::As) {
            Some(self.expect(TokenKind::Ident)?.literal)
        } else {
            None
        };

        Ok(ReturnItem {
            aggregate,
            path,
            alias,
        })
    }
}

/// Split a dotted identifier on unescaped dots; `\.` becomes a literal dot
/// inside the segment.
fn split_dotted(literal: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut chars = literal.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'.') {
            chars.next();
            parts.last_mut().expect("parts is never empty").push('.');
        } else if c == '.' {
            parts.push(String::new());
        } else {
            parts.last_mut().expect("parts is never empty").push(c);
        }
    }
    parts
}

/// Kindless-node rules: no two adjacent kindless nodes, and every kindless
/// node takes part in at least one relationship.
fn validate_kindless(
    nodes: &[NodePattern],
    relationships: &[Relationship],
) -> Result<(), ParseError> {
    for rel in relationships {
        let left = &nodes[rel.left];
        let right = &nodes[rel.right];
        if left.is_kindless() && right.is_kindless() {
            return Err(ParseError::KindlessChain { span: rel.span });
        }
    }
    for (idx, node) in nodes.iter().enumerate() {
        if node.is_kindless()
            && !relationships
                .iter()
                .any(|rel| rel.left == idx || rel.right == idx)
        {
            return Err(ParseError::DanglingKindless {
                span: node.span,
                name: node.name.clone(),
            });
        }
    }
    Ok(())
}
