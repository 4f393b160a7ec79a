use serde_json::Value;
use std::fmt;

/// Source position of a token, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A parsed statement: an optional context list (`IN ctx1, ctx2`) followed
/// by an ordered list of clauses. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub contexts: Vec<String>,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match(MatchClause),
    Create(CreateClause),
    Set(SetClause),
    Delete(DeleteClause),
    Return(ReturnClause),
}

/// Pattern nodes live in an arena (`nodes`); relationships reference them
/// by index.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    pub nodes: Vec<NodePattern>,
    pub relationships: Vec<Relationship>,
    pub filters: Vec<Filter>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateClause {
    pub nodes: Vec<NodePattern>,
    pub relationships: Vec<Relationship>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub pairs: Vec<SetPair>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetPair {
    pub path: PathExpr,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteClause {
    pub node_ids: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnClause {
    pub items: Vec<ReturnItem>,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    pub aggregate: Option<Aggregate>,
    pub path: PathExpr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub alias: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A node in a pattern. Anonymous nodes get synthetic `_anon<n>` names at
/// parse time; kindless nodes have an empty `kind` and are resolved by the
/// planner from their relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub name: String,
    pub kind: String,
    pub properties: Option<serde_json::Map<String, Value>>,
    pub anonymous: bool,
    pub span: Span,
}

impl NodePattern {
    pub fn is_kindless(&self) -> bool {
        self.kind.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    None,
}

/// An edge between two arena nodes. `left` and `right` index into the
/// owning clause's `nodes`.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub direction: Direction,
    pub left: usize,
    pub right: usize,
    pub variable: Option<String>,
    pub rel_type: Option<String>,
    pub properties: Option<serde_json::Map<String, Value>>,
    pub span: Span,
}

/// WHERE term.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Comparison(ComparisonFilter),
    SubMatch(SubMatchFilter),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonFilter {
    pub path: PathExpr,
    pub op: Operator,
    pub value: FilterValue,
    pub negated: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Contains,
    Regex,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::GtEq => ">=",
            Operator::LtEq => "<=",
            Operator::Contains => "CONTAINS",
            Operator::Regex => "=~",
        };
        f.write_str(s)
    }
}

/// Right-hand side of a comparison: a JSON literal or a temporal
/// expression (`datetime() - duration("PT1H")`).
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Literal(Value),
    Temporal(TemporalExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalExpr {
    pub offset: Option<TemporalOffset>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalOffset {
    pub sign: TemporalSign,
    /// ISO-8601 duration text as written, e.g. `PT1H`.
    pub duration: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalSign {
    Plus,
    Minus,
}

/// A relationship pattern used as a boolean predicate in WHERE. Exactly
/// one node references a variable from the outer MATCH; that node carries
/// no kind and no properties.
#[derive(Debug, Clone, PartialEq)]
pub struct SubMatchFilter {
    pub nodes: Vec<NodePattern>,
    pub relationships: Vec<Relationship>,
    pub reference: String,
    pub negated: bool,
    pub span: Span,
}

/// A dotted/bracketed path rooted at a pattern variable: `v.a.b[0].c[*]`.
/// `raw` keeps the original text (escapes included) for formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub var: String,
    pub segments: Vec<PathSegment>,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Map key, with `\.` escapes already resolved to literal dots.
    Key(String),
    Index(usize),
    Wildcard,
}

impl PathExpr {
    /// Variable-only path (`RETURN d`).
    pub fn is_bare(&self) -> bool {
        self.segments.is_empty()
    }
}
