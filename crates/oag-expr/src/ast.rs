//! Expression AST.
//!
//! The grammar is deliberately tiny: literals, dot-paths rooted at one of
//! the three scope names, comparisons, boolean/arithmetic operators,
//! membership tests, and two builtin calls (`len`, `abs`). Anything else is
//! a parse error — there is no symbol table to escape into.

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Scope root plus field path, e.g. `state.status`, `param.amount`.
    Path { root: ScopeRoot, segments: Vec<String> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// Builtin call — only `len` and `abs` exist.
    Call { builtin: Builtin, arg: Box<Expr> },
    /// Tuple/list literal, used on the right-hand side of `in`.
    List(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRoot {
    State,
    Param,
    User,
}

impl ScopeRoot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Param => "param",
            Self::User => "user",
        }
    }

    pub fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "state" => Some(Self::State),
            "param" => Some(Self::Param),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Abs,
}

impl Builtin {
    pub fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "len" => Some(Self::Len),
            "abs" => Some(Self::Abs),
            _ => None,
        }
    }
}
