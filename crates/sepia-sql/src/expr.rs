//! SQL expressions.

use rust_decimal::Decimal;

use crate::query::{Query, WindowDef};
use crate::types::ColumnType;

/// A SQL expression.
///
/// Parameters carry their zero-based index in the statement's bind list and
/// render as `$ix+1`; the renderer itself assigns numbers only for INSERT
/// row values.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// NULL
    Null,
    /// TRUE / FALSE
    Bool(bool),
    Integer(i64),
    /// Rendered with a `::float` cast.
    Float(f64),
    /// A string literal, single-quoted on output.
    String(String),
    /// A binary literal: `'\xHH…'::bytea`.
    Bytes(Vec<u8>),
    /// An arbitrary-precision decimal literal.
    Decimal(Decimal),
    /// A value with an explicit type: `expr::dbtype`.
    Tagged { value: Box<Expr>, ty: ColumnType },
    /// A positional bind parameter.
    Param(usize),
    /// A field of a query source: `alias."field"`.
    Field { ix: usize, name: String },
    /// A bare reference to a query source, rendered as its alias.
    SourceRef(usize),
    /// A scalar subquery: `(SELECT …)`.
    Subquery(Box<Query>),
    /// A binary operation.
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// A named function call, optionally `name(DISTINCT …)`.
    Call {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// Membership test; see [`InRhs`] for the emitted forms.
    In { lhs: Box<Expr>, rhs: InRhs },
    /// `expr IS NULL`
    IsNull(Box<Expr>),
    /// `NOT (expr)`
    Not(Box<Expr>),
    /// Raw SQL interleaved with expressions.
    Fragment(Vec<FragmentPart>),
    /// `base::timestamp + interval 'count unit'`.
    DatetimeAdd {
        base: Box<Expr>,
        count: Box<Expr>,
        unit: String,
    },
    /// Like [`Expr::DatetimeAdd`] but coerced to and cast back to a date.
    DateAdd {
        base: Box<Expr>,
        count: Box<Expr>,
        unit: String,
    },
    /// `agg FILTER (WHERE cond)`.
    Filter { agg: Box<Expr>, cond: Box<Expr> },
    /// `agg OVER name` or `agg OVER (window)`.
    Over { agg: Box<Expr>, window: OverWindow },
    /// `count(*)`
    CountStar,
    /// An array literal: `ARRAY[…]`.
    List(Vec<Expr>),
    /// A parenthesized group: `(e1,e2,…)`.
    Tuple(Vec<Expr>),
}

/// Right-hand side of an `IN` test.
#[derive(Debug, Clone, PartialEq)]
pub enum InRhs {
    /// An explicit value list: `lhs IN (a,b,c)`; an empty list renders the
    /// literal `false`.
    Values(Vec<Expr>),
    /// A bind parameter holding a list: `lhs = ANY($n)`.
    Param(usize),
    /// `lhs = ANY((SELECT …))`.
    Subquery(Box<Query>),
    /// `lhs = ANY(expr)` for anything else that evaluates to an array.
    Expr(Box<Expr>),
}

/// One piece of a SQL fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentPart {
    Raw(String),
    Expr(Expr),
}

/// The window an aggregate runs over.
#[derive(Debug, Clone, PartialEq)]
pub enum OverWindow {
    /// A window declared in the query's WINDOW clause.
    Named(String),
    /// An inline window definition.
    Def(WindowDef),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    LtEq,
    GtEq,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    ILike,
    Like,
}

impl BinOp {
    /// The SQL token, with surrounding spaces.
    pub fn as_sql(self) -> &'static str {
        match self {
            BinOp::Eq => " = ",
            BinOp::NotEq => " != ",
            BinOp::LtEq => " <= ",
            BinOp::GtEq => " >= ",
            BinOp::Lt => " < ",
            BinOp::Gt => " > ",
            BinOp::Add => " + ",
            BinOp::Sub => " - ",
            BinOp::Mul => " * ",
            BinOp::Div => " / ",
            BinOp::And => " AND ",
            BinOp::Or => " OR ",
            BinOp::ILike => " ILIKE ",
            BinOp::Like => " LIKE ",
        }
    }
}

// Convenience constructors
impl Expr {
    pub fn param(ix: usize) -> Self {
        Expr::Param(ix)
    }

    pub fn field(ix: usize, name: impl Into<String>) -> Self {
        Expr::Field {
            ix,
            name: name.into(),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::String(s.into())
    }

    pub fn int(n: i64) -> Self {
        Expr::Integer(n)
    }

    pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args: args.into_iter().collect(),
            distinct: false,
        }
    }

    pub fn binary(self, op: BinOp, other: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn eq(self, other: Expr) -> Self {
        self.binary(BinOp::Eq, other)
    }

    pub fn gt(self, other: Expr) -> Self {
        self.binary(BinOp::Gt, other)
    }

    pub fn and(self, other: Expr) -> Self {
        self.binary(BinOp::And, other)
    }

    pub fn or(self, other: Expr) -> Self {
        self.binary(BinOp::Or, other)
    }

    pub fn ilike(self, other: Expr) -> Self {
        self.binary(BinOp::ILike, other)
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull(Box::new(self))
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn in_values(self, values: impl IntoIterator<Item = Expr>) -> Self {
        Expr::In {
            lhs: Box::new(self),
            rhs: InRhs::Values(values.into_iter().collect()),
        }
    }

    pub fn in_param(self, ix: usize) -> Self {
        Expr::In {
            lhs: Box::new(self),
            rhs: InRhs::Param(ix),
        }
    }

    pub fn tagged(self, ty: ColumnType) -> Self {
        Expr::Tagged {
            value: Box::new(self),
            ty,
        }
    }
}
