//! The query AST consumed by the renderer.

use crate::expr::{Expr, FragmentPart};

/// A normalized query, the input to `all` / `update_all` / `delete_all`.
///
/// The FROM source is always `sources[0]`; joins reference further sources
/// by index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub sources: Vec<Source>,
    /// Table hints on the FROM source; always rejected by PostgreSQL.
    pub from_hints: Vec<String>,
    pub joins: Vec<Join>,
    pub wheres: Vec<BooleanExpr>,
    pub havings: Vec<BooleanExpr>,
    pub group_bys: Vec<Expr>,
    pub order_bys: Vec<OrderBy>,
    pub windows: Vec<(String, WindowDef)>,
    pub ctes: Option<With>,
    pub combinations: Vec<(SetOp, Query)>,
    pub distinct: Option<Distinct>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    /// Trailing lock clause, e.g. `FOR UPDATE`.
    pub lock: Option<String>,
    /// Selected fields; `Some([])` renders `SELECT TRUE`, `None` also means
    /// no RETURNING clause for `update_all` / `delete_all`.
    pub select: Option<Vec<SelectField>>,
    pub updates: Vec<UpdateOp>,
}

/// An entity in FROM/JOIN position.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Table {
        name: String,
        /// Name of the typed record this table decodes into; the renderer
        /// only cares whether one is present.
        schema: Option<String>,
        /// Schema namespace, e.g. `"audit"."users"`.
        prefix: Option<String>,
    },
    Subquery(Query),
    Fragment(Vec<FragmentPart>),
}

impl Source {
    pub fn table(name: impl Into<String>) -> Self {
        Source::Table {
            name: name.into(),
            schema: None,
            prefix: None,
        }
    }

    pub fn schema_table(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Source::Table {
            name: name.into(),
            schema: Some(schema.into()),
            prefix: None,
        }
    }
}

/// A JOIN clause; `ix` points into the query's sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub qual: JoinQual,
    pub ix: usize,
    pub on: Expr,
    pub hints: Vec<String>,
}

/// Join qualifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinQual {
    Inner,
    InnerLateral,
    Left,
    LeftLateral,
    Right,
    Full,
    Cross,
}

impl JoinQual {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinQual::Inner => "INNER JOIN ",
            JoinQual::InnerLateral => "INNER JOIN LATERAL ",
            JoinQual::Left => "LEFT OUTER JOIN ",
            JoinQual::LeftLateral => "LEFT OUTER JOIN LATERAL ",
            JoinQual::Right => "RIGHT OUTER JOIN ",
            JoinQual::Full => "FULL OUTER JOIN ",
            JoinQual::Cross => "CROSS JOIN ",
        }
    }
}

/// How a WHERE/HAVING entry combines with what came before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            BoolOp::And => " AND ",
            BoolOp::Or => " OR ",
        }
    }
}

/// One entry of a WHERE or HAVING clause.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanExpr {
    pub op: BoolOp,
    pub expr: Expr,
}

impl BooleanExpr {
    pub fn and(expr: Expr) -> Self {
        Self {
            op: BoolOp::And,
            expr,
        }
    }

    pub fn or(expr: Expr) -> Self {
        Self {
            op: BoolOp::Or,
            expr,
        }
    }
}

/// Sort directions. Plain ascending has no suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    AscNullsFirst,
    AscNullsLast,
    Desc,
    DescNullsFirst,
    DescNullsLast,
}

impl SortDir {
    pub fn suffix(self) -> &'static str {
        match self {
            SortDir::Asc => "",
            SortDir::AscNullsFirst => " ASC NULLS FIRST",
            SortDir::AscNullsLast => " ASC NULLS LAST",
            SortDir::Desc => " DESC",
            SortDir::DescNullsFirst => " DESC NULLS FIRST",
            SortDir::DescNullsLast => " DESC NULLS LAST",
        }
    }
}

/// ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub dir: SortDir,
    pub expr: Expr,
}

impl OrderBy {
    pub fn asc(expr: Expr) -> Self {
        Self {
            dir: SortDir::Asc,
            expr,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            dir: SortDir::Desc,
            expr,
        }
    }
}

/// A named window definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowDef {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderBy>,
    /// Frame clause, expected to be a fragment.
    pub frame: Option<Box<Expr>>,
}

/// SELECT DISTINCT variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Distinct {
    /// Plain `SELECT DISTINCT`.
    All,
    /// `DISTINCT ON (…)`; the expressions are also prepended to ORDER BY.
    On(Vec<OrderBy>),
}

/// A WITH clause.
#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub recursive: bool,
    pub queries: Vec<(String, CteQuery)>,
}

/// The body of one CTE.
#[derive(Debug, Clone, PartialEq)]
pub enum CteQuery {
    /// A full sub-query, parenthesized.
    Query(Query),
    /// A raw expression, rendered as-is.
    Expr(Expr),
}

/// Set operations combining a query with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    UnionAll,
    Except,
    ExceptAll,
    Intersect,
    IntersectAll,
}

impl SetOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            SetOp::Union => " UNION ",
            SetOp::UnionAll => " UNION ALL ",
            SetOp::Except => " EXCEPT ",
            SetOp::ExceptAll => " EXCEPT ALL ",
            SetOp::Intersect => " INTERSECT ",
            SetOp::IntersectAll => " INTERSECT ALL ",
        }
    }
}

/// One field of a SELECT or RETURNING list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectField {
    pub fn expr(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }
}

/// What an update operation does to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// `col = expr`
    Set,
    /// `col = a0.col + expr`
    Inc,
    /// `col = array_append(a0.col, expr)`
    Push,
    /// `col = array_remove(a0.col, expr)`
    Pull,
}

/// One SET entry of an `update_all`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOp {
    pub kind: UpdateKind,
    pub field: String,
    pub value: Expr,
}

impl UpdateOp {
    pub fn set(field: impl Into<String>, value: Expr) -> Self {
        Self {
            kind: UpdateKind::Set,
            field: field.into(),
            value,
        }
    }

    pub fn inc(field: impl Into<String>, value: Expr) -> Self {
        Self {
            kind: UpdateKind::Inc,
            field: field.into(),
            value,
        }
    }

    pub fn push(field: impl Into<String>, value: Expr) -> Self {
        Self {
            kind: UpdateKind::Push,
            field: field.into(),
            value,
        }
    }

    pub fn pull(field: impl Into<String>, value: Expr) -> Self {
        Self {
            kind: UpdateKind::Pull,
            field: field.into(),
            value,
        }
    }
}

/// One cell of an INSERT row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    /// `DEFAULT`
    Default,
    /// The next `$n` placeholder.
    Param,
    /// An inline sub-query carrying the number of placeholders it consumes.
    Subquery { query: Query, params: usize },
}

/// INSERT conflict handling.
#[derive(Debug, Clone, PartialEq)]
pub enum OnConflict {
    /// No ON CONFLICT clause; the violation surfaces as an error.
    Raise,
    /// `ON CONFLICT … DO NOTHING`
    Nothing(ConflictTarget),
    /// `ON CONFLICT … DO UPDATE SET field = EXCLUDED.field, …`
    Replace {
        fields: Vec<String>,
        target: ConflictTarget,
    },
    /// `ON CONFLICT … DO UPDATE SET …` driven by a full query; the
    /// inserted table gets aliased so the query can reference it.
    Update {
        query: Query,
        target: ConflictTarget,
    },
}

/// What an ON CONFLICT clause targets.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictTarget {
    None,
    /// `(c1,c2,…)`
    Columns(Vec<String>),
    /// `ON CONSTRAINT "name"`
    Constraint(String),
    /// Raw SQL spliced in as-is.
    Fragment(String),
}

/// A filter of a single-row UPDATE or DELETE.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub null: bool,
}

impl Filter {
    /// `field = $n`
    pub fn bind(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            null: false,
        }
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            null: true,
        }
    }
}

// Builder-style constructors
impl Query {
    pub fn new(source: Source) -> Self {
        Self {
            sources: vec![source],
            ..Default::default()
        }
    }

    pub fn select(mut self, fields: impl IntoIterator<Item = SelectField>) -> Self {
        self.select = Some(fields.into_iter().collect());
        self
    }

    /// Add a source and join it; returns the builder, the new source's
    /// index is `sources.len() - 1`.
    pub fn join(mut self, qual: JoinQual, source: Source, on: Expr) -> Self {
        let ix = self.sources.len();
        self.sources.push(source);
        self.joins.push(Join {
            qual,
            ix,
            on,
            hints: Vec::new(),
        });
        self
    }

    pub fn and_where(mut self, expr: Expr) -> Self {
        self.wheres.push(BooleanExpr::and(expr));
        self
    }

    pub fn or_where(mut self, expr: Expr) -> Self {
        self.wheres.push(BooleanExpr::or(expr));
        self
    }

    pub fn and_having(mut self, expr: Expr) -> Self {
        self.havings.push(BooleanExpr::and(expr));
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_bys.push(expr);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_bys.push(order);
        self
    }

    pub fn distinct(mut self, distinct: Distinct) -> Self {
        self.distinct = Some(distinct);
        self
    }

    pub fn window(mut self, name: impl Into<String>, def: WindowDef) -> Self {
        self.windows.push((name.into(), def));
        self
    }

    pub fn combine(mut self, op: SetOp, query: Query) -> Self {
        self.combinations.push((op, query));
        self
    }

    pub fn limit(mut self, expr: Expr) -> Self {
        self.limit = Some(expr);
        self
    }

    pub fn offset(mut self, expr: Expr) -> Self {
        self.offset = Some(expr);
        self
    }

    pub fn lock(mut self, clause: impl Into<String>) -> Self {
        self.lock = Some(clause.into());
        self
    }

    pub fn update(mut self, op: UpdateOp) -> Self {
        self.updates.push(op);
        self
    }
}
