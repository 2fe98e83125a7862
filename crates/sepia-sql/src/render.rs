//! Render query ASTs to PostgreSQL statements.
//!
//! Everything here is pure: a [`Dialect`] holds configuration, a [`Printer`]
//! accumulates one statement, and the output byte order is the left-to-right
//! traversal of the AST. Placeholders carried by the AST render as their
//! index plus one; INSERT row values are the only place the renderer assigns
//! numbers itself.

use crate::expr::{Expr, FragmentPart, InRhs, OverWindow};
use crate::query::{
    BoolOp, ConflictTarget, CteQuery, Distinct, Filter, JoinQual, OnConflict, OrderBy, Query,
    RowValue, SelectField, Source, UpdateKind, UpdateOp, WindowDef,
};
use crate::sources::SourceTable;
use crate::{Error, Result, quote_table, single_quote};

/// PostgreSQL rendering configuration.
///
/// Replaces process-global configuration with an explicit record: construct
/// one up front and call the rendering entry points on it. The default has
/// no map type configured.
#[derive(Debug, Clone, Default)]
pub struct Dialect {
    /// SQL type used for map columns and casts, e.g. `"jsonb"`.
    pub map_type: Option<String>,
}

impl Dialect {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dialect with the SQL type used for map columns configured.
    pub fn with_map_type(ty: impl Into<String>) -> Self {
        Self {
            map_type: Some(ty.into()),
        }
    }

    /// Render a SELECT statement.
    pub fn all(&self, query: &Query) -> Result<String> {
        let mut p = Printer::new(self);
        p.all(query)?;
        Ok(p.finish())
    }

    /// Render an UPDATE over a full query, lowering inner joins to FROM.
    pub fn update_all(&self, query: &Query) -> Result<String> {
        let mut p = Printer::new(self);
        p.update_all(query, None)?;
        Ok(p.finish())
    }

    /// Render a DELETE over a full query, lowering inner joins to USING.
    pub fn delete_all(&self, query: &Query) -> Result<String> {
        let mut p = Printer::new(self);
        p.delete_all(query)?;
        Ok(p.finish())
    }

    /// Render a multi-row INSERT.
    ///
    /// An empty header renders `VALUES (DEFAULT), …` one per row. Row
    /// placeholders are numbered from 1 in appearance order; inline
    /// sub-queries advance the counter by their declared parameter count.
    pub fn insert(
        &self,
        prefix: Option<&str>,
        table: &str,
        header: &[&str],
        rows: &[Vec<RowValue>],
        on_conflict: &OnConflict,
        returning: &[&str],
    ) -> Result<String> {
        let mut p = Printer::new(self);
        p.insert(prefix, table, header, rows, on_conflict, returning)?;
        Ok(p.finish())
    }

    /// Render a single-row UPDATE by key.
    pub fn update(
        &self,
        prefix: Option<&str>,
        table: &str,
        fields: &[&str],
        filters: &[Filter],
        returning: &[&str],
    ) -> Result<String> {
        let mut p = Printer::new(self);
        p.update(prefix, table, fields, filters, returning)?;
        Ok(p.finish())
    }

    /// Render a single-row DELETE by key.
    pub fn delete(
        &self,
        prefix: Option<&str>,
        table: &str,
        filters: &[Filter],
        returning: &[&str],
    ) -> Result<String> {
        let mut p = Printer::new(self);
        p.delete(prefix, table, filters, returning)?;
        Ok(p.finish())
    }

    /// SQL and parameters asking whether a table exists in the current
    /// schema.
    pub fn table_exists_query(&self, table: &str) -> (String, Vec<String>) {
        (
            "SELECT true FROM information_schema.tables \
             WHERE table_name = $1 AND table_schema = current_schema() LIMIT 1"
                .to_string(),
            vec![table.to_string()],
        )
    }
}

/// Accumulates one rendered statement.
pub(crate) struct Printer<'a> {
    dialect: &'a Dialect,
    sql: String,
}

impl<'a> Printer<'a> {
    pub(crate) fn new(dialect: &'a Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
        }
    }

    pub(crate) fn finish(self) -> String {
        self.sql
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn name(&mut self, ident: &str) -> Result<()> {
        let quoted = crate::quote_name(ident)?;
        self.push(&quoted);
        Ok(())
    }

    /// Render into a fresh buffer sharing this printer's dialect.
    fn capture(&self, f: impl FnOnce(&mut Printer) -> Result<()>) -> Result<String> {
        let mut p = Printer::new(self.dialect);
        f(&mut p)?;
        Ok(p.finish())
    }

    // ------------------------------------------------------------------
    // SELECT
    // ------------------------------------------------------------------

    fn all(&mut self, query: &Query) -> Result<()> {
        let sources = SourceTable::build(query)?;
        self.cte(query, &sources)?;
        let distinct = self.select_clause(query, &sources)?;
        self.from(query, &sources)?;
        self.joins(query, &sources)?;
        self.boolean(
            " WHERE ",
            query.wheres.iter().map(|b| (b.op, &b.expr)),
            &sources,
        )?;
        self.group_by(query, &sources)?;
        self.boolean(
            " HAVING ",
            query.havings.iter().map(|b| (b.op, &b.expr)),
            &sources,
        )?;
        self.windows(query, &sources)?;
        self.combinations(query)?;
        self.order_by(query, distinct, &sources)?;
        if let Some(limit) = &query.limit {
            self.push(" LIMIT ");
            self.expr(limit, &sources)?;
        }
        if let Some(offset) = &query.offset {
            self.push(" OFFSET ");
            self.expr(offset, &sources)?;
        }
        if let Some(lock) = &query.lock {
            self.push(" ");
            self.push(lock);
        }
        Ok(())
    }

    fn cte(&mut self, query: &Query, sources: &SourceTable) -> Result<()> {
        let Some(with) = &query.ctes else {
            return Ok(());
        };
        if with.queries.is_empty() {
            return Ok(());
        }
        self.push("WITH ");
        if with.recursive {
            self.push("RECURSIVE ");
        }
        let mut first = true;
        for (name, cte) in &with.queries {
            if !first {
                self.push(", ");
            }
            first = false;
            self.name(name)?;
            self.push(" AS ");
            match cte {
                CteQuery::Query(q) => {
                    self.push("(");
                    self.all(q)?;
                    self.push(")");
                }
                CteQuery::Expr(e) => self.expr(e, sources)?,
            }
        }
        self.push(" ");
        Ok(())
    }

    /// Renders `SELECT [DISTINCT …] fields`, returning the DISTINCT ON
    /// expressions so ORDER BY can prepend them.
    fn select_clause<'q>(
        &mut self,
        query: &'q Query,
        sources: &SourceTable,
    ) -> Result<&'q [OrderBy]> {
        self.push("SELECT ");
        let distinct: &[OrderBy] = match &query.distinct {
            None => &[],
            Some(Distinct::All) => {
                self.push("DISTINCT ");
                &[]
            }
            Some(Distinct::On(exprs)) => {
                self.push("DISTINCT ON (");
                let mut first = true;
                for ob in exprs {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.expr(&ob.expr, sources)?;
                }
                self.push(") ");
                exprs
            }
        };
        self.select_fields(query.select.as_deref(), sources)?;
        Ok(distinct)
    }

    fn select_fields(
        &mut self,
        fields: Option<&[SelectField]>,
        sources: &SourceTable,
    ) -> Result<()> {
        let fields = fields.unwrap_or(&[]);
        if fields.is_empty() {
            self.push("TRUE");
            return Ok(());
        }
        let mut first = true;
        for field in fields {
            if !first {
                self.push(", ");
            }
            first = false;
            if let Expr::SourceRef(ix) = &field.expr {
                let source = sources.get(*ix)?;
                if source.schema.is_none() {
                    return Err(Error::MissingSchema {
                        alias: source.alias.clone(),
                    });
                }
            }
            self.expr(&field.expr, sources)?;
            if let Some(alias) = &field.alias {
                self.push(" AS ");
                self.name(alias)?;
            }
        }
        Ok(())
    }

    fn from(&mut self, query: &Query, sources: &SourceTable) -> Result<()> {
        if !query.from_hints.is_empty() {
            return Err(Error::Unsupported(
                "table hints are not supported by PostgreSQL".into(),
            ));
        }
        self.push(" FROM ");
        self.aliased_source(query, sources, 0)
    }

    /// Renders a source plus its alias: `"users" AS u0`, `(SELECT …) AS s1`.
    fn aliased_source(&mut self, query: &Query, sources: &SourceTable, ix: usize) -> Result<()> {
        self.source(query, sources, ix)?;
        self.push(" AS ");
        let name = sources.get(ix)?;
        self.sql.push_str(&name.alias);
        Ok(())
    }

    fn source(&mut self, query: &Query, sources: &SourceTable, ix: usize) -> Result<()> {
        let name = sources.get(ix)?;
        if let Some(rendered) = &name.rendered {
            self.sql.push_str(rendered);
            return Ok(());
        }
        match query.sources.get(ix) {
            Some(Source::Subquery(sub)) => {
                self.push("(");
                self.all(sub)?;
                self.push(")");
            }
            Some(Source::Fragment(parts)) => self.fragment(parts, sources)?,
            _ => return Err(Error::BadSourceRef(ix)),
        }
        Ok(())
    }

    fn joins(&mut self, query: &Query, sources: &SourceTable) -> Result<()> {
        for join in &query.joins {
            if !join.hints.is_empty() {
                return Err(Error::Unsupported(
                    "table hints are not supported by PostgreSQL".into(),
                ));
            }
            self.push(" ");
            self.push(join.qual.as_sql());
            self.aliased_source(query, sources, join.ix)?;
            if join.qual != JoinQual::Cross {
                self.push(" ON ");
                self.paren_expr(&join.on, sources)?;
            }
        }
        Ok(())
    }

    /// Renders a WHERE/HAVING clause. Runs of the same operator flatten;
    /// when the operator changes, the accumulated left side is
    /// re-parenthesized so precedence stays observable.
    fn boolean<'e>(
        &mut self,
        name: &str,
        exprs: impl IntoIterator<Item = (BoolOp, &'e Expr)>,
        sources: &SourceTable,
    ) -> Result<()> {
        let mut it = exprs.into_iter();
        let Some((mut op, first)) = it.next() else {
            return Ok(());
        };
        let mut acc = self.capture(|p| p.paren_expr(first, sources))?;
        for (next_op, expr) in it {
            let rendered = self.capture(|p| p.paren_expr(expr, sources))?;
            if next_op == op {
                acc.push_str(op.as_sql());
                acc.push_str(&rendered);
            } else {
                acc = format!("({acc}){}{rendered}", next_op.as_sql());
                op = next_op;
            }
        }
        self.push(name);
        self.push(&acc);
        Ok(())
    }

    fn group_by(&mut self, query: &Query, sources: &SourceTable) -> Result<()> {
        if query.group_bys.is_empty() {
            return Ok(());
        }
        self.push(" GROUP BY ");
        let mut first = true;
        for expr in &query.group_bys {
            if !first {
                self.push(", ");
            }
            first = false;
            self.expr(expr, sources)?;
        }
        Ok(())
    }

    fn windows(&mut self, query: &Query, sources: &SourceTable) -> Result<()> {
        if query.windows.is_empty() {
            return Ok(());
        }
        self.push(" WINDOW ");
        let mut first = true;
        for (name, def) in &query.windows {
            if !first {
                self.push(", ");
            }
            first = false;
            self.name(name)?;
            self.push(" AS ");
            self.window_def(def, sources)?;
        }
        Ok(())
    }

    fn window_def(&mut self, def: &WindowDef, sources: &SourceTable) -> Result<()> {
        self.push("(");
        let mut wrote = false;
        if !def.partition_by.is_empty() {
            self.push("PARTITION BY ");
            let mut first = true;
            for expr in &def.partition_by {
                if !first {
                    self.push(", ");
                }
                first = false;
                self.expr(expr, sources)?;
            }
            wrote = true;
        }
        if !def.order_by.is_empty() {
            if wrote {
                self.push(" ");
            }
            self.push("ORDER BY ");
            let mut first = true;
            for ob in &def.order_by {
                if !first {
                    self.push(", ");
                }
                first = false;
                self.order_by_expr(ob, sources)?;
            }
            wrote = true;
        }
        if let Some(frame) = &def.frame {
            if wrote {
                self.push(" ");
            }
            self.expr(frame, sources)?;
        }
        self.push(")");
        Ok(())
    }

    fn combinations(&mut self, query: &Query) -> Result<()> {
        for (op, sub) in &query.combinations {
            self.push(op.as_sql());
            self.push("(");
            self.all(sub)?;
            self.push(")");
        }
        Ok(())
    }

    /// DISTINCT ON expressions always lead the ORDER BY clause, even when
    /// the query has no ordering of its own.
    fn order_by(
        &mut self,
        query: &Query,
        distinct: &[OrderBy],
        sources: &SourceTable,
    ) -> Result<()> {
        if query.order_bys.is_empty() && distinct.is_empty() {
            return Ok(());
        }
        self.push(" ORDER BY ");
        let mut first = true;
        for ob in distinct.iter().chain(&query.order_bys) {
            if !first {
                self.push(", ");
            }
            first = false;
            self.order_by_expr(ob, sources)?;
        }
        Ok(())
    }

    fn order_by_expr(&mut self, ob: &OrderBy, sources: &SourceTable) -> Result<()> {
        self.expr(&ob.expr, sources)?;
        self.push(ob.dir.suffix());
        Ok(())
    }

    // ------------------------------------------------------------------
    // UPDATE / DELETE over a query
    // ------------------------------------------------------------------

    fn update_all(&mut self, query: &Query, lead: Option<&str>) -> Result<()> {
        let sources = SourceTable::build(query)?;
        self.cte(query, &sources)?;
        match lead {
            Some(lead) => self.push(lead),
            None => {
                self.push("UPDATE ");
                self.aliased_source(query, &sources, 0)?;
                self.push(" SET ");
            }
        }
        self.update_fields(query, &sources)?;
        let join_ons = self.using_join(query, &sources, "FROM")?;
        self.where_with_joins(query, join_ons, &sources)?;
        self.returning_query(query, &sources)
    }

    fn delete_all(&mut self, query: &Query) -> Result<()> {
        let sources = SourceTable::build(query)?;
        self.cte(query, &sources)?;
        self.push("DELETE FROM ");
        self.aliased_source(query, &sources, 0)?;
        let join_ons = self.using_join(query, &sources, "USING")?;
        self.where_with_joins(query, join_ons, &sources)?;
        self.returning_query(query, &sources)
    }

    fn update_fields(&mut self, query: &Query, sources: &SourceTable) -> Result<()> {
        let mut first = true;
        for op in &query.updates {
            if !first {
                self.push(", ");
            }
            first = false;
            self.update_op(op, sources)?;
        }
        Ok(())
    }

    fn update_op(&mut self, op: &UpdateOp, sources: &SourceTable) -> Result<()> {
        self.name(&op.field)?;
        match op.kind {
            UpdateKind::Set => {
                self.push(" = ");
                self.expr(&op.value, sources)?;
            }
            UpdateKind::Inc => {
                self.push(" = ");
                self.qualified_name(0, &op.field, sources)?;
                self.push(" + ");
                self.expr(&op.value, sources)?;
            }
            UpdateKind::Push => {
                self.push(" = array_append(");
                self.qualified_name(0, &op.field, sources)?;
                self.push(", ");
                self.expr(&op.value, sources)?;
                self.push(")");
            }
            UpdateKind::Pull => {
                self.push(" = array_remove(");
                self.qualified_name(0, &op.field, sources)?;
                self.push(", ");
                self.expr(&op.value, sources)?;
                self.push(")");
            }
        }
        Ok(())
    }

    /// Lowers joins into a `FROM`/`USING` source list; only inner joins can
    /// be expressed there. Returns the ON expressions to fold into WHERE.
    fn using_join<'q>(
        &mut self,
        query: &'q Query,
        sources: &SourceTable,
        prefix: &str,
    ) -> Result<Vec<&'q Expr>> {
        if query.joins.is_empty() {
            return Ok(Vec::new());
        }
        self.push(" ");
        self.push(prefix);
        self.push(" ");
        let mut first = true;
        for join in &query.joins {
            if join.qual != JoinQual::Inner {
                return Err(Error::Unsupported(format!(
                    "PostgreSQL supports only inner joins on {prefix}, got: {:?}",
                    join.qual
                )));
            }
            if !first {
                self.push(", ");
            }
            first = false;
            self.aliased_source(query, sources, join.ix)?;
        }
        Ok(query
            .joins
            .iter()
            .filter(|join| !matches!(join.on, Expr::Bool(true)))
            .map(|join| &join.on)
            .collect())
    }

    fn where_with_joins(
        &mut self,
        query: &Query,
        join_ons: Vec<&Expr>,
        sources: &SourceTable,
    ) -> Result<()> {
        let exprs = join_ons
            .into_iter()
            .map(|expr| (BoolOp::And, expr))
            .chain(query.wheres.iter().map(|b| (b.op, &b.expr)));
        self.boolean(" WHERE ", exprs, sources)
    }

    fn returning_query(&mut self, query: &Query, sources: &SourceTable) -> Result<()> {
        let Some(fields) = &query.select else {
            return Ok(());
        };
        self.push(" RETURNING ");
        self.select_fields(Some(fields), sources)
    }

    // ------------------------------------------------------------------
    // INSERT / single-row UPDATE / DELETE
    // ------------------------------------------------------------------

    fn insert(
        &mut self,
        prefix: Option<&str>,
        table: &str,
        header: &[&str],
        rows: &[Vec<RowValue>],
        on_conflict: &OnConflict,
        returning: &[&str],
    ) -> Result<()> {
        self.push("INSERT INTO ");
        let table = quote_table(prefix, table)?;
        self.push(&table);
        self.insert_as(on_conflict)?;
        if header.is_empty() {
            self.push(" VALUES ");
            let mut first = true;
            for _ in rows {
                if !first {
                    self.push(",");
                }
                first = false;
                self.push("(DEFAULT)");
            }
        } else {
            self.push(" (");
            for (i, column) in header.iter().enumerate() {
                if i > 0 {
                    self.push(",");
                }
                self.name(column)?;
            }
            self.push(") VALUES ");
            self.insert_rows(rows)?;
        }
        self.on_conflict(on_conflict)?;
        self.returning_fields(returning)
    }

    fn insert_rows(&mut self, rows: &[Vec<RowValue>]) -> Result<()> {
        let mut counter = 1usize;
        let mut first = true;
        for row in rows {
            if !first {
                self.push(",");
            }
            first = false;
            self.push("(");
            let mut first_value = true;
            for value in row {
                if !first_value {
                    self.push(",");
                }
                first_value = false;
                match value {
                    RowValue::Default => self.push("DEFAULT"),
                    RowValue::Subquery { query, params } => {
                        self.push("(");
                        self.all(query)?;
                        self.push(")");
                        counter += params;
                    }
                    RowValue::Param => {
                        self.push("$");
                        self.push(&counter.to_string());
                        counter += 1;
                    }
                }
            }
            self.push(")");
        }
        Ok(())
    }

    /// The insert alias is only needed when ON CONFLICT carries a full
    /// query, which refers to the inserted table by that alias.
    fn insert_as(&mut self, on_conflict: &OnConflict) -> Result<()> {
        if let OnConflict::Update { query, .. } = on_conflict {
            let sources = SourceTable::build(query)?;
            self.push(" AS ");
            let name = sources.get(0)?;
            self.sql.push_str(&name.alias);
        }
        Ok(())
    }

    fn on_conflict(&mut self, on_conflict: &OnConflict) -> Result<()> {
        match on_conflict {
            OnConflict::Raise => Ok(()),
            OnConflict::Nothing(target) => {
                self.push(" ON CONFLICT ");
                self.conflict_target(target)?;
                self.push("DO NOTHING");
                Ok(())
            }
            OnConflict::Replace { fields, target } => {
                self.push(" ON CONFLICT ");
                self.conflict_target(target)?;
                self.push("DO UPDATE SET ");
                let mut first = true;
                for field in fields {
                    if !first {
                        self.push(",");
                    }
                    first = false;
                    self.name(field)?;
                    self.push(" = EXCLUDED.");
                    self.name(field)?;
                }
                Ok(())
            }
            OnConflict::Update { query, target } => {
                self.push(" ON CONFLICT ");
                self.conflict_target(target)?;
                self.push("DO ");
                self.update_all(query, Some("UPDATE SET "))
            }
        }
    }

    fn conflict_target(&mut self, target: &ConflictTarget) -> Result<()> {
        match target {
            ConflictTarget::None => Ok(()),
            ConflictTarget::Columns(columns) => {
                self.push("(");
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    self.name(column)?;
                }
                self.push(") ");
                Ok(())
            }
            ConflictTarget::Constraint(name) => {
                self.push("ON CONSTRAINT ");
                self.name(name)?;
                self.push(" ");
                Ok(())
            }
            ConflictTarget::Fragment(sql) => {
                self.push(sql);
                self.push(" ");
                Ok(())
            }
        }
    }

    fn update(
        &mut self,
        prefix: Option<&str>,
        table: &str,
        fields: &[&str],
        filters: &[Filter],
        returning: &[&str],
    ) -> Result<()> {
        self.push("UPDATE ");
        let table = quote_table(prefix, table)?;
        self.push(&table);
        self.push(" SET ");
        let mut counter = 1usize;
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.name(field)?;
            self.push(" = $");
            self.push(&counter.to_string());
            counter += 1;
        }
        self.filters(filters, counter)?;
        self.returning_fields(returning)
    }

    fn delete(
        &mut self,
        prefix: Option<&str>,
        table: &str,
        filters: &[Filter],
        returning: &[&str],
    ) -> Result<()> {
        self.push("DELETE FROM ");
        let table = quote_table(prefix, table)?;
        self.push(&table);
        self.filters(filters, 1)?;
        self.returning_fields(returning)
    }

    fn filters(&mut self, filters: &[Filter], mut counter: usize) -> Result<()> {
        if filters.is_empty() {
            return Ok(());
        }
        self.push(" WHERE ");
        let mut first = true;
        for filter in filters {
            if !first {
                self.push(" AND ");
            }
            first = false;
            self.name(&filter.field)?;
            if filter.null {
                self.push(" IS NULL");
            } else {
                self.push(" = $");
                self.push(&counter.to_string());
                counter += 1;
            }
        }
        Ok(())
    }

    fn returning_fields(&mut self, returning: &[&str]) -> Result<()> {
        if returning.is_empty() {
            return Ok(());
        }
        self.push(" RETURNING ");
        for (i, field) in returning.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.name(field)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self, e: &Expr, sources: &SourceTable) -> Result<()> {
        match e {
            Expr::Null => self.push("NULL"),
            Expr::Bool(true) => self.push("TRUE"),
            Expr::Bool(false) => self.push("FALSE"),
            Expr::Integer(n) => self.push(&n.to_string()),
            Expr::Float(f) => {
                self.push(&f.to_string());
                self.push("::float");
            }
            Expr::String(s) => {
                let quoted = single_quote(s);
                self.push(&quoted);
            }
            Expr::Bytes(bytes) => {
                self.push("'\\x");
                for byte in bytes {
                    self.push(&format!("{byte:02x}"));
                }
                self.push("'::bytea");
            }
            Expr::Decimal(d) => self.push(&d.to_string()),
            Expr::Tagged { value, ty } => {
                self.expr(value, sources)?;
                self.push("::");
                let db = ty.tagged_to_db(self.dialect.map_type.as_deref())?;
                self.push(&db);
            }
            Expr::Param(ix) => {
                self.push("$");
                self.push(&(ix + 1).to_string());
            }
            Expr::Field { ix, name } => self.qualified_name(*ix, name, sources)?,
            Expr::SourceRef(ix) => {
                let name = sources.get(*ix)?;
                self.sql.push_str(&name.alias);
            }
            Expr::Subquery(query) => {
                self.push("(");
                self.all(query)?;
                self.push(")");
            }
            Expr::Binary { op, left, right } => {
                self.op_to_binary(left, sources)?;
                self.push(op.as_sql());
                self.op_to_binary(right, sources)?;
            }
            Expr::Call {
                name,
                args,
                distinct,
            } => {
                self.push(name);
                self.push("(");
                if *distinct {
                    self.push("DISTINCT ");
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(arg, sources)?;
                }
                self.push(")");
            }
            Expr::In { lhs, rhs } => self.in_expr(lhs, rhs, sources)?,
            Expr::IsNull(inner) => {
                self.expr(inner, sources)?;
                self.push(" IS NULL");
            }
            Expr::Not(inner) => {
                self.push("NOT (");
                self.expr(inner, sources)?;
                self.push(")");
            }
            Expr::Fragment(parts) => self.fragment(parts, sources)?,
            Expr::DatetimeAdd { base, count, unit } => {
                self.expr(base, sources)?;
                self.type_unless_tagged(base, "timestamp");
                self.push(" + ");
                self.interval(count, unit, sources)?;
            }
            Expr::DateAdd { base, count, unit } => {
                self.push("(");
                self.expr(base, sources)?;
                self.type_unless_tagged(base, "date");
                self.push(" + ");
                self.interval(count, unit, sources)?;
                self.push(")::date");
            }
            Expr::Filter { agg, cond } => {
                self.expr(agg, sources)?;
                self.push(" FILTER (WHERE ");
                self.expr(cond, sources)?;
                self.push(")");
            }
            Expr::Over { agg, window } => {
                self.expr(agg, sources)?;
                self.push(" OVER ");
                match window {
                    OverWindow::Named(name) => self.name(name)?,
                    OverWindow::Def(def) => self.window_def(def, sources)?,
                }
            }
            Expr::CountStar => self.push("count(*)"),
            Expr::List(items) => {
                self.push("ARRAY[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    self.expr(item, sources)?;
                }
                self.push("]");
            }
            Expr::Tuple(items) => {
                self.push("(");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    self.expr(item, sources)?;
                }
                self.push(")");
            }
        }
        Ok(())
    }

    fn in_expr(&mut self, lhs: &Expr, rhs: &InRhs, sources: &SourceTable) -> Result<()> {
        match rhs {
            InRhs::Values(values) if values.is_empty() => self.push("false"),
            InRhs::Values(values) => {
                self.expr(lhs, sources)?;
                self.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(",");
                    }
                    self.expr(value, sources)?;
                }
                self.push(")");
            }
            InRhs::Param(ix) => {
                self.expr(lhs, sources)?;
                self.push(" = ANY($");
                self.push(&(ix + 1).to_string());
                self.push(")");
            }
            InRhs::Subquery(query) => {
                self.expr(lhs, sources)?;
                self.push(" = ANY((");
                self.all(query)?;
                self.push("))");
            }
            InRhs::Expr(expr) => {
                self.expr(lhs, sources)?;
                self.push(" = ANY(");
                self.expr(expr, sources)?;
                self.push(")");
            }
        }
        Ok(())
    }

    fn fragment(&mut self, parts: &[FragmentPart], sources: &SourceTable) -> Result<()> {
        let parens = parens_for_select(parts);
        if parens {
            self.push("(");
        }
        for part in parts {
            match part {
                FragmentPart::Raw(sql) => self.push(sql),
                FragmentPart::Expr(expr) => self.expr(expr, sources)?,
            }
        }
        if parens {
            self.push(")");
        }
        Ok(())
    }

    fn type_unless_tagged(&mut self, e: &Expr, cast: &str) {
        if !matches!(e, Expr::Tagged { .. }) {
            self.push("::");
            self.push(cast);
        }
    }

    fn interval(&mut self, count: &Expr, unit: &str, sources: &SourceTable) -> Result<()> {
        match count {
            Expr::Integer(n) => self.push(&format!("interval '{n} {unit}'")),
            Expr::Float(f) => self.push(&format!("interval '{f} {unit}'")),
            other => {
                self.push("(");
                self.expr(other, sources)?;
                self.push(&format!("::numeric * interval '1 {unit}')"));
            }
        }
        Ok(())
    }

    /// Operands that are themselves binary operations get their own
    /// parentheses.
    fn op_to_binary(&mut self, e: &Expr, sources: &SourceTable) -> Result<()> {
        if matches!(e, Expr::Binary { .. }) {
            self.paren_expr(e, sources)
        } else {
            self.expr(e, sources)
        }
    }

    fn paren_expr(&mut self, e: &Expr, sources: &SourceTable) -> Result<()> {
        self.push("(");
        self.expr(e, sources)?;
        self.push(")");
        Ok(())
    }

    fn qualified_name(&mut self, ix: usize, field: &str, sources: &SourceTable) -> Result<()> {
        let name = sources.get(ix)?;
        self.sql.push_str(&name.alias);
        self.push(".");
        self.name(field)
    }
}

/// A fragment whose first raw chunk starts with SELECT gets wrapped in
/// parentheses so it can sit inside a larger expression. Only the leading
/// bytes are checked; a fragment starting with whitespace is not detected.
fn parens_for_select(parts: &[FragmentPart]) -> bool {
    match parts.first() {
        Some(FragmentPart::Raw(sql)) => sql
            .get(..6)
            .is_some_and(|head| head.eq_ignore_ascii_case("select")),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SetOp, Source, With};
    use crate::types::ColumnType;

    fn users() -> Query {
        Query::new(Source::schema_table("users", "User"))
    }

    fn select_id(query: Query) -> Query {
        query.select([SelectField::expr(Expr::field(0, "id"))])
    }

    #[test]
    fn test_simple_select() {
        let query = select_id(users()).and_where(Expr::field(0, "age").gt(Expr::param(0)));
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 WHERE (u0."age" > $1)"#
        );
    }

    #[test]
    fn test_empty_select_list() {
        assert_eq!(
            Dialect::new().all(&users().select([])).unwrap(),
            r#"SELECT TRUE FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_select_aliased_field() {
        let query = users().select([SelectField::aliased(Expr::CountStar, "total")]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT count(*) AS "total" FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_select_source_ref() {
        let query = users().select([SelectField::expr(Expr::SourceRef(0))]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0 FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_select_source_ref_requires_schema() {
        let query = Query::new(Source::table("users")).select([SelectField::expr(Expr::SourceRef(0))]);
        assert!(matches!(
            Dialect::new().all(&query),
            Err(Error::MissingSchema { .. })
        ));
    }

    #[test]
    fn test_in_with_parameter_list() {
        let query = select_id(users()).and_where(Expr::field(0, "id").in_param(0));
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 WHERE (u0."id" = ANY($1))"#
        );
    }

    #[test]
    fn test_in_empty_list_is_false() {
        let query = select_id(users()).and_where(Expr::field(0, "id").in_values([]));
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 WHERE (false)"#
        );
    }

    #[test]
    fn test_in_value_list() {
        let query = select_id(users())
            .and_where(Expr::field(0, "id").in_values([Expr::int(1), Expr::int(2), Expr::int(3)]));
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 WHERE (u0."id" IN (1,2,3))"#
        );
    }

    #[test]
    fn test_boolean_operator_change_reparenthesizes() {
        let a = Expr::field(0, "a").eq(Expr::int(1));
        let b = Expr::field(0, "b").eq(Expr::int(2));
        let c = Expr::field(0, "c").eq(Expr::int(3));

        let query = select_id(users())
            .and_where(a.clone())
            .and_where(b.clone())
            .or_where(c.clone());
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 WHERE ((u0."a" = 1) AND (u0."b" = 2)) OR (u0."c" = 3)"#
        );

        let query = select_id(users()).and_where(a).or_where(b).or_where(c);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 WHERE ((u0."a" = 1)) OR (u0."b" = 2) OR (u0."c" = 3)"#
        );
    }

    #[test]
    fn test_nested_binary_operands_get_parens() {
        let expr = Expr::field(0, "a")
            .eq(Expr::int(1))
            .and(Expr::field(0, "b").eq(Expr::int(2)));
        let query = select_id(users()).and_where(expr);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 WHERE ((u0."a" = 1) AND (u0."b" = 2))"#
        );
    }

    #[test]
    fn test_distinct_on_prepends_order_by() {
        let query = select_id(users())
            .distinct(Distinct::On(vec![
                OrderBy::asc(Expr::field(0, "dept")),
                OrderBy::asc(Expr::field(0, "team")),
            ]))
            .order_by(OrderBy::desc(Expr::field(0, "salary")));
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT DISTINCT ON (u0."dept", u0."team") u0."id" FROM "users" AS u0 ORDER BY u0."dept", u0."team", u0."salary" DESC"#
        );
    }

    #[test]
    fn test_distinct_on_without_explicit_order_by() {
        let query = select_id(users()).distinct(Distinct::On(vec![
            OrderBy::asc(Expr::field(0, "dept")),
            OrderBy::desc(Expr::field(0, "hired_at")),
        ]));
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT DISTINCT ON (u0."dept", u0."hired_at") u0."id" FROM "users" AS u0 ORDER BY u0."dept", u0."hired_at" DESC"#
        );
    }

    #[test]
    fn test_plain_distinct() {
        let query = select_id(users()).distinct(Distinct::All);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT DISTINCT u0."id" FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_joins() {
        let query = users()
            .select([
                SelectField::expr(Expr::field(0, "id")),
                SelectField::expr(Expr::field(1, "title")),
            ])
            .join(
                JoinQual::Left,
                Source::schema_table("posts", "Post"),
                Expr::field(1, "user_id").eq(Expr::field(0, "id")),
            )
            .join(JoinQual::Cross, Source::table("tags"), Expr::Bool(true));
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id", p1."title" FROM "users" AS u0 LEFT OUTER JOIN "posts" AS p1 ON (p1."user_id" = u0."id") CROSS JOIN "tags" AS t2"#
        );
    }

    #[test]
    fn test_lateral_join_keyword() {
        let sub = Query::new(Source::schema_table("posts", "Post"))
            .select([SelectField::expr(Expr::field(0, "id"))]);
        let query = select_id(users()).join(
            JoinQual::InnerLateral,
            Source::Subquery(sub),
            Expr::Bool(true),
        );
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 INNER JOIN LATERAL (SELECT p0."id" FROM "posts" AS p0) AS s1 ON (TRUE)"#
        );
    }

    #[test]
    fn test_table_hints_rejected() {
        let mut query = select_id(users());
        query.from_hints = vec!["USE INDEX".into()];
        assert!(matches!(
            Dialect::new().all(&query),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_group_by_and_having() {
        let query = users()
            .select([SelectField::expr(Expr::field(0, "dept"))])
            .group_by(Expr::field(0, "dept"))
            .and_having(Expr::CountStar.gt(Expr::int(5)));
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."dept" FROM "users" AS u0 GROUP BY u0."dept" HAVING (count(*) > 5)"#
        );
    }

    #[test]
    fn test_limit_offset_lock() {
        let query = select_id(users())
            .limit(Expr::param(0))
            .offset(Expr::int(10))
            .lock("FOR UPDATE");
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 LIMIT $1 OFFSET 10 FOR UPDATE"#
        );
    }

    #[test]
    fn test_cte() {
        let tree = Query::new(Source::table("categories"))
            .select([SelectField::expr(Expr::field(0, "id"))]);
        let mut query = select_id(users());
        query.ctes = Some(With {
            recursive: true,
            queries: vec![("tree".into(), CteQuery::Query(tree))],
        });
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"WITH RECURSIVE "tree" AS (SELECT c0."id" FROM "categories" AS c0) SELECT u0."id" FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_combinations() {
        let others = Query::new(Source::schema_table("admins", "Admin"))
            .select([SelectField::expr(Expr::field(0, "id"))]);
        let query = select_id(users()).combine(SetOp::UnionAll, others);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 UNION ALL (SELECT a0."id" FROM "admins" AS a0)"#
        );
    }

    #[test]
    fn test_subquery_source() {
        let sub = Query::new(Source::schema_table("posts", "Post"))
            .select([SelectField::expr(Expr::field(0, "id"))]);
        let query = Query::new(Source::Subquery(sub))
            .select([SelectField::expr(Expr::field(0, "id"))]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT s0."id" FROM (SELECT p0."id" FROM "posts" AS p0) AS s0"#
        );
    }

    #[test]
    fn test_fragment_source() {
        let query = Query::new(Source::Fragment(vec![FragmentPart::Raw(
            "generate_series(1, 3)".into(),
        )]))
        .select([SelectField::expr(Expr::SourceRef(0))]);
        assert!(matches!(
            Dialect::new().all(&query),
            Err(Error::MissingSchema { .. })
        ));

        let query = Query::new(Source::Fragment(vec![FragmentPart::Raw(
            "generate_series(1, 3)".into(),
        )]))
        .select([SelectField::expr(Expr::Fragment(vec![FragmentPart::Raw(
            "f0".into(),
        )]))]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT f0 FROM generate_series(1, 3) AS f0"#
        );
    }

    #[test]
    fn test_fragment_parens_for_select() {
        let scalar = Expr::Fragment(vec![FragmentPart::Raw("SELECT 1".into())]);
        let query = select_id(users()).and_where(Expr::field(0, "id").eq(scalar));
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 WHERE (u0."id" = (SELECT 1))"#
        );

        // leading whitespace defeats the check, on purpose
        let scalar = Expr::Fragment(vec![FragmentPart::Raw(" SELECT 1".into())]);
        let query = select_id(users()).and_where(Expr::field(0, "id").eq(scalar));
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 WHERE (u0."id" =  SELECT 1)"#
        );
    }

    #[test]
    fn test_datetime_add() {
        let expr = Expr::DatetimeAdd {
            base: Box::new(Expr::field(0, "inserted_at")),
            count: Box::new(Expr::int(1)),
            unit: "month".into(),
        };
        let query = users().select([SelectField::expr(expr)]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."inserted_at"::timestamp + interval '1 month' FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_datetime_add_tagged_base_skips_cast() {
        let expr = Expr::DatetimeAdd {
            base: Box::new(Expr::field(0, "t").tagged(ColumnType::NaiveDatetime)),
            count: Box::new(Expr::int(2)),
            unit: "day".into(),
        };
        let query = users().select([SelectField::expr(expr)]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."t"::timestamp + interval '2 day' FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_date_add_with_expression_count() {
        let expr = Expr::DateAdd {
            base: Box::new(Expr::field(0, "day")),
            count: Box::new(Expr::param(0)),
            unit: "day".into(),
        };
        let query = users().select([SelectField::expr(expr)]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT (u0."day"::date + ($1::numeric * interval '1 day'))::date FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_window_clause_and_over() {
        let avg = Expr::call("avg", [Expr::field(0, "salary")]);
        let query = users()
            .select([SelectField::expr(Expr::Over {
                agg: Box::new(avg),
                window: OverWindow::Named("w".into()),
            })])
            .window(
                "w",
                WindowDef {
                    partition_by: vec![Expr::field(0, "dept")],
                    order_by: vec![OrderBy::desc(Expr::field(0, "salary"))],
                    frame: None,
                },
            );
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT avg(u0."salary") OVER "w" FROM "users" AS u0 WINDOW "w" AS (PARTITION BY u0."dept" ORDER BY u0."salary" DESC)"#
        );
    }

    #[test]
    fn test_over_inline_window() {
        let query = users().select([SelectField::expr(Expr::Over {
            agg: Box::new(Expr::call("row_number", [])),
            window: OverWindow::Def(WindowDef {
                partition_by: vec![Expr::field(0, "dept")],
                order_by: vec![],
                frame: None,
            }),
        })]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT row_number() OVER (PARTITION BY u0."dept") FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_filter_clause() {
        let query = users().select([SelectField::expr(Expr::Filter {
            agg: Box::new(Expr::CountStar),
            cond: Box::new(Expr::field(0, "age").gt(Expr::int(18))),
        })]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT count(*) FILTER (WHERE u0."age" > 18) FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_call_distinct() {
        let query = users().select([SelectField::expr(Expr::Call {
            name: "count".into(),
            args: vec![Expr::field(0, "id")],
            distinct: true,
        })]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT count(DISTINCT u0."id") FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_literals() {
        let query = users().select([
            SelectField::expr(Expr::Null),
            SelectField::expr(Expr::Bool(true)),
            SelectField::expr(Expr::Float(1.5)),
            SelectField::expr(Expr::string("it's")),
            SelectField::expr(Expr::Bytes(vec![0xde, 0xad])),
            SelectField::expr(Expr::List(vec![Expr::int(1), Expr::int(2)])),
            SelectField::expr(Expr::Tuple(vec![Expr::int(1), Expr::int(2)])),
        ]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT NULL, TRUE, 1.5::float, 'it''s', '\xdead'::bytea, ARRAY[1,2], (1,2) FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_tagged_casts() {
        let query = users().select([
            SelectField::expr(Expr::param(0).tagged(ColumnType::Integer)),
            SelectField::expr(Expr::param(1).tagged(ColumnType::Array(Box::new(ColumnType::String)))),
        ]);
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT $1::bigint, $2::varchar[] FROM "users" AS u0"#
        );
    }

    #[test]
    fn test_not_and_is_null() {
        let query = select_id(users())
            .and_where(Expr::field(0, "deleted_at").is_null().not());
        assert_eq!(
            Dialect::new().all(&query).unwrap(),
            r#"SELECT u0."id" FROM "users" AS u0 WHERE (NOT (u0."deleted_at" IS NULL))"#
        );
    }

    #[test]
    fn test_update_all() {
        let query = Query::new(Source::schema_table("users", "User"))
            .update(UpdateOp::set("name", Expr::param(0)))
            .update(UpdateOp::inc("visits", Expr::int(1)))
            .and_where(Expr::field(0, "id").eq(Expr::param(1)));
        assert_eq!(
            Dialect::new().update_all(&query).unwrap(),
            r#"UPDATE "users" AS u0 SET "name" = $1, "visits" = u0."visits" + 1 WHERE (u0."id" = $2)"#
        );
    }

    #[test]
    fn test_update_all_array_ops() {
        let query = Query::new(Source::schema_table("users", "User"))
            .update(UpdateOp::push("tags", Expr::param(0)))
            .update(UpdateOp::pull("roles", Expr::param(1)));
        assert_eq!(
            Dialect::new().update_all(&query).unwrap(),
            r#"UPDATE "users" AS u0 SET "tags" = array_append(u0."tags", $1), "roles" = array_remove(u0."roles", $2)"#
        );
    }

    #[test]
    fn test_update_all_lowers_inner_join() {
        let query = Query::new(Source::schema_table("users", "User"))
            .update(UpdateOp::set("active", Expr::Bool(false)))
            .join(
                JoinQual::Inner,
                Source::table("bans"),
                Expr::field(1, "user_id").eq(Expr::field(0, "id")),
            );
        assert_eq!(
            Dialect::new().update_all(&query).unwrap(),
            r#"UPDATE "users" AS u0 SET "active" = FALSE FROM "bans" AS b1 WHERE (b1."user_id" = u0."id")"#
        );
    }

    #[test]
    fn test_update_all_returning() {
        let query = Query::new(Source::schema_table("users", "User"))
            .update(UpdateOp::set("name", Expr::param(0)))
            .select([SelectField::expr(Expr::field(0, "id"))]);
        assert_eq!(
            Dialect::new().update_all(&query).unwrap(),
            r#"UPDATE "users" AS u0 SET "name" = $1 RETURNING u0."id""#
        );
    }

    #[test]
    fn test_delete_all_with_using() {
        let query = Query::new(Source::schema_table("users", "User")).join(
            JoinQual::Inner,
            Source::table("bans"),
            Expr::field(1, "user_id").eq(Expr::field(0, "id")),
        );
        assert_eq!(
            Dialect::new().delete_all(&query).unwrap(),
            r#"DELETE FROM "users" AS u0 USING "bans" AS b1 WHERE (b1."user_id" = u0."id")"#
        );
    }

    #[test]
    fn test_join_lowering_rejects_outer_joins() {
        let query = Query::new(Source::schema_table("users", "User")).join(
            JoinQual::Left,
            Source::table("bans"),
            Expr::field(1, "user_id").eq(Expr::field(0, "id")),
        );
        assert!(matches!(
            Dialect::new().delete_all(&query),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            Dialect::new().update_all(&query),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_insert_many_rows() {
        let rows = vec![
            vec![RowValue::Param, RowValue::Param],
            vec![RowValue::Param, RowValue::Param],
        ];
        assert_eq!(
            Dialect::new()
                .insert(
                    None,
                    "posts",
                    &["title", "body"],
                    &rows,
                    &OnConflict::Raise,
                    &["id"],
                )
                .unwrap(),
            r#"INSERT INTO "posts" ("title","body") VALUES ($1,$2),($3,$4) RETURNING "id""#
        );
    }

    #[test]
    fn test_insert_default_and_subquery_values() {
        let sub = Query::new(Source::schema_table("counters", "Counter"))
            .select([SelectField::expr(Expr::field(0, "value"))])
            .and_where(Expr::field(0, "id").eq(Expr::param(1)));
        let rows = vec![vec![
            RowValue::Param,
            RowValue::Default,
            RowValue::Subquery { query: sub, params: 1 },
            RowValue::Param,
        ]];
        assert_eq!(
            Dialect::new()
                .insert(
                    None,
                    "posts",
                    &["title", "rank", "views", "body"],
                    &rows,
                    &OnConflict::Raise,
                    &[],
                )
                .unwrap(),
            r#"INSERT INTO "posts" ("title","rank","views","body") VALUES ($1,DEFAULT,(SELECT c0."value" FROM "counters" AS c0 WHERE (c0."id" = $2)),$3)"#
        );
    }

    #[test]
    fn test_insert_empty_header() {
        let rows = vec![Vec::new(), Vec::new()];
        assert_eq!(
            Dialect::new()
                .insert(None, "logs", &[], &rows, &OnConflict::Raise, &[])
                .unwrap(),
            r#"INSERT INTO "logs" VALUES (DEFAULT),(DEFAULT)"#
        );
    }

    #[test]
    fn test_insert_with_prefix() {
        let rows = vec![vec![RowValue::Param]];
        assert_eq!(
            Dialect::new()
                .insert(Some("tenant"), "posts", &["title"], &rows, &OnConflict::Raise, &[])
                .unwrap(),
            r#"INSERT INTO "tenant"."posts" ("title") VALUES ($1)"#
        );
    }

    #[test]
    fn test_on_conflict_do_nothing() {
        let rows = vec![vec![RowValue::Param]];
        assert_eq!(
            Dialect::new()
                .insert(
                    None,
                    "t",
                    &["a"],
                    &rows,
                    &OnConflict::Nothing(ConflictTarget::Columns(vec!["a".into()])),
                    &[],
                )
                .unwrap(),
            r#"INSERT INTO "t" ("a") VALUES ($1) ON CONFLICT ("a") DO NOTHING"#
        );
    }

    #[test]
    fn test_on_conflict_no_target() {
        let rows = vec![vec![RowValue::Param]];
        assert_eq!(
            Dialect::new()
                .insert(
                    None,
                    "t",
                    &["a"],
                    &rows,
                    &OnConflict::Nothing(ConflictTarget::None),
                    &[],
                )
                .unwrap(),
            r#"INSERT INTO "t" ("a") VALUES ($1) ON CONFLICT DO NOTHING"#
        );
    }

    #[test]
    fn test_on_conflict_replace_fields() {
        let rows = vec![vec![RowValue::Param, RowValue::Param]];
        assert_eq!(
            Dialect::new()
                .insert(
                    None,
                    "posts",
                    &["id", "body"],
                    &rows,
                    &OnConflict::Replace {
                        fields: vec!["body".into()],
                        target: ConflictTarget::Constraint("posts_pkey".into()),
                    },
                    &[],
                )
                .unwrap(),
            r#"INSERT INTO "posts" ("id","body") VALUES ($1,$2) ON CONFLICT ON CONSTRAINT "posts_pkey" DO UPDATE SET "body" = EXCLUDED."body""#
        );
    }

    #[test]
    fn test_on_conflict_query_aliases_the_table() {
        let conflict = Query::new(Source::schema_table("posts", "Post"))
            .update(UpdateOp::inc("views", Expr::int(1)));
        let rows = vec![vec![RowValue::Param, RowValue::Param]];
        assert_eq!(
            Dialect::new()
                .insert(
                    None,
                    "posts",
                    &["id", "views"],
                    &rows,
                    &OnConflict::Update {
                        query: conflict,
                        target: ConflictTarget::Columns(vec!["id".into()]),
                    },
                    &[],
                )
                .unwrap(),
            r#"INSERT INTO "posts" AS p0 ("id","views") VALUES ($1,$2) ON CONFLICT ("id") DO UPDATE SET "views" = p0."views" + 1"#
        );
    }

    #[test]
    fn test_single_row_update() {
        assert_eq!(
            Dialect::new()
                .update(
                    None,
                    "users",
                    &["name", "email"],
                    &[Filter::bind("id"), Filter::is_null("deleted_at")],
                    &["id"],
                )
                .unwrap(),
            r#"UPDATE "users" SET "name" = $1, "email" = $2 WHERE "id" = $3 AND "deleted_at" IS NULL RETURNING "id""#
        );
    }

    #[test]
    fn test_single_row_delete() {
        assert_eq!(
            Dialect::new()
                .delete(Some("tenant"), "users", &[Filter::bind("id")], &[])
                .unwrap(),
            r#"DELETE FROM "tenant"."users" WHERE "id" = $1"#
        );
    }

    #[test]
    fn test_table_exists_query() {
        let (sql, params) = Dialect::new().table_exists_query("users");
        assert_eq!(
            sql,
            "SELECT true FROM information_schema.tables WHERE table_name = $1 AND table_schema = current_schema() LIMIT 1"
        );
        assert_eq!(params, vec!["users".to_string()]);
    }

    #[test]
    fn test_bad_identifier_is_rejected() {
        let query = select_id(users()).and_where(Expr::field(0, "a\"b").eq(Expr::int(1)));
        assert!(matches!(
            Dialect::new().all(&query),
            Err(Error::BadIdentifier(_))
        ));
    }
}
