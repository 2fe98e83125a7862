//! Migration AST and DDL rendering.
//!
//! Each command renders to an ordered list of statements: the primary DDL
//! first, then any `COMMENT ON …` follow-ups, so comments run once the
//! object exists.

use crate::render::Dialect;
use crate::types::ColumnType;
use crate::{Error, Result, quote_name, quote_table, single_quote};

/// A table in a migration command.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub prefix: Option<String>,
    pub comment: Option<String>,
    /// Raw trailing options for CREATE TABLE, e.g. `WITH (fillfactor=70)`.
    pub options: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            comment: None,
            options: None,
        }
    }
}

/// A foreign key column descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub table: String,
    pub column: String,
    pub prefix: Option<String>,
    pub ty: ColumnType,
    /// Constraint name; defaults to `<table>_<column>_fkey`.
    pub name: Option<String>,
    pub on_delete: ReferenceAction,
    pub on_update: ReferenceAction,
}

impl Reference {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: "id".into(),
            prefix: None,
            ty: ColumnType::BigSerial,
            name: None,
            on_delete: ReferenceAction::Nothing,
            on_update: ReferenceAction::Nothing,
        }
    }
}

/// What happens to the referencing row when the referenced one changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceAction {
    Nothing,
    /// `SET NULL`
    NilifyAll,
    /// `CASCADE` on delete.
    DeleteAll,
    /// `CASCADE` on update.
    UpdateAll,
    /// `RESTRICT`
    Restrict,
}

/// An index in a migration command.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub prefix: Option<String>,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
    pub concurrently: bool,
    pub using: Option<String>,
    pub where_: Option<String>,
    pub comment: Option<String>,
}

impl Index {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            prefix: None,
            columns: Vec::new(),
            unique: false,
            concurrently: false,
            using: None,
            where_: None,
            comment: None,
        }
    }
}

/// One indexed column or expression.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexColumn {
    /// A column name, quoted.
    Column(String),
    /// A raw index expression, spliced in as-is.
    Expr(String),
}

/// A named table constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub table: String,
    pub prefix: Option<String>,
    pub check: Option<String>,
    pub exclude: Option<String>,
    pub comment: Option<String>,
}

impl Constraint {
    pub fn check(table: impl Into<String>, name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            prefix: None,
            check: Some(expr.into()),
            exclude: None,
            comment: None,
        }
    }

    pub fn exclude(
        table: impl Into<String>,
        name: impl Into<String>,
        expr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            prefix: None,
            check: None,
            exclude: Some(expr.into()),
            comment: None,
        }
    }
}

/// A column default.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Null,
    /// A string literal; NUL bytes are rejected.
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// JSON-encoded and single-quoted.
    Map(serde_json::Value),
    /// `ARRAY[…]::T[]`; only valid on array columns.
    List(Vec<DefaultValue>),
    /// Raw SQL spliced in as-is.
    Fragment(String),
}

/// Options of one column definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnOpts {
    pub primary_key: bool,
    pub null: Option<bool>,
    pub default: Option<DefaultValue>,
    pub size: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub comment: Option<String>,
    /// The reference this column is migrating away from (modify only);
    /// its constraint is dropped before the column type changes.
    pub from: Option<Reference>,
}

/// A column's type: a plain type or a foreign key.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSpec {
    Type(ColumnType),
    Reference(Reference),
}

/// One column of a CREATE TABLE or ALTER TABLE command.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub spec: ColumnSpec,
    pub opts: ColumnOpts,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            spec: ColumnSpec::Type(ty),
            opts: ColumnOpts::default(),
        }
    }

    pub fn reference(name: impl Into<String>, reference: Reference) -> Self {
        Self {
            name: name.into(),
            spec: ColumnSpec::Reference(reference),
            opts: ColumnOpts::default(),
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.opts.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.opts.null = Some(false);
        self
    }

    pub fn default(mut self, default: DefaultValue) -> Self {
        self.opts.default = Some(default);
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.opts.size = Some(size);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.opts.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.opts.scale = Some(scale);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.opts.comment = Some(comment.into());
        self
    }
}

/// One change of an ALTER TABLE command.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    Add(ColumnDef),
    AddIfNotExists(ColumnDef),
    Modify(ColumnDef),
    Remove(String),
    RemoveIfExists(String),
}

/// A migration command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTable {
        table: Table,
        columns: Vec<ColumnDef>,
        if_not_exists: bool,
    },
    DropTable {
        table: Table,
        if_exists: bool,
    },
    AlterTable {
        table: Table,
        changes: Vec<ColumnChange>,
    },
    CreateIndex {
        index: Index,
        if_not_exists: bool,
    },
    DropIndex {
        index: Index,
        if_exists: bool,
    },
    RenameTable {
        from: Table,
        to: Table,
    },
    RenameColumn {
        table: Table,
        from: String,
        to: String,
    },
    CreateConstraint(Constraint),
    DropConstraint {
        constraint: Constraint,
        if_exists: bool,
    },
    /// A raw SQL statement passed through untouched.
    Raw(String),
}

impl Dialect {
    /// Render a migration command to an ordered list of SQL statements.
    pub fn execute_ddl(&self, command: &Command) -> Result<Vec<String>> {
        match command {
            Command::CreateTable {
                table,
                columns,
                if_not_exists,
            } => self.create_table(table, columns, *if_not_exists),
            Command::DropTable { table, if_exists } => Ok(vec![format!(
                "DROP TABLE {}{}",
                if_do(*if_exists, "IF EXISTS "),
                quote_table(table.prefix.as_deref(), &table.name)?,
            )]),
            Command::AlterTable { table, changes } => self.alter_table(table, changes),
            Command::CreateIndex {
                index,
                if_not_exists,
            } => self.create_index(index, *if_not_exists),
            Command::DropIndex { index, if_exists } => Ok(vec![format!(
                "DROP INDEX {}{}{}",
                if_do(index.concurrently, "CONCURRENTLY "),
                if_do(*if_exists, "IF EXISTS "),
                quote_table(index.prefix.as_deref(), &index.name)?,
            )]),
            Command::RenameTable { from, to } => Ok(vec![format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_table(from.prefix.as_deref(), &from.name)?,
                quote_name(&to.name)?,
            )]),
            Command::RenameColumn { table, from, to } => Ok(vec![format!(
                "ALTER TABLE {} RENAME {} TO {}",
                quote_table(table.prefix.as_deref(), &table.name)?,
                quote_name(from)?,
                quote_name(to)?,
            )]),
            Command::CreateConstraint(constraint) => self.create_constraint(constraint),
            Command::DropConstraint {
                constraint,
                if_exists,
            } => Ok(vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT {}{}",
                quote_table(constraint.prefix.as_deref(), &constraint.table)?,
                if_do(*if_exists, "IF EXISTS "),
                quote_name(&constraint.name)?,
            )]),
            Command::Raw(sql) => Ok(vec![sql.clone()]),
        }
    }

    fn create_table(
        &self,
        table: &Table,
        columns: &[ColumnDef],
        if_not_exists: bool,
    ) -> Result<Vec<String>> {
        let table_name = quote_table(table.prefix.as_deref(), &table.name)?;
        let mut defs = Vec::with_capacity(columns.len());
        for column in columns {
            defs.push(self.column_definition(table, column)?);
        }
        let pk = pk_definition(columns.iter().map(|c| (c.name.as_str(), &c.opts)), ", ")?;
        let options = match &table.options {
            Some(options) => format!(" {options}"),
            None => String::new(),
        };
        let mut statements = vec![format!(
            "CREATE TABLE {}{table_name} ({}{pk}){options}",
            if_do(if_not_exists, "IF NOT EXISTS "),
            defs.join(", "),
        )];
        statements.extend(comments_on("TABLE", &table_name, table.comment.as_deref()));
        statements.extend(column_comments(
            &table_name,
            columns.iter().map(|c| (c.name.as_str(), &c.opts)),
        )?);
        Ok(statements)
    }

    fn alter_table(&self, table: &Table, changes: &[ColumnChange]) -> Result<Vec<String>> {
        let table_name = quote_table(table.prefix.as_deref(), &table.name)?;
        let mut rendered = Vec::with_capacity(changes.len());
        for change in changes {
            rendered.push(self.column_change(table, change)?);
        }
        let pk = pk_definition(
            changes
                .iter()
                .filter_map(changed_column)
                .map(|c| (c.name.as_str(), &c.opts)),
            ", ADD ",
        )?;
        let mut statements = vec![format!(
            "ALTER TABLE {table_name} {}{pk}",
            rendered.join(", ")
        )];
        statements.extend(column_comments(
            &table_name,
            changes
                .iter()
                .filter_map(changed_column)
                .map(|c| (c.name.as_str(), &c.opts)),
        )?);
        Ok(statements)
    }

    fn column_change(&self, table: &Table, change: &ColumnChange) -> Result<String> {
        match change {
            ColumnChange::Add(column) => {
                Ok(format!("ADD COLUMN {}", self.column_definition(table, column)?))
            }
            ColumnChange::AddIfNotExists(column) => Ok(format!(
                "ADD COLUMN IF NOT EXISTS {}",
                self.column_definition(table, column)?
            )),
            ColumnChange::Modify(column) => self.modify_column(table, column),
            ColumnChange::Remove(name) => Ok(format!("DROP COLUMN {}", quote_name(name)?)),
            ColumnChange::RemoveIfExists(name) => {
                Ok(format!("DROP COLUMN IF EXISTS {}", quote_name(name)?))
            }
        }
    }

    fn column_definition(&self, table: &Table, column: &ColumnDef) -> Result<String> {
        match &column.spec {
            ColumnSpec::Type(ty) => Ok(format!(
                "{} {}{}",
                quote_name(&column.name)?,
                self.column_type(ty, &column.opts)?,
                self.column_options(ty, &column.opts)?,
            )),
            ColumnSpec::Reference(reference) => Ok(format!(
                "{} {}{}{}",
                quote_name(&column.name)?,
                self.reference_column_type(reference, &column.opts)?,
                self.column_options(&reference.ty, &column.opts)?,
                reference_expr(reference, table, &column.name)?,
            )),
        }
    }

    fn modify_column(&self, table: &Table, column: &ColumnDef) -> Result<String> {
        let mut out = String::new();
        if let Some(previous) = &column.opts.from {
            out.push_str("DROP CONSTRAINT ");
            out.push_str(&reference_name(previous, table, &column.name)?);
            out.push_str(", ");
        }
        out.push_str("ALTER COLUMN ");
        out.push_str(&quote_name(&column.name)?);
        out.push_str(" TYPE ");
        let ty = match &column.spec {
            ColumnSpec::Type(ty) => {
                out.push_str(&self.column_type(ty, &column.opts)?);
                ty
            }
            ColumnSpec::Reference(reference) => {
                out.push_str(&self.reference_column_type(reference, &column.opts)?);
                out.push_str(&add_constraint_expr(reference, table, &column.name)?);
                &reference.ty
            }
        };
        match column.opts.null {
            Some(true) => {
                out.push_str(", ALTER COLUMN ");
                out.push_str(&quote_name(&column.name)?);
                out.push_str(" DROP NOT NULL");
            }
            Some(false) => {
                out.push_str(", ALTER COLUMN ");
                out.push_str(&quote_name(&column.name)?);
                out.push_str(" SET NOT NULL");
            }
            None => {}
        }
        if let Some(default) = &column.opts.default {
            out.push_str(", ALTER COLUMN ");
            out.push_str(&quote_name(&column.name)?);
            out.push_str(" SET DEFAULT ");
            out.push_str(&self.default_expr(default, ty)?);
        }
        Ok(out)
    }

    /// Default then nullability, both optional.
    fn column_options(&self, ty: &ColumnType, opts: &ColumnOpts) -> Result<String> {
        let mut out = String::new();
        if let Some(default) = &opts.default {
            out.push_str(" DEFAULT ");
            out.push_str(&self.default_expr(default, ty)?);
        }
        match opts.null {
            Some(false) => out.push_str(" NOT NULL"),
            Some(true) => out.push_str(" NULL"),
            None => {}
        }
        Ok(out)
    }

    fn default_expr(&self, default: &DefaultValue, ty: &ColumnType) -> Result<String> {
        Ok(match default {
            DefaultValue::Null => "NULL".into(),
            DefaultValue::String(s) => {
                if s.contains('\0') {
                    return Err(Error::BadDefault(
                        "string defaults may not contain null bytes".into(),
                    ));
                }
                single_quote(s)
            }
            DefaultValue::Integer(n) => n.to_string(),
            DefaultValue::Float(f) => f.to_string(),
            DefaultValue::Boolean(b) => b.to_string(),
            DefaultValue::Map(map) => {
                let json = serde_json::to_string(map)
                    .map_err(|e| Error::BadDefault(e.to_string()))?;
                single_quote(&json)
            }
            DefaultValue::List(items) => {
                let ColumnType::Array(inner) = ty else {
                    return Err(Error::BadDefault(
                        "array defaults are only allowed on array columns".into(),
                    ));
                };
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    rendered.push(self.default_expr(item, inner)?);
                }
                format!(
                    "ARRAY[{}]::{}[]",
                    rendered.join(","),
                    inner.to_db(self.map_type.as_deref())?
                )
            }
            DefaultValue::Fragment(sql) => sql.clone(),
        })
    }

    /// Type name with size/precision/scale applied.
    fn column_type(&self, ty: &ColumnType, opts: &ColumnOpts) -> Result<String> {
        let map_type = self.map_type.as_deref();
        Ok(match ty {
            ColumnType::Array(inner) => format!("{}[]", self.column_type(inner, opts)?),
            ColumnType::Time | ColumnType::UtcDatetime | ColumnType::NaiveDatetime => {
                format!("{}({})", ty.to_db(map_type)?, opts.precision.unwrap_or(0))
            }
            ColumnType::TimeUsec | ColumnType::UtcDatetimeUsec | ColumnType::NaiveDatetimeUsec => {
                let base = ty.to_db(map_type)?;
                match opts.precision {
                    Some(precision) => format!("{base}({precision})"),
                    None => base,
                }
            }
            _ => {
                let base = ty.to_db(map_type)?;
                if let Some(size) = opts.size {
                    format!("{base}({size})")
                } else if let Some(precision) = opts.precision {
                    format!("{base}({precision},{})", opts.scale.unwrap_or(0))
                } else if matches!(ty, ColumnType::String) {
                    format!("{base}(255)")
                } else {
                    base
                }
            }
        })
    }

    /// The column type of a foreign key: serial keys become their plain
    /// integer counterparts.
    fn reference_column_type(&self, reference: &Reference, opts: &ColumnOpts) -> Result<String> {
        match reference.ty {
            ColumnType::Serial => Ok("integer".into()),
            ColumnType::BigSerial => Ok("bigint".into()),
            _ => self.column_type(&reference.ty, opts),
        }
    }

    fn create_index(&self, index: &Index, if_not_exists: bool) -> Result<Vec<String>> {
        if if_not_exists && index.concurrently {
            return Err(Error::Unsupported(
                "concurrent index creation cannot be combined with create-if-not-exists".into(),
            ));
        }
        let mut fields = Vec::with_capacity(index.columns.len());
        for column in &index.columns {
            fields.push(match column {
                IndexColumn::Column(name) => quote_name(name)?,
                IndexColumn::Expr(sql) => sql.clone(),
            });
        }
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if index.concurrently {
            sql.push_str("CONCURRENTLY ");
        }
        sql.push_str(&quote_name(&index.name)?);
        sql.push_str(" ON ");
        sql.push_str(&quote_table(index.prefix.as_deref(), &index.table)?);
        if let Some(using) = &index.using {
            sql.push_str(" USING ");
            sql.push_str(using);
        }
        sql.push_str(" (");
        sql.push_str(&fields.join(", "));
        sql.push(')');
        if let Some(predicate) = &index.where_ {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        let primary = if if_not_exists {
            format!("DO $$ BEGIN {sql}; EXCEPTION WHEN duplicate_table THEN END; $$;")
        } else {
            sql
        };
        let mut statements = vec![primary];
        statements.extend(comments_on(
            "INDEX",
            &quote_name(&index.name)?,
            index.comment.as_deref(),
        ));
        Ok(statements)
    }

    fn create_constraint(&self, constraint: &Constraint) -> Result<Vec<String>> {
        let table_name = quote_table(constraint.prefix.as_deref(), &constraint.table)?;
        let body = match (&constraint.check, &constraint.exclude) {
            (Some(check), None) => format!("CHECK ({check})"),
            (None, Some(exclude)) => format!("EXCLUDE USING {exclude}"),
            _ => {
                return Err(Error::Unsupported(
                    "a constraint needs exactly one of check or exclude".into(),
                ));
            }
        };
        let mut statements = vec![format!(
            "ALTER TABLE {table_name} ADD CONSTRAINT {} {body}",
            quote_name(&constraint.name)?,
        )];
        if let Some(comment) = &constraint.comment {
            statements.push(format!(
                "COMMENT ON CONSTRAINT {} ON {table_name} IS {}",
                quote_name(&constraint.name)?,
                single_quote(comment),
            ));
        }
        Ok(statements)
    }
}

fn if_do(cond: bool, s: &str) -> &str {
    if cond { s } else { "" }
}

fn changed_column(change: &ColumnChange) -> Option<&ColumnDef> {
    match change {
        ColumnChange::Add(column)
        | ColumnChange::AddIfNotExists(column)
        | ColumnChange::Modify(column) => Some(column),
        _ => None,
    }
}

fn pk_definition<'a>(
    columns: impl Iterator<Item = (&'a str, &'a ColumnOpts)>,
    prefix: &str,
) -> Result<String> {
    let mut pks = Vec::new();
    for (name, opts) in columns {
        if opts.primary_key {
            pks.push(quote_name(name)?);
        }
    }
    if pks.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("{prefix}PRIMARY KEY ({})", pks.join(", ")))
}

/// Inline reference clause of a column definition:
/// `CONSTRAINT "name" REFERENCES "table"("column") [ON DELETE …] [ON UPDATE …]`.
fn reference_expr(reference: &Reference, table: &Table, column: &str) -> Result<String> {
    let prefix = reference.prefix.as_deref().or(table.prefix.as_deref());
    Ok(format!(
        " CONSTRAINT {} REFERENCES {}({}){}{}",
        reference_name(reference, table, column)?,
        quote_table(prefix, &reference.table)?,
        quote_name(&reference.column)?,
        on_delete_sql(reference.on_delete),
        on_update_sql(reference.on_update),
    ))
}

/// Standalone reference clause used by column modify:
/// `, ADD CONSTRAINT "name" FOREIGN KEY ("column") REFERENCES …`.
fn add_constraint_expr(reference: &Reference, table: &Table, column: &str) -> Result<String> {
    let prefix = reference.prefix.as_deref().or(table.prefix.as_deref());
    Ok(format!(
        ", ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}){}{}",
        reference_name(reference, table, column)?,
        quote_name(column)?,
        quote_table(prefix, &reference.table)?,
        quote_name(&reference.column)?,
        on_delete_sql(reference.on_delete),
        on_update_sql(reference.on_update),
    ))
}

fn reference_name(reference: &Reference, table: &Table, column: &str) -> Result<String> {
    match &reference.name {
        Some(name) => quote_name(name),
        None => quote_name(&format!("{}_{}_fkey", table.name, column)),
    }
}

fn on_delete_sql(action: ReferenceAction) -> &'static str {
    match action {
        ReferenceAction::NilifyAll => " ON DELETE SET NULL",
        ReferenceAction::DeleteAll => " ON DELETE CASCADE",
        ReferenceAction::Restrict => " ON DELETE RESTRICT",
        _ => "",
    }
}

fn on_update_sql(action: ReferenceAction) -> &'static str {
    match action {
        ReferenceAction::NilifyAll => " ON UPDATE SET NULL",
        ReferenceAction::UpdateAll => " ON UPDATE CASCADE",
        ReferenceAction::Restrict => " ON UPDATE RESTRICT",
        _ => "",
    }
}

fn comments_on(object: &str, name: &str, comment: Option<&str>) -> Vec<String> {
    match comment {
        Some(comment) => vec![format!(
            "COMMENT ON {object} {name} IS {}",
            single_quote(comment)
        )],
        None => Vec::new(),
    }
}

fn column_comments<'a>(
    table_name: &str,
    columns: impl Iterator<Item = (&'a str, &'a ColumnOpts)>,
) -> Result<Vec<String>> {
    let mut statements = Vec::new();
    for (name, opts) in columns {
        if let Some(comment) = &opts.comment {
            let column = format!("{table_name}.{}", quote_name(name)?);
            statements.extend(comments_on("COLUMN", &column, Some(comment)));
        }
    }
    Ok(statements)
}
