use thiserror::Error;

/// Errors raised while rendering SQL.
///
/// All of these are programmer errors in the query or migration AST, not
/// user-data errors: they surface at render time, before anything reaches
/// the wire.
#[derive(Debug, Error)]
pub enum Error {
    /// The AST asks for something PostgreSQL cannot express.
    #[error("{0}")]
    Unsupported(String),

    /// A table or field name contains an embedded double quote.
    #[error("bad identifier {0:?}: embedded double quotes are not allowed")]
    BadIdentifier(String),

    /// An expression references a source index outside the query's sources.
    #[error("source index {0} is out of range for this query")]
    BadSourceRef(usize),

    /// Selecting all fields of a source that has no schema.
    #[error(
        "cannot select all fields of {alias}: it has no schema, \
         select the fields explicitly instead"
    )]
    MissingSchema { alias: String },

    /// A column default that cannot be rendered.
    #[error("bad default value: {0}")]
    BadDefault(String),

    /// A map column was rendered without a configured map type.
    #[error("map columns require a map type (e.g. \"jsonb\") configured on the dialect")]
    MapTypeNotConfigured,
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, Error>;
