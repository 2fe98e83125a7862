//! PostgreSQL SQL generation.
//!
//! Build queries and migration commands as typed ASTs, then render them to
//! wire-ready SQL strings with `$1, $2, …` placeholders. Rendering is pure:
//! no I/O, no shared state, output order is the left-to-right traversal of
//! the AST.

mod ddl;
mod error;
mod expr;
mod query;
mod render;
mod sources;
mod types;

pub use ddl::*;
pub use error::{Error, Result};
pub use expr::*;
pub use query::*;
pub use render::*;
pub use sources::*;
pub use types::*;

/// Quote a SQL identifier (table or column name).
///
/// Identifiers are always double-quoted. An identifier that itself contains
/// a double quote is rejected rather than escaped: nothing in a query or
/// migration AST legitimately produces one.
pub fn quote_name(name: &str) -> Result<String> {
    if name.contains('"') {
        return Err(Error::BadIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

/// Quote a possibly schema-qualified table name.
pub fn quote_table(prefix: Option<&str>, name: &str) -> Result<String> {
    match prefix {
        Some(prefix) => Ok(format!("{}.{}", quote_name(prefix)?, quote_name(name)?)),
        None => quote_name(name),
    }
}

/// Escape a string for inclusion in a single-quoted SQL literal.
pub fn escape_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Render a single-quoted SQL string literal.
pub fn single_quote(s: &str) -> String {
    format!("'{}'", escape_string(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_name() {
        assert_eq!(quote_name("users").unwrap(), "\"users\"");
        assert_eq!(quote_name("select").unwrap(), "\"select\"");
        assert!(quote_name("bad\"name").is_err());
    }

    #[test]
    fn test_quote_table() {
        assert_eq!(quote_table(None, "users").unwrap(), "\"users\"");
        assert_eq!(
            quote_table(Some("audit"), "users").unwrap(),
            "\"audit\".\"users\""
        );
    }

    #[test]
    fn test_single_quote() {
        assert_eq!(single_quote("it's"), "'it''s'");
        assert_eq!(single_quote(""), "''");
    }
}
