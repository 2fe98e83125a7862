//! Decode constraint violations out of driver errors.

use tokio_postgres::error::{DbError, SqlState};

/// The kind of constraint behind a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Exclusion,
    Check,
}

impl ConstraintKind {
    fn from_code(code: &SqlState) -> Option<Self> {
        if code == &SqlState::UNIQUE_VIOLATION {
            Some(ConstraintKind::Unique)
        } else if code == &SqlState::FOREIGN_KEY_VIOLATION {
            Some(ConstraintKind::ForeignKey)
        } else if code == &SqlState::EXCLUSION_VIOLATION {
            Some(ConstraintKind::Exclusion)
        } else if code == &SqlState::CHECK_VIOLATION {
            Some(ConstraintKind::Check)
        } else {
            None
        }
    }

    fn sentinel(self) -> &'static str {
        match self {
            ConstraintKind::Unique => " unique constraint ",
            ConstraintKind::ForeignKey => " foreign key constraint ",
            ConstraintKind::Exclusion => " exclusion constraint ",
            ConstraintKind::Check => " check constraint ",
        }
    }
}

/// Decode an error into `(kind, constraint-name)` pairs.
///
/// Anything that is not a recognized constraint violation decodes to an
/// empty list; the error itself propagates elsewhere untouched.
pub fn to_constraints(error: &tokio_postgres::Error) -> Vec<(ConstraintKind, String)> {
    error.as_db_error().map(db_constraints).unwrap_or_default()
}

/// Decode a server error into `(kind, constraint-name)` pairs.
pub fn db_constraints(error: &DbError) -> Vec<(ConstraintKind, String)> {
    let Some(kind) = ConstraintKind::from_code(error.code()) else {
        return Vec::new();
    };
    if let Some(constraint) = error.constraint() {
        return vec![(kind, constraint.to_string())];
    }
    // Servers before 9.2 do not attach the constraint field; scrape the
    // message instead.
    match constraint_from_message(kind, error.message()) {
        Some(name) => vec![(kind, name)],
        None => Vec::new(),
    }
}

fn constraint_from_message(kind: ConstraintKind, message: &str) -> Option<String> {
    let (_, quoted) = message.split_once(kind.sentinel())?;
    let quoted = match kind {
        ConstraintKind::ForeignKey => quoted.split(" on table ").next().unwrap_or(quoted),
        _ => quoted,
    };
    Some(strip_quotes(quoted))
}

fn strip_quotes(quoted: &str) -> String {
    quoted
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(quoted)
        .to_string()
}
