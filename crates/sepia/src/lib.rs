//! PostgreSQL toolkit: SQL generation plus a thin driver surface.
//!
//! The pure rendering half lives in [`sepia_sql`], re-exported here as
//! [`sql`]. This crate adds the pieces that talk to `tokio-postgres`:
//!
//! - [`Conn`]: prepare/query/execute/stream pass-throughs with a
//!   prepared-statement reset signal
//! - [`to_constraints`]: decode constraint violations out of driver errors
//! - [`ddl_logs`]: classify server notices into log levels

mod conn;
mod constraints;
mod error;
mod logs;

pub use conn::{Conn, ExecuteError, connect};
pub use constraints::{ConstraintKind, db_constraints, to_constraints};
pub use error::Error;
pub use logs::{ddl_logs, log_ddl, severity_level};

pub use sepia_sql as sql;

/// Result type for driver-facing operations.
pub type Result<T> = std::result::Result<T, Error>;
