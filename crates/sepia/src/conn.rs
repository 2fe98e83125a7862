//! Thin connection surface over `tokio-postgres`.

use std::future::poll_fn;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_postgres::error::{DbError, SqlState};
use tokio_postgres::types::ToSql;
use tokio_postgres::{AsyncMessage, Client, Row, RowStream, Statement};

use crate::Result;

/// A database connection.
///
/// Wraps a [`Client`] and keeps the async notices the server sends (RAISE
/// NOTICE and friends) so DDL logging can surface them afterwards.
pub struct Conn {
    client: Client,
    notices: Mutex<mpsc::UnboundedReceiver<DbError>>,
}

/// Connect with a parameter string, e.g. `host=localhost user=postgres`.
///
/// Driver defaults apply, including port 5432 when unset. The returned
/// handle drives the connection until it closes; notices are captured on
/// the [`Conn`].
pub async fn connect(params: &str) -> Result<(Conn, JoinHandle<()>)> {
    let (client, mut connection) = tokio_postgres::connect(params, tokio_postgres::NoTls).await?;
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        loop {
            match poll_fn(|cx| connection.poll_message(cx)).await {
                Some(Ok(AsyncMessage::Notice(notice))) => {
                    let _ = tx.send(notice);
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    tracing::error!(%error, "postgres connection error");
                    break;
                }
                None => break,
            }
        }
    });
    let conn = Conn {
        client,
        notices: Mutex::new(rx),
    };
    Ok((conn, handle))
}

impl Conn {
    /// Prepare a statement and run it in one go, returning the statement
    /// for caching alongside the rows.
    pub async fn prepare_execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<(Statement, Vec<Row>)> {
        let statement = self.client.prepare(sql).await?;
        let rows = self.client.query(&statement, params).await?;
        Ok((statement, rows))
    }

    /// Run a query and collect its rows.
    pub async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        Ok(self.client.query(sql, params).await?)
    }

    /// Execute a prepared statement, returning the affected-row count.
    ///
    /// Errors with SQLSTATE 0A000 (`feature_not_supported`, the code behind
    /// "cached plan must not change result type") come back as
    /// [`ExecuteError::Reset`]: drop the cached statement, re-prepare and
    /// retry. Everything else passes through unchanged.
    pub async fn execute(
        &self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> std::result::Result<u64, ExecuteError> {
        self.client
            .execute(statement, params)
            .await
            .map_err(ExecuteError::from)
    }

    /// Stream rows without collecting them.
    pub async fn stream(
        &self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<RowStream> {
        let stream = self
            .client
            .query_raw(statement, params.iter().map(|p| *p as &dyn ToSql))
            .await?;
        Ok(stream)
    }

    /// Take the notices received since the last drain.
    pub fn drain_notices(&self) -> Vec<DbError> {
        let mut rx = self.notices.lock().unwrap_or_else(|e| e.into_inner());
        let mut notices = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    /// The underlying client, for anything not covered here.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Error from [`Conn::execute`].
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// The cached statement is no longer valid; re-prepare and retry.
    #[error("prepared statement must be reset: {0}")]
    Reset(tokio_postgres::Error),
    /// Any other driver error, passed through.
    #[error(transparent)]
    Driver(tokio_postgres::Error),
}

impl ExecuteError {
    /// Whether the caller should drop its cached statement.
    pub fn is_reset(&self) -> bool {
        matches!(self, ExecuteError::Reset(_))
    }
}

impl From<tokio_postgres::Error> for ExecuteError {
    fn from(error: tokio_postgres::Error) -> Self {
        let reset = error
            .as_db_error()
            .is_some_and(|db| db.code() == &SqlState::FEATURE_NOT_SUPPORTED);
        if reset {
            ExecuteError::Reset(error)
        } else {
            ExecuteError::Driver(error)
        }
    }
}
