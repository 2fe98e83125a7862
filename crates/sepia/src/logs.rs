//! Classify server notices into log levels.

use tokio_postgres::error::DbError;
use tracing::Level;

/// Map a PostgreSQL severity string to a log level. Unknown severities log
/// at INFO.
pub fn severity_level(severity: &str) -> Level {
    match severity {
        "DEBUG" => Level::DEBUG,
        "LOG" | "INFO" | "NOTICE" => Level::INFO,
        "WARNING" => Level::WARN,
        "ERROR" | "FATAL" | "PANIC" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Classify drained notices into `(level, message)` pairs.
pub fn ddl_logs(notices: &[DbError]) -> Vec<(Level, String)> {
    notices
        .iter()
        .map(|notice| (severity_level(notice.severity()), notice.message().to_string()))
        .collect()
}

/// Emit drained notices through `tracing`.
pub fn log_ddl(notices: &[DbError]) {
    for (level, message) in ddl_logs(notices) {
        if level == Level::ERROR {
            tracing::error!("{message}");
        } else if level == Level::WARN {
            tracing::warn!("{message}");
        } else if level == Level::DEBUG {
            tracing::debug!("{message}");
        } else {
            tracing::info!("{message}");
        }
    }
}
