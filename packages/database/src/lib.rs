#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Postgres record source for incident trends.
//!
//! Renders a [`Plan`](incident_trends_analytics::Plan) into parameterized SQL
//! over the `incident`, `incident_category`, `category` and `media` tables and
//! runs it through `switchy_database` with `query_raw_params()`. The schema
//! is owned elsewhere; table names are resolved through a configured prefix.

pub mod db;
pub mod incident_db;
pub mod queries;

use incident_trends_analytics::AnalyticsError;

pub use incident_db::IncidentDb;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// The configured table prefix is not a plain SQL identifier fragment.
    #[error("Invalid table prefix: {prefix:?}")]
    InvalidTablePrefix {
        /// The rejected prefix.
        prefix: String,
    },
}

impl From<DbError> for AnalyticsError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Conversion { message } => Self::MalformedRow { message },
            other @ (DbError::Database(_) | DbError::InvalidTablePrefix { .. }) => {
                Self::DataSourceUnavailable {
                    message: other.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_errors_become_malformed_rows() {
        let err: AnalyticsError = DbError::Conversion {
            message: "null category_color".to_string(),
        }
        .into();
        assert!(matches!(err, AnalyticsError::MalformedRow { message } if message == "null category_color"));
    }

    #[test]
    fn prefix_errors_become_unavailable() {
        let err: AnalyticsError = DbError::InvalidTablePrefix {
            prefix: "x;".to_string(),
        }
        .into();
        assert!(matches!(err, AnalyticsError::DataSourceUnavailable { .. }));
    }
}
