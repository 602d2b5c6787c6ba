//! Builder-style configuration.

use crate::trace::SqlTrace;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::Level;

/// Configuration for [`PgConnection`](crate::PgConnection).
#[derive(Debug, Clone)]
pub struct PgConnectionConfig {
    /// Per-statement timeout. `None` waits indefinitely.
    pub query_timeout: Option<Duration>,
    /// Statement tracing. `None` disables it.
    pub sql_trace: Option<SqlTrace>,
}

impl Default for PgConnectionConfig {
    fn default() -> Self {
        Self {
            query_timeout: None,
            sql_trace: Some(SqlTrace::default()),
        }
    }
}

impl PgConnectionConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set query timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.query_timeout = Some(duration);
        self
    }

    /// Trace executed SQL with the given settings.
    pub fn trace(mut self, trace: SqlTrace) -> Self {
        self.sql_trace = Some(trace);
        self
    }

    /// Trace executed SQL at `level` with default truncation.
    pub fn trace_at(self, level: Level) -> Self {
        self.trace(SqlTrace::new().level(level))
    }

    /// Disable SQL tracing.
    pub fn no_trace(mut self) -> Self {
        self.sql_trace = None;
        self
    }
}

/// Configuration for [`TabularEndpoint`](crate::TabularEndpoint).
#[derive(Debug, Clone)]
pub struct TabularConfig {
    /// Columns that sort chronologically, wrapped in a cast when ordering.
    pub datetime_columns: BTreeSet<String>,
    /// Target type of the datetime cast.
    pub datetime_cast: String,
    /// Typeahead row limit when the request carries none.
    pub typeahead_limit: i64,
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            datetime_columns: BTreeSet::new(),
            datetime_cast: "TIMESTAMP".to_string(),
            typeahead_limit: 10,
        }
    }
}

impl TabularConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a column whose ordering should go through the datetime cast.
    pub fn datetime_column(mut self, column: impl Into<String>) -> Self {
        self.datetime_columns.insert(column.into());
        self
    }

    pub fn datetime_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datetime_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Override the cast target (e.g. `TIMESTAMPTZ`, `DATE`).
    pub fn datetime_cast(mut self, cast: impl Into<String>) -> Self {
        self.datetime_cast = cast.into();
        self
    }

    pub fn typeahead_limit(mut self, limit: i64) -> Self {
        self.typeahead_limit = limit;
        self
    }

    pub(crate) fn is_datetime(&self, column: &str) -> bool {
        self.datetime_columns.contains(column)
    }
}
