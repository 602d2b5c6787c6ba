//! Connection contract and the `tokio-postgres` adapter.

use crate::config::PgConnectionConfig;
use crate::error::{DraftError, DraftResult};
use crate::record::Record;
use crate::value::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

/// What the builders need from a database connection.
///
/// Statements are awaited one at a time; every method takes `&self` so a
/// connection can be shared by reference between a builder and the caller.
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DraftResult<Vec<Record>>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DraftResult<Option<Record>>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            Ok(rows.into_iter().next())
        }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value])
    -> impl Future<Output = DraftResult<u64>> + Send;

    /// Execute an `INSERT` and return the generated value of `key_column`.
    ///
    /// Returns `None` when `table` has no such column or nothing was generated.
    fn execute_insert(
        &self,
        sql: &str,
        params: &[Value],
        table: &str,
        key_column: &str,
    ) -> impl Future<Output = DraftResult<Option<Value>>> + Send;

    fn begin(&self) -> impl Future<Output = DraftResult<()>> + Send;

    fn commit(&self) -> impl Future<Output = DraftResult<()>> + Send;

    fn rollback(&self) -> impl Future<Output = DraftResult<()>> + Send;

    fn in_transaction(&self) -> bool;
}

impl<C: Connection> Connection for &C {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DraftResult<Vec<Record>>> + Send {
        (*self).query(sql, params)
    }

    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DraftResult<Option<Record>>> + Send {
        (*self).query_opt(sql, params)
    }

    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DraftResult<u64>> + Send {
        (*self).execute(sql, params)
    }

    fn execute_insert(
        &self,
        sql: &str,
        params: &[Value],
        table: &str,
        key_column: &str,
    ) -> impl Future<Output = DraftResult<Option<Value>>> + Send {
        (*self).execute_insert(sql, params, table, key_column)
    }

    fn begin(&self) -> impl Future<Output = DraftResult<()>> + Send {
        (*self).begin()
    }

    fn commit(&self) -> impl Future<Output = DraftResult<()>> + Send {
        (*self).commit()
    }

    fn rollback(&self) -> impl Future<Output = DraftResult<()>> + Send {
        (*self).rollback()
    }

    fn in_transaction(&self) -> bool {
        (*self).in_transaction()
    }
}

const COLUMN_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM pg_attribute \
     WHERE attrelid = to_regclass($1::text) AND attname = $2::text \
     AND attnum > 0 AND NOT attisdropped)";

/// [`Connection`] over a single `tokio_postgres::Client`.
///
/// Transactions are driven with plain `BEGIN`/`COMMIT`/`ROLLBACK` statements on
/// the same session, so builders never need a separate transaction handle.
///
/// # Example
///
/// ```ignore
/// use pgdraft::{PgConnection, PgConnectionConfig};
/// use std::time::Duration;
///
/// let conn = PgConnection::connect_with(
///     &database_url,
///     PgConnectionConfig::new().timeout(Duration::from_secs(5)),
/// )
/// .await?;
/// let users = pgdraft::QueryBuilder::new(&conn).table("users").get().await?;
/// ```
pub struct PgConnection {
    client: Client,
    config: PgConnectionConfig,
    in_transaction: AtomicBool,
}

impl PgConnection {
    pub fn new(client: Client) -> Self {
        Self::with_config(client, PgConnectionConfig::default())
    }

    pub fn with_config(client: Client, config: PgConnectionConfig) -> Self {
        Self {
            client,
            config,
            in_transaction: AtomicBool::new(false),
        }
    }

    /// Connect without TLS and drive the connection on a spawned task.
    pub async fn connect(database_url: &str) -> DraftResult<Self> {
        Self::connect_with(database_url, PgConnectionConfig::default()).await
    }

    pub async fn connect_with(database_url: &str, config: PgConnectionConfig) -> DraftResult<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| DraftError::Connection(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "pgdraft.sql", error = %e, "connection closed with error");
            }
        });
        Ok(Self::with_config(client, config))
    }

    /// Connect to `DATABASE_URL`.
    pub async fn connect_env() -> DraftResult<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| DraftError::Connection("DATABASE_URL is not set".to_string()))?;
        Self::connect(&database_url).await
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &PgConnectionConfig {
        &self.config
    }

    /// Run one statement future with the configured timeout and trace it.
    async fn run<T, F>(&self, sql: &str, param_count: usize, future: F) -> DraftResult<T>
    where
        F: Future<Output = Result<T, tokio_postgres::Error>> + Send,
    {
        let start = Instant::now();
        let result = match self.config.query_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, future).await {
                Ok(result) => result.map_err(DraftError::from_db_error),
                Err(_) => {
                    let cancel_token = self.client.cancel_token();
                    tokio::spawn(async move {
                        let _ = cancel_token.cancel_query(NoTls).await;
                    });
                    Err(DraftError::Timeout(timeout))
                }
            },
            None => future.await.map_err(DraftError::from_db_error),
        };
        if let Some(trace) = &self.config.sql_trace {
            trace.emit(sql, param_count, start.elapsed(), result.is_ok());
        }
        result
    }

    async fn has_column(&self, table: &str, column: &str) -> DraftResult<bool> {
        let params = [Value::from(table), Value::from(column)];
        let rows = self.query(COLUMN_EXISTS_SQL, &params).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.into_iter().next())
            .is_some_and(|(_, v)| v == Value::Bool(true)))
    }

    async fn batch(&self, sql: &str) -> DraftResult<()> {
        self.run(sql, 0, self.client.batch_execute(sql)).await
    }
}

fn params_ref(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl Connection for PgConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> DraftResult<Vec<Record>> {
        let refs = params_ref(params);
        let rows = self
            .run(sql, params.len(), self.client.query(sql, &refs))
            .await?;
        rows.iter().map(Record::try_from_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DraftResult<u64> {
        let refs = params_ref(params);
        self.run(sql, params.len(), self.client.execute(sql, &refs))
            .await
    }

    async fn execute_insert(
        &self,
        sql: &str,
        params: &[Value],
        table: &str,
        key_column: &str,
    ) -> DraftResult<Option<Value>> {
        // Probing the catalog keeps a failed RETURNING from aborting an open transaction.
        if !self.has_column(table, key_column).await? {
            self.execute(sql, params).await?;
            return Ok(None);
        }
        let returning = format!("{sql} RETURNING {key_column}");
        let rows = self.query(&returning, params).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.into_iter().next())
            .map(|(_, v)| v)
            .filter(|v| !v.is_null()))
    }

    async fn begin(&self) -> DraftResult<()> {
        self.batch("BEGIN").await?;
        self.in_transaction.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> DraftResult<()> {
        let result = self.batch("COMMIT").await;
        self.in_transaction.store(false, Ordering::SeqCst);
        result
    }

    async fn rollback(&self) -> DraftResult<()> {
        let result = self.batch("ROLLBACK").await;
        self.in_transaction.store(false, Ordering::SeqCst);
        result
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }
}
