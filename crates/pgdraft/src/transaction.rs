//! Transaction helper macro.
//!
//! # Example
//!
//! ```ignore
//! use pgdraft::{DraftResult, QueryBuilder, record};
//!
//! # async fn demo(conn: &pgdraft::PgConnection) -> DraftResult<()> {
//! pgdraft::transaction!(conn, {
//!     let mut qb = QueryBuilder::new(conn);
//!     qb.table("accounts").where_eq("id", 1).update(record! { "balance" => 0 }).await?;
//!     qb.table("ledger").insert(record! { "account_id" => 1, "amount" => -100 }).await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

/// Runs the given block inside a database transaction on a [`Connection`](crate::Connection).
///
/// - Begins with `Connection::begin`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `pgdraft::DraftResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($conn:expr, $body:block) => {{
        let __pgdraft_conn = &$conn;
        $crate::Connection::begin(__pgdraft_conn).await?;

        let __pgdraft_tx_body_result = async { $body }.await;
        match __pgdraft_tx_body_result {
            Ok(value) => {
                $crate::Connection::commit(__pgdraft_conn).await?;
                Ok(value)
            }
            Err(error) => match $crate::Connection::rollback(__pgdraft_conn).await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::DraftError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

#[cfg(test)]
mod tests {
    use crate::error::{DraftError, DraftResult};
    use crate::mock::{MockConnection, MockResponse};
    use crate::{Connection, QueryBuilder, record};

    async fn transfer(conn: &MockConnection, fail: bool) -> DraftResult<u32> {
        crate::transaction!(conn, {
            let mut qb = QueryBuilder::new(conn);
            qb.table("ledger").insert(record! { "amount" => 5 }).await?;
            if fail {
                return Err(DraftError::Other("insufficient funds".to_string()));
            }
            Ok(7)
        })
    }

    #[tokio::test]
    async fn commits_on_ok() {
        let conn = MockConnection::new();
        conn.push(MockResponse::no_key());
        assert_eq!(transfer(&conn, false).await.unwrap(), 7);
        let statements = conn.statements();
        assert_eq!(statements.first().map(String::as_str), Some("BEGIN"));
        assert_eq!(statements.last().map(String::as_str), Some("COMMIT"));
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn rolls_back_on_err() {
        let conn = MockConnection::new();
        conn.push(MockResponse::no_key());
        let err = transfer(&conn, true).await.unwrap_err();
        assert!(err.to_string().contains("insufficient funds"));
        assert_eq!(conn.statements().last().map(String::as_str), Some("ROLLBACK"));
    }
}
