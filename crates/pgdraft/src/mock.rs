//! Scripted in-memory connection for unit tests.

use crate::client::Connection;
use crate::error::{DraftError, DraftResult};
use crate::record::Record;
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
pub(crate) enum MockResponse {
    Rows(Vec<Record>),
    Affected(u64),
    Key(Option<Value>),
    Fail(String),
}

impl MockResponse {
    pub(crate) fn rows(rows: Vec<Record>) -> Self {
        Self::Rows(rows)
    }

    pub(crate) fn affected(n: u64) -> Self {
        Self::Affected(n)
    }

    pub(crate) fn key(key: impl Into<Value>) -> Self {
        Self::Key(Some(key.into()))
    }

    pub(crate) fn no_key() -> Self {
        Self::Key(None)
    }

    pub(crate) fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// Records every statement and answers from a queue; an empty queue answers
/// with no rows.
#[derive(Debug, Default)]
pub(crate) struct MockConnection {
    log: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Mutex<VecDeque<MockResponse>>,
    in_transaction: AtomicBool,
}

impl MockConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, response: MockResponse) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.calls().into_iter().map(|(sql, _)| sql).collect()
    }

    fn record(&self, sql: &str, params: &[Value]) -> Option<MockResponse> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        self.responses.lock().unwrap().pop_front()
    }
}

fn unexpected(response: &MockResponse) -> DraftError {
    DraftError::Other(format!("mock: unexpected response {response:?}"))
}

impl Connection for MockConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> DraftResult<Vec<Record>> {
        match self.record(sql, params) {
            None => Ok(Vec::new()),
            Some(MockResponse::Rows(rows)) => Ok(rows),
            Some(MockResponse::Fail(message)) => Err(DraftError::Other(message)),
            Some(other) => Err(unexpected(&other)),
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DraftResult<u64> {
        match self.record(sql, params) {
            None => Ok(0),
            Some(MockResponse::Affected(n)) => Ok(n),
            Some(MockResponse::Rows(rows)) => Ok(rows.len() as u64),
            Some(MockResponse::Fail(message)) => Err(DraftError::Other(message)),
            Some(other) => Err(unexpected(&other)),
        }
    }

    async fn execute_insert(
        &self,
        sql: &str,
        params: &[Value],
        _table: &str,
        _key_column: &str,
    ) -> DraftResult<Option<Value>> {
        match self.record(sql, params) {
            None | Some(MockResponse::Affected(_)) => Ok(None),
            Some(MockResponse::Key(key)) => Ok(key),
            Some(MockResponse::Fail(message)) => Err(DraftError::Other(message)),
            Some(other) => Err(unexpected(&other)),
        }
    }

    async fn begin(&self) -> DraftResult<()> {
        self.log.lock().unwrap().push(("BEGIN".to_string(), Vec::new()));
        self.in_transaction.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> DraftResult<()> {
        self.log.lock().unwrap().push(("COMMIT".to_string(), Vec::new()));
        self.in_transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> DraftResult<()> {
        self.log
            .lock()
            .unwrap()
            .push(("ROLLBACK".to_string(), Vec::new()));
        self.in_transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }
}
