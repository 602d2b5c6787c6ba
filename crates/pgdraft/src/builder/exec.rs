//! Terminal operations. Each one takes the draft out of the builder first.

use super::QueryBuilder;
use super::draft::Draft;
use crate::client::Connection;
use crate::condition::{Condition, Connector, Op};
use crate::error::{DraftError, DraftResult};
use crate::record::Record;
use crate::value::Value;
use std::mem;

/// Result of [`QueryBuilder::insert`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The row was inserted and read back.
    Resolved(Record),
    /// The row was inserted but could not be identified afterwards.
    Unresolved,
}

impl InsertOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, InsertOutcome::Resolved(_))
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            InsertOutcome::Resolved(record) => Some(record),
            InsertOutcome::Unresolved => None,
        }
    }
}

/// The draft's WHERE fragments, unchanged, for the post-update read.
///
/// A predicate on a column the update changed no longer matches the row, so
/// the read-back comes up empty rather than returning a row the update never
/// touched.
fn replay_conditions(draft: &Draft) -> Draft {
    let mut replay = Draft::new(draft.table.clone(), draft.alias.clone());
    for fragment in &draft.wheres {
        replay.push_condition(fragment.connector, fragment.condition.clone());
    }
    replay
}

impl<C: Connection> QueryBuilder<'_, C> {
    fn take_draft(&mut self) -> Draft {
        mem::take(&mut self.draft)
    }

    /// Execute the SELECT and return every row.
    pub async fn get(&mut self) -> DraftResult<Vec<Record>> {
        let draft = self.take_draft();
        draft.check()?;
        draft.select_sql().fetch_all(self.conn).await
    }

    /// Execute with `LIMIT 1`, overriding any configured limit.
    pub async fn first(&mut self) -> DraftResult<Option<Record>> {
        let draft = self.take_draft();
        draft.check()?;
        draft.select_sql_limited(Some(1)).fetch_opt(self.conn).await
    }

    /// Look a row up by the builder's key column.
    pub async fn find(&mut self, id: impl Into<Value>) -> DraftResult<Option<Record>> {
        let key = self.key_column.clone();
        self.where_eq(key, id).first().await
    }

    /// Look a row up by an explicit key column.
    pub async fn find_by(
        &mut self,
        column: impl Into<String>,
        id: impl Into<Value>,
    ) -> DraftResult<Option<Record>> {
        self.where_eq(column, id).first().await
    }

    /// The value of `column` in the first row, if any.
    pub async fn value(&mut self, column: &str) -> DraftResult<Option<Value>> {
        let Some(row) = self.first().await? else {
            return Ok(None);
        };
        let bare = column.rsplit_once('.').map_or(column, |(_, c)| c);
        Ok(row.get(column).or_else(|| row.get(bare)).cloned())
    }

    pub async fn exists(&mut self) -> DraftResult<bool> {
        let draft = self.take_draft();
        draft.check()?;
        let value = draft.exists_sql().fetch_scalar(self.conn).await?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// `COUNT(column)` over the draft. Grouped or limited drafts count rows of
    /// the wrapped query instead.
    pub async fn count(&mut self, column: &str) -> DraftResult<i64> {
        let draft = self.take_draft();
        draft.check()?;
        draft.count_sql(column).fetch_count(self.conn).await
    }

    pub async fn count_all(&mut self) -> DraftResult<i64> {
        self.count("*").await
    }

    /// Insert `data` and read the new row back.
    ///
    /// The row is resolved through the generated key column when the table has
    /// one, otherwise by matching every inserted non-JSON column.
    pub async fn insert(&mut self, data: Record) -> DraftResult<InsertOutcome> {
        let draft = self.take_draft();
        draft.check()?;
        let stmt = draft.insert_sql(&data);
        stmt.validate()?;
        let key = self
            .conn
            .execute_insert(&stmt.to_sql(), stmt.params(), &draft.table, &self.key_column)
            .await?;

        let mut lookup = Draft::new(draft.table.clone(), None);
        match key {
            Some(key) => {
                lookup.push_condition(
                    Connector::And,
                    Condition::Compare {
                        column: self.key_column.clone(),
                        op: Op::Eq,
                        value: key,
                    },
                );
            }
            None => {
                for (column, value) in data.iter().filter(|(_, v)| v.is_comparable()) {
                    let condition = if value.is_null() {
                        Condition::Null {
                            column: column.to_string(),
                            negated: false,
                        }
                    } else {
                        Condition::Compare {
                            column: column.to_string(),
                            op: Op::Eq,
                            value: value.clone(),
                        }
                    };
                    lookup.push_condition(Connector::And, condition);
                }
                if lookup.wheres.is_empty() {
                    return Ok(InsertOutcome::Unresolved);
                }
            }
        }

        let row = lookup.select_sql_limited(Some(1)).fetch_opt(self.conn).await?;
        Ok(row.map_or(InsertOutcome::Unresolved, InsertOutcome::Resolved))
    }

    /// Update the rows matching the draft and read one back by replaying the predicate.
    ///
    /// `None` when no row still satisfies the original predicate, which is
    /// always the case once the update rewrites a filtered column.
    pub async fn update(&mut self, data: Record) -> DraftResult<Option<Record>> {
        let draft = self.take_draft();
        draft.check()?;
        if data.is_empty() {
            return Err(DraftError::validation("update requires at least one column"));
        }
        if draft.wheres.is_empty() {
            tracing::warn!(
                target: "pgdraft.builder",
                table = %draft.table,
                "UPDATE without WHERE affects every row"
            );
        }
        draft.update_sql(&data).execute(self.conn).await?;

        let replay = replay_conditions(&draft);
        replay
            .select_sql_limited(Some(1))
            .fetch_opt(self.conn)
            .await
    }

    /// Delete the rows matching the draft. `true` when at least one row went away.
    pub async fn delete(&mut self) -> DraftResult<bool> {
        let draft = self.take_draft();
        draft.check()?;
        if draft.wheres.is_empty() {
            tracing::warn!(
                target: "pgdraft.builder",
                table = %draft.table,
                "DELETE without WHERE affects every row"
            );
        }
        let affected = draft.delete_sql().execute(self.conn).await?;
        Ok(affected > 0)
    }

    // ==================== Transactions ====================

    pub async fn begin_transaction(&self) -> DraftResult<()> {
        self.conn.begin().await
    }

    pub async fn commit(&self) -> DraftResult<()> {
        self.conn.commit().await
    }

    pub async fn roll_back(&self) -> DraftResult<()> {
        self.conn.rollback().await
    }

    pub fn in_transaction(&self) -> bool {
        self.conn.in_transaction()
    }
}
