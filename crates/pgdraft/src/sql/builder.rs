use super::{TemplatePiece, scan_template};
use crate::client::Connection;
use crate::error::{DraftError, DraftResult};
use crate::record::Record;
use crate::value::Value;
use rust_decimal::prelude::ToPrimitive;
use std::fmt::Write as _;

#[derive(Debug, Clone)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A parameter-safe SQL fragment.
///
/// `Sql` stores SQL pieces and values separately and generates `$1, $2, ...`
/// placeholders in one final pass, so fragments can be built independently and
/// concatenated without renumbering.
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct Sql {
    parts: Vec<SqlPart>,
    params: Vec<Value>,
}

impl Sql {
    /// Create a new fragment with an initial SQL text.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        let mut sql = Self::empty();
        sql.push(&initial_sql.into());
        sql
    }

    /// Create an empty fragment.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a `?`-marked template into a fragment.
    ///
    /// Each `?` outside quoted text becomes a placeholder bound to the next value;
    /// `??` stands for a literal `?`. The number of markers must equal the number
    /// of bindings.
    pub fn template(
        template: &str,
        bindings: impl IntoIterator<Item = Value>,
    ) -> DraftResult<Self> {
        let mut sql = Self::empty();
        sql.push_template(template, bindings)?;
        Ok(sql)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| match p {
            SqlPart::Raw(s) => s.is_empty(),
            SqlPart::Param => false,
        })
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a parameter placeholder and bind its value.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.params.push(value.into());
        self
    }

    /// Append a comma-separated list of placeholders and bind all values.
    ///
    /// An empty list appends `NULL`, so `IN (NULL)` stays valid SQL that matches nothing.
    pub fn push_bind_list<T: Into<Value>>(
        &mut self,
        values: impl IntoIterator<Item = T>,
    ) -> &mut Self {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return self.push("NULL");
        };

        self.push_bind(first);
        for v in iter {
            self.push(", ");
            self.push_bind(v);
        }
        self
    }

    /// Append another fragment, consuming it.
    pub fn push_sql(&mut self, other: Sql) -> &mut Self {
        for part in other.parts {
            match part {
                SqlPart::Raw(s) => {
                    self.push(&s);
                }
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.params.extend(other.params);
        self
    }

    /// Append a `?`-marked template. On a marker/binding mismatch nothing is appended.
    pub fn push_template(
        &mut self,
        template: &str,
        bindings: impl IntoIterator<Item = Value>,
    ) -> DraftResult<&mut Self> {
        let pieces = scan_template(template);
        let markers = pieces
            .iter()
            .filter(|p| matches!(p, TemplatePiece::Marker))
            .count();
        let bindings: Vec<Value> = bindings.into_iter().collect();
        if markers != bindings.len() {
            return Err(DraftError::validation(format!(
                "template has {markers} placeholder(s) but {} binding(s): {template}",
                bindings.len()
            )));
        }

        let mut values = bindings.into_iter();
        for piece in pieces {
            match piece {
                TemplatePiece::Text(text) => {
                    self.push(&text);
                }
                TemplatePiece::Marker => {
                    if let Some(v) = values.next() {
                        self.push_bind(v);
                    }
                }
            }
        }
        Ok(self)
    }

    /// Append `LIMIT $n OFFSET $m` with bound parameters.
    pub fn limit_offset(&mut self, limit: i64, offset: i64) -> &mut Self {
        self.push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset)
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> String {
        let cap = self
            .parts
            .iter()
            .map(|p| match p {
                SqlPart::Raw(s) => s.len(),
                SqlPart::Param => 4,
            })
            .sum();

        let mut out = String::with_capacity(cap);
        let mut idx = 0usize;
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    let _ = write!(out, "${idx}");
                }
            }
        }
        out
    }

    /// Bound values, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_params(self) -> Vec<Value> {
        self.params
    }

    pub(crate) fn placeholder_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, SqlPart::Param))
            .count()
    }

    pub(crate) fn validate(&self) -> DraftResult<()> {
        let placeholder_count = self.placeholder_count();
        if placeholder_count != self.params.len() {
            let params_len = self.params.len();
            return Err(DraftError::Validation(format!(
                "Sql: placeholders({placeholder_count}) != params({params_len})"
            )));
        }
        Ok(())
    }

    // ==================== Execution ====================

    /// Execute and return all rows.
    pub async fn fetch_all(&self, conn: &impl Connection) -> DraftResult<Vec<Record>> {
        self.validate()?;
        conn.query(&self.to_sql(), &self.params).await
    }

    /// Execute and return the first row, if any.
    pub async fn fetch_opt(&self, conn: &impl Connection) -> DraftResult<Option<Record>> {
        self.validate()?;
        conn.query_opt(&self.to_sql(), &self.params).await
    }

    /// Execute and return the affected row count.
    pub async fn execute(&self, conn: &impl Connection) -> DraftResult<u64> {
        self.validate()?;
        conn.execute(&self.to_sql(), &self.params).await
    }

    /// Execute and return the first column of the first row.
    pub async fn fetch_scalar(&self, conn: &impl Connection) -> DraftResult<Option<Value>> {
        let row = self.fetch_opt(conn).await?;
        Ok(row.and_then(|r| r.into_iter().next().map(|(_, v)| v)))
    }

    /// Execute a `COUNT(...)` style statement and read it as `i64`.
    pub async fn fetch_count(&self, conn: &impl Connection) -> DraftResult<i64> {
        match self.fetch_scalar(conn).await? {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Int(n)) => Ok(n),
            Some(Value::Decimal(d)) => d
                .to_i64()
                .ok_or_else(|| DraftError::conversion(format!("count out of range: {d}"))),
            Some(other) => Err(DraftError::conversion(format!(
                "expected an integer count, got {other:?}"
            ))),
        }
    }
}
