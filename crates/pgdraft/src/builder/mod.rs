//! Fluent statement builder.
//!
//! A [`QueryBuilder`] accumulates one statement draft at a time over a shared
//! [`Connection`]. `table()` starts a fresh draft, and every executor takes the
//! draft out of the builder before running, so the same instance can be reused
//! for unrelated statements even after a failure.
//!
//! ```ignore
//! use pgdraft::{Op, QueryBuilder, SortDir, record};
//!
//! let mut qb = QueryBuilder::new(&conn);
//!
//! let rows = qb
//!     .table_as("users", "u")
//!     .select(["u.id", "u.name", "r.name AS role"])
//!     .left_join("roles", &[("u.role_id", "=", "r.id")], Some("r"))
//!     .where_eq("u.status", "active")
//!     .where_op("u.age", Op::Gte, 18)
//!     .order_by("u.name", SortDir::Asc)
//!     .limit(20)
//!     .get()
//!     .await?;
//!
//! let created = qb.table("users").insert(record! { "name" => "Kemi" }).await?;
//! ```
//!
//! Identifiers (tables, columns, join expressions, raw fragments) are written
//! into the SQL verbatim and must come from code, never from request input.
//! Only values are bound.

mod draft;
mod exec;


pub use draft::JoinKind;
pub use exec::InsertOutcome;

use crate::client::Connection;
use crate::condition::{Condition, Connector, Op, SortDir, split_connector};
use crate::sql::{Sql, TemplatePiece, scan_template};
use crate::value::Value;
use draft::{Draft, render_join};

/// Stateful statement builder bound to a connection.
pub struct QueryBuilder<'c, C: Connection> {
    conn: &'c C,
    key_column: String,
    draft: Draft,
}

impl<'c, C: Connection> QueryBuilder<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self {
            conn,
            key_column: "id".to_string(),
            draft: Draft::default(),
        }
    }

    /// Column used by `find()` and by insert resolution. Defaults to `id`.
    pub fn key_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.key_column = column.into();
        self
    }

    pub fn connection(&self) -> &'c C {
        self.conn
    }

    // ==================== Target ====================

    /// Start a new statement on `name`, discarding any previous draft.
    ///
    /// `"users u"` and `"users AS u"` are read as table plus alias.
    pub fn table(&mut self, name: &str) -> &mut Self {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        let (table, alias) = match tokens.as_slice() {
            [table, alias] => (table.to_string(), Some(alias.to_string())),
            [table, kw, alias] if kw.eq_ignore_ascii_case("AS") => {
                (table.to_string(), Some(alias.to_string()))
            }
            _ => (name.trim().to_string(), None),
        };
        self.draft = Draft::new(table, alias);
        self
    }

    /// Start a new statement on `name AS alias`.
    pub fn table_as(&mut self, name: &str, alias: &str) -> &mut Self {
        self.draft = Draft::new(name.trim().to_string(), Some(alias.trim().to_string()));
        self
    }

    // ==================== Projection ====================

    /// Set the projection. An empty list selects `*`.
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set a single raw projection expression, e.g. `"COUNT(*) AS total, status"`.
    pub fn select_raw(&mut self, expr: &str) -> &mut Self {
        self.draft.columns = vec![expr.to_string()];
        self
    }

    // ==================== Conditions ====================

    fn compare(&mut self, connector: Connector, column: String, op: Op, value: Value) -> &mut Self {
        self.draft
            .push_condition(connector, Condition::Compare { column, op, value });
        self
    }

    /// `column = value`, AND-connected.
    pub fn where_eq(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.compare(Connector::And, column.into(), Op::Eq, value.into())
    }

    /// `column <op> value`, AND-connected.
    pub fn where_op(
        &mut self,
        column: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.compare(Connector::And, column.into(), op, value.into())
    }

    /// One AND-connected equality per entry, in iteration order.
    pub fn where_map<I, K, V>(&mut self, pairs: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (column, value) in pairs {
            self.compare(Connector::And, column.into(), Op::Eq, value.into());
        }
        self
    }

    pub fn or_where_eq(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.compare(Connector::Or, column.into(), Op::Eq, value.into())
    }

    pub fn or_where_op(
        &mut self,
        column: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.compare(Connector::Or, column.into(), op, value.into())
    }

    pub fn or_where_map<I, K, V>(&mut self, pairs: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (column, value) in pairs {
            self.compare(Connector::Or, column.into(), Op::Eq, value.into());
        }
        self
    }

    pub fn where_null(&mut self, column: impl Into<String>) -> &mut Self {
        let column = column.into();
        self.draft.push_condition(
            Connector::And,
            Condition::Null {
                column,
                negated: false,
            },
        );
        self
    }

    pub fn where_not_null(&mut self, column: impl Into<String>) -> &mut Self {
        let column = column.into();
        self.draft.push_condition(
            Connector::And,
            Condition::Null {
                column,
                negated: true,
            },
        );
        self
    }

    fn membership<I, T>(
        &mut self,
        connector: Connector,
        column: String,
        values: I,
        negated: bool,
    ) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return self;
        }
        self.draft.push_condition(
            connector,
            Condition::In {
                column,
                values,
                negated,
            },
        );
        self
    }

    /// `column IN (...)`. An empty collection leaves the draft untouched.
    pub fn where_in<I, T>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.membership(Connector::And, column.into(), values, false)
    }

    pub fn where_not_in<I, T>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.membership(Connector::And, column.into(), values, true)
    }

    pub fn or_where_in<I, T>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.membership(Connector::Or, column.into(), values, false)
    }

    pub fn or_where_not_in<I, T>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.membership(Connector::Or, column.into(), values, true)
    }

    /// Append a raw condition with `?` binding markers.
    ///
    /// A leading `AND`/`OR` in `sql` becomes the fragment's connector (AND when
    /// absent) and a trailing one is dropped. A marker/binding count mismatch is
    /// reported by the next executor and the fragment is not added.
    pub fn where_raw<I, T>(&mut self, sql: &str, bindings: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let (connector, text) = split_connector(sql);
        let bindings: Vec<Value> = bindings.into_iter().map(Into::into).collect();
        if text.is_empty() {
            if !bindings.is_empty() {
                self.draft.record_error(format!(
                    "where_raw: empty condition with {} binding(s)",
                    bindings.len()
                ));
            }
            return self;
        }
        match Sql::template(text, bindings) {
            Ok(fragment) => self.draft.push_condition(
                connector.unwrap_or(Connector::And),
                Condition::Raw(fragment),
            ),
            Err(e) => self.draft.record_error(format!("where_raw: {e}")),
        }
        self
    }

    // ==================== Joins ====================

    /// Join `table` ON the AND of `(left, op, right)` triples. Never parameterized.
    pub fn join(
        &mut self,
        table: &str,
        conditions: &[(&str, &str, &str)],
        kind: JoinKind,
        alias: Option<&str>,
    ) -> &mut Self {
        self.draft
            .joins
            .push(render_join(kind, table, conditions, alias));
        self
    }

    pub fn left_join(
        &mut self,
        table: &str,
        conditions: &[(&str, &str, &str)],
        alias: Option<&str>,
    ) -> &mut Self {
        self.join(table, conditions, JoinKind::Left, alias)
    }

    pub fn right_join(
        &mut self,
        table: &str,
        conditions: &[(&str, &str, &str)],
        alias: Option<&str>,
    ) -> &mut Self {
        self.join(table, conditions, JoinKind::Right, alias)
    }

    // ==================== Grouping / ordering ====================

    pub fn group_by<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.draft.group_by = (!columns.is_empty()).then(|| columns.join(", "));
        self
    }

    /// Add an AND-joined HAVING condition with one bound value.
    ///
    /// `?` marks where the value goes; without one it is appended after the text
    /// (`"COUNT(*) >"` → `COUNT(*) > $n`).
    pub fn having(&mut self, condition: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let has_marker = scan_template(condition)
            .iter()
            .any(|p| matches!(p, TemplatePiece::Marker));
        let fragment = if has_marker {
            Sql::template(condition, [value])
        } else {
            let mut sql = Sql::new(condition.trim_end());
            sql.push(" ").push_bind(value);
            Ok(sql)
        };
        match fragment {
            Ok(fragment) => self.draft.having.push(fragment),
            Err(e) => self.draft.record_error(format!("having: {e}")),
        }
        self
    }

    /// Set the ORDER BY expression. The last call wins.
    pub fn order_by(&mut self, column: &str, direction: SortDir) -> &mut Self {
        self.draft.order_by = Some(format!("{column} {}", direction.as_sql()));
        self
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.draft.limit = Some(n);
        self
    }

    pub fn offset(&mut self, n: u64) -> &mut Self {
        self.draft.offset = Some(n);
        self
    }

    // ==================== Rendering ====================

    /// The SELECT statement the current draft renders to.
    pub fn to_sql(&self) -> String {
        self.draft.select_sql().to_sql()
    }

    /// Values bound to the placeholders of [`to_sql`](Self::to_sql), in order.
    pub fn bindings(&self) -> Vec<Value> {
        self.draft.select_sql().into_params()
    }
}
