use crate::condition::{Condition, Connector, Fragment, push_where};
use crate::error::{DraftError, DraftResult};
use crate::record::Record;
use crate::sql::Sql;
use std::fmt;

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL OUTER JOIN",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Render `KIND JOIN table [AS alias] ON l op r AND ...`.
pub(crate) fn render_join(
    kind: JoinKind,
    table: &str,
    conditions: &[(&str, &str, &str)],
    alias: Option<&str>,
) -> String {
    let mut out = format!("{kind} {table}");
    if let Some(alias) = alias {
        out.push_str(" AS ");
        out.push_str(alias);
    }
    let on = conditions
        .iter()
        .map(|(left, op, right)| format!("{left} {op} {right}"))
        .collect::<Vec<_>>()
        .join(" AND ");
    if !on.is_empty() {
        out.push_str(" ON ");
        out.push_str(&on);
    }
    out
}

/// Accumulated statement state.
#[derive(Debug, Clone, Default)]
pub(crate) struct Draft {
    pub(crate) table: String,
    pub(crate) alias: Option<String>,
    /// Projection; empty means `*`.
    pub(crate) columns: Vec<String>,
    pub(crate) wheres: Vec<Fragment>,
    pub(crate) joins: Vec<String>,
    pub(crate) group_by: Option<String>,
    pub(crate) having: Vec<Sql>,
    pub(crate) order_by: Option<String>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    /// First deferred error; surfaced by the next executor.
    pub(crate) build_error: Option<String>,
}

impl Draft {
    pub(crate) fn new(table: String, alias: Option<String>) -> Self {
        Self {
            table,
            alias,
            ..Self::default()
        }
    }

    pub(crate) fn push_condition(&mut self, connector: Connector, condition: Condition) {
        self.wheres.push(Fragment {
            connector,
            condition,
        });
    }

    pub(crate) fn record_error(&mut self, message: String) {
        if self.build_error.is_none() {
            self.build_error = Some(message);
        }
    }

    pub(crate) fn check(&self) -> DraftResult<()> {
        if let Some(ref err) = self.build_error {
            return Err(DraftError::Validation(err.clone()));
        }
        if self.table.is_empty() {
            return Err(DraftError::validation("no table selected; call table() first"));
        }
        Ok(())
    }

    /// GROUP BY or HAVING shapes the result into groups.
    pub(crate) fn is_grouped(&self) -> bool {
        self.group_by.is_some() || !self.having.is_empty()
    }

    fn push_target(&self, sql: &mut Sql) {
        sql.push(&self.table);
        if let Some(alias) = &self.alias {
            sql.push(" AS ").push(alias);
        }
    }

    fn push_from(&self, sql: &mut Sql) {
        sql.push(" FROM ");
        self.push_target(sql);
        for join in &self.joins {
            sql.push(" ").push(join);
        }
    }

    fn push_grouping(&self, sql: &mut Sql) {
        if let Some(group_by) = &self.group_by {
            sql.push(" GROUP BY ").push(group_by);
        }
        for (i, having) in self.having.iter().enumerate() {
            sql.push(if i == 0 { " HAVING " } else { " AND " });
            sql.push_sql(having.clone());
        }
    }

    fn push_window(&self, sql: &mut Sql, limit: Option<u64>) {
        if let Some(limit) = limit {
            sql.push(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push(&format!(" OFFSET {offset}"));
        }
    }

    fn projection(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        }
    }

    /// Full SELECT in clause order: SELECT, FROM/JOIN, WHERE, GROUP BY, HAVING,
    /// ORDER BY, LIMIT, OFFSET.
    pub(crate) fn select_sql(&self) -> Sql {
        self.select_sql_limited(self.limit)
    }

    pub(crate) fn select_sql_limited(&self, limit: Option<u64>) -> Sql {
        let mut sql = Sql::new("SELECT ");
        sql.push(&self.projection());
        self.push_from(&mut sql);
        push_where(&mut sql, &self.wheres);
        self.push_grouping(&mut sql);
        if let Some(order_by) = &self.order_by {
            sql.push(" ORDER BY ").push(order_by);
        }
        self.push_window(&mut sql, limit);
        sql
    }

    /// `COUNT(column)` over the draft, or a count of the wrapped subquery rows
    /// when grouping or a LIMIT/OFFSET shapes the result.
    pub(crate) fn count_sql(&self, column: &str) -> Sql {
        if self.is_grouped() || self.limit.is_some() || self.offset.is_some() {
            let mut inner = Sql::new("SELECT ");
            inner.push(&self.projection());
            self.push_from(&mut inner);
            push_where(&mut inner, &self.wheres);
            self.push_grouping(&mut inner);
            self.push_window(&mut inner, self.limit);

            let mut sql = Sql::new("SELECT COUNT(*) FROM (");
            sql.push_sql(inner).push(") AS counted");
            sql
        } else {
            let mut sql = Sql::new("SELECT COUNT(");
            sql.push(column).push(")");
            self.push_from(&mut sql);
            push_where(&mut sql, &self.wheres);
            sql
        }
    }

    pub(crate) fn exists_sql(&self) -> Sql {
        let mut sql = Sql::new("SELECT EXISTS(");
        sql.push_sql(self.select_sql()).push(")");
        sql
    }

    /// `INSERT INTO table (cols) VALUES (...)`, or `DEFAULT VALUES` for no data.
    pub(crate) fn insert_sql(&self, data: &Record) -> Sql {
        let mut sql = Sql::new("INSERT INTO ");
        sql.push(&self.table);
        if data.is_empty() {
            sql.push(" DEFAULT VALUES");
            return sql;
        }
        let columns = data.column_names().collect::<Vec<_>>().join(", ");
        sql.push(" (").push(&columns).push(") VALUES (");
        sql.push_bind_list(data.iter().map(|(_, v)| v.clone()));
        sql.push(")");
        sql
    }

    /// `UPDATE table SET ... WHERE ...`; SET values bind before WHERE values.
    pub(crate) fn update_sql(&self, data: &Record) -> Sql {
        let mut sql = Sql::new("UPDATE ");
        self.push_target(&mut sql);
        sql.push(" SET ");
        for (i, (column, value)) in data.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            sql.push(column).push(" = ").push_bind(value.clone());
        }
        push_where(&mut sql, &self.wheres);
        sql
    }

    pub(crate) fn delete_sql(&self) -> Sql {
        let mut sql = Sql::new("DELETE FROM ");
        self.push_target(&mut sql);
        push_where(&mut sql, &self.wheres);
        sql
    }
}
