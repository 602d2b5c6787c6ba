//! Server-side logic for browser table widgets.
//!
//! [`TabularEndpoint::paginated`] answers the draw/start/length/search/order
//! protocol of paginated tables; [`TabularEndpoint::typeahead`] answers
//! select-box searches. Both take an explicit request structure (see
//! [`TabularRequest::from_query`] for the query-string adapter) and a
//! code-controlled query description, and render through [`Sql`] directly.
//!
//! # Example
//!
//! ```ignore
//! use pgdraft::{TabularConfig, TabularEndpoint, TabularQuery, TabularRequest};
//!
//! let endpoint = TabularEndpoint::with_config(&conn, TabularConfig::new().datetime_column("created_at"));
//! let query = TabularQuery::new("users")
//!     .columns(["id", "name", "created_at"])
//!     .condition("deleted_at IS NULL");
//! let request = TabularRequest::from_query("draw=3&start=0&length=10&search[value]=ann")?;
//! let page = endpoint.paginated(&query, &request).await?;
//! ```

mod columns;
mod request;
mod response;
#[cfg(test)]
mod tests;

pub use request::{OrderSpec, SearchSpec, TabularRequest, TypeaheadRequest};
pub use response::{TabularResponse, TypeaheadItem, TypeaheadResponse};

use crate::builder::JoinKind;
use crate::client::Connection;
use crate::config::TabularConfig;
use crate::error::DraftResult;
use crate::sql::Sql;

/// Code-controlled description of a paginated source.
///
/// Every string here is written into SQL verbatim and must not come from the
/// request.
#[derive(Debug, Clone)]
pub struct TabularQuery {
    pub table: String,
    /// Projected columns; request order indices refer to this list.
    pub columns: Vec<String>,
    pub primary_key: String,
    /// Join clause(s), e.g. `LEFT JOIN roles r ON r.id = users.role_id`.
    pub join: Option<String>,
    /// Extra predicate, AND-ed last and parenthesized.
    pub condition: Option<Sql>,
    pub group_by: Option<String>,
    pub having: Option<Sql>,
}

impl TabularQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            primary_key: "id".to_string(),
            join: None,
            condition: None,
            group_by: None,
            having: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn join(mut self, join: impl Into<String>) -> Self {
        self.join = Some(join.into());
        self
    }

    pub fn condition(self, condition: impl Into<String>) -> Self {
        self.condition_sql(Sql::new(condition.into()))
    }

    /// Extra predicate carrying its own bindings.
    pub fn condition_sql(mut self, condition: Sql) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn having(self, having: impl Into<String>) -> Self {
        self.having_sql(Sql::new(having.into()))
    }

    pub fn having_sql(mut self, having: Sql) -> Self {
        self.having = Some(having);
        self
    }

    fn is_grouped(&self) -> bool {
        self.group_by.is_some() || self.having.is_some()
    }

    fn projection(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        }
    }

    fn push_from(&self, sql: &mut Sql) {
        sql.push(" FROM ").push(&self.table);
        if let Some(join) = &self.join {
            sql.push(" ").push(join.trim());
        }
    }

    fn push_grouping(&self, sql: &mut Sql) {
        if let Some(group_by) = &self.group_by {
            sql.push(" GROUP BY ").push(group_by);
        }
        if let Some(having) = &self.having {
            sql.push(" HAVING ").push_sql(having.clone());
        }
    }

    /// `WHERE` from filters, then the search group, then the extra condition.
    fn push_where(&self, sql: &mut Sql, request: &TabularRequest) {
        let mut predicates: Vec<Sql> = Vec::new();

        for (column, value) in request.filters.iter() {
            let mut p = Sql::new(column);
            if value.is_null() {
                p.push(" IS NULL");
            } else {
                p.push(" = ").push_bind(value.clone());
            }
            predicates.push(p);
        }

        let term = request.search.value.trim();
        if !term.is_empty()
            && let Some(group) = columns::search_group(&self.columns, term)
        {
            predicates.push(group);
        }

        if let Some(condition) = self.condition.as_ref().filter(|c| !c.is_empty()) {
            let mut p = Sql::new("(");
            p.push_sql(condition.clone()).push(")");
            predicates.push(p);
        }

        for (i, p) in predicates.into_iter().enumerate() {
            sql.push(if i == 0 { " WHERE " } else { " AND " });
            sql.push_sql(p);
        }
    }

    fn order_by(&self, request: &TabularRequest, config: &TabularConfig) -> String {
        let terms: Vec<String> = request
            .order
            .iter()
            .filter_map(|o| columns::order_term(&self.columns, o.column, o.direction(), config))
            .collect();
        if terms.is_empty() {
            format!("{} ASC", self.primary_key)
        } else {
            terms.join(", ")
        }
    }

    pub(crate) fn total_sql(&self) -> Sql {
        let mut sql = Sql::new("SELECT COUNT(*)");
        self.push_from(&mut sql);
        sql
    }

    pub(crate) fn filtered_sql(&self, request: &TabularRequest) -> Sql {
        if self.is_grouped() {
            let mut inner = Sql::new("SELECT ");
            inner.push(&self.projection());
            self.push_from(&mut inner);
            self.push_where(&mut inner, request);
            self.push_grouping(&mut inner);

            let mut sql = Sql::new("SELECT COUNT(*) FROM (");
            sql.push_sql(inner).push(") AS grouped");
            sql
        } else {
            let mut sql = Sql::new("SELECT COUNT(*)");
            self.push_from(&mut sql);
            self.push_where(&mut sql, request);
            sql
        }
    }

    pub(crate) fn data_sql(&self, request: &TabularRequest, config: &TabularConfig) -> Sql {
        let mut sql = Sql::new("SELECT ");
        sql.push(&self.projection());
        self.push_from(&mut sql);
        self.push_where(&mut sql, request);
        self.push_grouping(&mut sql);
        sql.push(" ORDER BY ").push(&self.order_by(request, config));
        if request.length != -1 {
            sql.limit_offset(request.length, request.start);
        }
        sql
    }
}

/// One join of a typeahead source.
#[derive(Debug, Clone)]
pub struct TypeaheadJoin {
    pub kind: JoinKind,
    pub table: String,
    /// Raw `ON` expression.
    pub on: String,
}

impl TypeaheadJoin {
    pub fn new(kind: JoinKind, table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            on: on.into(),
        }
    }
}

/// Code-controlled description of a typeahead source.
#[derive(Debug, Clone)]
pub struct TypeaheadQuery {
    pub table: String,
    pub id_column: String,
    pub text_column: String,
    pub condition: Option<String>,
    pub joins: Vec<TypeaheadJoin>,
}

impl TypeaheadQuery {
    pub fn new(
        table: impl Into<String>,
        id_column: impl Into<String>,
        text_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            id_column: id_column.into(),
            text_column: text_column.into(),
            condition: None,
            joins: Vec::new(),
        }
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn join(mut self, kind: JoinKind, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(TypeaheadJoin::new(kind, table, on));
        self
    }

    pub(crate) fn to_sql(&self, term: &str, limit: i64) -> Sql {
        let mut sql = Sql::new("SELECT ");
        sql.push(&self.id_column)
            .push(" AS id, ")
            .push(&self.text_column)
            .push(" AS text FROM ")
            .push(&self.table);
        for join in &self.joins {
            sql.push(&format!(" {} {} ON {}", join.kind, join.table, join.on));
        }
        sql.push(" WHERE CAST(")
            .push(&self.text_column)
            .push(" AS TEXT) LIKE ")
            .push_bind(columns::contains_pattern(term));
        let condition = self.condition.as_deref().map(str::trim);
        if let Some(condition) = condition.filter(|c| !c.is_empty()) {
            sql.push(" AND (").push(condition).push(")");
        }
        sql.push(" LIMIT ").push_bind(limit);
        sql
    }
}

/// Answers tabular and typeahead requests over a [`Connection`].
pub struct TabularEndpoint<'c, C: Connection> {
    conn: &'c C,
    config: TabularConfig,
}

impl<'c, C: Connection> TabularEndpoint<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self::with_config(conn, TabularConfig::default())
    }

    pub fn with_config(conn: &'c C, config: TabularConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &TabularConfig {
        &self.config
    }

    /// Assemble one page: total count, filtered count, then the rows.
    pub async fn paginated(
        &self,
        query: &TabularQuery,
        request: &TabularRequest,
    ) -> DraftResult<TabularResponse> {
        request.validate()?;

        let filtered_sql = query.filtered_sql(request);
        let (records_total, records_filtered) = if query.is_grouped() {
            let filtered = filtered_sql.fetch_count(self.conn).await?;
            (filtered, filtered)
        } else {
            let total = query.total_sql().fetch_count(self.conn).await?;
            let filtered = filtered_sql.fetch_count(self.conn).await?;
            (total, filtered)
        };

        let data = query
            .data_sql(request, &self.config)
            .fetch_all(self.conn)
            .await?;

        Ok(TabularResponse {
            draw: request.draw,
            records_total,
            records_filtered,
            data,
        })
    }

    /// Typeahead search. Faults are logged and returned as the error shape.
    pub async fn typeahead(
        &self,
        query: &TypeaheadQuery,
        request: &TypeaheadRequest,
    ) -> TypeaheadResponse {
        let limit = request
            .limit
            .filter(|l| *l >= 0)
            .unwrap_or(self.config.typeahead_limit);
        let sql = query.to_sql(&request.q, limit);

        match sql.fetch_all(self.conn).await {
            Ok(rows) => TypeaheadResponse::Results {
                results: rows.iter().map(TypeaheadItem::from_record).collect(),
            },
            Err(e) => {
                tracing::warn!(
                    target: "pgdraft.tabular",
                    table = %query.table,
                    error = %e,
                    "typeahead query failed"
                );
                TypeaheadResponse::Error {
                    error: e.to_string(),
                }
            }
        }
    }
}
