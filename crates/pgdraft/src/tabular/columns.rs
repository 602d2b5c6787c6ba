//! Column-expression helpers for ordering and searching.

use crate::config::TabularConfig;
use crate::condition::SortDir;
use crate::sql::Sql;
use std::sync::OnceLock;

fn alias_re() -> &'static regex::Regex {
    static ALIAS_RE: OnceLock<regex::Regex> = OnceLock::new();
    ALIAS_RE.get_or_init(|| {
        regex::Regex::new(r"(?i)\s+AS\s+\w+\s*$").expect("invalid built-in alias regex")
    })
}

/// `u.name AS user_name` → `u.name`.
pub(crate) fn strip_alias(column: &str) -> &str {
    match alias_re().find(column) {
        Some(m) => column[..m.start()].trim(),
        None => column.trim(),
    }
}

/// Function-call expressions are excluded from free-text search.
pub(crate) fn is_searchable(column: &str) -> bool {
    !column.contains('(')
}

/// Sort expression for one requested ordering, or `None` if the index is out of range.
pub(crate) fn order_term(
    columns: &[String],
    index: i64,
    dir: SortDir,
    config: &TabularConfig,
) -> Option<String> {
    let column = usize::try_from(index).ok().and_then(|i| columns.get(i))?;
    let column = strip_alias(column);
    let expr = if config.is_datetime(column) {
        format!("CAST({column} AS {})", config.datetime_cast)
    } else {
        column.to_string()
    };
    Some(format!("{expr} {}", dir.as_sql()))
}

/// Escape LIKE wildcards so the term matches literally.
pub(crate) fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `%term%` with wildcards escaped.
pub(crate) fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

/// `(CAST(a AS TEXT) LIKE $n OR CAST(b AS TEXT) LIKE $m ...)`, or `None` when
/// no column is searchable.
pub(crate) fn search_group(columns: &[String], term: &str) -> Option<Sql> {
    let pattern = contains_pattern(term);
    let searchable: Vec<&str> = columns
        .iter()
        .filter(|c| is_searchable(c))
        .map(|c| strip_alias(c))
        .collect();
    if searchable.is_empty() {
        return None;
    }

    let mut sql = Sql::new("(");
    for (i, column) in searchable.iter().enumerate() {
        if i > 0 {
            sql.push(" OR ");
        }
        sql.push("CAST(")
            .push(column)
            .push(" AS TEXT) LIKE ")
            .push_bind(pattern.clone());
    }
    sql.push(")");
    Some(sql)
}
