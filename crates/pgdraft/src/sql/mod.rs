//! Parameter-safe SQL fragments.
//!
//! Both the statement builder and the tabular endpoint render through [`Sql`]:
//! text and values are kept apart and `$n` placeholders are numbered once, at
//! the end.
//!
//! # Example
//!
//! ```ignore
//! use pgdraft::sql;
//!
//! let mut q = sql("SELECT id, name FROM users WHERE 1=1");
//! if let Some(status) = status {
//!     q.push(" AND status = ").push_bind(status);
//! }
//! q.push(" ORDER BY id DESC");
//!
//! let rows = q.fetch_all(&conn).await?;
//! ```

mod builder;


pub use builder::Sql;

/// Start building a SQL statement.
pub fn sql(initial_sql: impl Into<String>) -> Sql {
    Sql::new(initial_sql)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TemplatePiece {
    Text(String),
    Marker,
}

/// Split a `?`-marked template into text and marker pieces.
///
/// Markers inside single-quoted literals and double-quoted identifiers are text.
/// `??` collapses to a literal `?`.
pub(crate) fn scan_template(template: &str) -> Vec<TemplatePiece> {
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut in_literal = false;
    let mut in_ident = false;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_ident => {
                in_literal = !in_literal;
                text.push(c);
            }
            '"' if !in_literal => {
                in_ident = !in_ident;
                text.push(c);
            }
            '?' if !in_literal && !in_ident => {
                if chars.peek() == Some(&'?') {
                    chars.next();
                    text.push('?');
                } else {
                    if !text.is_empty() {
                        pieces.push(TemplatePiece::Text(std::mem::take(&mut text)));
                    }
                    pieces.push(TemplatePiece::Marker);
                }
            }
            _ => text.push(c),
        }
    }
    if !text.is_empty() {
        pieces.push(TemplatePiece::Text(text));
    }
    pieces
}

pub(crate) fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) => {
            prefix.eq_ignore_ascii_case(keyword)
                && s[keyword.len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| c.is_whitespace() || c == '(')
        }
        None => false,
    }
}

pub(crate) fn ends_with_keyword(s: &str, keyword: &str) -> bool {
    let Some(start) = s.len().checked_sub(keyword.len()) else {
        return false;
    };
    match s.get(start..) {
        Some(suffix) => {
            suffix.eq_ignore_ascii_case(keyword)
                && s[..start]
                    .chars()
                    .next_back()
                    .is_none_or(|c| c.is_whitespace() || c == ')')
        }
        None => false,
    }
}
