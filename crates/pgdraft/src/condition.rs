//! Condition primitives for WHERE/HAVING clauses.
//!
//! [`Op`] and [`SortDir`] are public; the structured [`Condition`] fragments are
//! what the statement draft accumulates and renders through [`Sql`].

use crate::error::DraftError;
use crate::sql::{Sql, ends_with_keyword, starts_with_keyword};
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a `where_op` condition.
///
/// # Example
/// ```ignore
/// use pgdraft::Op;
///
/// builder.where_op("age", Op::Gte, 18);
/// builder.where_op("name", "ilike".parse::<Op>()?, "%ann%");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    Ilike,
    NotIlike,
}

impl Op {
    pub fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Like => "LIKE",
            Op::NotLike => "NOT LIKE",
            Op::Ilike => "ILIKE",
            Op::NotIlike => "NOT ILIKE",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Op {
    type Err = DraftError;

    /// Parse the SQL spelling, case-insensitively. `<>` is accepted for `!=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        let op = match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Op::Eq,
            "!=" | "<>" => Op::Ne,
            "<" => Op::Lt,
            "<=" => Op::Lte,
            ">" => Op::Gt,
            ">=" => Op::Gte,
            "LIKE" => Op::Like,
            "NOT LIKE" => Op::NotLike,
            "ILIKE" => Op::Ilike,
            "NOT ILIKE" => Op::NotIlike,
            _ => return Err(DraftError::validation(format!("unknown operator '{s}'"))),
        };
        Ok(op)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }

    /// `desc` in any case is descending; anything else is ascending.
    pub fn lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            SortDir::Desc
        } else {
            SortDir::Asc
        }
    }
}

impl FromStr for SortDir {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDir::Asc),
            "desc" => Ok(SortDir::Desc),
            _ => Err(DraftError::validation(format!(
                "sort direction must be ASC or DESC, got '{s}'"
            ))),
        }
    }
}

/// Boolean connector in front of a condition fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Connector {
    And,
    Or,
}

impl Connector {
    fn as_sql(self) -> &'static str {
        match self {
            Connector::And => " AND ",
            Connector::Or => " OR ",
        }
    }
}

/// A structured condition. Identifiers are rendered verbatim; only values bind.
#[derive(Debug, Clone)]
pub(crate) enum Condition {
    Compare {
        column: String,
        op: Op,
        value: Value,
    },
    Null {
        column: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Raw(Sql),
}

impl Condition {
    pub(crate) fn append_to_sql(&self, sql: &mut Sql) {
        match self {
            Condition::Compare { column, op, value } => {
                sql.push(column)
                    .push(" ")
                    .push(op.as_sql())
                    .push(" ")
                    .push_bind(value.clone());
            }
            Condition::Null { column, negated } => {
                sql.push(column);
                sql.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Condition::In {
                column,
                values,
                negated,
            } => {
                sql.push(column);
                sql.push(if *negated { " NOT IN (" } else { " IN (" });
                sql.push_bind_list(values.iter().cloned());
                sql.push(")");
            }
            Condition::Raw(raw) => {
                sql.push_sql(raw.clone());
            }
        }
    }
}

/// One entry of a WHERE clause: its connector and condition.
#[derive(Debug, Clone)]
pub(crate) struct Fragment {
    pub(crate) connector: Connector,
    pub(crate) condition: Condition,
}

/// Render ` WHERE a AND b OR c`. The first fragment's connector is dropped.
pub(crate) fn push_where(sql: &mut Sql, fragments: &[Fragment]) {
    for (i, fragment) in fragments.iter().enumerate() {
        if i == 0 {
            sql.push(" WHERE ");
        } else {
            sql.push(fragment.connector.as_sql());
        }
        fragment.condition.append_to_sql(sql);
    }
}

/// Lift leading `AND`/`OR` keywords into a connector and drop trailing ones.
///
/// Returns `None` as connector when the text carried no leading keyword.
pub(crate) fn split_connector(text: &str) -> (Option<Connector>, &str) {
    let mut rest = text.trim();
    let mut connector = None;
    loop {
        if starts_with_keyword(rest, "AND") {
            connector = Some(Connector::And);
            rest = rest[3..].trim_start();
        } else if starts_with_keyword(rest, "OR") {
            connector = Some(Connector::Or);
            rest = rest[2..].trim_start();
        } else {
            break;
        }
    }
    loop {
        if ends_with_keyword(rest, "AND") {
            rest = rest[..rest.len() - 3].trim_end();
        } else if ends_with_keyword(rest, "OR") {
            rest = rest[..rest.len() - 2].trim_end();
        } else {
            break;
        }
    }
    (connector, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_parses_sql_spellings() {
        assert_eq!("<>".parse::<Op>().unwrap(), Op::Ne);
        assert_eq!("not   like".parse::<Op>().unwrap(), Op::NotLike);
        assert_eq!("ILIKE".parse::<Op>().unwrap(), Op::Ilike);
        assert!("; DROP".parse::<Op>().is_err());
    }

    #[test]
    fn sort_dir_lenient_only_recognizes_desc() {
        assert_eq!(SortDir::lenient("DeSc"), SortDir::Desc);
        assert_eq!(SortDir::lenient("sideways"), SortDir::Asc);
        assert!("sideways".parse::<SortDir>().is_err());
    }

    #[test]
    fn split_connector_lifts_and_drops_keywords() {
        assert_eq!(split_connector("AND a = 1"), (Some(Connector::And), "a = 1"));
        assert_eq!(split_connector(" or b = 2 AND "), (Some(Connector::Or), "b = 2"));
        assert_eq!(split_connector("order_no = 3"), (None, "order_no = 3"));
        assert_eq!(split_connector("AND"), (Some(Connector::And), ""));
    }

    #[test]
    fn where_clause_drops_first_connector() {
        let fragments = vec![
            Fragment {
                connector: Connector::Or,
                condition: Condition::Compare {
                    column: "a".into(),
                    op: Op::Eq,
                    value: Value::Int(1),
                },
            },
            Fragment {
                connector: Connector::Or,
                condition: Condition::Null {
                    column: "b".into(),
                    negated: true,
                },
            },
            Fragment {
                connector: Connector::And,
                condition: Condition::In {
                    column: "c".into(),
                    values: vec![Value::from("x"), Value::from("y")],
                    negated: false,
                },
            },
        ];
        let mut sql = Sql::new("SELECT * FROM t");
        push_where(&mut sql, &fragments);
        assert_eq!(
            sql.to_sql(),
            "SELECT * FROM t WHERE a = $1 OR b IS NOT NULL AND c IN ($2, $3)"
        );
    }
}
