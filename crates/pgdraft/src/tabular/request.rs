//! Request shapes and their transport adapters.

use crate::condition::SortDir;
use crate::error::{DraftError, DraftResult};
use crate::ident::validate_identifier;
use crate::record::Record;
use crate::value::Value;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Accept `7`, `7.0` and `"7"` alike.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    use serde::de::Error;

    let raw = serde_json::Value::deserialize(deserializer)?;
    parse_lenient(&raw).ok_or_else(|| D::Error::custom(format!("expected an integer, got {raw}")))
}

/// A draw token that is not a number echoes back as `1`.
fn draw_token<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(parse_lenient(&raw).unwrap_or(1))
}

/// Order entries that cannot be read are dropped.
fn lenient_orders<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<OrderSpec>, D::Error> {
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|entry| OrderSpec::deserialize(entry).ok())
        .collect())
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    use serde::de::Error;

    let raw = serde_json::Value::deserialize(deserializer)?;
    match raw {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(ref s) if s.trim().is_empty() => Ok(None),
        _ => parse_lenient(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected an integer, got {raw}"))),
    }
}

fn parse_lenient(raw: &serde_json::Value) -> Option<i64> {
    match raw {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => parse_int(s),
        _ => None,
    }
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn parse_field(name: &str, raw: &str) -> DraftResult<i64> {
    parse_int(raw)
        .ok_or_else(|| DraftError::validation(format!("{name} must be an integer, got '{raw}'")))
}

/// Split `order[0][column]` into `("order", ["0", "column"])`.
fn bracket_path(key: &str) -> (&str, Vec<&str>) {
    let Some(open) = key.find('[') else {
        return (key, Vec::new());
    };
    let head = &key[..open];
    let segments = key[open..]
        .split('[')
        .filter_map(|s| s.strip_suffix(']'))
        .collect();
    (head, segments)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpec {
    pub value: String,
}

/// One requested sort: index into the projected columns plus direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSpec {
    #[serde(deserialize_with = "lenient_i64")]
    pub column: i64,
    pub dir: String,
}

impl Default for OrderSpec {
    fn default() -> Self {
        Self {
            column: 0,
            dir: "asc".to_string(),
        }
    }
}

impl OrderSpec {
    pub fn new(column: i64, dir: SortDir) -> Self {
        Self {
            column,
            dir: dir.as_sql().to_ascii_lowercase(),
        }
    }

    pub fn direction(&self) -> SortDir {
        SortDir::lenient(&self.dir)
    }
}

/// A paginated-table request as sent by a browser table widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularRequest {
    /// Echoed back untouched.
    #[serde(deserialize_with = "draw_token")]
    pub draw: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub start: i64,
    /// Page size; `-1` returns every row.
    #[serde(deserialize_with = "lenient_i64")]
    pub length: i64,
    pub search: SearchSpec,
    #[serde(deserialize_with = "lenient_orders")]
    pub order: Vec<OrderSpec>,
    /// Exact-match filters, column → value, in request order.
    #[serde(rename = "where")]
    pub filters: Record,
}

impl Default for TabularRequest {
    fn default() -> Self {
        Self {
            draw: 1,
            start: 0,
            length: -1,
            search: SearchSpec::default(),
            order: Vec::new(),
            filters: Record::new(),
        }
    }
}

impl TabularRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, start: i64, length: i64) -> Self {
        self.start = start;
        self.length = length;
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search.value = term.into();
        self
    }

    pub fn order(mut self, column: i64, dir: SortDir) -> Self {
        self.order.push(OrderSpec::new(column, dir));
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    /// Parse the bracket-notation query string, e.g.
    /// `draw=2&start=0&length=10&search[value]=kemi&order[0][column]=1&order[0][dir]=desc&where[status]=A`.
    ///
    /// Unknown keys (`columns[..]`, cache busters) are ignored. A non-numeric
    /// `draw` becomes `1` and an order entry with a non-numeric column is skipped.
    pub fn from_query(query: &str) -> DraftResult<Self> {
        let mut request = Self::default();
        let mut orders: BTreeMap<usize, OrderSpec> = BTreeMap::new();
        let mut unreadable: BTreeSet<usize> = BTreeSet::new();

        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let (head, segments) = bracket_path(&key);
            match (head, segments.as_slice()) {
                ("draw", []) => request.draw = parse_int(&value).unwrap_or(1),
                ("start", []) => request.start = parse_field("start", &value)?,
                ("length", []) => request.length = parse_field("length", &value)?,
                ("search", ["value"]) => request.search.value = value.into_owned(),
                ("order", [idx, field]) => {
                    let Ok(idx) = idx.parse::<usize>() else {
                        continue;
                    };
                    let spec = orders.entry(idx).or_default();
                    match *field {
                        "column" => match parse_int(&value) {
                            Some(column) => spec.column = column,
                            None => {
                                unreadable.insert(idx);
                            }
                        },
                        "dir" => spec.dir = value.into_owned(),
                        _ => {}
                    }
                }
                ("where", [column]) => {
                    request
                        .filters
                        .insert((*column).to_string(), Value::Text(value.into_owned()));
                }
                _ => {}
            }
        }
        request.order = orders
            .into_iter()
            .filter(|(idx, _)| !unreadable.contains(idx))
            .map(|(_, spec)| spec)
            .collect();
        Ok(request)
    }

    /// Reject out-of-range paging and filter keys that are not plain identifiers.
    pub fn validate(&self) -> DraftResult<()> {
        if self.start < 0 {
            return Err(DraftError::validation(format!(
                "start must be >= 0, got {}",
                self.start
            )));
        }
        if self.length < -1 {
            return Err(DraftError::validation(format!(
                "length must be >= -1, got {}",
                self.length
            )));
        }
        for column in self.filters.column_names() {
            validate_identifier(column)?;
        }
        Ok(())
    }
}

/// A typeahead (select-box search) request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeaheadRequest {
    pub q: String,
    #[serde(deserialize_with = "lenient_opt_i64")]
    pub limit: Option<i64>,
}

impl TypeaheadRequest {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Read `q` and `limit` from a query string. A non-numeric limit falls back to the default.
    pub fn from_query(query: &str) -> Self {
        let mut request = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "q" => request.q = value.into_owned(),
                "limit" => request.limit = parse_int(&value),
                _ => {}
            }
        }
        request
    }
}
