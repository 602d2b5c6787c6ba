use crate::record::Record;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// One page of a paginated table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularResponse {
    pub draw: i64,
    /// Rows in the source, ignoring request filters.
    pub records_total: i64,
    /// Rows left after filters and search.
    pub records_filtered: i64,
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeaheadItem {
    pub id: Value,
    pub text: Value,
}

impl TypeaheadItem {
    pub(crate) fn from_record(record: &Record) -> Self {
        Self {
            id: record.get("id").cloned().unwrap_or_default(),
            text: record.get("text").cloned().unwrap_or_default(),
        }
    }
}

/// `{"results": [...]}` on success, `{"error": "..."}` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeaheadResponse {
    Results { results: Vec<TypeaheadItem> },
    Error { error: String },
}

impl TypeaheadResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, TypeaheadResponse::Error { .. })
    }

    pub fn results(&self) -> &[TypeaheadItem] {
        match self {
            TypeaheadResponse::Results { results } => results,
            TypeaheadResponse::Error { .. } => &[],
        }
    }
}
