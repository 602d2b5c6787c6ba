//! Common imports:
//!
//! ```ignore
//! use pgdraft::prelude::*;
//! ```

pub use crate::{
    Connection, DraftError, DraftResult, InsertOutcome, JoinKind, Op, PgConnection, QueryBuilder,
    Record, SortDir, Sql, TabularEndpoint, TabularQuery, TabularRequest, TypeaheadQuery,
    TypeaheadRequest, Value, record, sql,
};
