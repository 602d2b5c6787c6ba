//! # pgdraft
//!
//! A fluent SQL statement builder for PostgreSQL, plus the server-side logic
//! behind paginated browser tables and typeahead search boxes.
//!
//! ## Features
//!
//! - **Parameter-safe**: values are always bound as `$n` placeholders; identifiers come from code
//! - **Fluent drafts**: `table()` starts a fresh statement, every executor resets the builder
//! - **Row read-back**: insert/update return the affected row when it can be identified
//! - **Tabular protocol**: draw/start/length/search/order requests answered with counts and rows
//! - **Typeahead**: `{results: [{id, text}]}` answers that never fail the caller
//! - **Mockable**: everything runs over the [`Connection`] trait
//!
//! ## Statement builder
//!
//! ```ignore
//! use pgdraft::{Op, PgConnection, QueryBuilder, SortDir, record};
//!
//! let conn = PgConnection::connect_env().await?;
//! let mut qb = QueryBuilder::new(&conn);
//!
//! let active = qb
//!     .table("users u")
//!     .select(["u.id", "u.name"])
//!     .where_eq("u.status", "active")
//!     .where_op("u.age", Op::Gte, 18)
//!     .order_by("u.name", SortDir::Asc)
//!     .limit(10)
//!     .get()
//!     .await?;
//!
//! let created = qb.table("users").insert(record! { "name" => "ann" }).await?;
//! let updated = qb
//!     .table("users")
//!     .where_eq("id", 1)
//!     .update(record! { "status" => "inactive" })
//!     .await?;
//! ```
//!
//! ## Tabular endpoint
//!
//! See [`TabularEndpoint`].

pub mod builder;
pub mod client;
pub mod condition;
pub mod config;
pub mod error;
pub mod ident;
pub mod prelude;
pub mod record;
pub mod sql;
pub mod tabular;
pub mod trace;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod mock;

pub use builder::{InsertOutcome, JoinKind, QueryBuilder};
pub use client::{Connection, PgConnection};
pub use condition::{Op, SortDir};
pub use config::{PgConnectionConfig, TabularConfig};
pub use error::{DraftError, DraftResult};
pub use record::Record;
pub use sql::{Sql, sql};
pub use tabular::{
    OrderSpec, SearchSpec, TabularEndpoint, TabularQuery, TabularRequest, TabularResponse,
    TypeaheadItem, TypeaheadJoin, TypeaheadQuery, TypeaheadRequest, TypeaheadResponse,
};
pub use trace::SqlTrace;
pub use value::Value;
