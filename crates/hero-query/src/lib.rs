//! hero-query: typed, schema-checked queries over the heroes database.
//!
//! Queries are either built as [`expr::Select`] values or written as SQL
//! through the `query!` macro in `hero-query-macros`, which checks them
//! against `schema.sql` at compile time. Both run through [`Database`].

pub mod compare;
pub mod config;
pub mod error;
pub mod expr;
pub mod heroes;
pub mod logging;
pub mod runtime;
pub mod schema;
pub mod types;
pub mod validate;

pub use compare::{check_eq, join};
pub use config::DatabaseConfig;
pub use error::{Error, Result};
pub use expr::{sql_eq, Condition, Param, Select, TableRef};
pub use runtime::{Database, Query, QueryRow};
pub use schema::{Column, Schema, Table};
pub use types::{RustType, SqlType};
pub use validate::validate_query;
