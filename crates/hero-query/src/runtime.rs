//! Runtime query execution support.
//!
//! Executes rendered or macro-generated queries through sqlx against either
//! PostgreSQL or SQLite. Rows are decoded with `sqlx::FromRow`, whose derive
//! is generic over the row type, so one row struct serves both backends.

use crate::error::{Error, Result};
use crate::expr::{Param, Select};
use crate::schema::Schema;
use crate::validate::validate_query;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                Param::Int(value) => query.bind(*value),
                Param::Text(value) => query.bind(value.clone()),
            };
        }
        query
    }};
}

/// Row types that decode on every supported backend.
pub trait QueryRow:
    for<'r> sqlx::FromRow<'r, PgRow> + for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin
{
}

impl<T> QueryRow for T where
    T: for<'r> sqlx::FromRow<'r, PgRow> + for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin
{
}

#[derive(Debug, Clone)]
enum Pool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// A read-only handle to the external database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool,
    schema: Option<Arc<Schema>>,
}

impl Database {
    /// Connect using a `postgres://`, `postgresql://` or `sqlite:` URL.
    ///
    /// In-memory SQLite databases live as long as their connection, so they
    /// get a single connection that never idles out.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .map_err(Error::Connection)?;
            Pool::Postgres(pool)
        } else if url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(url).map_err(Error::Connection)?;
            let mut pool_options = SqlitePoolOptions::new();
            if is_in_memory(url) {
                pool_options = pool_options
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None);
            }
            let pool = pool_options
                .connect_with(options)
                .await
                .map_err(Error::Connection)?;
            Pool::Sqlite(pool)
        } else {
            return Err(Error::Config(format!(
                "Unsupported database URL '{url}': expected postgres:// or sqlite:"
            )));
        };

        let db = Self { pool, schema: None };
        info!(backend = db.backend(), "connected to database");
        Ok(db)
    }

    /// Validate every statement against `schema` before sending it.
    #[must_use]
    pub fn checked(mut self, schema: Schema) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn backend(&self) -> &'static str {
        match self.pool {
            Pool::Postgres(_) => "postgres",
            Pool::Sqlite(_) => "sqlite",
        }
    }

    pub fn as_postgres(&self) -> Option<&PgPool> {
        match &self.pool {
            Pool::Postgres(pool) => Some(pool),
            Pool::Sqlite(_) => None,
        }
    }

    pub fn as_sqlite(&self) -> Option<&SqlitePool> {
        match &self.pool {
            Pool::Sqlite(pool) => Some(pool),
            Pool::Postgres(_) => None,
        }
    }

    pub async fn close(&self) {
        match &self.pool {
            Pool::Postgres(pool) => pool.close().await,
            Pool::Sqlite(pool) => pool.close().await,
        }
    }

    fn check(&self, sql: &str, params: &[Param]) -> Result<()> {
        let Some(schema) = &self.schema else {
            return Ok(());
        };

        let invalid = |source: Error| Error::Validation {
            sql: sql.to_string(),
            source: Box::new(source),
        };

        let result = validate_query(schema, sql).map_err(invalid)?;
        if result.param_count != params.len() {
            return Err(invalid(Error::InvalidQuery(format!(
                "Expected {} parameters, got {}",
                result.param_count,
                params.len()
            ))));
        }
        Ok(())
    }

    async fn fetch_optional<T: QueryRow>(&self, sql: &str, params: &[Param]) -> Result<Option<T>> {
        self.check(sql, params)?;
        debug!(backend = self.backend(), params = params.len(), %sql, "fetch_optional");

        match &self.pool {
            Pool::Postgres(pool) => bind_params!(sqlx::query_as::<sqlx::Postgres, T>(sql), params)
                .fetch_optional(pool)
                .await
                .map_err(Error::from_sqlx),
            Pool::Sqlite(pool) => bind_params!(sqlx::query_as::<sqlx::Sqlite, T>(sql), params)
                .fetch_optional(pool)
                .await
                .map_err(Error::from_sqlx),
        }
    }

    async fn fetch_all<T: QueryRow>(&self, sql: &str, params: &[Param]) -> Result<Vec<T>> {
        self.check(sql, params)?;
        debug!(backend = self.backend(), params = params.len(), %sql, "fetch_all");

        let rows = match &self.pool {
            Pool::Postgres(pool) => bind_params!(sqlx::query_as::<sqlx::Postgres, T>(sql), params)
                .fetch_all(pool)
                .await
                .map_err(Error::from_sqlx)?,
            Pool::Sqlite(pool) => bind_params!(sqlx::query_as::<sqlx::Sqlite, T>(sql), params)
                .fetch_all(pool)
                .await
                .map_err(Error::from_sqlx)?,
        };

        debug!(rows = rows.len(), "query complete");
        Ok(rows)
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// A query ready for execution, with its parameters bound.
pub struct Query<T> {
    sql: String,
    params: Vec<Param>,
    _row: PhantomData<fn() -> T>,
}

impl<T> Query<T> {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            _row: PhantomData,
        }
    }

    /// Render a query expression. Nested subqueries become part of this one statement.
    pub fn from_select(select: &Select) -> Self {
        let (sql, params) = select.to_sql();
        Self {
            sql,
            params,
            _row: PhantomData,
        }
    }

    /// Get the SQL string.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Bind the next `$N` parameter.
    #[must_use]
    pub fn bind(mut self, value: impl Into<Param>) -> Self {
        self.params.push(value.into());
        self
    }
}

impl<T: QueryRow> Query<T> {
    /// Execute the query and fetch all results.
    pub async fn fetch_all(&self, db: &Database) -> Result<Vec<T>> {
        db.fetch_all(&self.sql, &self.params).await
    }

    /// Execute the query and fetch one result; no rows is a query error.
    pub async fn fetch_one(&self, db: &Database) -> Result<T> {
        db.fetch_optional(&self.sql, &self.params)
            .await?
            .ok_or(Error::Query(sqlx::Error::RowNotFound))
    }

    /// Execute the query and fetch an optional result.
    pub async fn fetch_optional(&self, db: &Database) -> Result<Option<T>> {
        db.fetch_optional(&self.sql, &self.params).await
    }
}

impl Select {
    /// Render into an executable query yielding `T` rows.
    pub fn into_query<T>(self) -> Query<T> {
        Query::from_select(&self)
    }
}

impl<T> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .finish()
    }
}
