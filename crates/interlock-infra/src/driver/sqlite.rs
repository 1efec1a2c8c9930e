//! SQLite driver for the database domain.
//!
//! Holds one pool per named connection from `[database.connections]`.
//! Statements that produce rows (`SELECT`, `WITH`, `PRAGMA`, `VALUES`, or
//! anything with `RETURNING`) are fetched and decoded by runtime storage
//! class; everything else reports `rows_affected`.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, Sqlite, TypeInfo, ValueRef};

use interlock_core::driver::{DomainDriver, DriverError};
use interlock_types::config::DatabaseConfig;
use interlock_types::domain::{DatabaseAction, DatabaseOutcome, Domain, RawOutcome, StepAction};

/// `DomainDriver` for `Domain::Database` over named SQLite pools.
#[derive(Debug, Clone, Default)]
pub struct SqliteDatabaseDriver {
    pools: HashMap<String, SqlitePool>,
}

impl SqliteDatabaseDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every connection in `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let mut driver = Self::new();
        for (name, url) in &config.connections {
            let pool = open_pool(url, config.max_connections).await?;
            tracing::debug!(connection = %name, "database pool opened");
            driver.pools.insert(name.clone(), pool);
        }
        Ok(driver)
    }

    /// Add (or replace) a named pool.
    pub fn with_pool(mut self, name: impl Into<String>, pool: SqlitePool) -> Self {
        self.pools.insert(name.into(), pool);
        self
    }

    pub fn pool(&self, name: &str) -> Option<&SqlitePool> {
        self.pools.get(name)
    }

    pub fn connection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    async fn run(&self, action: &DatabaseAction) -> Result<DatabaseOutcome, DriverError> {
        let pool = self
            .pools
            .get(&action.connection)
            .ok_or_else(|| DriverError::UnknownConnection(action.connection.clone()))?;

        let started = Instant::now();
        let query = bind_args(sqlx::query(&action.query), &action.args)?;

        let outcome = if returns_rows(&action.query) {
            let rows = query.fetch_all(pool).await.map_err(query_error)?;
            let columns = match rows.first() {
                Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
                None => describe_columns(pool, &action.query).await,
            };
            let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
            DatabaseOutcome {
                columns,
                rows,
                rows_affected: 0,
                elapsed_ms: 0,
            }
        } else {
            let done = query.execute(pool).await.map_err(query_error)?;
            DatabaseOutcome {
                rows_affected: done.rows_affected(),
                ..Default::default()
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            connection = %action.connection,
            rows = outcome.rows.len(),
            rows_affected = outcome.rows_affected,
            elapsed_ms,
            "query completed"
        );
        Ok(DatabaseOutcome {
            elapsed_ms,
            ..outcome
        })
    }
}

impl DomainDriver for SqliteDatabaseDriver {
    fn domain(&self) -> Domain {
        Domain::Database
    }

    async fn execute(&self, action: &StepAction) -> Result<RawOutcome, DriverError> {
        match action {
            StepAction::Database(db) => self.run(db).await.map(RawOutcome::Database),
            other => Err(DriverError::WrongDomain {
                domain: Domain::Database,
                actual: other.domain(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Open a pool for `url`. In-memory databases get a single, never-recycled
/// connection so every statement sees the same database.
pub async fn open_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);

    let in_memory = url.contains(":memory:") || url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections.max(1))
    };

    pool_options.connect_with(options).await
}

fn query_error(e: sqlx::Error) -> DriverError {
    DriverError::Query(e.to_string())
}

/// Whether `sql` yields a result set.
pub fn returns_rows(sql: &str) -> bool {
    let upper = sql.trim_start().to_ascii_uppercase();
    let keyword = upper
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("");
    matches!(keyword, "SELECT" | "WITH" | "PRAGMA" | "VALUES" | "EXPLAIN")
        || upper
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .any(|word| word == "RETURNING")
}

/// Bind JSON args positionally. SQLite integers are signed 64-bit, so an
/// unsigned value above `i64::MAX` is rejected rather than rounded to a float.
fn bind_args<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &[Value],
) -> Result<sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>, DriverError> {
    for (position, arg) in args.iter().enumerate() {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) if n.is_f64() => query.bind(n.as_f64().unwrap_or(f64::NAN)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => {
                    return Err(DriverError::InvalidAction(format!(
                        "arg {position} ({n}) does not fit a 64-bit signed integer"
                    )));
                }
            },
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(other.to_string()),
        };
    }
    Ok(query)
}

async fn describe_columns(pool: &SqlitePool, sql: &str) -> Vec<String> {
    match pool.describe(sql).await {
        Ok(described) => described
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "could not describe result columns");
            Vec::new()
        }
    }
}

fn decode_row(row: &SqliteRow) -> Result<Map<String, Value>, DriverError> {
    let mut out = Map::new();
    for column in row.columns() {
        let i = column.ordinal();
        let raw = row.try_get_raw(i).map_err(query_error)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            match type_name.as_str() {
                "INTEGER" | "INT8" | "BIGINT" => Value::from(row.try_get::<i64, _>(i).map_err(query_error)?),
                "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(i).map_err(query_error)?),
                "REAL" | "NUMERIC" => Value::from(row.try_get::<f64, _>(i).map_err(query_error)?),
                "BLOB" => {
                    let bytes = row.try_get::<Vec<u8>, _>(i).map_err(query_error)?;
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::String(row.try_get::<String, _>(i).map_err(query_error)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}
