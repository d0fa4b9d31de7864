//! Embedded SQLite backend for demos and tests.
//!
//! One connection behind a mutex. The lock is taken and released inside
//! each synchronous call, never held across an `.await`.

use super::{SqlRow, SqlValue, StatsStore};
use crate::{
    error::StatsResult,
    sql::{BuiltQuery, Dialect, SqlParam},
};
use async_trait::async_trait;
use rusqlite::{
    params_from_iter,
    types::{ToSqlOutput, ValueRef},
    Connection, OpenFlags, ToSql,
};
use std::sync::{Mutex, PoisonError};

pub struct SqliteStatsStore {
    conn: Mutex<Connection>,
}

impl SqliteStatsStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> StatsResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL only applies to real files.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> StatsResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StatsResult<T>) -> StatsResult<T> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlParam::Text(v)    => v.to_sql(),
            SqlParam::OptText(v) => v.to_sql(),
            SqlParam::Int(v)     => v.to_sql(),
            SqlParam::Bool(v)    => v.to_sql(),
        }
    }
}

fn fetch_rows(conn: &Connection, query: &BuiltQuery) -> StatsResult<Vec<SqlRow>> {
    let mut stmt = conn.prepare(&query.sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params_from_iter(query.params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = SqlRow::default();
        for (idx, name) in columns.iter().enumerate() {
            let value = match row.get_ref(idx)? {
                ValueRef::Null       => SqlValue::Null,
                ValueRef::Integer(v) => SqlValue::Int(v),
                ValueRef::Real(v)    => SqlValue::Real(v),
                ValueRef::Text(v) | ValueRef::Blob(v) => {
                    SqlValue::Text(String::from_utf8_lossy(v).into_owned())
                }
            };
            record.insert(name.clone(), value);
        }
        out.push(record);
    }
    Ok(out)
}

#[async_trait]
impl StatsStore for SqliteStatsStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch(&self, query: &BuiltQuery) -> StatsResult<Vec<SqlRow>> {
        self.with_conn(|conn| fetch_rows(conn, query))
    }

    async fn execute(&self, query: &BuiltQuery) -> StatsResult<u64> {
        self.with_conn(|conn| {
            let changed = conn.execute(&query.sql, params_from_iter(query.params.iter()))?;
            Ok(changed as u64)
        })
    }

    async fn migrate(&self) -> StatsResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(include_str!("../../../migrations/sqlite/001_outbound_stats.sql"))?;
            Ok(())
        })?;
        log::info!("SQLite schema applied");
        Ok(())
    }
}
