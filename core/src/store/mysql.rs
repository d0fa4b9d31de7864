//! MySQL backend over a `sqlx` connection pool.

use super::{SqlRow, SqlValue, StatsStore};
use crate::{
    config::DatabaseConfig,
    error::StatsResult,
    sql::{split_statements, BuiltQuery, Dialect, SqlParam},
};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlRow},
    query::Query,
    Column, MySql, MySqlPool, Row,
};

pub struct MySqlStatsStore {
    pool: MySqlPool,
}

impl MySqlStatsStore {
    /// Build the pool without connecting; the first query opens a connection.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(options);
        Self { pool }
    }

    /// Connect eagerly from a `mysql://` URL.
    pub async fn connect(url: &str) -> StatsResult<Self> {
        let pool = MySqlPoolOptions::new().max_connections(2).connect(url).await?;
        Ok(Self { pool })
    }
}

fn bind_all<'q>(sql: &'q str, params: &[SqlParam]) -> Query<'q, MySql, MySqlArguments> {
    params.iter().fold(sqlx::query(sql), |query, param| match param {
        SqlParam::Text(v)    => query.bind(v.clone()),
        SqlParam::OptText(v) => query.bind(v.clone()),
        SqlParam::Int(v)     => query.bind(*v),
        SqlParam::Bool(v)    => query.bind(*v),
    })
}

/// Copy one row by trying the decodings our statements produce, narrowest
/// first. Counters arrive as `SIGNED`, text as `CHAR`/`VARCHAR`.
fn copy_row(row: &MySqlRow) -> SqlRow {
    let mut record = SqlRow::default();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            v.map_or(SqlValue::Null, SqlValue::Int)
        } else if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
            v.map_or(SqlValue::Null, |v| match i64::try_from(v) {
                Ok(v) => SqlValue::Int(v),
                Err(_) => SqlValue::Text(v.to_string()),
            })
        } else if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            v.map_or(SqlValue::Null, SqlValue::Text)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            v.map_or(SqlValue::Null, SqlValue::Real)
        } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            v.map_or(SqlValue::Null, |b| {
                SqlValue::Text(String::from_utf8_lossy(&b).into_owned())
            })
        } else {
            log::debug!("column {} has an undecodable type, reading NULL", column.name());
            SqlValue::Null
        };
        record.insert(column.name(), value);
    }
    record
}

#[async_trait]
impl StatsStore for MySqlStatsStore {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn fetch(&self, query: &BuiltQuery) -> StatsResult<Vec<SqlRow>> {
        let rows = bind_all(&query.sql, &query.params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(copy_row).collect())
    }

    async fn execute(&self, query: &BuiltQuery) -> StatsResult<u64> {
        let result = bind_all(&query.sql, &query.params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn migrate(&self) -> StatsResult<()> {
        let statements = split_statements(include_str!("../../../migrations/mysql/001_outbound_stats.sql"));
        let total = statements.len();
        for (i, statement) in statements.iter().enumerate() {
            if let Err(e) = sqlx::query(statement).execute(&self.pool).await {
                log::error!("migration statement {}/{} failed: {e}", i + 1, total);
                return Err(e.into());
            }
            log::debug!("migration statement {}/{} applied", i + 1, total);
        }
        log::info!("MySQL schema applied ({total} statements)");
        Ok(())
    }
}
