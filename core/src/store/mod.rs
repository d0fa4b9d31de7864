//! Persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Reports and handlers call `StatsStore` methods; they never execute SQL
//! directly. Backends implement four primitives (`dialect`, `fetch`,
//! `execute`, `migrate`); every typed read and write is a provided method
//! built from `sql` and the decoders below, so both backends run the same
//! statements.

mod mysql;
mod row;
mod sqlite;

pub use mysql::MySqlStatsStore;
pub use row::{SqlRow, SqlValue};
pub use sqlite::SqliteStatsStore;

use crate::{
    config::{Backend, DatabaseConfig},
    error::StatsResult,
    filter::StatsFilter,
    rates::Rates,
    records::{
        AggregateRow, DailyRow, DashboardRow, FilterOptions, NewChannelAlias, NewResponseRecord,
        NewSendRecord, ResponseRecord, SendRecord, SummaryMetrics,
    },
    sql::{self, BuiltQuery, Dialect, EXPECTED_TABLES},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

/// Rows sampled per table by `explore`.
pub const SAMPLE_ROWS: u32 = 3;

/// One column as `DESCRIBE` reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    #[serde(rename = "Field")]
    pub field:   String,
    #[serde(rename = "Type")]
    pub ty:      String,
    #[serde(rename = "Null")]
    pub null:    String,
    #[serde(rename = "Key")]
    pub key:     String,
    #[serde(rename = "Default")]
    pub default: Option<String>,
    #[serde(rename = "Extra")]
    pub extra:   String,
}

/// What `explore` found for one table. A failure on one table does not
/// abort the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableReport {
    Explored {
        structure:   Vec<ColumnInfo>,
        count:       i64,
        /// `None` when the table is empty.
        #[serde(rename = "sampleData")]
        sample_data: Option<Vec<Value>>,
    },
    Failed {
        error: String,
    },
}

#[async_trait]
pub trait StatsStore: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Run a query and copy every row out by column name.
    async fn fetch(&self, query: &BuiltQuery) -> StatsResult<Vec<SqlRow>>;

    /// Run a statement, returning the affected row count.
    async fn execute(&self, query: &BuiltQuery) -> StatsResult<u64>;

    /// Apply the bundled schema for this backend.
    async fn migrate(&self) -> StatsResult<()>;

    // ── Connectivity ───────────────────────────────────────────

    async fn ping(&self) -> StatsResult<()> {
        let probe = BuiltQuery {
            sql:    "SELECT 1 AS ok".into(),
            params: Vec::new(),
        };
        self.fetch(&probe).await?;
        Ok(())
    }

    // ── Hierarchy inputs ───────────────────────────────────────

    async fn aggregate_rows(&self, filter: &StatsFilter) -> StatsResult<Vec<AggregateRow>> {
        let rows = self.fetch(&sql::aggregate_query(self.dialect(), filter)).await?;
        rows.iter().map(decode_aggregate).collect()
    }

    async fn daily_rows(&self, filter: &StatsFilter) -> StatsResult<Vec<DailyRow>> {
        let rows = self.fetch(&sql::daily_query(self.dialect(), filter)).await?;
        rows.iter().map(decode_daily).collect()
    }

    /// Every account with at least one send row, sorted.
    async fn accounts(&self) -> StatsResult<Vec<String>> {
        let query = BuiltQuery {
            sql:    sql::ACCOUNTS_QUERY.into(),
            params: Vec::new(),
        };
        let rows = self.fetch(&query).await?;
        rows.iter().map(|r| r.text("cuenta")).collect()
    }

    // ── Flat reports ───────────────────────────────────────────

    async fn send_records(&self, filter: &StatsFilter) -> StatsResult<Vec<SendRecord>> {
        let rows = self.fetch(&sql::send_records_query(self.dialect(), filter)).await?;
        rows.iter().map(decode_send).collect()
    }

    async fn response_records(&self, filter: &StatsFilter) -> StatsResult<Vec<ResponseRecord>> {
        let rows = self
            .fetch(&sql::response_records_query(self.dialect(), filter))
            .await?;
        rows.iter().map(decode_response).collect()
    }

    async fn dashboard_rows(&self, filter: &StatsFilter) -> StatsResult<Vec<DashboardRow>> {
        let rows = self.fetch(&sql::dashboard_query(self.dialect(), filter)).await?;
        rows.iter().map(decode_dashboard).collect()
    }

    async fn summary(&self, filter: &StatsFilter) -> StatsResult<SummaryMetrics> {
        let rows = self.fetch(&sql::summary_query(self.dialect(), filter)).await?;
        let summary = match rows.first() {
            Some(row) => decode_summary(row)?,
            None => SummaryMetrics::default(),
        };
        Ok(summary.with_rates())
    }

    /// Filter choices over sends dated on or after `since`.
    async fn filter_options(&self, since: &str, cuenta: Option<&str>) -> StatsResult<FilterOptions> {
        let d = self.dialect();
        let clientes = self.fetch(&sql::option_accounts_query(since)).await?;
        let origenes = self.fetch(&sql::option_origins_query(d, since, cuenta)).await?;
        let funnels = self.fetch(&sql::option_funnels_query(since, cuenta)).await?;
        Ok(FilterOptions {
            clientes: clientes.iter().map(|r| r.text("cuenta")).collect::<StatsResult<_>>()?,
            origenes: origenes.iter().map(|r| r.text("origen")).collect::<StatsResult<_>>()?,
            funnels:  funnels.iter().map(|r| r.text("funnel")).collect::<StatsResult<_>>()?,
        })
    }

    // ── Introspection ──────────────────────────────────────────

    async fn list_tables(&self) -> StatsResult<Vec<String>> {
        let rows = self.fetch(&sql::list_tables_query(self.dialect())).await?;
        rows.iter().map(|r| r.text("table_name")).collect()
    }

    async fn describe_table(&self, table: &str) -> StatsResult<TableReport> {
        let d = self.dialect();
        let structure = self
            .fetch(&sql::columns_query(d, table))
            .await?
            .iter()
            .map(decode_column)
            .collect::<StatsResult<Vec<_>>>()?;

        let count = match self.fetch(&sql::count_query(d, table)).await?.first() {
            Some(row) => row.int("total")?,
            None => 0,
        };

        let sample_data = if count > 0 {
            let columns: Vec<String> = structure.iter().map(|c| c.field.clone()).collect();
            let rows = self
                .fetch(&sql::sample_rows_query(d, table, &columns, SAMPLE_ROWS))
                .await?;
            let samples = rows
                .iter()
                .map(|r| -> StatsResult<Value> { Ok(serde_json::from_str(&r.text("sample")?)?) })
                .collect::<StatsResult<Vec<_>>>()?;
            Some(samples)
        } else {
            None
        };

        Ok(TableReport::Explored {
            structure,
            count,
            sample_data,
        })
    }

    /// Structure, row count and a few sample rows of every table.
    async fn explore(&self) -> StatsResult<BTreeMap<String, TableReport>> {
        let mut report = BTreeMap::new();
        for table in self.list_tables().await? {
            let entry = match self.describe_table(&table).await {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("explore: table {table} failed: {e}");
                    TableReport::Failed { error: e.to_string() }
                }
            };
            report.insert(table, entry);
        }
        Ok(report)
    }

    /// Presence of each table the reports rely on.
    async fn check_structure(&self) -> StatsResult<BTreeMap<String, bool>> {
        let present = self.list_tables().await?;
        Ok(EXPECTED_TABLES
            .iter()
            .map(|t| (t.to_string(), present.iter().any(|p| p == t)))
            .collect())
    }

    // ── Write path ─────────────────────────────────────────────

    async fn upsert_send(&self, record: &NewSendRecord) -> StatsResult<u64> {
        self.execute(&sql::upsert_send(self.dialect(), record)).await
    }

    async fn upsert_response(&self, record: &NewResponseRecord) -> StatsResult<u64> {
        self.execute(&sql::upsert_response(self.dialect(), record)).await
    }

    async fn upsert_alias(&self, record: &NewChannelAlias) -> StatsResult<u64> {
        self.execute(&sql::upsert_alias(self.dialect(), record)).await
    }
}

/// Build the store selected by `config.backend`.
///
/// The MySQL pool connects lazily, so a server whose database is down still
/// starts and reports the failure per request.
pub fn open_store(config: &DatabaseConfig) -> StatsResult<Arc<dyn StatsStore>> {
    match config.backend {
        Backend::Mysql => {
            log::info!(
                "Using MySQL at {}:{}/{} (pool {})",
                config.host,
                config.port,
                config.database,
                config.max_connections
            );
            Ok(Arc::new(MySqlStatsStore::connect_lazy(config)))
        }
        Backend::Sqlite => {
            log::info!("Using SQLite at {}", config.sqlite_path);
            let store = if config.sqlite_path == ":memory:" {
                SqliteStatsStore::in_memory()?
            } else {
                SqliteStatsStore::open(&config.sqlite_path)?
            };
            Ok(Arc::new(store))
        }
    }
}

// ── Decoders ───────────────────────────────────────────────────────

fn decode_aggregate(r: &SqlRow) -> StatsResult<AggregateRow> {
    Ok(AggregateRow {
        cuenta:                       r.text("cuenta")?,
        identificador_via:            r.text("identificador_via")?,
        tipo_via:                     r.text("tipo_via")?,
        tipo_actividad:               r.text("tipo_actividad")?,
        funnel:                       r.text("funnel")?,
        total_enviados:               r.int("total_enviados")?,
        total_fallidos:               r.int("total_fallidos")?,
        total_limites:                r.int("total_limites")?,
        dias_activos:                 r.int("dias_activos")?,
        ultimo_envio:                 r.opt_text("ultimo_envio")?,
        total_respuestas:             r.int("total_respuestas")?,
        total_cualificados:           r.int("total_cualificados")?,
        total_interesados:            r.int("total_interesados")?,
        total_no_interesados:         r.int("total_no_interesados")?,
        total_agendados:              r.int("total_agendados")?,
        total_no_cualifica:           r.int("total_no_cualifica")?,
        total_respuestas_automaticas: r.int("total_respuestas_automaticas")?,
        total_otros:                  r.int("total_otros")?,
    })
}

fn decode_daily(r: &SqlRow) -> StatsResult<DailyRow> {
    Ok(DailyRow {
        cuenta:            r.text("cuenta")?,
        identificador_via: r.text("identificador_via")?,
        tipo_via:          r.text("tipo_via")?,
        tipo_actividad:    r.text("tipo_actividad")?,
        funnel:            r.text("funnel")?,
        fecha:             r.text("fecha")?,
        enviados_dia:      r.int("enviados_dia")?,
        fallidos_dia:      r.int("fallidos_dia")?,
        limites_dia:       r.int("limites_dia")?,
        respuestas_dia:    r.int("respuestas_dia")?,
        agendados_dia:     r.int("agendados_dia")?,
    })
}

fn decode_send(r: &SqlRow) -> StatsResult<SendRecord> {
    Ok(SendRecord {
        id:                r.int("id")?,
        fecha:             r.text("fecha")?,
        cuenta:            r.text("cuenta")?,
        funnel:            r.text("funnel")?,
        tipo_via:          r.text("tipo_via")?,
        identificador_via: r.text("identificador_via")?,
        tipo_actividad:    r.text("tipo_actividad")?,
        enviados:          r.int("enviados")?,
        fallidos:          r.int("fallidos")?,
        limite_alcanzado:  r.int("limite_alcanzado")?,
        ultimo_envio:      r.opt_text("ultimo_envio")?,
        origen_display:    r.text("origen_display")?,
    })
}

fn decode_response(r: &SqlRow) -> StatsResult<ResponseRecord> {
    Ok(ResponseRecord {
        id:                     r.int("id")?,
        fecha:                  r.text("fecha")?,
        cuenta:                 r.text("cuenta")?,
        funnel:                 r.text("funnel")?,
        tipo_via:               r.text("tipo_via")?,
        identificador_via:      r.text("identificador_via")?,
        total_respuestas:       r.int("total_respuestas")?,
        cualificados:           r.int("cualificados")?,
        interesados:            r.int("interesados")?,
        no_interesados:         r.int("no_interesados")?,
        agendados:              r.int("agendados")?,
        no_cualifica:           r.int("no_cualifica")?,
        respuestas_automaticas: r.int("respuestas_automaticas")?,
        otros:                  r.int("otros")?,
        origen_display:         r.text("origen_display")?,
    })
}

fn decode_dashboard(r: &SqlRow) -> StatsResult<DashboardRow> {
    let total_enviados = r.int("total_enviados")?;
    let total_fallidos = r.int("total_fallidos")?;
    let total_respuestas = r.int("total_respuestas")?;
    let total_agendados = r.int("total_agendados")?;
    Ok(DashboardRow {
        fecha:              r.text("fecha")?,
        cuenta:             r.text("cuenta")?,
        funnel:             r.text("funnel")?,
        origen:             r.text("origen")?,
        tipo_via:           r.text("tipo_via")?,
        tipo_actividad:     r.text("tipo_actividad")?,
        total_enviados,
        total_fallidos,
        limites_alcanzados: r.int("limites_alcanzados")?,
        total_respuestas,
        total_cualificados: r.int("total_cualificados")?,
        total_interesados:  r.int("total_interesados")?,
        total_agendados,
        rates:              Rates::from_counts(
            total_enviados,
            total_fallidos,
            total_respuestas,
            total_agendados,
        ),
    })
}

fn decode_summary(r: &SqlRow) -> StatsResult<SummaryMetrics> {
    Ok(SummaryMetrics {
        total_cuentas:      r.int("total_cuentas")?,
        total_funnels:      r.int("total_funnels")?,
        total_origenes:     r.int("total_origenes")?,
        total_enviados:     r.int("total_enviados")?,
        total_fallidos:     r.int("total_fallidos")?,
        total_limites:      r.int("total_limites")?,
        total_respuestas:   r.int("total_respuestas")?,
        total_cualificados: r.int("total_cualificados")?,
        total_agendados:    r.int("total_agendados")?,
        ..SummaryMetrics::default()
    })
}

fn decode_column(r: &SqlRow) -> StatsResult<ColumnInfo> {
    Ok(ColumnInfo {
        field:   r.text("field")?,
        ty:      r.opt_text("col_type")?.unwrap_or_default(),
        null:    r.text("nullable")?,
        key:     r.opt_text("col_key")?.unwrap_or_default(),
        default: r.opt_text("col_default")?,
        extra:   r.opt_text("extra")?.unwrap_or_default(),
    })
}
