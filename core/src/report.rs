//! Report assembly: one function per endpoint payload.
//!
//! RULES:
//!   - Filters arrive already normalized (`StatsFilter::normalized`), so a
//!     bad date never reaches SQL.
//!   - Queries run one after another on the caller's task; any failure
//!     aborts the report with no partial result.

use crate::{
    clock::{date_key, ReportClock},
    config::{InsightThresholds, ReportConfig},
    error::{StatsError, StatsResult},
    filter::StatsFilter,
    hierarchy::{GlobalTotals, Hierarchy},
    insights::{self, ConversionFunnel, Insight},
    records::{
        DashboardRow, FilterOptions, NewChannelAlias, NewResponseRecord, NewSendRecord,
        ResponseRecord, SendRecord, SummaryMetrics,
    },
    store::StatsStore,
    types::{DateKey, DATE_KEY_FORMAT},
};
use chrono::{Days, NaiveDate};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

// ── Hierarchy ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyReport {
    pub data:             Hierarchy,
    pub clientes:         Vec<String>,
    pub totales_globales: GlobalTotals,
}

/// Build the account → identifier → activity tree for `filter`.
///
/// `clientes` lists every account with sends regardless of the filter, so
/// the dashboard can offer accounts the current filter hides.
pub async fn hierarchy_report(
    store: &dyn StatsStore,
    filter: &StatsFilter,
    clock: &ReportClock,
) -> StatsResult<HierarchyReport> {
    let aggregates = store.aggregate_rows(filter).await?;
    let daily = store.daily_rows(filter).await?;
    let clientes = store.accounts().await?;

    let today = clock.today_key();
    let data = Hierarchy::build(&aggregates, &daily, &today);
    let totales_globales = data.global_totals();
    log::debug!(
        "hierarchy: {} aggregate rows, {} daily rows, {} accounts, today {today}",
        aggregates.len(),
        daily.len(),
        data.cuentas.len()
    );
    Ok(HierarchyReport {
        data,
        clientes,
        totales_globales,
    })
}

// ── Flat statistics ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsKind {
    Envios,
    Respuestas,
    Resumen,
    Dashboard,
}

impl StatsKind {
    /// Missing and unrecognised values both select `Dashboard`.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("envios")     => StatsKind::Envios,
            Some("respuestas") => StatsKind::Respuestas,
            Some("resumen")    => StatsKind::Resumen,
            _                  => StatsKind::Dashboard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatsData {
    Envios(Vec<SendRecord>),
    Respuestas(Vec<ResponseRecord>),
    Resumen(SummaryMetrics),
    Dashboard(Vec<DashboardRow>),
}

pub async fn stats_report(
    store: &dyn StatsStore,
    kind: StatsKind,
    filter: &StatsFilter,
) -> StatsResult<StatsData> {
    Ok(match kind {
        StatsKind::Envios     => StatsData::Envios(store.send_records(filter).await?),
        StatsKind::Respuestas => StatsData::Respuestas(store.response_records(filter).await?),
        StatsKind::Resumen    => StatsData::Resumen(store.summary(filter).await?),
        StatsKind::Dashboard  => StatsData::Dashboard(store.dashboard_rows(filter).await?),
    })
}

// ── Filter options ─────────────────────────────────────────────────

/// Choices over the trailing `report.filter_lookback_days` ending today.
pub async fn filter_options(
    store: &dyn StatsStore,
    clock: &ReportClock,
    report: &ReportConfig,
    cuenta: Option<&str>,
) -> StatsResult<FilterOptions> {
    let days = u64::try_from(report.filter_lookback_days).unwrap_or(0);
    let today = clock.today();
    let since = today.checked_sub_days(Days::new(days)).unwrap_or(today);
    store.filter_options(&date_key(since), cuenta).await
}

// ── Insights ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightsReport {
    pub embudo:  ConversionFunnel,
    pub alertas: Vec<Insight>,
}

pub async fn insights_report(
    store: &dyn StatsStore,
    filter: &StatsFilter,
    thresholds: &InsightThresholds,
) -> StatsResult<InsightsReport> {
    let rows = store.aggregate_rows(filter).await?;
    Ok(InsightsReport {
        embudo:  ConversionFunnel::from_rows(&rows),
        alertas: insights::evaluate(&rows, thresholds),
    })
}

// ── Write path ─────────────────────────────────────────────────────

/// A single record or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v)   => vec![v],
            OneOrMany::Many(vs) => vs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertRequest {
    Envios(Vec<NewSendRecord>),
    Respuestas(Vec<NewResponseRecord>),
    Alias(Vec<NewChannelAlias>),
}

impl UpsertRequest {
    /// Parse a `{ "type": ..., "data": ... }` body.
    pub fn from_body(body: &Value) -> StatsResult<Self> {
        let tipo = body.get("type").and_then(Value::as_str);
        let data = body.get("data").filter(|d| !d.is_null());
        let (Some(tipo), Some(data)) = (tipo, data) else {
            return Err(StatsError::InvalidPayload("type and data are required".into()));
        };
        match tipo {
            "envios" => {
                let mut records: Vec<NewSendRecord> = parse_records(data)?;
                for record in &mut records {
                    record.fecha = canonical_date(&record.fecha)?;
                }
                Ok(UpsertRequest::Envios(records))
            }
            "respuestas" => {
                let mut records: Vec<NewResponseRecord> = parse_records(data)?;
                for record in &mut records {
                    record.fecha = canonical_date(&record.fecha)?;
                }
                Ok(UpsertRequest::Respuestas(records))
            }
            "alias" => Ok(UpsertRequest::Alias(parse_records(data)?)),
            other => Err(StatsError::InvalidPayload(format!(
                "unknown type '{other}' (expected envios, respuestas or alias)"
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UpsertRequest::Envios(_)     => "envios",
            UpsertRequest::Respuestas(_) => "respuestas",
            UpsertRequest::Alias(_)      => "alias",
        }
    }
}

fn parse_records<T: DeserializeOwned>(data: &Value) -> StatsResult<Vec<T>> {
    let parsed: OneOrMany<T> = serde_json::from_value(data.clone())
        .map_err(|e| StatsError::InvalidPayload(e.to_string()))?;
    let records = parsed.into_vec();
    if records.is_empty() {
        return Err(StatsError::InvalidPayload("data is empty".into()));
    }
    Ok(records)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertOutcome {
    pub tipo:      &'static str,
    pub registros: usize,
}

/// Write every record in order. Dates must already be zero-padded
/// `YYYY-MM-DD` (`from_body` rewrites them) and are checked before the
/// first write; records already written stay written if a later statement
/// fails.
pub async fn apply_upsert(store: &dyn StatsStore, request: &UpsertRequest) -> StatsResult<UpsertOutcome> {
    let registros = match request {
        UpsertRequest::Envios(records) => {
            check_dates(records.iter().map(|r| r.fecha.as_str()))?;
            for record in records {
                store.upsert_send(record).await?;
            }
            records.len()
        }
        UpsertRequest::Respuestas(records) => {
            check_dates(records.iter().map(|r| r.fecha.as_str()))?;
            for record in records {
                store.upsert_response(record).await?;
            }
            records.len()
        }
        UpsertRequest::Alias(records) => {
            for record in records {
                store.upsert_alias(record).await?;
            }
            records.len()
        }
    };
    log::info!("upserted {registros} {} record(s)", request.kind());
    Ok(UpsertOutcome {
        tipo: request.kind(),
        registros,
    })
}

/// Parse a payload date and render it as a zero-padded date key, so
/// `2024-5-1` is stored as `2024-05-01`.
fn canonical_date(raw: &str) -> StatsResult<DateKey> {
    NaiveDate::parse_from_str(raw.trim(), DATE_KEY_FORMAT)
        .map(date_key)
        .map_err(|_| StatsError::InvalidPayload(format!("fecha '{raw}' is not YYYY-MM-DD")))
}

fn check_dates<'a>(mut fechas: impl Iterator<Item = &'a str>) -> StatsResult<()> {
    match fechas.find(|f| canonical_date(f).map_or(true, |key| key != *f)) {
        Some(bad) => Err(StatsError::InvalidPayload(format!("fecha '{bad}' is not YYYY-MM-DD"))),
        None => Ok(()),
    }
}
