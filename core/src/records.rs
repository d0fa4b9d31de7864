//! Row types read from and written to the statistics tables.
//!
//! Field names follow the column names of the MySQL schema, which are also
//! the JSON keys the dashboard consumes.

use crate::{
    rates::Rates,
    types::{AccountName, ActivityType, ChannelId, DateKey},
};
use serde::{Deserialize, Serialize};

// ── Persisted rows ─────────────────────────────────────────────────

/// One `stats_envios` row plus its channel display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRecord {
    pub id:                i64,
    pub fecha:             DateKey,
    pub cuenta:            AccountName,
    pub funnel:            String,
    pub tipo_via:          String,
    pub identificador_via: ChannelId,
    pub tipo_actividad:    ActivityType,
    pub enviados:          i64,
    pub fallidos:          i64,
    pub limite_alcanzado:  i64,
    pub ultimo_envio:      Option<String>,
    pub origen_display:    String,
}

/// One `stats_respuestas` row plus its channel display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id:                     i64,
    pub fecha:                  DateKey,
    pub cuenta:                 AccountName,
    pub funnel:                 String,
    pub tipo_via:               String,
    pub identificador_via:      ChannelId,
    pub total_respuestas:       i64,
    pub cualificados:           i64,
    pub interesados:            i64,
    pub no_interesados:         i64,
    pub agendados:              i64,
    pub no_cualifica:           i64,
    pub respuestas_automaticas: i64,
    pub otros:                  i64,
    pub origen_display:         String,
}

/// Fallback display name for a channel without an active alias.
pub fn channel_display(tipo_via: &str, identificador: &str) -> String {
    format!("{tipo_via} - {identificador}")
}

// ── Upsert inputs ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSendRecord {
    pub fecha:             DateKey,
    pub cuenta:            AccountName,
    pub funnel:            String,
    pub tipo_via:          String,
    pub identificador_via: ChannelId,
    pub tipo_actividad:    ActivityType,
    pub enviados:          i64,
    #[serde(default)]
    pub fallidos:          i64,
    #[serde(default)]
    pub limite_alcanzado:  i64,
    #[serde(default)]
    pub ultimo_envio:      Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResponseRecord {
    pub fecha:                  DateKey,
    pub cuenta:                 AccountName,
    pub funnel:                 String,
    pub tipo_via:               String,
    pub identificador_via:      ChannelId,
    pub total_respuestas:       i64,
    #[serde(default)]
    pub cualificados:           i64,
    #[serde(default)]
    pub interesados:            i64,
    #[serde(default)]
    pub no_interesados:         i64,
    #[serde(default)]
    pub agendados:              i64,
    #[serde(default)]
    pub no_cualifica:           i64,
    #[serde(default)]
    pub respuestas_automaticas: i64,
    #[serde(default)]
    pub otros:                  i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChannelAlias {
    pub cuenta:        AccountName,
    pub tipo_via:      String,
    pub identificador: ChannelId,
    pub alias:         String,
    #[serde(default = "default_true")]
    pub activo:        bool,
}

fn default_true() -> bool {
    true
}

// ── Aggregation results ────────────────────────────────────────────

/// Sends joined with responses, grouped by
/// (cuenta, identificador_via, tipo_via, tipo_actividad, funnel).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub cuenta:                       AccountName,
    pub identificador_via:            ChannelId,
    pub tipo_via:                     String,
    pub tipo_actividad:               ActivityType,
    pub funnel:                       String,
    pub total_enviados:               i64,
    pub total_fallidos:               i64,
    pub total_limites:                i64,
    pub dias_activos:                 i64,
    pub ultimo_envio:                 Option<String>,
    pub total_respuestas:             i64,
    pub total_cualificados:           i64,
    pub total_interesados:            i64,
    pub total_no_interesados:         i64,
    pub total_agendados:              i64,
    pub total_no_cualifica:           i64,
    pub total_respuestas_automaticas: i64,
    pub total_otros:                  i64,
}

impl AggregateRow {
    pub fn rates(&self) -> Rates {
        Rates::from_counts(
            self.total_enviados,
            self.total_fallidos,
            self.total_respuestas,
            self.total_agendados,
        )
    }
}

/// The same grouping as `AggregateRow`, split per day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyRow {
    pub cuenta:            AccountName,
    pub identificador_via: ChannelId,
    pub tipo_via:          String,
    pub tipo_actividad:    ActivityType,
    pub funnel:            String,
    pub fecha:             DateKey,
    pub enviados_dia:      i64,
    pub fallidos_dia:      i64,
    pub limites_dia:       i64,
    pub respuestas_dia:    i64,
    pub agendados_dia:     i64,
}

/// One row of the flat `dashboard` report: a day of one channel activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardRow {
    pub fecha:              DateKey,
    pub cuenta:             AccountName,
    pub funnel:             String,
    pub origen:             String,
    pub tipo_via:           String,
    pub tipo_actividad:     ActivityType,
    pub total_enviados:     i64,
    pub total_fallidos:     i64,
    pub limites_alcanzados: i64,
    pub total_respuestas:   i64,
    pub total_cualificados: i64,
    pub total_interesados:  i64,
    pub total_agendados:    i64,
    #[serde(flatten)]
    pub rates:              Rates,
}

/// The single-row `resumen` report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total_cuentas:          i64,
    pub total_funnels:          i64,
    pub total_origenes:         i64,
    pub total_enviados:         i64,
    pub total_fallidos:         i64,
    pub total_limites:          i64,
    pub total_respuestas:       i64,
    pub total_cualificados:     i64,
    pub total_agendados:        i64,
    pub tasa_respuesta_global:  f64,
    pub tasa_conversion_global: f64,
    pub tasa_entrega_global:    f64,
}

impl SummaryMetrics {
    /// Fill the three global rates from the summed counters.
    pub fn with_rates(mut self) -> Self {
        let rates = Rates::from_counts(
            self.total_enviados,
            self.total_fallidos,
            self.total_respuestas,
            self.total_agendados,
        );
        self.tasa_respuesta_global = rates.tasa_respuesta;
        self.tasa_conversion_global = rates.tasa_conversion;
        self.tasa_entrega_global = rates.tasa_entrega;
        self
    }
}

/// Values offered by the dashboard's filter controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub clientes: Vec<AccountName>,
    pub origenes: Vec<String>,
    pub funnels:  Vec<String>,
}
