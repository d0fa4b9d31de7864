//! Conversion funnel and rule-based alerts over aggregated rows.

use crate::{
    config::InsightThresholds,
    rates::{round2, safe_percentage},
    records::{channel_display, AggregateRow},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub step:                String,
    pub value:               i64,
    pub percentage:          f64,
    pub percentage_previous: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionFunnel {
    pub pasos:           Vec<FunnelStep>,
    pub tasa_entrega:    f64,
    pub tasa_engagement: f64,
    pub tasa_cierre:     f64,
}

impl ConversionFunnel {
    pub fn from_rows(rows: &[AggregateRow]) -> Self {
        let enviados: i64 = rows.iter().map(|r| r.total_enviados).sum();
        let fallidos: i64 = rows.iter().map(|r| r.total_fallidos).sum();
        let respuestas: i64 = rows.iter().map(|r| r.total_respuestas).sum();
        let cualificados: i64 = rows.iter().map(|r| r.total_cualificados).sum();
        let agendados: i64 = rows.iter().map(|r| r.total_agendados).sum();
        let entregados = enviados - fallidos;

        let stages = [
            ("enviados", enviados),
            ("entregados", entregados),
            ("respuestas", respuestas),
            ("cualificados", cualificados),
            ("agendados", agendados),
        ];
        let mut previous = enviados;
        let pasos = stages
            .iter()
            .map(|&(name, value)| {
                let step = FunnelStep {
                    step: name.to_string(),
                    value,
                    percentage: safe_percentage(value, enviados),
                    percentage_previous: safe_percentage(value, previous),
                };
                previous = value;
                step
            })
            .collect();

        Self {
            pasos,
            tasa_entrega:    safe_percentage(entregados, enviados),
            tasa_engagement: safe_percentage(respuestas, entregados),
            tasa_cierre:     safe_percentage(agendados, cualificados),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightLevel {
    Danger,
    Warning,
    Success,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub tipo:    InsightLevel,
    pub mensaje: String,
}

impl Insight {
    fn new(tipo: InsightLevel, mensaje: String) -> Self {
        Self { tipo, mensaje }
    }
}

/// Alerts first, then positive insights, in rule order.
pub fn evaluate(rows: &[AggregateRow], limits: &InsightThresholds) -> Vec<Insight> {
    let mut alerts = Vec::new();
    let mut insights = Vec::new();

    let enviados: i64 = rows.iter().map(|r| r.total_enviados).sum();
    let respuestas: i64 = rows.iter().map(|r| r.total_respuestas).sum();
    let limites: i64 = rows.iter().map(|r| r.total_limites).sum();

    if enviados > 0 {
        let tasa = safe_percentage(respuestas, enviados);
        if tasa < limits.low_response_rate {
            alerts.push(Insight::new(
                InsightLevel::Danger,
                format!("Tasa de respuesta muy baja ({tasa:.1}%). Revisar mensajes y segmentación."),
            ));
        } else if tasa > limits.high_response_rate {
            insights.push(Insight::new(
                InsightLevel::Success,
                format!("Excelente tasa de respuesta ({tasa:.1}%). Considera escalar esta estrategia."),
            ));
        }
    }

    if limites > 0 {
        alerts.push(Insight::new(
            InsightLevel::Warning,
            format!("{limites} envíos han alcanzado límites. Esto puede estar limitando el crecimiento."),
        ));
    }

    // Ties keep the first row in query order.
    let top_origin = rows
        .iter()
        .filter(|r| r.total_enviados >= limits.min_origin_sends)
        .map(|r| (r, r.rates().tasa_conversion))
        .fold(None, |best: Option<(&AggregateRow, f64)>, (row, conv)| match best {
            Some((_, best_conv)) if best_conv >= conv => best,
            _ => Some((row, conv)),
        });
    if let Some((row, conv)) = top_origin {
        if conv > limits.top_origin_conversion {
            insights.push(Insight::new(
                InsightLevel::Success,
                format!(
                    "Origen destacado: \"{}\" con {conv:.1}% de conversión ({} envíos).",
                    channel_display(&row.tipo_via, &row.identificador_via),
                    row.total_enviados
                ),
            ));
        }
    }

    if !rows.is_empty() {
        match best_client(rows, limits.min_client_sends) {
            Some((cliente, conv, sent)) => insights.push(Insight::new(
                InsightLevel::Success,
                format!(
                    "Cliente con mejor rendimiento: \"{cliente}\" ({conv:.1}% conversión, {sent} envíos)."
                ),
            )),
            None => insights.push(Insight::new(
                InsightLevel::Warning,
                format!(
                    "Datos insuficientes para análisis de clientes. Se necesitan al menos {} envíos por cliente.",
                    limits.min_client_sends
                ),
            )),
        }
    }

    alerts.extend(insights);
    alerts
}

/// Account with the highest mean per-row conversion among accounts that
/// sent at least `min_sends` in total.
fn best_client(rows: &[AggregateRow], min_sends: i64) -> Option<(String, f64, i64)> {
    let mut per_client: BTreeMap<&str, (f64, usize, i64)> = BTreeMap::new();
    for row in rows {
        let entry = per_client.entry(row.cuenta.as_str()).or_default();
        entry.0 += row.rates().tasa_conversion;
        entry.1 += 1;
        entry.2 += row.total_enviados;
    }
    per_client
        .into_iter()
        .filter(|(_, (_, _, sent))| *sent >= min_sends)
        .map(|(name, (sum, count, sent))| (name.to_string(), round2(sum / count as f64), sent))
        .fold(None, |best: Option<(String, f64, i64)>, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        })
}
