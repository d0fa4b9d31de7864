//! Request filters shared by every report.

use crate::{
    clock::date_key,
    error::{StatsError, StatsResult},
    sql::SqlParam,
    types::{DateKey, DATE_KEY_FORMAT},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Optional filters; `None` means "do not restrict".
///
/// Serialized with the query-string names the dashboard sends
/// (`fechaInicio`, `fechaFin`, `cuenta`, `funnel`, `tipoVia`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsFilter {
    pub fecha_inicio: Option<DateKey>,
    pub fecha_fin:    Option<DateKey>,
    pub cuenta:       Option<String>,
    pub funnel:       Option<String>,
    pub tipo_via:     Option<String>,
}

impl StatsFilter {
    pub fn for_account(cuenta: impl Into<String>) -> Self {
        Self {
            cuenta: Some(cuenta.into()),
            ..Self::default()
        }
    }

    pub fn between(inicio: impl Into<String>, fin: impl Into<String>) -> Self {
        Self {
            fecha_inicio: Some(inicio.into()),
            fecha_fin: Some(fin.into()),
            ..Self::default()
        }
    }

    /// Treat empty strings as absent, check both date bounds parse and
    /// rewrite them as zero-padded `YYYY-MM-DD` so text comparison in SQL
    /// orders them correctly.
    pub fn normalized(self) -> StatsResult<Self> {
        let mut filter = Self {
            fecha_inicio: non_empty(self.fecha_inicio),
            fecha_fin:    non_empty(self.fecha_fin),
            cuenta:       non_empty(self.cuenta),
            funnel:       non_empty(self.funnel),
            tipo_via:     non_empty(self.tipo_via),
        };
        let start = parse_date("fechaInicio", filter.fecha_inicio.as_deref())?;
        let end = parse_date("fechaFin", filter.fecha_fin.as_deref())?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(StatsError::InvalidFilter {
                    field: "fechaInicio",
                    value: format!("{start} is after fechaFin {end}"),
                });
            }
        }
        filter.fecha_inicio = start.map(date_key);
        filter.fecha_fin = end.map(date_key);
        Ok(filter)
    }

    /// Append ` AND <alias>.<column> <op> ?` for each active filter.
    pub fn push_conditions(&self, alias: &str, sql: &mut String, params: &mut Vec<SqlParam>) {
        let conditions = [
            ("fecha", ">=", &self.fecha_inicio),
            ("fecha", "<=", &self.fecha_fin),
            ("cuenta", "=", &self.cuenta),
            ("funnel", "=", &self.funnel),
            ("tipo_via", "=", &self.tipo_via),
        ];
        for (column, op, value) in conditions {
            if let Some(value) = value {
                sql.push_str(&format!(" AND {alias}.{column} {op} ?"));
                params.push(SqlParam::Text(value.clone()));
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_date(field: &'static str, value: Option<&str>) -> StatsResult<Option<NaiveDate>> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(raw, DATE_KEY_FORMAT).map_err(|_| StatsError::InvalidFilter {
                field,
                value: raw.to_string(),
            })
        })
        .transpose()
}
