//! SQL text for every report, rendered per backend dialect.
//!
//! RULE: statements are built here and nowhere else. Stores bind the
//! returned parameters positionally (`?`) and decode by column name.
//! Counters are summed and cast to a 64-bit integer in SQL; rates are not
//! computed in SQL (see `rates`).

use crate::{
    filter::StatsFilter,
    records::{NewChannelAlias, NewResponseRecord, NewSendRecord},
};

/// Tables the schema is expected to contain.
pub const EXPECTED_TABLES: [&str; 5] = [
    "stats_envios",
    "stats_respuestas",
    "vias_alias",
    "users",
    "cuentas_config",
];

/// Distinct accounts for the filter list, unfiltered.
pub const ACCOUNTS_QUERY: &str = "SELECT DISTINCT cuenta FROM stats_envios ORDER BY cuenta";

/// Sends and responses share this composite key.
const RESPONSE_JOIN: &str = "
      LEFT JOIN stats_respuestas r ON (
        e.fecha = r.fecha AND
        e.cuenta = r.cuenta AND
        e.funnel = r.funnel AND
        e.tipo_via = r.tipo_via AND
        e.identificador_via = r.identificador_via
      )";

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    OptText(Option<String>),
    Int(i64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql:    String,
    pub params: Vec<SqlParam>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Cast an integer expression to a 64-bit integer.
    pub fn int(self, expr: &str) -> String {
        match self {
            Dialect::MySql  => format!("CAST({expr} AS SIGNED)"),
            Dialect::Sqlite => format!("CAST({expr} AS INTEGER)"),
        }
    }

    /// `SUM(expr)` with NULL (no rows, unmatched join) read as zero.
    pub fn sum(self, expr: &str) -> String {
        self.int(&format!("COALESCE(SUM({expr}), 0)"))
    }

    /// Render a DATE column as `YYYY-MM-DD` text, without timezone conversion.
    pub fn date_key(self, expr: &str) -> String {
        match self {
            Dialect::MySql  => format!("DATE_FORMAT({expr}, '%Y-%m-%d')"),
            Dialect::Sqlite => format!("strftime('%Y-%m-%d', {expr})"),
        }
    }

    /// Render a DATETIME column as `YYYY-MM-DD HH:MM:SS` text.
    pub fn datetime_text(self, expr: &str) -> String {
        match self {
            Dialect::MySql  => format!("DATE_FORMAT({expr}, '%Y-%m-%d %H:%i:%s')"),
            Dialect::Sqlite => format!("strftime('%Y-%m-%d %H:%M:%S', {expr})"),
        }
    }

    pub fn concat(self, parts: &[&str]) -> String {
        match self {
            Dialect::MySql  => format!("CONCAT({})", parts.join(", ")),
            Dialect::Sqlite => format!("({})", parts.join(" || ")),
        }
    }

    pub fn truthy(self) -> &'static str {
        match self {
            Dialect::MySql  => "TRUE",
            Dialect::Sqlite => "1",
        }
    }

    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Dialect::MySql  => format!("`{}`", name.replace('`', "``")),
            Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Tail of an insert that overwrites `update_cols` on a unique-key clash.
    pub fn upsert_tail(self, key_cols: &[&str], update_cols: &[&str]) -> String {
        let mut sets: Vec<String> = update_cols
            .iter()
            .map(|c| match self {
                Dialect::MySql  => format!("{c} = VALUES({c})"),
                Dialect::Sqlite => format!("{c} = excluded.{c}"),
            })
            .collect();
        sets.push("updated_at = CURRENT_TIMESTAMP".into());
        match self {
            Dialect::MySql => format!(" ON DUPLICATE KEY UPDATE {}", sets.join(", ")),
            Dialect::Sqlite => format!(
                " ON CONFLICT({}) DO UPDATE SET {}",
                key_cols.join(", "),
                sets.join(", ")
            ),
        }
    }

    /// `COALESCE(alias, "<tipo_via> - <id>")` for table alias `t`.
    fn origin(self, t: &str) -> String {
        let fallback = self.concat(&[
            &format!("{t}.tipo_via"),
            "' - '",
            &format!("{t}.identificador_via"),
        ]);
        format!("COALESCE(va.alias, {fallback})")
    }

    fn alias_join(self, t: &str) -> String {
        format!(
            "
      LEFT JOIN vias_alias va ON (
        {t}.cuenta = va.cuenta AND
        {t}.tipo_via = va.tipo_via AND
        {t}.identificador_via = va.identificador AND
        va.activo = {}
      )",
            self.truthy()
        )
    }
}

// ── Hierarchy inputs ───────────────────────────────────────────────

/// One row per (cuenta, identificador_via, tipo_via, tipo_actividad, funnel).
pub fn aggregate_query(d: Dialect, filter: &StatsFilter) -> BuiltQuery {
    let mut sql = format!(
        "
      SELECT
        e.cuenta,
        e.identificador_via,
        e.tipo_via,
        e.tipo_actividad,
        e.funnel,
        {} AS total_enviados,
        {} AS total_fallidos,
        {} AS total_limites,
        {} AS dias_activos,
        {} AS ultimo_envio,
        {} AS total_respuestas,
        {} AS total_cualificados,
        {} AS total_interesados,
        {} AS total_no_interesados,
        {} AS total_agendados,
        {} AS total_no_cualifica,
        {} AS total_respuestas_automaticas,
        {} AS total_otros
      FROM stats_envios e{RESPONSE_JOIN}
      WHERE 1=1",
        d.sum("e.enviados"),
        d.sum("e.fallidos"),
        d.sum("e.limite_alcanzado"),
        d.int("COUNT(DISTINCT e.fecha)"),
        d.datetime_text("MAX(e.ultimo_envio)"),
        d.sum("r.total_respuestas"),
        d.sum("r.cualificados"),
        d.sum("r.interesados"),
        d.sum("r.no_interesados"),
        d.sum("r.agendados"),
        d.sum("r.no_cualifica"),
        d.sum("r.respuestas_automaticas"),
        d.sum("r.otros"),
    );
    let mut params = Vec::new();
    filter.push_conditions("e", &mut sql, &mut params);
    sql.push_str(
        "
      GROUP BY e.cuenta, e.identificador_via, e.tipo_via, e.tipo_actividad, e.funnel
      ORDER BY e.cuenta, e.identificador_via, e.tipo_actividad, SUM(e.enviados) DESC",
    );
    BuiltQuery { sql, params }
}

/// The aggregate grouping plus `fecha`, newest day first.
pub fn daily_query(d: Dialect, filter: &StatsFilter) -> BuiltQuery {
    let mut sql = format!(
        "
      SELECT
        e.cuenta,
        e.identificador_via,
        e.tipo_via,
        e.tipo_actividad,
        e.funnel,
        {} AS fecha,
        {} AS enviados_dia,
        {} AS fallidos_dia,
        {} AS limites_dia,
        {} AS respuestas_dia,
        {} AS agendados_dia
      FROM stats_envios e{RESPONSE_JOIN}
      WHERE 1=1",
        d.date_key("e.fecha"),
        d.sum("e.enviados"),
        d.sum("e.fallidos"),
        d.sum("e.limite_alcanzado"),
        d.sum("r.total_respuestas"),
        d.sum("r.agendados"),
    );
    let mut params = Vec::new();
    filter.push_conditions("e", &mut sql, &mut params);
    sql.push_str(
        "
      GROUP BY e.cuenta, e.identificador_via, e.tipo_via, e.tipo_actividad, e.funnel, e.fecha
      ORDER BY e.fecha DESC",
    );
    BuiltQuery { sql, params }
}

// ── Flat reports ───────────────────────────────────────────────────

pub fn send_records_query(d: Dialect, filter: &StatsFilter) -> BuiltQuery {
    let mut sql = format!(
        "
      SELECT
        {} AS id,
        {} AS fecha,
        e.cuenta,
        e.funnel,
        e.tipo_via,
        e.identificador_via,
        e.tipo_actividad,
        {} AS enviados,
        {} AS fallidos,
        {} AS limite_alcanzado,
        {} AS ultimo_envio,
        {} AS origen_display
      FROM stats_envios e{}
      WHERE 1=1",
        d.int("e.id"),
        d.date_key("e.fecha"),
        d.int("e.enviados"),
        d.int("e.fallidos"),
        d.int("e.limite_alcanzado"),
        d.datetime_text("e.ultimo_envio"),
        d.origin("e"),
        d.alias_join("e"),
    );
    let mut params = Vec::new();
    filter.push_conditions("e", &mut sql, &mut params);
    sql.push_str(" ORDER BY e.fecha DESC, e.cuenta, e.funnel");
    BuiltQuery { sql, params }
}

pub fn response_records_query(d: Dialect, filter: &StatsFilter) -> BuiltQuery {
    let mut sql = format!(
        "
      SELECT
        {} AS id,
        {} AS fecha,
        r.cuenta,
        r.funnel,
        r.tipo_via,
        r.identificador_via,
        {} AS total_respuestas,
        {} AS cualificados,
        {} AS interesados,
        {} AS no_interesados,
        {} AS agendados,
        {} AS no_cualifica,
        {} AS respuestas_automaticas,
        {} AS otros,
        {} AS origen_display
      FROM stats_respuestas r{}
      WHERE 1=1",
        d.int("r.id"),
        d.date_key("r.fecha"),
        d.int("r.total_respuestas"),
        d.int("r.cualificados"),
        d.int("r.interesados"),
        d.int("r.no_interesados"),
        d.int("r.agendados"),
        d.int("r.no_cualifica"),
        d.int("r.respuestas_automaticas"),
        d.int("r.otros"),
        d.origin("r"),
        d.alias_join("r"),
    );
    let mut params = Vec::new();
    filter.push_conditions("r", &mut sql, &mut params);
    sql.push_str(" ORDER BY r.fecha DESC, r.cuenta, r.funnel");
    BuiltQuery { sql, params }
}

pub fn dashboard_query(d: Dialect, filter: &StatsFilter) -> BuiltQuery {
    let mut sql = format!(
        "
      SELECT
        {} AS fecha,
        e.cuenta,
        e.funnel,
        {} AS origen,
        e.tipo_via,
        e.tipo_actividad,
        {} AS total_enviados,
        {} AS total_fallidos,
        {} AS limites_alcanzados,
        {} AS total_respuestas,
        {} AS total_cualificados,
        {} AS total_interesados,
        {} AS total_agendados
      FROM stats_envios e{}{RESPONSE_JOIN}
      WHERE 1=1",
        d.date_key("e.fecha"),
        d.origin("e"),
        d.sum("e.enviados"),
        d.sum("e.fallidos"),
        d.sum("e.limite_alcanzado"),
        d.sum("r.total_respuestas"),
        d.sum("r.cualificados"),
        d.sum("r.interesados"),
        d.sum("r.agendados"),
        d.alias_join("e"),
    );
    let mut params = Vec::new();
    filter.push_conditions("e", &mut sql, &mut params);
    sql.push_str(
        "
      GROUP BY e.fecha, e.cuenta, e.funnel, e.tipo_via, e.identificador_via, e.tipo_actividad, va.alias
      ORDER BY e.fecha DESC, e.cuenta, e.funnel",
    );
    BuiltQuery { sql, params }
}

/// Always returns exactly one row, zeroes when nothing matches.
pub fn summary_query(d: Dialect, filter: &StatsFilter) -> BuiltQuery {
    let origin_key = d.concat(&["e.tipo_via", "':'", "e.identificador_via"]);
    let mut sql = format!(
        "
      SELECT
        {} AS total_cuentas,
        {} AS total_funnels,
        {} AS total_origenes,
        {} AS total_enviados,
        {} AS total_fallidos,
        {} AS total_limites,
        {} AS total_respuestas,
        {} AS total_cualificados,
        {} AS total_agendados
      FROM stats_envios e{RESPONSE_JOIN}
      WHERE 1=1",
        d.int("COUNT(DISTINCT e.cuenta)"),
        d.int("COUNT(DISTINCT e.funnel)"),
        d.int(&format!("COUNT(DISTINCT {origin_key})")),
        d.sum("e.enviados"),
        d.sum("e.fallidos"),
        d.sum("e.limite_alcanzado"),
        d.sum("r.total_respuestas"),
        d.sum("r.cualificados"),
        d.sum("r.agendados"),
    );
    let mut params = Vec::new();
    filter.push_conditions("e", &mut sql, &mut params);
    BuiltQuery { sql, params }
}

// ── Filter options ─────────────────────────────────────────────────

pub fn option_accounts_query(since: &str) -> BuiltQuery {
    BuiltQuery {
        sql: "SELECT cuenta FROM stats_envios WHERE fecha >= ?
              GROUP BY cuenta ORDER BY COUNT(*) DESC, cuenta"
            .into(),
        params: vec![SqlParam::Text(since.to_string())],
    }
}

pub fn option_origins_query(d: Dialect, since: &str, cuenta: Option<&str>) -> BuiltQuery {
    let mut sql = format!(
        "SELECT {} AS origen FROM stats_envios e{} WHERE e.fecha >= ?",
        d.origin("e"),
        d.alias_join("e"),
    );
    let mut params = vec![SqlParam::Text(since.to_string())];
    if let Some(cuenta) = cuenta {
        sql.push_str(" AND e.cuenta = ?");
        params.push(SqlParam::Text(cuenta.to_string()));
    }
    sql.push_str(" GROUP BY e.tipo_via, e.identificador_via, va.alias ORDER BY COUNT(*) DESC, origen");
    BuiltQuery { sql, params }
}

pub fn option_funnels_query(since: &str, cuenta: Option<&str>) -> BuiltQuery {
    let mut sql = String::from("SELECT funnel FROM stats_envios WHERE fecha >= ?");
    let mut params = vec![SqlParam::Text(since.to_string())];
    if let Some(cuenta) = cuenta {
        sql.push_str(" AND cuenta = ?");
        params.push(SqlParam::Text(cuenta.to_string()));
    }
    sql.push_str(" GROUP BY funnel ORDER BY COUNT(*) DESC, funnel");
    BuiltQuery { sql, params }
}

// ── Write path ─────────────────────────────────────────────────────

pub fn upsert_send(d: Dialect, rec: &NewSendRecord) -> BuiltQuery {
    let sql = format!(
        "INSERT INTO stats_envios (
           fecha, cuenta, funnel, tipo_via, identificador_via, tipo_actividad,
           enviados, fallidos, limite_alcanzado, ultimo_envio
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?){}",
        d.upsert_tail(
            &["fecha", "cuenta", "funnel", "tipo_via", "identificador_via", "tipo_actividad"],
            &["enviados", "fallidos", "limite_alcanzado", "ultimo_envio"],
        )
    );
    BuiltQuery {
        sql,
        params: vec![
            SqlParam::Text(rec.fecha.clone()),
            SqlParam::Text(rec.cuenta.clone()),
            SqlParam::Text(rec.funnel.clone()),
            SqlParam::Text(rec.tipo_via.clone()),
            SqlParam::Text(rec.identificador_via.clone()),
            SqlParam::Text(rec.tipo_actividad.clone()),
            SqlParam::Int(rec.enviados),
            SqlParam::Int(rec.fallidos),
            SqlParam::Int(rec.limite_alcanzado),
            SqlParam::OptText(rec.ultimo_envio.clone()),
        ],
    }
}

pub fn upsert_response(d: Dialect, rec: &NewResponseRecord) -> BuiltQuery {
    let sql = format!(
        "INSERT INTO stats_respuestas (
           fecha, cuenta, funnel, tipo_via, identificador_via,
           total_respuestas, cualificados, interesados, no_interesados,
           agendados, no_cualifica, respuestas_automaticas, otros
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?){}",
        d.upsert_tail(
            &["fecha", "cuenta", "funnel", "tipo_via", "identificador_via"],
            &[
                "total_respuestas",
                "cualificados",
                "interesados",
                "no_interesados",
                "agendados",
                "no_cualifica",
                "respuestas_automaticas",
                "otros",
            ],
        )
    );
    BuiltQuery {
        sql,
        params: vec![
            SqlParam::Text(rec.fecha.clone()),
            SqlParam::Text(rec.cuenta.clone()),
            SqlParam::Text(rec.funnel.clone()),
            SqlParam::Text(rec.tipo_via.clone()),
            SqlParam::Text(rec.identificador_via.clone()),
            SqlParam::Int(rec.total_respuestas),
            SqlParam::Int(rec.cualificados),
            SqlParam::Int(rec.interesados),
            SqlParam::Int(rec.no_interesados),
            SqlParam::Int(rec.agendados),
            SqlParam::Int(rec.no_cualifica),
            SqlParam::Int(rec.respuestas_automaticas),
            SqlParam::Int(rec.otros),
        ],
    }
}

pub fn upsert_alias(d: Dialect, rec: &NewChannelAlias) -> BuiltQuery {
    let sql = format!(
        "INSERT INTO vias_alias (cuenta, tipo_via, identificador, alias, activo)
         VALUES (?, ?, ?, ?, ?){}",
        d.upsert_tail(&["cuenta", "tipo_via", "identificador"], &["alias", "activo"])
    );
    BuiltQuery {
        sql,
        params: vec![
            SqlParam::Text(rec.cuenta.clone()),
            SqlParam::Text(rec.tipo_via.clone()),
            SqlParam::Text(rec.identificador.clone()),
            SqlParam::Text(rec.alias.clone()),
            SqlParam::Bool(rec.activo),
        ],
    }
}

// ── Introspection ──────────────────────────────────────────────────

/// Base tables of the current database, as `table_name`.
pub fn list_tables_query(d: Dialect) -> BuiltQuery {
    let sql = match d {
        Dialect::MySql => "SELECT CAST(TABLE_NAME AS CHAR) AS table_name
             FROM information_schema.TABLES
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
             ORDER BY TABLE_NAME",
        Dialect::Sqlite => "SELECT name AS table_name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
    };
    BuiltQuery {
        sql:    sql.into(),
        params: Vec::new(),
    }
}

/// `DESCRIBE`-shaped column metadata for one table:
/// `field, col_type, nullable, col_key, col_default, extra`.
pub fn columns_query(d: Dialect, table: &str) -> BuiltQuery {
    let sql = match d {
        Dialect::MySql => "SELECT
               CAST(COLUMN_NAME AS CHAR)    AS field,
               CAST(COLUMN_TYPE AS CHAR)    AS col_type,
               CAST(IS_NULLABLE AS CHAR)    AS nullable,
               CAST(COLUMN_KEY AS CHAR)     AS col_key,
               CAST(COLUMN_DEFAULT AS CHAR) AS col_default,
               CAST(EXTRA AS CHAR)          AS extra
             FROM information_schema.COLUMNS
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
             ORDER BY ORDINAL_POSITION",
        Dialect::Sqlite => "SELECT
               name AS field,
               type AS col_type,
               CASE WHEN \"notnull\" = 1 OR pk > 0 THEN 'NO' ELSE 'YES' END AS nullable,
               CASE WHEN pk > 0 THEN 'PRI' ELSE '' END AS col_key,
               dflt_value AS col_default,
               '' AS extra
             FROM pragma_table_info(?)
             ORDER BY cid",
    };
    BuiltQuery {
        sql:    sql.into(),
        params: vec![SqlParam::Text(table.to_string())],
    }
}

pub fn count_query(d: Dialect, table: &str) -> BuiltQuery {
    BuiltQuery {
        sql:    format!("SELECT {} AS total FROM {}", d.int("COUNT(*)"), d.quote_ident(table)),
        params: Vec::new(),
    }
}

/// Up to `limit` rows of `table`, each rendered as one JSON object text
/// in column `sample`.
pub fn sample_rows_query(d: Dialect, table: &str, columns: &[String], limit: u32) -> BuiltQuery {
    let pairs = columns
        .iter()
        .map(|c| format!("'{}', {}", c.replace('\'', "''"), d.quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let object = match d {
        Dialect::MySql  => format!("CAST(JSON_OBJECT({pairs}) AS CHAR)"),
        Dialect::Sqlite => format!("json_object({pairs})"),
    };
    BuiltQuery {
        sql:    format!("SELECT {object} AS sample FROM {} LIMIT {limit}", d.quote_ident(table)),
        params: Vec::new(),
    }
}

// ── Migrations ─────────────────────────────────────────────────────

/// Split a migration script into statements on `;`, dropping blanks and
/// comment-only fragments. Scripts must not contain `;` inside literals.
pub fn split_statements(script: &str) -> Vec<String> {
    script
        .split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|stmt| !stmt.is_empty())
        .collect()
}
