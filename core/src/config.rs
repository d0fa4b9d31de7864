use crate::{
    clock::{DayBoundary, ReportClock},
    error::{StatsError, StatsResult},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Mysql,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend:              Backend,
    pub host:                 String,
    pub port:                 u16,
    pub user:                 String,
    pub password:             String,
    pub database:             String,
    pub max_connections:      u32,
    pub acquire_timeout_secs: u64,
    pub sqlite_path:          String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend:              Backend::Mysql,
            host:                 "127.0.0.1".into(),
            port:                 3306,
            user:                 String::new(),
            password:             String::new(),
            database:             String::new(),
            max_connections:      10,
            acquire_timeout_secs: 10,
            sqlite_path:          "outbound.db".into(),
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".into(),
        }
    }
}

/// Thresholds for the alert rules in `insights`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightThresholds {
    /// Global response rate (%) below which a danger alert fires.
    pub low_response_rate:     f64,
    /// Global response rate (%) above which a success insight fires.
    pub high_response_rate:    f64,
    pub min_origin_sends:      i64,
    pub top_origin_conversion: f64,
    pub min_client_sends:      i64,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            low_response_rate:     3.0,
            high_response_rate:    15.0,
            min_origin_sends:      10,
            top_origin_conversion: 5.0,
            min_client_sends:      20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub timezone:             DayBoundary,
    pub filter_lookback_days: i64,
    pub insights:             InsightThresholds,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timezone:             DayBoundary::Local,
            filter_lookback_days: 90,
            insights:             InsightThresholds::default(),
        }
    }
}

impl ReportConfig {
    pub fn clock(&self) -> ReportClock {
        ReportClock::new(self.timezone)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server:   ServerConfig,
    pub report:   ReportConfig,
}

impl AppConfig {
    /// Load from a JSON file, then apply environment overrides.
    /// A missing path means all defaults.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
                serde_json::from_str(&content)
                    .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?
            }
            None => AppConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply the deployment's environment variables on top of the file.
    /// `lookup` is injected so tests need not touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> StatsResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DB_BACKEND") {
            self.database.backend = match v.to_ascii_lowercase().as_str() {
                "mysql" => Backend::Mysql,
                "sqlite" => Backend::Sqlite,
                other => return Err(StatsError::Config(format!("unknown DB_BACKEND '{other}'"))),
            };
        }
        if let Some(v) = lookup("DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = lookup("DB_PORT") {
            self.database.port = v
                .parse()
                .map_err(|_| StatsError::Config(format!("invalid DB_PORT '{v}'")))?;
        }
        if let Some(v) = lookup("DB_USER") {
            self.database.user = v;
        }
        if let Some(v) = lookup("DB_PASSWORD") {
            self.database.password = v;
        }
        if let Some(v) = lookup("MYSQL_DATABASE") {
            self.database.database = v;
        }
        if let Some(v) = lookup("SQLITE_PATH") {
            self.database.sqlite_path = v;
        }
        if let Some(v) = lookup("BIND_ADDR") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("REPORT_TIMEZONE") {
            self.report.timezone = v.parse()?;
        }
        Ok(())
    }

    /// Embedded in-memory backend, UTC day boundary. For tests only.
    pub fn default_test() -> Self {
        Self {
            database: DatabaseConfig {
                backend:     Backend::Sqlite,
                sqlite_path: ":memory:".into(),
                ..DatabaseConfig::default()
            },
            server: ServerConfig {
                bind: "127.0.0.1:0".into(),
            },
            report: ReportConfig {
                timezone: DayBoundary::Utc,
                ..ReportConfig::default()
            },
        }
    }
}
