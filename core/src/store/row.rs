//! Backend-neutral result rows.
//!
//! Both stores copy each result row into a `SqlRow` keyed by column name,
//! and the typed decoders in `store` read from that.

use crate::error::{StatsError, StatsResult};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    values: BTreeMap<String, SqlValue>,
}

impl SqlRow {
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> StatsResult<&SqlValue> {
        self.values.get(column).ok_or_else(|| StatsError::Decode {
            column: column.to_string(),
            reason: "missing from result set".into(),
        })
    }

    pub fn opt_text(&self, column: &str) -> StatsResult<Option<String>> {
        match self.get(column)? {
            SqlValue::Null    => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            SqlValue::Int(i)  => Ok(Some(i.to_string())),
            SqlValue::Real(f) => Ok(Some(f.to_string())),
        }
    }

    pub fn text(&self, column: &str) -> StatsResult<String> {
        self.opt_text(column)?.ok_or_else(|| StatsError::Decode {
            column: column.to_string(),
            reason: "unexpected NULL".into(),
        })
    }

    /// Integer column; NULL reads as 0, numeric text is parsed.
    pub fn int(&self, column: &str) -> StatsResult<i64> {
        match self.get(column)? {
            SqlValue::Null   => Ok(0),
            SqlValue::Int(i) => Ok(*i),
            SqlValue::Text(s) => s.trim().parse().map_err(|_| StatsError::Decode {
                column: column.to_string(),
                reason: format!("'{s}' is not an integer"),
            }),
            SqlValue::Real(f) => Err(StatsError::Decode {
                column: column.to_string(),
                reason: format!("{f} is not an integer"),
            }),
        }
    }
}
