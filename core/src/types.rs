//! Shared primitive types used across the reporting pipeline.

/// An account (client) name, the first level of the hierarchy.
pub type AccountName = String;

/// The channel identifier (`identificador_via`), the second level.
pub type ChannelId = String;

/// The activity type (`tipo_actividad`), the third level.
pub type ActivityType = String;

/// A calendar day rendered as `YYYY-MM-DD`, exactly as the SQL layer emits it.
pub type DateKey = String;

/// Format used for every date key crossing the store boundary.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";
