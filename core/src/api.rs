//! HTTP surface: axum router and JSON envelopes.
//!
//! RULES:
//!   - Handlers parse and normalize input, call one `report` function (or a
//!     store method) and wrap the result. No SQL and no aggregation here.
//!   - Every success carries `success: true`; every failure goes through
//!     `ApiError`, which logs it and answers `{success: false, message, error}`.

use crate::{
    clock::ReportClock,
    config::ReportConfig,
    error::StatsError,
    filter::StatsFilter,
    report::{self, StatsKind, UpsertRequest},
    store::StatsStore,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store:  Arc<dyn StatsStore>,
    pub clock:  ReportClock,
    pub report: ReportConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn StatsStore>, report: ReportConfig) -> Self {
        Self {
            store,
            clock: report.clock(),
            report,
        }
    }

    /// Same state with "today" pinned by `clock`.
    pub fn with_clock(mut self, clock: ReportClock) -> Self {
        self.clock = clock;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/dashboard/hierarchy", get(hierarchy))
        .route("/api/stats", get(stats).post(upsert_stats))
        .route("/api/stats/filters", get(filter_options))
        .route("/api/insights", get(insights))
        .route("/api/database/explore", get(explore))
        .route("/api/database/setup", get(setup_status).post(run_setup))
        .route("/api/test-db", get(test_db))
        .with_state(state)
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    message: &'static str,
    source:  StatsError,
}

impl ApiError {
    pub fn new(message: &'static str, source: StatsError) -> Self {
        Self { message, source }
    }

    /// `map_err` adapter that tags an error with a user-facing message.
    fn with(message: &'static str) -> impl FnOnce(StatsError) -> ApiError {
        move |source| ApiError::new(message, source)
    }

    pub fn status(&self) -> StatusCode {
        if self.source.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    pub fn source(&self) -> &StatsError {
        &self.source
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{} [{}]: {}", self.message, status, self.source);
        } else {
            log::warn!("{} [{}]: {}", self.message, status, self.source);
        }
        let body = json!({
            "success": false,
            "message": self.message,
            "error":   self.source.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult = Result<Json<Value>, ApiError>;

// ── Reports ────────────────────────────────────────────────────────

pub async fn hierarchy(State(state): State<AppState>, Query(filter): Query<StatsFilter>) -> ApiResult {
    const FAILED: &str = "Error obteniendo jerarquía del dashboard";
    log::debug!("GET /api/dashboard/hierarchy {filter:?}");
    let filter = filter.normalized().map_err(ApiError::with(FAILED))?;
    let report = report::hierarchy_report(state.store.as_ref(), &filter, &state.clock)
        .await
        .map_err(ApiError::with(FAILED))?;
    Ok(Json(json!({
        "success":          true,
        "data":             report.data,
        "clientes":         report.clientes,
        "totales_globales": report.totales_globales,
        "filtros": {
            "fechaInicio": filter.fecha_inicio,
            "fechaFin":    filter.fecha_fin,
            "cuenta":      filter.cuenta,
        },
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    #[serde(rename = "type")]
    pub kind:   Option<String>,
    #[serde(flatten)]
    pub filter: StatsFilter,
}

pub async fn stats(State(state): State<AppState>, Query(params): Query<StatsParams>) -> ApiResult {
    const FAILED: &str = "Error obteniendo estadísticas";
    log::debug!("GET /api/stats {params:?}");
    let filter = params.filter.normalized().map_err(ApiError::with(FAILED))?;
    let requested = params
        .kind
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| "dashboard".to_string());
    let kind = StatsKind::from_param(Some(&requested));
    let data = report::stats_report(state.store.as_ref(), kind, &filter)
        .await
        .map_err(ApiError::with(FAILED))?;
    Ok(Json(json!({
        "success": true,
        "data":    data,
        "filters": filter,
        "type":    requested,
    })))
}

pub async fn upsert_stats(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult {
    const FAILED: &str = "Error procesando datos";
    let request = UpsertRequest::from_body(&body).map_err(ApiError::with("Tipo y datos son requeridos"))?;
    log::debug!("POST /api/stats type={}", request.kind());
    let outcome = report::apply_upsert(state.store.as_ref(), &request)
        .await
        .map_err(ApiError::with(FAILED))?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{} registro(s) guardados", outcome.registros),
        "data":    outcome,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub cuenta: Option<String>,
}

pub async fn filter_options(State(state): State<AppState>, Query(params): Query<FilterParams>) -> ApiResult {
    log::debug!("GET /api/stats/filters {params:?}");
    let cuenta = params.cuenta.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let options = report::filter_options(state.store.as_ref(), &state.clock, &state.report, cuenta)
        .await
        .map_err(ApiError::with("Error obteniendo opciones de filtro"))?;
    Ok(Json(json!({ "success": true, "data": options })))
}

pub async fn insights(State(state): State<AppState>, Query(filter): Query<StatsFilter>) -> ApiResult {
    const FAILED: &str = "Error generando insights";
    log::debug!("GET /api/insights {filter:?}");
    let filter = filter.normalized().map_err(ApiError::with(FAILED))?;
    let report = report::insights_report(state.store.as_ref(), &filter, &state.report.insights)
        .await
        .map_err(ApiError::with(FAILED))?;
    Ok(Json(json!({ "success": true, "data": report, "filtros": filter })))
}

// ── Database maintenance ───────────────────────────────────────────

pub async fn explore(State(state): State<AppState>) -> ApiResult {
    log::info!("Exploring database");
    state
        .store
        .ping()
        .await
        .map_err(ApiError::with("No se pudo conectar a la base de datos"))?;
    let tables = state
        .store
        .explore()
        .await
        .map_err(ApiError::with("Error explorando base de datos"))?;
    Ok(Json(json!({
        "success": true,
        "message": "Base de datos explorada exitosamente",
        "tables":  tables,
    })))
}

pub async fn setup_status(State(state): State<AppState>) -> ApiResult {
    state
        .store
        .ping()
        .await
        .map_err(ApiError::with("Error de conexión a la base de datos"))?;
    let structure = state
        .store
        .check_structure()
        .await
        .map_err(ApiError::with("Error verificando la base de datos"))?;
    Ok(Json(json!({
        "success":   true,
        "message":   "Base de datos conectada correctamente",
        "structure": structure,
    })))
}

pub async fn run_setup(State(state): State<AppState>) -> ApiResult {
    const FAILED: &str = "Error ejecutando migraciones";
    log::info!("Running migrations on request");
    state.store.migrate().await.map_err(ApiError::with(FAILED))?;
    let structure = state.store.check_structure().await.map_err(ApiError::with(FAILED))?;
    Ok(Json(json!({
        "success":   true,
        "message":   "Migraciones ejecutadas correctamente",
        "structure": structure,
    })))
}

pub async fn test_db(State(state): State<AppState>) -> ApiResult {
    state
        .store
        .ping()
        .await
        .map_err(ApiError::with("Error al conectar con la base de datos"))?;
    Ok(Json(json!({
        "success": true,
        "message": "Conexión a la base de datos exitosa",
    })))
}
