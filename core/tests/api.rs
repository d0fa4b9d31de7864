//! HTTP handlers invoked directly with their extractors.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use outbound_core::{
    api::{self, AppState, FilterParams, StatsParams},
    clock::ReportClock,
    config::ReportConfig,
    filter::StatsFilter,
    records::{NewResponseRecord, NewSendRecord},
    report,
    store::{SqliteStatsStore, StatsStore},
};
use serde_json::{json, Value};
use std::sync::Arc;

const TODAY: &str = "2024-05-10";

async fn state() -> AppState {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = SqliteStatsStore::in_memory().expect("in-memory store");
    store.migrate().await.expect("migration");

    let sends = [
        (TODAY, "A", "laura", "mensaje", 100, 10),
        ("2024-05-09", "A", "laura", "conexion", 50, 0),
        (TODAY, "B", "pablo", "mensaje", 7, 0),
    ];
    for (fecha, cuenta, id, actividad, enviados, fallidos) in sends {
        store
            .upsert_send(&NewSendRecord {
                fecha:             fecha.into(),
                cuenta:            cuenta.into(),
                funnel:            "outbound".into(),
                tipo_via:          "linkedin".into(),
                identificador_via: id.into(),
                tipo_actividad:    actividad.into(),
                enviados,
                fallidos,
                limite_alcanzado:  0,
                ultimo_envio:      None,
            })
            .await
            .unwrap();
    }
    store
        .upsert_response(&NewResponseRecord {
            fecha:                  TODAY.into(),
            cuenta:                 "A".into(),
            funnel:                 "outbound".into(),
            tipo_via:               "linkedin".into(),
            identificador_via:      "laura".into(),
            total_respuestas:       20,
            cualificados:           8,
            interesados:            10,
            no_interesados:         5,
            agendados:              5,
            no_cualifica:           2,
            respuestas_automaticas: 3,
            otros:                  0,
        })
        .await
        .unwrap();

    let today = NaiveDate::parse_from_str(TODAY, "%Y-%m-%d").unwrap();
    AppState::new(Arc::new(store), ReportConfig::default()).with_clock(ReportClock::fixed(today))
}

fn ok_body(result: api::ApiResult) -> Value {
    match result {
        Ok(Json(body)) => {
            assert_eq!(body["success"], true, "{body}");
            body
        }
        Err(e) => panic!("handler failed: {e:?}"),
    }
}

fn err_status(result: api::ApiResult) -> StatusCode {
    match result {
        Ok(Json(body)) => panic!("expected failure, got {body}"),
        Err(e) => e.into_response().status(),
    }
}

#[tokio::test]
async fn hierarchy_returns_tree_accounts_and_totals() {
    let state = state().await;
    let body = ok_body(api::hierarchy(State(state), Query(StatsFilter::default())).await);

    let laura = &body["data"]["A"]["identificadores"]["laura"];
    assert_eq!(laura["totales"]["enviados"], 150);
    assert_eq!(laura["actividades"]["mensaje"]["tasa_entrega"], 90.0);
    assert_eq!(laura["actividades"]["mensaje"]["tasa_respuesta"], 20.0);
    assert_eq!(laura["actividades"]["mensaje"]["tasa_conversion"], 5.0);
    assert_eq!(laura["enviados_hoy"], 100);

    assert_eq!(body["clientes"], json!(["A", "B"]));
    assert_eq!(body["totales_globales"]["enviados"], 157);
    assert_eq!(body["totales_globales"]["enviados_hoy"], 107);
}

#[tokio::test]
async fn hierarchy_for_unknown_account_is_empty() {
    let state = state().await;
    let body = ok_body(api::hierarchy(State(state), Query(StatsFilter::for_account("nobody"))).await);

    assert_eq!(body["data"], json!({}));
    for field in ["enviados", "fallidos", "respuestas", "agendados", "limites", "enviados_hoy"] {
        assert_eq!(body["totales_globales"][field], 0, "{field}");
    }
    assert_eq!(body["filtros"]["cuenta"], "nobody");
    assert_eq!(body["filtros"]["fechaInicio"], Value::Null);
    assert!(body["filtros"].get("funnel").is_none());
    assert!(body["filtros"].get("tipoVia").is_none());
}

#[tokio::test]
async fn malformed_date_is_a_client_error() {
    let state = state().await;
    let filter = StatsFilter {
        fecha_inicio: Some("10/05/2024".into()),
        ..StatsFilter::default()
    };
    assert_eq!(
        err_status(api::hierarchy(State(state.clone()), Query(filter)).await),
        StatusCode::BAD_REQUEST
    );

    let reversed = StatsFilter::between("2024-05-10", "2024-05-01");
    let params = StatsParams {
        kind:   Some("envios".into()),
        filter: reversed,
    };
    assert_eq!(err_status(api::stats(State(state), Query(params)).await), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn error_envelope_shape() {
    let state = state().await;
    let filter = StatsFilter {
        fecha_fin: Some("not-a-date".into()),
        ..StatsFilter::default()
    };
    let err = api::insights(State(state), Query(filter)).await.unwrap_err();
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
    assert!(body["error"].as_str().unwrap().contains("not-a-date"));
}

#[tokio::test]
async fn stats_by_type() {
    let state = state().await;

    let envios = ok_body(
        api::stats(
            State(state.clone()),
            Query(StatsParams {
                kind:   Some("envios".into()),
                filter: StatsFilter::for_account("A"),
            }),
        )
        .await,
    );
    assert_eq!(envios["type"], "envios");
    assert_eq!(envios["data"].as_array().unwrap().len(), 2);
    assert_eq!(envios["data"][0]["fecha"], TODAY);
    assert_eq!(envios["filters"]["cuenta"], "A");

    let resumen = ok_body(
        api::stats(
            State(state.clone()),
            Query(StatsParams {
                kind:   Some("resumen".into()),
                filter: StatsFilter::default(),
            }),
        )
        .await,
    );
    assert_eq!(resumen["data"]["total_enviados"], 157);
    assert_eq!(resumen["data"]["total_cuentas"], 2);

    let respuestas = ok_body(
        api::stats(
            State(state.clone()),
            Query(StatsParams {
                kind:   Some("respuestas".into()),
                filter: StatsFilter::default(),
            }),
        )
        .await,
    );
    assert_eq!(respuestas["data"][0]["agendados"], 5);

    let default = ok_body(api::stats(State(state), Query(StatsParams::default())).await);
    assert_eq!(default["type"], "dashboard");
    let rows = default["data"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.get("tasa_entrega").is_some()));
}

#[tokio::test]
async fn unknown_stats_type_falls_back_to_dashboard() {
    let state = state().await;
    let body = ok_body(
        api::stats(
            State(state),
            Query(StatsParams {
                kind:   Some("whatever".into()),
                filter: StatsFilter::default(),
            }),
        )
        .await,
    );
    assert_eq!(body["type"], "whatever");
    assert!(body["data"][0].get("origen").is_some());
}

#[tokio::test]
async fn post_stats_upserts_records() {
    let state = state().await;
    let payload = json!({
        "type": "envios",
        "data": [{
            "fecha": "2024-05-10",
            "cuenta": "C",
            "funnel": "eventos",
            "tipoVia": "email",
            "identificadorVia": "hola@c.io",
            "tipoActividad": "email_inicial",
            "enviados": 12
        }]
    });
    let body = ok_body(api::upsert_stats(State(state.clone()), Json(payload)).await);
    assert_eq!(body["data"]["registros"], 1);
    assert_eq!(body["data"]["tipo"], "envios");

    let alias = json!({
        "type": "alias",
        "data": { "cuenta": "C", "tipoVia": "email", "identificador": "hola@c.io", "alias": "Hola C" }
    });
    ok_body(api::upsert_stats(State(state.clone()), Json(alias)).await);

    let envios = ok_body(
        api::stats(
            State(state),
            Query(StatsParams {
                kind:   Some("envios".into()),
                filter: StatsFilter::for_account("C"),
            }),
        )
        .await,
    );
    assert_eq!(envios["data"][0]["enviados"], 12);
    assert_eq!(envios["data"][0]["fallidos"], 0);
    assert_eq!(envios["data"][0]["origen_display"], "Hola C");
}

#[tokio::test]
async fn post_stats_rejects_bad_payloads() {
    let state = state().await;
    for payload in [
        json!({ "type": "envios" }),
        json!({ "data": {} }),
        json!({ "type": "ventas", "data": {} }),
        json!({ "type": "envios", "data": { "cuenta": "C" } }),
        json!({ "type": "envios", "data": [] }),
        json!({ "type": "envios", "data": {
            "fecha": "ayer", "cuenta": "C", "funnel": "f", "tipoVia": "email",
            "identificadorVia": "x", "tipoActividad": "y", "enviados": 1
        }}),
    ] {
        assert_eq!(
            err_status(api::upsert_stats(State(state.clone()), Json(payload.clone())).await),
            StatusCode::BAD_REQUEST,
            "{payload}"
        );
    }
}

#[tokio::test]
async fn filter_options_use_pinned_today() {
    let state = state().await;
    let body = ok_body(api::filter_options(State(state.clone()), Query(FilterParams::default())).await);
    assert_eq!(body["data"]["clientes"], json!(["A", "B"]));
    assert_eq!(body["data"]["funnels"], json!(["outbound"]));

    let only_b = ok_body(
        api::filter_options(State(state), Query(FilterParams { cuenta: Some("B".into()) })).await,
    );
    assert_eq!(only_b["data"]["origenes"], json!(["linkedin - pablo"]));
}

#[tokio::test]
async fn insights_report_funnel_and_alerts() {
    let state = state().await;
    let body = ok_body(api::insights(State(state), Query(StatsFilter::for_account("A"))).await);

    let pasos = body["data"]["embudo"]["pasos"].as_array().unwrap();
    assert_eq!(pasos.len(), 5);
    assert_eq!(pasos[0]["value"], 150);
    assert_eq!(pasos[1]["value"], 140);
    assert!(body["data"]["alertas"].is_array());
}

#[tokio::test]
async fn database_maintenance_endpoints() {
    let state = state().await;

    let test = ok_body(api::test_db(State(state.clone())).await);
    assert!(test["message"].is_string());

    let setup = ok_body(api::setup_status(State(state.clone())).await);
    assert_eq!(setup["structure"]["stats_envios"], true);
    assert_eq!(setup["structure"]["cuentas_config"], true);

    let migrated = ok_body(api::run_setup(State(state.clone())).await);
    assert_eq!(migrated["structure"]["vias_alias"], true);

    let explored = ok_body(api::explore(State(state)).await);
    assert_eq!(explored["tables"]["stats_envios"]["count"], 3);
    assert_eq!(explored["tables"]["stats_envios"]["sampleData"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn setup_on_fresh_database_creates_schema() {
    let store = SqliteStatsStore::in_memory().unwrap();
    let state = AppState::new(Arc::new(store), ReportConfig::default());

    let before = ok_body(api::setup_status(State(state.clone())).await);
    assert_eq!(before["structure"]["stats_envios"], false);

    let after = ok_body(api::run_setup(State(state)).await);
    assert_eq!(after["structure"]["stats_envios"], true);
}

#[tokio::test]
async fn unpadded_dates_are_stored_and_filtered_as_date_keys() {
    let state = state().await;
    let payload = json!({
        "type": "envios",
        "data": {
            "fecha": "2024-5-1",
            "cuenta": "C",
            "funnel": "eventos",
            "tipoVia": "email",
            "identificadorVia": "hola@c.io",
            "tipoActividad": "email_inicial",
            "enviados": 4
        }
    });
    ok_body(api::upsert_stats(State(state.clone()), Json(payload)).await);

    let body = ok_body(api::hierarchy(State(state.clone()), Query(StatsFilter::for_account("C"))).await);
    let activity = &body["data"]["C"]["identificadores"]["hola@c.io"]["actividades"]["email_inicial"];
    assert_eq!(activity["datos_diarios"][0]["fecha"], "2024-05-01");

    let filter = StatsFilter {
        cuenta: Some("A".into()),
        ..StatsFilter::between("2024-5-10", "2024-5-10")
    };
    let body = ok_body(api::hierarchy(State(state.clone()), Query(filter)).await);
    assert_eq!(body["totales_globales"]["enviados"], 100);
    assert_eq!(body["filtros"]["fechaInicio"], "2024-05-10");

    let direct = report::UpsertRequest::Envios(vec![NewSendRecord {
        fecha:             "2024-5-2".into(),
        cuenta:            "C".into(),
        funnel:            "eventos".into(),
        tipo_via:          "email".into(),
        identificador_via: "hola@c.io".into(),
        tipo_actividad:    "email_inicial".into(),
        enviados:          1,
        fallidos:          0,
        limite_alcanzado:  0,
        ultimo_envio:      None,
    }]);
    let err = report::apply_upsert(state.store.as_ref(), &direct).await.unwrap_err();
    assert!(err.is_client_error());
}
