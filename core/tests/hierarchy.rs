//! Hierarchy reducer: rollups, "sent today" and rates.
//!
//! Every parent total must equal the sum of its children after every build.

use outbound_core::{
    hierarchy::{GlobalTotals, Hierarchy},
    records::{AggregateRow, DailyRow},
};

const TODAY: &str = "2024-05-10";

fn agg(cuenta: &str, id: &str, actividad: &str, enviados: i64, fallidos: i64, respuestas: i64, agendados: i64) -> AggregateRow {
    AggregateRow {
        cuenta:            cuenta.into(),
        identificador_via: id.into(),
        tipo_via:          "linkedin".into(),
        tipo_actividad:    actividad.into(),
        funnel:            "outbound".into(),
        total_enviados:    enviados,
        total_fallidos:    fallidos,
        total_respuestas:  respuestas,
        total_agendados:   agendados,
        dias_activos:      1,
        ..AggregateRow::default()
    }
}

fn day(cuenta: &str, id: &str, actividad: &str, fecha: &str, enviados: i64) -> DailyRow {
    DailyRow {
        cuenta:            cuenta.into(),
        identificador_via: id.into(),
        tipo_via:          "linkedin".into(),
        tipo_actividad:    actividad.into(),
        funnel:            "outbound".into(),
        fecha:             fecha.into(),
        enviados_dia:      enviados,
        ..DailyRow::default()
    }
}

fn assert_parents_sum_children(tree: &Hierarchy) {
    for (name, account) in &tree.cuentas {
        let mut enviados = 0;
        let mut fallidos = 0;
        let mut respuestas = 0;
        let mut agendados = 0;
        let mut hoy = 0;
        for (id, identifier) in &account.identificadores {
            let acts = identifier.actividades.values();
            assert_eq!(
                identifier.totales.enviados,
                acts.clone().map(|a| a.enviados).sum::<i64>(),
                "{name}/{id} enviados"
            );
            assert_eq!(identifier.totales.fallidos, acts.clone().map(|a| a.fallidos).sum::<i64>());
            assert_eq!(identifier.totales.respuestas, acts.clone().map(|a| a.respuestas).sum::<i64>());
            assert_eq!(identifier.totales.agendados, acts.clone().map(|a| a.agendados).sum::<i64>());
            assert_eq!(identifier.enviados_hoy, acts.map(|a| a.enviados_hoy).sum::<i64>());
            enviados += identifier.totales.enviados;
            fallidos += identifier.totales.fallidos;
            respuestas += identifier.totales.respuestas;
            agendados += identifier.totales.agendados;
            hoy += identifier.enviados_hoy;
        }
        assert_eq!(account.totales.enviados, enviados, "{name} enviados");
        assert_eq!(account.totales.fallidos, fallidos, "{name} fallidos");
        assert_eq!(account.totales.respuestas, respuestas, "{name} respuestas");
        assert_eq!(account.totales.agendados, agendados, "{name} agendados");
        assert_eq!(account.enviados_hoy, hoy, "{name} enviados_hoy");
    }
}

#[test]
fn single_row_rates() {
    let tree = Hierarchy::build(&[agg("A", "laura", "mensaje", 100, 10, 20, 5)], &[], TODAY);

    let account = tree.account("A").expect("account A");
    let identifier = &account.identificadores["laura"];
    let activity = &identifier.actividades["mensaje"];

    for rates in [activity.rates, identifier.rates, account.rates] {
        assert_eq!(rates.tasa_entrega, 90.0);
        assert_eq!(rates.tasa_respuesta, 20.0);
        assert_eq!(rates.tasa_conversion, 5.0);
    }
    assert_eq!(account.totales.enviados, 100);
    assert_eq!(identifier.tipo_via, "linkedin");
}

#[test]
fn sent_today_rolls_up_to_every_level() {
    let tree = Hierarchy::build(
        &[agg("A", "laura", "mensaje", 7, 0, 0, 0)],
        &[day("A", "laura", "mensaje", TODAY, 7)],
        TODAY,
    );

    let account = tree.account("A").expect("account A");
    let identifier = &account.identificadores["laura"];
    assert_eq!(identifier.actividades["mensaje"].enviados_hoy, 7);
    assert_eq!(identifier.enviados_hoy, 7);
    assert_eq!(account.enviados_hoy, 7);
    assert_eq!(tree.global_totals().enviados_hoy, 7);
}

#[test]
fn other_days_are_kept_but_not_counted_as_today() {
    let tree = Hierarchy::build(
        &[agg("A", "laura", "mensaje", 12, 0, 0, 0)],
        &[
            day("A", "laura", "mensaje", TODAY, 5),
            day("A", "laura", "mensaje", "2024-05-09", 7),
        ],
        TODAY,
    );
    let activity = &tree.cuentas["A"].identificadores["laura"].actividades["mensaje"];
    assert_eq!(activity.datos_diarios.len(), 2);
    assert_eq!(activity.datos_diarios[0].fecha, TODAY);
    assert_eq!(activity.datos_diarios[1].enviados, 7);
    assert_eq!(activity.enviados_hoy, 5);
}

#[test]
fn parents_equal_sum_of_children() {
    let aggregates = vec![
        agg("A", "laura", "conexion", 40, 2, 3, 1),
        agg("A", "laura", "mensaje", 25, 1, 4, 2),
        agg("A", "ventas@a.io", "email_inicial", 60, 6, 2, 0),
        agg("B", "pablo", "conexion", 10, 0, 1, 0),
    ];
    let daily = vec![
        day("A", "laura", "conexion", TODAY, 4),
        day("A", "laura", "mensaje", TODAY, 3),
        day("A", "ventas@a.io", "email_inicial", TODAY, 9),
        day("B", "pablo", "conexion", "2024-05-01", 10),
    ];
    let tree = Hierarchy::build(&aggregates, &daily, TODAY);

    assert_parents_sum_children(&tree);
    assert_eq!(tree.cuentas["A"].totales.enviados, 125);
    assert_eq!(tree.cuentas["A"].enviados_hoy, 16);
    assert_eq!(tree.cuentas["B"].enviados_hoy, 0);
    assert_eq!(
        tree.global_totals(),
        GlobalTotals {
            enviados:     135,
            fallidos:     9,
            respuestas:   10,
            agendados:    3,
            limites:      0,
            enviados_hoy: 16,
        }
    );
}

#[test]
fn duplicate_activity_keys_are_merged() {
    // Same activity type under one identifier but in two funnels.
    let mut second = agg("A", "laura", "mensaje", 30, 3, 6, 3);
    second.funnel = "reactivacion".into();
    second.dias_activos = 4;
    second.ultimo_envio = Some("2024-05-09 12:00:00".into());
    let mut first = agg("A", "laura", "mensaje", 70, 7, 4, 2);
    first.ultimo_envio = Some("2024-05-08 09:00:00".into());

    let tree = Hierarchy::build(&[first, second], &[], TODAY);
    let identifier = &tree.cuentas["A"].identificadores["laura"];
    let activity = &identifier.actividades["mensaje"];

    assert_eq!(identifier.actividades.len(), 1);
    assert_eq!(activity.enviados, 100);
    assert_eq!(activity.respuestas, 10);
    assert_eq!(activity.dias_activos, 4);
    assert_eq!(activity.ultimo_envio.as_deref(), Some("2024-05-09 12:00:00"));
    assert_eq!(activity.rates.tasa_respuesta, 10.0);
    assert_eq!(activity.rates.tasa_entrega, 90.0);
    assert_parents_sum_children(&tree);
}

#[test]
fn zero_sends_give_zero_rates() {
    let tree = Hierarchy::build(&[agg("A", "laura", "mensaje", 0, 0, 3, 1)], &[], TODAY);
    let account = &tree.cuentas["A"];
    for rates in [
        account.identificadores["laura"].actividades["mensaje"].rates,
        account.identificadores["laura"].rates,
        account.rates,
    ] {
        assert_eq!(rates.tasa_entrega, 0.0);
        assert_eq!(rates.tasa_respuesta, 0.0);
        assert_eq!(rates.tasa_conversion, 0.0);
    }
}

#[test]
fn daily_rows_without_aggregate_are_skipped() {
    let tree = Hierarchy::build(
        &[agg("A", "laura", "mensaje", 5, 0, 0, 0)],
        &[
            day("A", "laura", "conexion", TODAY, 99),
            day("Z", "nobody", "mensaje", TODAY, 99),
        ],
        TODAY,
    );
    assert_eq!(tree.cuentas.len(), 1);
    assert_eq!(tree.cuentas["A"].enviados_hoy, 0);
    assert!(tree.cuentas["A"].identificadores["laura"].actividades["mensaje"].datos_diarios.is_empty());
}

#[test]
fn empty_input_gives_empty_tree_and_zero_totals() {
    let tree = Hierarchy::build(&[], &[], TODAY);
    assert!(tree.is_empty());
    assert_eq!(tree.global_totals(), GlobalTotals::default());
    assert_eq!(serde_json::to_value(&tree).unwrap(), serde_json::json!({}));
}

#[test]
fn building_twice_is_identical() {
    let aggregates = vec![
        agg("A", "laura", "conexion", 40, 2, 3, 1),
        agg("B", "pablo", "mensaje", 13, 1, 2, 1),
    ];
    let daily = vec![day("A", "laura", "conexion", TODAY, 4)];

    let first = Hierarchy::build(&aggregates, &daily, TODAY);
    let second = Hierarchy::build(&aggregates, &daily, TODAY);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn json_shape_flattens_rates_and_keys_children() {
    let tree = Hierarchy::build(&[agg("A", "laura", "mensaje", 100, 10, 20, 5)], &[], TODAY);
    let json = serde_json::to_value(&tree).unwrap();

    assert_eq!(json["A"]["nombre"], "A");
    assert_eq!(json["A"]["tasa_entrega"], 90.0);
    assert_eq!(json["A"]["totales"]["enviados"], 100);
    assert_eq!(json["A"]["identificadores"]["laura"]["tasa_respuesta"], 20.0);
    assert_eq!(
        json["A"]["identificadores"]["laura"]["actividades"]["mensaje"]["tasa_conversion"],
        5.0
    );
    assert!(json["A"]["identificadores"]["laura"]["actividades"]["mensaje"]["datos_diarios"].is_array());
}
