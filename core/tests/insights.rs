//! Conversion funnel and alert rules.

use outbound_core::{
    config::InsightThresholds,
    insights::{evaluate, ConversionFunnel, InsightLevel},
    rates::safe_percentage,
    records::AggregateRow,
};

fn row(cuenta: &str, id: &str, enviados: i64, respuestas: i64, agendados: i64) -> AggregateRow {
    AggregateRow {
        cuenta:            cuenta.into(),
        identificador_via: id.into(),
        tipo_via:          "linkedin".into(),
        tipo_actividad:    "mensaje".into(),
        funnel:            "outbound".into(),
        total_enviados:    enviados,
        total_respuestas:  respuestas,
        total_agendados:   agendados,
        ..AggregateRow::default()
    }
}

#[test]
fn safe_percentage_edges() {
    assert_eq!(safe_percentage(5, 0), 0.0);
    assert_eq!(safe_percentage(0, 0), 0.0);
    assert_eq!(safe_percentage(1, 3), 33.33);
    assert_eq!(safe_percentage(2, 3), 66.67);
    assert_eq!(safe_percentage(1, 8), 12.5);
}

#[test]
fn safe_percentage_rounds_exact_halves_up() {
    assert_eq!(safe_percentage(23, 160), 14.38);
    assert_eq!(safe_percentage(41, 160), 25.63);
    assert_eq!(safe_percentage(51, 160), 31.88);
    assert_eq!(safe_percentage(46, 320), 14.38);
    assert_eq!(safe_percentage(1, 16), 6.25);
    assert_eq!(safe_percentage(-23, 160), -14.38);
    assert_eq!(safe_percentage(160, 160), 100.0);
}

#[test]
fn funnel_steps_and_rates() {
    let mut r = row("A", "laura", 100, 20, 4);
    r.total_fallidos = 10;
    r.total_cualificados = 8;
    let funnel = ConversionFunnel::from_rows(&[r]);

    let values: Vec<i64> = funnel.pasos.iter().map(|p| p.value).collect();
    assert_eq!(values, vec![100, 90, 20, 8, 4]);
    assert_eq!(funnel.pasos[0].percentage, 100.0);
    assert_eq!(funnel.pasos[1].percentage, 90.0);
    assert_eq!(funnel.pasos[2].percentage_previous, 22.22);
    assert_eq!(funnel.pasos[4].percentage_previous, 50.0);
    assert_eq!(funnel.tasa_entrega, 90.0);
    assert_eq!(funnel.tasa_engagement, 22.22);
    assert_eq!(funnel.tasa_cierre, 50.0);
}

#[test]
fn empty_funnel_is_all_zero() {
    let funnel = ConversionFunnel::from_rows(&[]);
    assert_eq!(funnel.pasos.len(), 5);
    assert!(funnel.pasos.iter().all(|p| p.value == 0 && p.percentage == 0.0));
    assert_eq!(funnel.tasa_cierre, 0.0);
    assert!(evaluate(&[], &InsightThresholds::default()).is_empty());
}

#[test]
fn alerts_come_before_insights() {
    let mut r = row("A", "laura", 100, 2, 0);
    r.total_limites = 3;
    let out = evaluate(&[r], &InsightThresholds::default());

    let levels: Vec<InsightLevel> = out.iter().map(|i| i.tipo).collect();
    assert_eq!(
        levels,
        vec![InsightLevel::Danger, InsightLevel::Warning, InsightLevel::Success]
    );
    assert!(out[0].mensaje.contains("2.0%"));
    assert!(out[1].mensaje.starts_with("3 envíos"));
    assert!(out[2].mensaje.contains("\"A\""));
}

#[test]
fn high_response_and_top_origin() {
    let rows = vec![row("A", "laura", 100, 20, 10), row("A", "pedro", 50, 10, 1)];
    let out = evaluate(&rows, &InsightThresholds::default());

    assert!(out.iter().all(|i| i.tipo == InsightLevel::Success), "{out:?}");
    assert!(out.iter().any(|i| i.mensaje.starts_with("Excelente")));
    let origin = out
        .iter()
        .find(|i| i.mensaje.starts_with("Origen destacado"))
        .expect("top origin");
    assert!(origin.mensaje.contains("linkedin - laura"));
    assert!(origin.mensaje.contains("10.0%"));
}

#[test]
fn small_accounts_are_not_ranked() {
    let rows = vec![row("A", "laura", 5, 0, 0), row("B", "pablo", 8, 0, 0)];
    let out = evaluate(&rows, &InsightThresholds::default());
    let last = out.last().expect("client insight");
    assert_eq!(last.tipo, InsightLevel::Warning);
    assert!(last.mensaje.contains("20 envíos"));
}

#[test]
fn best_client_uses_mean_row_conversion() {
    let rows = vec![
        row("A", "laura", 100, 10, 10), // 10 %
        row("A", "pedro", 100, 10, 0),  // 0 %, mean 5 %
        row("B", "pablo", 30, 5, 2),    // 6.67 %
    ];
    let thresholds = InsightThresholds {
        top_origin_conversion: 50.0,
        ..InsightThresholds::default()
    };
    let out = evaluate(&rows, &thresholds);
    let best = out
        .iter()
        .find(|i| i.mensaje.starts_with("Cliente con mejor rendimiento"))
        .expect("best client");
    assert!(best.mensaje.contains("\"B\""), "{}", best.mensaje);
    assert!(best.mensaje.contains("6.7%"));
}
