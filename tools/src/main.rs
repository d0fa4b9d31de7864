//! stats-server: HTTP reporting service for outbound statistics.
//!
//! Usage:
//!   stats-server --config stats.json
//!   stats-server --sqlite demo.db --seed-demo 42 --bind 127.0.0.1:3000
//!   stats-server --config stats.json --migrate
//!   stats-server --sqlite demo.db --check
//!
//! `--migrate` and `--seed-demo` run before the server starts;
//! `--check` prints a report and exits without serving.

use anyhow::{Context, Result};
use outbound_core::{
    api::{self, AppState},
    config::{AppConfig, Backend},
    demo::{self, DemoGenerator},
    filter::StatsFilter,
    report,
    store::{open_store, StatsStore},
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path = string_arg(&args, "--config");
    let mut config = AppConfig::load(config_path)?;
    if let Some(path) = string_arg(&args, "--sqlite") {
        config.database.backend = Backend::Sqlite;
        config.database.sqlite_path = path.to_string();
    }
    if let Some(bind) = string_arg(&args, "--bind") {
        config.server.bind = bind.to_string();
    }
    let migrate = args.iter().any(|a| a == "--migrate");
    let check = args.iter().any(|a| a == "--check");
    let demo_seed = string_arg(&args, "--seed-demo")
        .map(|s| s.parse::<u64>().with_context(|| format!("--seed-demo expects an integer, got {s}")))
        .transpose()?;
    let demo_days = parse_arg(&args, "--demo-days", 30u32);

    println!("stats-server");
    println!("  backend:   {:?}", config.database.backend);
    println!("  bind:      {}", config.server.bind);
    println!("  timezone:  {}", config.report.timezone);
    println!();

    let store = open_store(&config.database)?;

    if migrate || demo_seed.is_some() {
        store.migrate().await.context("migration failed")?;
    }

    if let Some(seed) = demo_seed {
        let today = config.report.clock().today();
        let data = DemoGenerator::new(seed, today, demo_days).generate();
        let written = demo::populate(store.as_ref(), &data).await?;
        println!("Seeded {written} demo rows (seed {seed}, {demo_days} days to {today})");
    }

    if check {
        return print_summary(store.as_ref(), &config).await;
    }

    serve(store, config).await
}

async fn serve(store: Arc<dyn StatsStore>, config: AppConfig) -> Result<()> {
    let state = AppState::new(store, config.report.clone());
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("cannot bind {}", config.server.bind))?;
    log::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("cannot listen for shutdown signal: {e}");
            }
        })
        .await?;
    log::info!("shut down");
    Ok(())
}

async fn print_summary(store: &dyn StatsStore, config: &AppConfig) -> Result<()> {
    store.ping().await.context("database unreachable")?;

    println!("=== SCHEMA ===");
    for (table, present) in store.check_structure().await? {
        println!("  {table:<18} {}", if present { "ok" } else { "MISSING" });
    }
    println!();

    let clock = config.report.clock();
    let hierarchy = report::hierarchy_report(store, &StatsFilter::default(), &clock).await?;
    let totals = hierarchy.totales_globales;
    println!("=== TOTALS (today {}) ===", clock.today_key());
    println!("  Accounts:        {}", hierarchy.data.cuentas.len());
    println!("  Sent:            {}", totals.enviados);
    println!("  Failed:          {}", totals.fallidos);
    println!("  Responses:       {}", totals.respuestas);
    println!("  Scheduled:       {}", totals.agendados);
    println!("  Limits reached:  {}", totals.limites);
    println!("  Sent today:      {}", totals.enviados_hoy);
    println!();

    println!("=== ACCOUNTS ===");
    for (name, account) in &hierarchy.data.cuentas {
        println!(
            "  {name:<12} sent {:>6}  resp {:>5.2}%  conv {:>5.2}%  today {:>4}  channels {}",
            account.totales.enviados,
            account.rates.tasa_respuesta,
            account.rates.tasa_conversion,
            account.enviados_hoy,
            account.identificadores.len()
        );
    }
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    string_arg(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
