pub mod cli;

use anyhow::{Context, anyhow};
use clap::Parser;
use common::logger::init_logger;
use common::time::SystemClock;
use corelib::{Catalog, IngestBatch, Tick, TokenDay};
use serde::Serialize;
use tokens::{AppConfig, TokenService};
use tracing::info;

use cli::{Cli, Command, read_batch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let cfg = AppConfig::from_env();
    init_logger("token-graph", cfg.json_logs);

    let catalog_path = args
        .catalog
        .clone()
        .or_else(|| cfg.catalog_path.clone())
        .context("no catalog given (--catalog or CATALOG_PATH)")?;
    let catalog = tokio::task::spawn_blocking(move || Catalog::from_path(&catalog_path))
        .await
        .context("catalog loader panicked")?
        .context("loading catalog")?;

    let (ticks, days) = load_batches(&args).await?;

    let svc = TokenService::from_config(catalog, &cfg, SystemClock);
    for batch in ticks {
        svc.ingest_ticks(batch).context("ingesting pair ticks")?;
    }
    for batch in days {
        svc.ingest_token_days(batch).context("ingesting token days")?;
    }

    let base = match &args.base {
        Some(symbol) => svc
            .catalog()
            .token_by_symbol(symbol)
            .map(|(id, _)| id)
            .ok_or_else(|| anyhow!("unknown base currency {symbol}"))?,
        None => svc.default_base(),
    };

    match &args.command {
        Command::List => print_json(&*svc.list_snapshots(base)?),
        Command::Snapshot { symbol } => print_json(&svc.get_snapshot(symbol, base)?),
        Command::History {
            symbol,
            period_hours,
        } => {
            let series = svc
                .get_historical_series(symbol, *period_hours, base)
                .ok_or_else(|| anyhow!("no historical series for {symbol}"))?;
            print_json(&series)
        }
        Command::Plan { symbol } => {
            let plan = svc.refresh_plan(symbol, base)?;
            info!(
                from = %render_ts(plan.from),
                to = %render_ts(plan.to),
                pairs = plan.ids.len(),
                "refresh window"
            );
            print_json(&plan)
        }
    }
}

/// Reads every batch file concurrently.
async fn load_batches(args: &Cli) -> anyhow::Result<(Vec<IngestBatch<Tick>>, Vec<IngestBatch<TokenDay>>)> {
    let tick_tasks: Vec<_> = args
        .tick_files
        .iter()
        .cloned()
        .map(|p| tokio::spawn(async move { read_batch::<Tick>(&p).await }))
        .collect();
    let day_tasks: Vec<_> = args
        .day_files
        .iter()
        .cloned()
        .map(|p| tokio::spawn(async move { read_batch::<TokenDay>(&p).await }))
        .collect();

    let mut ticks = Vec::with_capacity(tick_tasks.len());
    for task in tick_tasks {
        ticks.push(task.await.context("batch loader panicked")??);
    }
    let mut days = Vec::with_capacity(day_tasks.len());
    for task in day_tasks {
        days.push(task.await.context("batch loader panicked")??);
    }

    info!(ticks = ticks.len(), days = days.len(), "batches loaded");
    Ok((ticks, days))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{out}");
    Ok(())
}

fn render_ts(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
