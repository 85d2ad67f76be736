//! Incremental ETL example.
//!
//! 1. **Incremental export**: page through an order feed three records at a time,
//!    translate each order, encode the page as Parquet and write it to a numbered
//!    file. The cursor lives in a JSON state file, so every run picks up where
//!    the last successful one stopped.
//! 2. **Batch report**: a plain source → stage → sink pipeline that counts orders
//!    per country and fans the result out to two sinks.
//!
//! Run with: RUST_LOG=ironflow=debug cargo run --example incremental_etl

use anyhow::Result;
use ironflow::incremental::infallible;
use ironflow::io::{DirectoryEmitter, FileStateStore, ParquetEncoder, SliceCollector, read_parquet_bytes};
use ironflow::sink::sink_fn;
use ironflow::source::from_vec;
use ironflow::stage::{after_delivery, count, filter, map};
use ironflow::*;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    id: u64,
    customer: String,
    country: String,
    cents: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Amount {
    currency: String,
    value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExportRow {
    order_id: u64,
    customer: String,
    amount: Amount,
    domestic: bool,
}

fn feed() -> Vec<Order> {
    let customers = ["ada", "grace", "linus", "barbara", "ken"];
    let countries = ["NO", "SE", "NO", "DK"];
    (1..=10)
        .map(|id| Order {
            id,
            customer: customers[(id as usize) % customers.len()].to_string(),
            country: countries[(id as usize) % countries.len()].to_string(),
            cents: 1_000 + id * 250,
        })
        .collect()
}

fn to_export_row(order: Order) -> ExportRow {
    ExportRow {
        order_id: order.id,
        customer: order.customer,
        amount: Amount {
            currency: "NOK".into(),
            value: order.cents as f64 / 100.0,
        },
        domestic: order.country == "NO",
    }
}

fn incremental_export(workdir: &std::path::Path) -> Result<()> {
    let out_dir = workdir.join("exports");
    let pipeline = IncrementalPipeline::new(
        FileStateStore::new(workdir.join("state.json")),
        SliceCollector::new(feed(), 3),
        infallible(to_export_row),
        ParquetEncoder::new(),
        DirectoryEmitter::new(&out_dir, "orders", "parquet"),
    )
    .with_config(PipelineConfig::named("orders-export"));

    for _ in 0..5 {
        let outcome = pipeline.execute("orders")?;
        println!(
            "run: cursor {} -> {}, {} records, {} bytes",
            outcome.cursor_read, outcome.cursor_written, outcome.records, outcome.bytes
        );
    }

    let mut parts: Vec<_> = std::fs::read_dir(&out_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    parts.sort();
    for part in parts {
        let (schema, batches) = read_parquet_bytes(&std::fs::read(&part)?)?;
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        let columns: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        println!("{}: {rows} rows, columns {columns:?}", part.display());
    }
    Ok(())
}

fn country_report() -> Result<()> {
    let stage = filter(|o: &Order| o.cents >= 2_000)
        .then(map(|o: Order| o.country))
        .then(count())
        .then(after_delivery(|counts: &[std::collections::HashMap<String, usize>]| {
            tracing::info!(countries = counts.first().map_or(0, |c| c.len()), "report delivered");
            Ok(())
        }));

    let pipeline = Pipeline::new(
        from_vec(feed()),
        stage,
        Spread::new()
            .with(sink_fn(|_, counts: Vec<std::collections::HashMap<String, usize>>| {
                let mut rows: Vec<_> = counts.into_iter().flatten().collect();
                rows.sort();
                println!("orders >= 20.00 per country: {rows:?}");
                Ok(())
            }))
            .with(sink::discard()),
    )
    .with_config(PipelineConfig::named("country-report").with_mode(ExecMode::Parallel { threads: Some(2) }));

    let summary = pipeline.execute()?;
    println!(
        "report: {} collected, {} emitted, {} after-effects in {:?}",
        summary.collected, summary.emitted, summary.after_effects, summary.elapsed
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let workdir = tempfile::tempdir()?;
    incremental_export(workdir.path())?;
    country_report()?;
    Ok(())
}
