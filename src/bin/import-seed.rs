use std::env;
use std::path::PathBuf;

use portfolio_dashboard::config::{AppConfig, StoreBackend};
use portfolio_dashboard::{open_store, seed};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let path = env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --bin import-seed <SEED.json>");
        std::process::exit(1);
    });

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    if config.store_backend == StoreBackend::Memory {
        eprintln!("Seeding an in-memory store has no lasting effect. Set DATABASE_URL first.");
        std::process::exit(1);
    }
    // The seed is imported below, after the store is open.
    config.seed_path = None;

    let data = match seed::SeedData::from_file(&path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let store = match open_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let report = seed::import(store.as_ref(), data).await;
    for (kind, id) in &report.imported {
        println!("imported  {}/{}", kind, id);
    }
    for skipped in &report.skipped {
        println!("skipped   {} #{}: {}", skipped.kind, skipped.index, skipped.reason);
    }
    println!(
        "\n{} imported, {} skipped",
        report.imported.len(),
        report.skipped.len()
    );
    if !report.skipped.is_empty() {
        std::process::exit(2);
    }
}
