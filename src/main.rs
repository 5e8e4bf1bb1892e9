mod catalog;
mod config;
mod item_db;
mod llm;
mod manufacturer;
mod parser;
mod pdf_text;
mod pipeline;
mod rag;
mod search;
mod template;
mod textnorm;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use config::Config;
use item_db::ItemStore;
use llm::OllamaClient;
use manufacturer::{ManufacturerBook, ManufacturerResolver};
use pipeline::Pipeline;
use rag::OllamaEmbedder;
use search::DuckDuckGoClient;

const CONFIG_PATH: &str = "ncm_classify.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = match Config::load(CONFIG_PATH) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = CONFIG_PATH, error = %e, "config not loaded, using defaults");
            Config::default()
        }
    };

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("extract") => {
            let path = args.get(2).ok_or("usage: ncm_classify extract <file.pdf>")?;
            run_extract(path)
        }
        Some("classify") => {
            let path = args.get(2).ok_or("usage: ncm_classify classify <file.pdf>")?;
            run_classify(path, &cfg).await
        }
        Some("stats") => run_stats(&cfg),
        _ => {
            eprintln!("usage: ncm_classify <extract|classify|stats> [file.pdf]");
            Ok(())
        }
    }
}

/// Extraction only: PDF text, template detection, per-template parsing.
fn run_extract(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let pdf_bytes = fs::read(path)?;
    let items = pipeline::extract_items(&pdf_bytes)?;
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

/// Full pipeline: extraction followed by per-item classification.
async fn run_classify(path: &str, cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let pdf_bytes = fs::read(path)?;
    let items = pipeline::extract_items(&pdf_bytes)?;

    // Empty part numbers cannot be cached or persisted; drop them
    // before classification starts.
    let (items, dropped): (Vec<_>, Vec<_>) = items
        .into_iter()
        .partition(|item| !item.partnumber.trim().is_empty());
    if !dropped.is_empty() {
        warn!(count = dropped.len(), "dropping items without a partnumber");
    }
    if items.is_empty() {
        warn!("no classifiable items in this document");
        println!("[]");
        return Ok(());
    }

    let store = ItemStore::new(&cfg.db_path)?;
    let embedder = Arc::new(OllamaEmbedder::new(&cfg.embedding)?);
    let index = rag::shared_index(&cfg.catalog.path, embedder).await?;
    info!(catalog_rows = index.len(), top_k = cfg.top_k, "retrieval index ready");
    let resolver = ManufacturerResolver::new(
        ManufacturerBook::load(&cfg.manufacturers_path)?,
        DuckDuckGoClient::new(&cfg.search)?,
        cfg.search.max_results,
    );
    let llm = OllamaClient::new(&cfg.llm)?;

    let batch_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    let pipeline = Pipeline::new(
        store,
        index,
        llm,
        resolver,
        &cfg.known_manufacturers,
        cfg.top_k,
    );
    let batch_id = pipeline.store().create_batch(&batch_name)?;

    let rows = pipeline.process_batch(batch_id, &items).await;
    println!("{}", serde_json::to_string_pretty(&rows)?);

    let flagged = rows.iter().filter(|r| r.is_new_manufacturer).count();
    info!(
        batch = batch_id,
        items = rows.len(),
        flagged_for_review = flagged,
        "batch classified"
    );
    Ok(())
}

fn run_stats(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = ItemStore::new(&cfg.db_path)?;
    let (items, manufacturers, batches, links) = store.get_counts()?;
    info!(items, manufacturers, batches, links, "store statistics");
    println!(
        "items: {items}\nmanufacturers: {manufacturers}\nbatches: {batches}\nlinks: {links}"
    );
    Ok(())
}
