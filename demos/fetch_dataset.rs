//! Fetch the chest X-ray dataset
//!
//! Downloads the catalog and every image row into `<documents>/DataSet`, printing
//! session events as they arrive. Ctrl+C cancels the session.
//!
//! Usage: cargo run --example fetch_dataset [documents-dir] [--serve]
//!
//! With `--serve` the REST API is started as well (Swagger UI at
//! http://127.0.0.1:6790/swagger-ui).

use chestxray_dl::{Config, DatasetDownloader, Event, Finding, execute_until_signal};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut config = Config::default();
    let mut serve = false;
    for arg in std::env::args().skip(1) {
        if arg == "--serve" {
            serve = true;
        } else {
            config.storage.documents_dir = Some(PathBuf::from(arg));
        }
    }

    let downloader = Arc::new(DatasetDownloader::new(config)?);
    println!("Dataset directory: {}", downloader.store().dataset_dir()?.display());

    let api = serve.then(|| downloader.spawn_api_server());

    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::CatalogParsed {
                    records,
                    dropped_rows,
                    image_rows,
                    ..
                } => {
                    println!(
                        "Catalog: {} records ({} rows dropped), {} images to fetch",
                        records, dropped_rows, image_rows
                    );
                }
                Event::ImageFailed {
                    filename, error, ..
                } => {
                    println!("✗ {}: {}", filename, error);
                }
                Event::SessionComplete { summary, .. } => {
                    println!(
                        "Done: {} stored, {} failed, {} skipped, {} duplicates",
                        summary.succeeded, summary.failed, summary.skipped, summary.duplicates
                    );
                }
                Event::SessionCancelled { .. } => println!("Cancelled"),
                _ => {}
            }
        }
    });

    let records = execute_until_signal(&downloader).await?;

    let labels = downloader.labeled_images()?;
    println!("{} records", records.len());
    for finding in Finding::ALL {
        println!("  {:<11} {} images", finding.label(), labels.count(finding));
    }

    if let Some(api) = api {
        println!("Serving API, press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
        api.abort();
    }

    Ok(())
}
