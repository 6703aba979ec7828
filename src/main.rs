use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use mp_scout::config::{Cli, Settings};
use mp_scout::crawler::{run_parents, Crawler, RunSummary};
use mp_scout::dataset;
use mp_scout::scrapers::{ChromeFetcher, Marktplaats};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let settings = Settings::from_env(&cli).context("Invalid configuration")?;
    let started = Instant::now();

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let listings_path = settings.listings_path();
    let mut existing = dataset::load(&listings_path)
        .with_context(|| format!("Failed to read {}", listings_path.display()))?;
    info!(
        "Loaded {} listings from {}",
        existing.len(),
        listings_path.display()
    );

    if dataset::has_duplicates(&existing) {
        warn!("Dataset contains duplicate item ids, saving a de-duplicated copy");
        existing = dataset::dedupe(existing);
        dataset::persist(&existing, &listings_path)
            .with_context(|| format!("Failed to write {}", listings_path.display()))?;
    }

    let mut excluded =
        dataset::compute_exclusion_set(&existing, Utc::now(), settings.recrawl_hours);
    info!(
        "{} listings were crawled less than {} hours ago and will be skipped",
        excluded.len(),
        settings.recrawl_hours
    );

    if !settings.chromium_path.exists() {
        bail!(
            "Chromium executable not found at {}",
            settings.chromium_path.display()
        );
    }

    let fetcher = ChromeFetcher::launch(&settings.browser_options())
        .context("Failed to launch browser")?;
    let source = Marktplaats::with_base_url(
        fetcher,
        settings.base_url.clone(),
        settings.crawl_options().timeout,
    );
    let crawler = Crawler::with_cancellation(source, settings.crawl_options(), cancel);

    let parents = crawler.get_parent_categories().await?;

    let summary = run_parents(&crawler, &parents, settings.limit, &mut excluded).await;
    let fatal = summary.is_fatal();
    let RunSummary {
        listings: new_listings,
        crawled_parents,
        stop: stop_reason,
    } = summary;

    // Closes the browser before the dataset is written
    drop(crawler);

    let new_count = new_listings.len();
    let dataset_size = if new_listings.is_empty() {
        warn!("Nothing to save");
        existing.len()
    } else {
        let merged = dataset::merge(existing, new_listings);
        dataset::persist(&merged, &listings_path)
            .with_context(|| format!("Failed to write {}", listings_path.display()))?;
        info!("Saved {} listings to {}", merged.len(), listings_path.display());
        merged.len()
    };

    info!(
        "Crawled {} of {} parent categories: {} new listings, {} in dataset, took {:.1}s",
        crawled_parents,
        parents.len(),
        new_count,
        dataset_size,
        started.elapsed().as_secs_f64()
    );

    match stop_reason {
        Some(cause) if fatal => {
            error!("Run aborted: {}", cause);
            Err(cause.into())
        }
        Some(cause) => {
            warn!("Run stopped early: {}", cause);
            Ok(())
        }
        None => Ok(()),
    }
}

fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("mp_scout=info,warn"),
        1 => EnvFilter::new("mp_scout=debug,info"),
        _ => EnvFilter::new("mp_scout=trace,debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Cancel `cancel` on Ctrl-C or SIGTERM
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        warn!("Interrupted, saving what was collected so far...");
        cancel.cancel();
    });
}
