//! # Haber Relay
//!
//! A polling relay that picks up breaking news from a listing page, rewrites
//! each new article through an OpenAI-compatible chat model, and republishes
//! it to WordPress.
//!
//! ## Features
//!
//! - Scrapes the listing and article pages, skipping anything without a real image
//! - Rewrites articles into short neutral Turkish copy with a tag list
//! - Publishes over XML-RPC, falling back to the REST API when that fails
//! - Remembers published articles in a JSON state file so nothing posts twice
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=... WP_USERNAME=... WP_USERPASS=... WP_APPPASS=... \
//!     haber_relay --config relay.yaml
//! ```
//!
//! ## Architecture
//!
//! The relay follows a pipeline architecture, one item at a time:
//! 1. **Listing**: discover article links with a usable thumbnail
//! 2. **Article**: fetch the page, gate on its lead image, collect the text
//! 3. **Generation**: rewrite the text and extract tags
//! 4. **Publishing**: XML-RPC first, REST as fallback; record the item on success

use clap::Parser;
use std::error::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod generator;
mod http;
mod models;
mod pipeline;
mod publish;
mod scrapers;
mod store;
#[cfg(test)]
mod test_support;
mod utils;

use api::ChatClient;
use cli::Cli;
use config::Config;
use error::ConfigError;
use generator::ContentGenerator;
use http::HttpClient;
use pipeline::Pipeline;
use publish::{Publisher, Transport};
use publish::rest::RestTransport;
use publish::xmlrpc::XmlRpcTransport;
use scrapers::SourceExtractor;
use store::SeenStore;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "haber_relay starting up");

    let args = Cli::parse();
    debug!(config = ?args.config, once = args.once, "Parsed CLI arguments");

    let config = Config::load(args.config.as_deref())?.with_secrets(&args)?;
    if config.wordpress.app_password.is_empty() {
        warn!("WP_APPPASS is not set; the REST fallback will be rejected by the backend");
    }

    let mut pipeline = build_pipeline(&config).await?;
    info!(seen = pipeline.seen().len(), path = %config.seen_path, "State loaded");

    if args.once {
        let (_tx, rx) = watch::channel(false);
        let report = pipeline.run_cycle(&rx).await?;
        info!(published = report.published, failed = report.failed, "Single cycle complete");
        return Ok(());
    }

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received; finishing the current item");
                let _ = tx.send(true);
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });

    info!(
        listing = %config.listing_url,
        interval_secs = config.poll_interval_secs,
        "Entering poll loop"
    );
    pipeline.run_forever(config.poll_interval(), rx).await;
    Ok(())
}

/// Wire every stage from the loaded configuration.
async fn build_pipeline(
    config: &Config,
) -> Result<Pipeline<HttpClient, ChatClient, XmlRpcTransport, RestTransport>, ConfigError> {
    let http = HttpClient::new(
        &config.user_agent,
        std::time::Duration::from_secs(config.page_timeout_secs),
    )?;

    let extractor = SourceExtractor::new(http.clone(), config.extraction.clone());
    let chat = ChatClient::new(http.client().clone(), config.generation.clone());
    let generator = ContentGenerator::new(chat, &config.generation.tag_marker)?;
    let publisher = Publisher::new(
        XmlRpcTransport::new(http.clone(), &config.wordpress),
        RestTransport::new(http, &config.wordpress),
    );
    info!(
        backend = %config.wordpress.base(),
        primary = publisher.primary().name(),
        fallback = publisher.fallback().name(),
        model = %config.generation.model,
        "Publishing configured"
    );

    let store = SeenStore::new(&config.seen_path);
    Ok(Pipeline::new(
        extractor,
        generator,
        publisher,
        store,
        config.listing_url.clone(),
        &config.wordpress,
    )
    .await)
}
