//! # Intern Report
//!
//! Aggregates software internship postings from company job boards
//! (Greenhouse, Lever), the Adzuna search API and community-maintained GitHub
//! listings, keeps the Boston-area and US-remote ones, and appends new rows to
//! a Markdown table in a README.
//!
//! ## Usage
//!
//! ```sh
//! intern_report boards --config config/companies.yml
//! intern_report adzuna --include-remote
//! intern_report github
//! intern_report discover --max 20
//! intern_report fix-locations
//! intern_report sort
//! ```
//!
//! ## Architecture
//!
//! Every subcommand runs one sequential pipeline:
//! 1. **Fetching**: pull raw records from one source at a time
//! 2. **Normalizing**: map records to listings and clean up locations
//! 3. **Filtering**: location, keyword and seniority relevance
//! 4. **Deduplicating**: across sources, then against the README
//! 5. **Output**: insert rows under the table header, write the daily report

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod cli;
mod config;
mod dates;
mod dedup;
mod location;
mod models;
mod outputs;
mod pipeline;
mod relevance;
mod scrapers;
mod utils;

use api::{http_client, RetryPolicy};
use cli::{Cli, Command};
use config::{load_config, require_env};
use location::LocationPolicy;
use pipeline::{DiscoverOptions, RunOptions};
use scrapers::{adzuna, github, serpapi};
use utils::ensure_writable_dir;

/// `RUST_LOG` first, then `LOGLEVEL`, then `info`.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("LOGLEVEL")
                .map_err(|e| e.to_string())
                .and_then(|level| EnvFilter::try_new(level.to_lowercase()).map_err(|e| e.to_string()))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    tfmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("intern_report starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let opts = RunOptions {
        readme: args.readme.clone(),
        dry_run: args.dry_run,
        dedup_key: args.dedup_key(),
        now: Local::now().naive_local(),
    };

    match args.command {
        Command::Boards { config, include_remote, out } => {
            let config = load_config(&config).await?;
            let out_dir = out.unwrap_or_else(|| config.out_dir.clone());
            if !opts.dry_run {
                check_out_dir(&out_dir).await?;
            }
            let client = http_client(RetryPolicy::default())?;
            let summary = pipeline::run_boards(
                &client,
                &config,
                include_remote || config.include_remote,
                &out_dir,
                &opts,
            )
            .await?;
            info!(added = summary.added, skipped = summary.skipped, "boards finished");
        }
        Command::Adzuna { what, location, max_days_old, include_remote, out, app_id, app_key } => {
            let creds = adzuna::Credentials {
                app_id: require_env("ADZUNA_APP_ID", app_id.as_deref())?,
                app_key: require_env("ADZUNA_APP_KEY", app_key.as_deref())?,
            };
            if !opts.dry_run {
                check_out_dir(&out).await?;
            }
            let query = adzuna::SearchQuery {
                what,
                location,
                max_days_old,
                remote: include_remote,
            };
            let client = http_client(RetryPolicy::default())?;
            let summary = pipeline::run_adzuna(
                &client,
                &creds,
                &query,
                &LocationPolicy::boston(include_remote),
                &out,
                &opts,
            )
            .await?;
            info!(added = summary.added, skipped = summary.skipped, "adzuna finished");
        }
        Command::Github { no_remote } => {
            let client = http_client(RetryPolicy::default())?;
            let summary = pipeline::run_github(
                &client,
                github::GITHUB_SOURCES,
                &LocationPolicy::boston(!no_remote),
                &opts,
            )
            .await?;
            info!(added = summary.added, skipped = summary.skipped, "github finished");
        }
        Command::Discover { cities, keywords, max, config, include_remote, serpapi_key } => {
            let api_key = require_env("SERPAPI_KEY", serpapi_key.as_deref())?;
            let queries = serpapi::build_queries(
                &serpapi::parse_cities(&cities),
                &serpapi::parse_keywords(&keywords),
                max,
            );
            info!(queries = queries.len(), "Built discovery queries");
            let discover = DiscoverOptions {
                queries,
                config_path: config,
                include_remote,
                query_delay: serpapi::QUERY_DELAY,
            };
            let client = http_client(RetryPolicy::default())?;
            let summary = pipeline::run_discover(&client, &api_key, &discover, &opts).await?;
            info!(added = summary.added, skipped = summary.skipped, "discover finished");
        }
        Command::FixLocations { no_remote } => {
            let changed = pipeline::run_fix_locations(
                &opts.readme,
                &LocationPolicy::boston(!no_remote),
                opts.dry_run,
            )
            .await?;
            info!(changed, "fix-locations finished");
        }
        Command::Sort => {
            let rows = pipeline::run_sort(&opts.readme, opts.dry_run).await?;
            info!(rows, "sort finished");
        }
    }

    let elapsed: Duration = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Fail early when the report directory cannot be written.
async fn check_out_dir(out_dir: &std::path::Path) -> Result<(), Box<dyn Error>> {
    if let Err(e) = ensure_writable_dir(out_dir).await {
        error!(
            path = %out_dir.display(),
            error = %e,
            "Report directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    Ok(())
}
