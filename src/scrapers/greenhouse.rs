//! Greenhouse job-board API.
//!
//! `GET https://boards-api.greenhouse.io/v1/boards/{slug}/jobs?content=true`
//! returns `{"jobs": [...]}` with HTML-escaped descriptions in `content`.

use crate::api::{Fetch, FetchError, HttpRequest};
use crate::models::{decode_records, GreenhouseBoard, GreenhouseJob, RawPosting};
use std::time::Duration;
use tracing::{info, instrument};

pub const API_BASE: &str = "https://boards-api.greenhouse.io/v1/boards";
pub const TIMEOUT: Duration = Duration::from_secs(10);

pub fn board_url(slug: &str) -> String {
    format!("{API_BASE}/{}/jobs?content=true", urlencoding::encode(slug))
}

/// Fetch every posting on a company's board.
#[instrument(level = "info", skip(client))]
pub async fn fetch_jobs<F: Fetch>(client: &F, slug: &str) -> Result<Vec<RawPosting>, FetchError> {
    let board: GreenhouseBoard = client
        .fetch_json(&HttpRequest::get(board_url(slug), TIMEOUT))
        .await?;
    let jobs: Vec<GreenhouseJob> = decode_records(board.jobs, "greenhouse");
    info!(count = jobs.len(), "Fetched Greenhouse jobs");
    Ok(jobs.into_iter().map(RawPosting::Greenhouse).collect())
}

/// A slug is valid when its board answers 200.
pub async fn board_exists<F: Fetch>(client: &F, slug: &str) -> bool {
    client
        .fetch(&HttpRequest::get(board_url(slug), TIMEOUT))
        .await
        .is_ok()
}
