//! Board discovery through SerpAPI Google search.
//!
//! Queries look like `site:boards.greenhouse.io "Boston" intern`; the first
//! path segment of each matching result link is taken as a board slug.

use crate::api::{Fetch, FetchError, HttpRequest};
use crate::config::Provider;
use itertools::Itertools;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const ENDPOINT: &str = "https://serpapi.com/search.json";
pub const TIMEOUT: Duration = Duration::from_secs(20);
pub const RESULTS_PER_QUERY: u32 = 10;
/// Pause between consecutive searches.
pub const QUERY_DELAY: Duration = Duration::from_millis(800);
/// Only this many keywords are combined with each city.
pub const KEYWORDS_PER_CITY: usize = 10;

pub const GREENHOUSE_HOST: &str = "boards.greenhouse.io";
pub const LEVER_HOST: &str = "jobs.lever.co";

pub const DEFAULT_CITIES: &str =
    "Boston,Cambridge,Somerville,Quincy,Newton,Brookline,Waltham,Watertown,Burlington,Lexington,Needham";
pub const DEFAULT_KEYWORDS: &str = "intern internship co-op coop student graduate new grad entry junior software engineer backend infrastructure systems reliability compiler quant data platform analytics data science ml ai frontend front end full stack web mobile devops cloud security qa quality assurance support IT product UX UI design research campus university fall spring summer";
pub const DEFAULT_MAX_QUERIES: usize = 100;

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Default, Deserialize)]
struct OrganicResult {
    link: Option<String>,
}

/// Cities x first [`KEYWORDS_PER_CITY`] keywords, for both hosts,
/// de-duplicated in order and capped at `max`.
pub fn build_queries(cities: &[String], keywords: &[String], max: usize) -> Vec<String> {
    cities
        .iter()
        .cartesian_product(keywords.iter().take(KEYWORDS_PER_CITY))
        .flat_map(|(city, kw)| {
            [
                format!(r#"site:{GREENHOUSE_HOST} "{city}" {kw}"#),
                format!(r#"site:{LEVER_HOST} "{city}" {kw}"#),
            ]
        })
        .unique()
        .take(max)
        .collect()
}

/// Comma-separated cities, trimmed, empties dropped.
pub fn parse_cities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whitespace-separated keywords.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// First path segment of `link` when it is on `host`.
pub fn extract_slug(link: &str, host: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    if url.host_str()? != host {
        return None;
    }
    url.path_segments()?
        .find(|seg| !seg.is_empty())
        .map(str::to_string)
}

/// Classify a result link as a Greenhouse or Lever board.
pub fn board_for_link(link: &str) -> Option<(Provider, String)> {
    extract_slug(link, GREENHOUSE_HOST)
        .map(|slug| (Provider::Greenhouse, slug))
        .or_else(|| extract_slug(link, LEVER_HOST).map(|slug| (Provider::Lever, slug)))
}

/// Run one search and return the organic result links.
#[instrument(level = "info", skip(client, api_key))]
pub async fn search<F: Fetch>(
    client: &F,
    api_key: &str,
    query: &str,
) -> Result<Vec<String>, FetchError> {
    let num = RESULTS_PER_QUERY.to_string();
    let req = HttpRequest::with_query(
        ENDPOINT,
        &[
            ("engine", "google"),
            ("q", query),
            ("api_key", api_key),
            ("num", num.as_str()),
            ("hl", "en"),
        ],
        TIMEOUT,
    )?;
    let response: SearchResponse = client.fetch_json(&req).await?;
    let links: Vec<String> = response
        .organic_results
        .into_iter()
        .filter_map(|r| r.link)
        .collect();
    debug!(count = links.len(), "Search results");
    Ok(links)
}
