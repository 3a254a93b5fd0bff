//! Adzuna US job search.
//!
//! Requires `ADZUNA_APP_ID` and `ADZUNA_APP_KEY`. One page of up to 50
//! results is requested per run.

use crate::api::{Fetch, FetchError, HttpRequest};
use crate::models::{decode_records, AdzunaResponse, AdzunaResult, RawPosting};
use std::time::Duration;
use tracing::{info, instrument};

pub const API_BASE: &str = "https://api.adzuna.com/v1/api/jobs/us/search/1";
pub const TIMEOUT: Duration = Duration::from_secs(20);
pub const RESULTS_PER_PAGE: u32 = 50;

/// Default `what` expression: internship signals OR'd with role keywords.
pub const DEFAULT_WHAT: &str = r#"intern OR internship OR co-op OR coop OR student OR graduate OR "new grad" OR entry OR junior OR systems OR infrastructure OR backend OR "core systems" OR frontend OR "front end" OR "full stack" OR web OR mobile OR reliability OR "site reliability" OR sre OR devops OR cloud OR security OR qa OR "quality assurance" OR support OR IT OR compiler OR compilers OR algorithm OR algorithms OR quant OR quantitative OR simulation OR modeling OR "data infrastructure" OR "data platform" OR analytics OR "data science" OR "ml systems" OR "machine learning systems" OR "ml infra" OR "ml platform" OR product OR UX OR UI OR design OR research OR campus OR university OR fall OR spring OR summer"#;

pub const DEFAULT_LOCATION: &str = "Boston, MA";
pub const DEFAULT_MAX_DAYS_OLD: u32 = 7;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub app_id: String,
    pub app_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub what: String,
    pub location: String,
    pub max_days_old: u32,
    pub remote: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            what: DEFAULT_WHAT.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            max_days_old: DEFAULT_MAX_DAYS_OLD,
            remote: false,
        }
    }
}

pub fn search_request(creds: &Credentials, query: &SearchQuery) -> Result<HttpRequest, FetchError> {
    let mut params = vec![
        ("app_id", creds.app_id.clone()),
        ("app_key", creds.app_key.clone()),
        ("what", query.what.clone()),
        ("where", query.location.clone()),
        ("results_per_page", RESULTS_PER_PAGE.to_string()),
        ("content-type", "application/json".to_string()),
        ("max_days_old", query.max_days_old.to_string()),
    ];
    if query.remote {
        params.push(("remote", "1".to_string()));
    }
    HttpRequest::with_query(API_BASE, &params, TIMEOUT)
}

#[instrument(level = "info", skip(client, creds), fields(location = %query.location))]
pub async fn search<F: Fetch>(
    client: &F,
    creds: &Credentials,
    query: &SearchQuery,
) -> Result<Vec<RawPosting>, FetchError> {
    let response: AdzunaResponse = client.fetch_json(&search_request(creds, query)?).await?;
    let results: Vec<AdzunaResult> = decode_records(response.results, "adzuna");
    info!(count = results.len(), "Fetched Adzuna results");
    Ok(results.into_iter().map(RawPosting::Adzuna).collect())
}
