//! Lever postings API: `GET https://api.lever.co/v0/postings/{slug}?mode=json`
//! returns a bare JSON array.

use crate::api::{Fetch, FetchError, HttpRequest};
use crate::models::{decode_records, LeverPosting, RawPosting};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, instrument};

pub const API_BASE: &str = "https://api.lever.co/v0/postings";
pub const TIMEOUT: Duration = Duration::from_secs(10);

pub fn postings_url(slug: &str) -> String {
    format!("{API_BASE}/{}?mode=json", urlencoding::encode(slug))
}

#[instrument(level = "info", skip(client))]
pub async fn fetch_jobs<F: Fetch>(client: &F, slug: &str) -> Result<Vec<RawPosting>, FetchError> {
    let records: Vec<Value> = client
        .fetch_json(&HttpRequest::get(postings_url(slug), TIMEOUT))
        .await?;
    let postings: Vec<LeverPosting> = decode_records(records, "lever");
    info!(count = postings.len(), "Fetched Lever postings");
    Ok(postings.into_iter().map(RawPosting::Lever).collect())
}

pub async fn board_exists<F: Fetch>(client: &F, slug: &str) -> bool {
    client
        .fetch(&HttpRequest::get(postings_url(slug), TIMEOUT))
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedFetcher;

    #[tokio::test]
    async fn test_fetch_jobs() {
        let fetcher = ScriptedFetcher::new().reply(
            &postings_url("globex"),
            r#"[{"text": "Backend Intern", "hostedUrl": "https://jobs.lever.co/globex/1",
                 "categories": {"location": "Remote - US", "team": "Eng"}, "createdAt": 1760659200000}]"#,
        );
        let jobs = fetch_jobs(&fetcher, "globex").await.unwrap();
        assert_eq!(jobs.len(), 1);
        let listing = jobs.into_iter().next().unwrap().into_listing("Globex");
        assert_eq!(listing.location, "Remote - US");
        assert_eq!(listing.date_posted, "1760659200000");
    }

    #[tokio::test]
    async fn test_object_body_is_a_decode_error() {
        let fetcher =
            ScriptedFetcher::new().reply(&postings_url("globex"), r#"{"ok": false}"#);
        let err = fetch_jobs(&fetcher, "globex").await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }
}
