//! Data models for job postings and their raw provider representations.
//!
//! This module defines the core data structures used throughout the application:
//! - [`JobListing`]: A normalized posting, the unit every pipeline stage works on
//! - [`RawPosting`]: Tagged union over the raw provider shapes
//! - Provider shapes: [`GreenhouseJob`], [`LeverPosting`], [`AdzunaResult`]
//!
//! Provider payloads are decoded tolerantly: every field is optional and a
//! record that fails to decode is logged and skipped rather than failing the
//! whole batch (see [`decode_records`]).

use crate::dates::format_date_posted;
use crate::location::{normalize_location, LocationPolicy};
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// A job posting normalized from any source.
///
/// Listings are built once by [`RawPosting::into_listing`] or by the GitHub
/// listing parser and are not mutated afterwards; location normalization
/// produces a new value via [`JobListing::with_normalized_location`].
///
/// # Fields
///
/// * `location` - The display location (normalized once the pipeline has run)
/// * `raw_location` - The location exactly as the provider reported it
/// * `date_posted` - The provider's raw date value, rendered on output
/// * `description` - Only consulted by the relevance filter, never written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobListing {
    pub company: String,
    pub title: String,
    pub location: String,
    pub raw_location: String,
    pub apply_url: Option<String>,
    pub date_posted: String,
    pub source: String,
    pub closed: bool,
    pub description: String,
}

impl JobListing {
    /// Build a listing whose display location equals the raw location.
    pub fn new(
        company: impl Into<String>,
        title: impl Into<String>,
        location: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let location = location.into();
        Self {
            company: company.into(),
            title: title.into(),
            raw_location: location.clone(),
            location,
            apply_url: None,
            date_posted: String::new(),
            source: source.into(),
            closed: false,
            description: String::new(),
        }
    }

    pub fn with_apply_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.apply_url = if url.trim().is_empty() { None } else { Some(url) };
        self
    }

    pub fn with_date_posted(mut self, date: impl Into<String>) -> Self {
        self.date_posted = date.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    /// Run the location normalizer over the raw location.
    ///
    /// An empty `location` on the result means nothing relevant remained.
    pub fn with_normalized_location(self, policy: &LocationPolicy) -> Self {
        let location = normalize_location(&self.raw_location, policy);
        Self { location, ..self }
    }

    /// `MM/DD/YYYY` rendering of the posting date relative to `now`.
    pub fn date_display(&self, now: NaiveDateTime) -> String {
        format_date_posted(&self.date_posted, now)
    }
}

impl fmt::Display for JobListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.company, self.title, self.location)
    }
}

/// Raw posting as returned by one of the job-board APIs.
#[derive(Debug, Clone)]
pub enum RawPosting {
    Greenhouse(GreenhouseJob),
    Lever(LeverPosting),
    Adzuna(AdzunaResult),
}

impl RawPosting {
    /// Map a raw provider record to a [`JobListing`].
    ///
    /// `company` is the configured display name; Adzuna records carry their
    /// own company and only fall back to it when the field is missing.
    pub fn into_listing(self, company: &str) -> JobListing {
        match self {
            RawPosting::Greenhouse(job) => {
                let location = match job.location {
                    Some(GreenhouseLocation::Named { name }) => name.unwrap_or_default(),
                    Some(GreenhouseLocation::Plain(name)) => name,
                    None => String::new(),
                };
                JobListing::new(company, job.title.unwrap_or_default(), location, "greenhouse")
                    .with_apply_url(job.absolute_url.unwrap_or_default())
                    .with_date_posted(job.updated_at.or(job.created_at).unwrap_or_default())
                    .with_description(job.content.unwrap_or_default())
            }
            RawPosting::Lever(posting) => {
                let location = posting
                    .categories
                    .and_then(|c| c.location)
                    .filter(|l| !l.is_empty())
                    .or(posting.workplace_type)
                    .unwrap_or_default();
                let date = posting
                    .created_at
                    .or(posting.updated_at)
                    .map(|t| t.to_string())
                    .unwrap_or_default();
                JobListing::new(company, posting.text.unwrap_or_default(), location, "lever")
                    .with_apply_url(posting.hosted_url.or(posting.apply_url).unwrap_or_default())
                    .with_date_posted(date)
                    .with_description(
                        posting
                            .description_plain
                            .or(posting.description)
                            .unwrap_or_default(),
                    )
            }
            RawPosting::Adzuna(result) => {
                let company = result
                    .company
                    .and_then(|c| c.display_name)
                    .unwrap_or_else(|| company.to_string());
                let location = result
                    .location
                    .and_then(|l| l.display_name)
                    .unwrap_or_default();
                JobListing::new(company, result.title.unwrap_or_default(), location, "adzuna")
                    .with_apply_url(result.redirect_url.unwrap_or_default())
                    .with_date_posted(result.created.unwrap_or_default())
                    .with_description(result.description.unwrap_or_default())
            }
        }
    }
}

/// `GET /v1/boards/{slug}/jobs` response body.
#[derive(Debug, Default, Deserialize)]
pub struct GreenhouseBoard {
    #[serde(default)]
    pub jobs: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GreenhouseJob {
    pub title: Option<String>,
    pub absolute_url: Option<String>,
    pub location: Option<GreenhouseLocation>,
    pub updated_at: Option<String>,
    pub created_at: Option<String>,
    pub content: Option<String>,
}

/// Greenhouse usually sends `{"name": ...}`, older boards a plain string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GreenhouseLocation {
    Named { name: Option<String> },
    Plain(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverPosting {
    pub text: Option<String>,
    pub hosted_url: Option<String>,
    pub apply_url: Option<String>,
    pub categories: Option<LeverCategories>,
    pub workplace_type: Option<String>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub description_plain: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeverCategories {
    pub location: Option<String>,
}

/// Lever timestamps are epoch milliseconds, occasionally strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Millis(ms) => write!(f, "{ms}"),
            Timestamp::Text(s) => f.write_str(s),
        }
    }
}

/// Adzuna search response body.
#[derive(Debug, Default, Deserialize)]
pub struct AdzunaResponse {
    #[serde(default)]
    pub results: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdzunaResult {
    pub title: Option<String>,
    pub redirect_url: Option<String>,
    pub location: Option<DisplayName>,
    pub company: Option<DisplayName>,
    pub created: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayName {
    pub display_name: Option<String>,
}

/// Decode each JSON record independently, skipping the ones that do not fit.
pub fn decode_records<T: DeserializeOwned>(records: Vec<Value>, provider: &str) -> Vec<T> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(provider, index, error = %e, "Skipping undecodable record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_greenhouse_mapping() {
        let job: GreenhouseJob = serde_json::from_value(json!({
            "title": "Software Engineering Intern",
            "absolute_url": "https://boards.greenhouse.io/acme/jobs/1",
            "location": {"name": "Boston, MA"},
            "updated_at": "2025-10-17T08:00:00-04:00",
            "created_at": "2025-10-01T08:00:00-04:00",
            "content": "&lt;p&gt;Summer internship&lt;/p&gt;"
        }))
        .unwrap();

        let listing = RawPosting::Greenhouse(job).into_listing("Acme");
        assert_eq!(listing.company, "Acme");
        assert_eq!(listing.title, "Software Engineering Intern");
        assert_eq!(listing.location, "Boston, MA");
        assert_eq!(
            listing.apply_url.as_deref(),
            Some("https://boards.greenhouse.io/acme/jobs/1")
        );
        assert_eq!(listing.date_posted, "2025-10-17T08:00:00-04:00");
        assert_eq!(listing.source, "greenhouse");
    }

    #[test]
    fn test_greenhouse_plain_location_and_created_fallback() {
        let job: GreenhouseJob = serde_json::from_value(json!({
            "title": "Intern",
            "location": "Cambridge, MA",
            "created_at": "2025-09-30"
        }))
        .unwrap();

        let listing = RawPosting::Greenhouse(job).into_listing("Acme");
        assert_eq!(listing.location, "Cambridge, MA");
        assert_eq!(listing.date_posted, "2025-09-30");
        assert_eq!(listing.apply_url, None);
    }

    #[test]
    fn test_lever_mapping_prefers_hosted_url_and_created_at() {
        let posting: LeverPosting = serde_json::from_value(json!({
            "text": "Backend Intern",
            "hostedUrl": "https://jobs.lever.co/globex/abc",
            "applyUrl": "https://jobs.lever.co/globex/abc/apply",
            "categories": {"location": "Somerville, MA"},
            "createdAt": 1760659200000i64,
            "updatedAt": 1760000000000i64,
            "descriptionPlain": "Internship on the platform team"
        }))
        .unwrap();

        let listing = RawPosting::Lever(posting).into_listing("Globex");
        assert_eq!(listing.apply_url.as_deref(), Some("https://jobs.lever.co/globex/abc"));
        assert_eq!(listing.location, "Somerville, MA");
        assert_eq!(listing.date_posted, "1760659200000");
        assert_eq!(listing.description, "Internship on the platform team");
        assert_eq!(listing.source, "lever");
    }

    #[test]
    fn test_lever_workplace_type_fallback() {
        let posting: LeverPosting = serde_json::from_value(json!({
            "text": "Data Intern",
            "applyUrl": "https://jobs.lever.co/globex/def/apply",
            "workplaceType": "remote",
            "updatedAt": "2025-10-01"
        }))
        .unwrap();

        let listing = RawPosting::Lever(posting).into_listing("Globex");
        assert_eq!(listing.location, "remote");
        assert_eq!(listing.date_posted, "2025-10-01");
        assert_eq!(
            listing.apply_url.as_deref(),
            Some("https://jobs.lever.co/globex/def/apply")
        );
    }

    #[test]
    fn test_adzuna_mapping_uses_record_company() {
        let result: AdzunaResult = serde_json::from_value(json!({
            "title": "Research Intern",
            "redirect_url": "https://www.adzuna.com/land/ad/1",
            "location": {"display_name": "Boston, Suffolk County"},
            "company": {"display_name": "Initech"},
            "created": "2025-10-18T10:00:00Z",
            "description": "Internship"
        }))
        .unwrap();

        let listing = RawPosting::Adzuna(result).into_listing("unused");
        assert_eq!(listing.company, "Initech");
        assert_eq!(listing.location, "Boston, Suffolk County");
        assert_eq!(listing.source, "adzuna");
    }

    #[test]
    fn test_decode_records_skips_bad_rows() {
        let records = vec![
            json!({"title": "Intern"}),
            json!({"title": 42}),
            json!({"title": "Co-op", "location": null}),
        ];
        let jobs: Vec<GreenhouseJob> = decode_records(records, "greenhouse");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].title.as_deref(), Some("Co-op"));
    }

    #[test]
    fn test_normalized_location_keeps_raw() {
        let listing = JobListing::new("Acme", "Intern", "BostonMA", "greenhouse")
            .with_normalized_location(&LocationPolicy::default());
        assert_eq!(listing.location, "Boston, MA");
        assert_eq!(listing.raw_location, "BostonMA");
    }

    #[test]
    fn test_empty_apply_url_is_none() {
        let listing = JobListing::new("Acme", "Intern", "Boston", "x").with_apply_url("  ");
        assert_eq!(listing.apply_url, None);
    }
}
