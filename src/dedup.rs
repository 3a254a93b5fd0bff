//! Deduplication across sources and against rows already in the README.

use crate::models::JobListing;
use crate::outputs::readme::ReadmeTable;
use clap::ValueEnum;
use itertools::Itertools;
use std::collections::HashSet;
use tracing::{debug, info};

/// Which field(s) decide that a posting is already listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DedupKey {
    /// Exact apply URL match.
    #[value(name = "url")]
    ApplyUrl,
    /// Case-insensitive company and title.
    #[value(name = "company-title")]
    CompanyTitle,
}

/// `lowercase(company|title)`.
pub fn listing_key(company: &str, title: &str) -> String {
    format!("{company}|{title}").to_lowercase()
}

/// Drop later postings with the same company and title; the first source wins.
pub fn dedup_across_sources(listings: Vec<JobListing>) -> Vec<JobListing> {
    let before = listings.len();
    let unique: Vec<JobListing> = listings
        .into_iter()
        .unique_by(|l| listing_key(&l.company, &l.title))
        .collect();
    let removed = before - unique.len();
    if removed > 0 {
        info!(removed, "Removed duplicates across sources");
    }
    unique
}

/// Keys already present in the README.
#[derive(Debug, Default, Clone)]
pub struct ExistingKeys {
    urls: HashSet<String>,
    pairs: HashSet<String>,
}

impl ExistingKeys {
    pub fn from_table(table: &ReadmeTable) -> Self {
        let pairs = table
            .rows()
            .iter()
            .filter_map(|row| {
                let (company, title) = (row.company(), row.title());
                (!company.is_empty() && !title.is_empty()).then(|| listing_key(&company, &title))
            })
            .collect();
        Self {
            urls: table.apply_urls(),
            pairs,
        }
    }

    /// Returns true and records the listing when it is not yet known.
    ///
    /// Under [`DedupKey::ApplyUrl`] a listing without a URL falls back to
    /// its company and title.
    fn insert(&mut self, listing: &JobListing, key: DedupKey) -> bool {
        let pair = listing_key(&listing.company, &listing.title);
        match (key, listing.apply_url.as_deref()) {
            (DedupKey::ApplyUrl, Some(url)) => {
                let fresh = self.urls.insert(url.to_string());
                if fresh {
                    self.pairs.insert(pair);
                }
                fresh
            }
            _ => {
                let fresh = self.pairs.insert(pair);
                if fresh {
                    if let Some(url) = &listing.apply_url {
                        self.urls.insert(url.clone());
                    }
                }
                fresh
            }
        }
    }
}

/// Keep only listings not already in the README (nor earlier in the batch).
pub fn retain_new(
    listings: Vec<JobListing>,
    existing: &mut ExistingKeys,
    key: DedupKey,
) -> Vec<JobListing> {
    let before = listings.len();
    let fresh: Vec<JobListing> = listings
        .into_iter()
        .filter(|l| {
            let keep = existing.insert(l, key);
            if !keep {
                debug!(company = %l.company, title = %l.title, "Already listed");
            }
            keep
        })
        .collect();
    info!(
        kept = fresh.len(),
        skipped = before - fresh.len(),
        ?key,
        "Deduplicated against README"
    );
    fresh
}
