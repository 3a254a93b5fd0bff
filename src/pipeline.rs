//! One sequential pipeline per subcommand.
//!
//! ```text
//! fetch -> normalize record -> normalize location -> relevance filter
//!       -> cross-source dedup -> dedup against README -> sort -> write
//! ```
//!
//! Per-source failures are logged and skipped; README and config I/O errors
//! are returned to `main`.

use crate::api::Fetch;
use crate::config::{merge_companies, AppConfig, CompanyConfig, ConfigError, Provider};
use crate::dates::sort_key;
use crate::dedup::{dedup_across_sources, retain_new, DedupKey, ExistingKeys};
use crate::location::LocationPolicy;
use crate::models::{JobListing, RawPosting};
use crate::outputs::readme::{ReadmeTable, TableError, TableRow};
use crate::outputs::{email, report};
use crate::relevance::{is_excluded_product_role, is_intern_role, title_matches_keywords};
use crate::scrapers::github::{self, ListingSource};
use crate::scrapers::{adzuna, greenhouse, lever, serpapi};
use chrono::NaiveDateTime;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Options shared by every README-writing subcommand.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub readme: PathBuf,
    pub dry_run: bool,
    pub dedup_key: DedupKey,
    pub now: NaiveDateTime,
}

/// Outcome of merging a batch into the README.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub candidates: usize,
    pub added: usize,
    pub skipped: usize,
}

/// Newest first by rendered date, then by company.
fn sort_newest_first(listings: &mut [JobListing], now: NaiveDateTime) {
    listings.sort_by_cached_key(|l| (Reverse(sort_key(&l.date_display(now))), l.company.to_lowercase()));
}

/// Location, keyword and seniority gates for a job-board posting.
pub fn keep_board_listing(listing: &JobListing, company: &CompanyConfig) -> bool {
    !listing.location.is_empty()
        && title_matches_keywords(&listing.title, &company.include_keywords, &company.exclude_keywords)
        && is_intern_role(&listing.title, &listing.description)
}

async fn fetch_company<F: Fetch>(client: &F, company: &CompanyConfig) -> Option<Vec<RawPosting>> {
    let result = match company.provider {
        Provider::Greenhouse => greenhouse::fetch_jobs(client, &company.slug).await,
        Provider::Lever => lever::fetch_jobs(client, &company.slug).await,
        Provider::Unsupported => {
            warn!(company = %company.name, "Unsupported provider; skipping");
            return None;
        }
    };
    match result {
        Ok(raw) => Some(raw),
        Err(e) => {
            warn!(company = %company.name, slug = %company.slug, status = ?e.status_code(), error = %e, "Fetch failed; skipping company");
            None
        }
    }
}

/// Poll every company board and keep the relevant internships.
#[instrument(level = "info", skip_all, fields(companies = companies.len()))]
pub async fn collect_board_listings<F: Fetch>(
    client: &F,
    companies: &[CompanyConfig],
    policy: &LocationPolicy,
) -> Vec<JobListing> {
    let mut kept = Vec::new();
    for (idx, company) in companies.iter().enumerate() {
        info!(
            index = idx + 1,
            total = companies.len(),
            company = %company.name,
            provider = company.provider.as_str(),
            "Fetching board"
        );
        let Some(raw) = fetch_company(client, company).await else {
            continue;
        };
        let fetched = raw.len();
        let before = kept.len();
        kept.extend(
            raw.into_iter()
                .map(|r| r.into_listing(&company.name).with_normalized_location(policy))
                .filter(|l| keep_board_listing(l, company)),
        );
        info!(company = %company.name, fetched, kept = kept.len() - before, "Filtered board");
    }
    kept
}

/// Cross-source dedup, README dedup, sort, and insert beneath the separator.
#[instrument(level = "info", skip_all, fields(readme = %opts.readme.display()))]
pub async fn publish(
    listings: Vec<JobListing>,
    opts: &RunOptions,
) -> Result<PublishSummary, TableError> {
    let candidates = listings.len();
    let listings = dedup_across_sources(listings);

    let mut table = ReadmeTable::load(&opts.readme).await?;
    let mut existing = ExistingKeys::from_table(&table);
    let mut fresh = retain_new(listings, &mut existing, opts.dedup_key);
    sort_newest_first(&mut fresh, opts.now);

    let summary = PublishSummary {
        candidates,
        added: fresh.len(),
        skipped: candidates - fresh.len(),
    };

    if fresh.is_empty() {
        info!("No new jobs to add");
        return Ok(summary);
    }

    for listing in fresh.iter().take(10) {
        info!(%listing, date = %listing.date_display(opts.now), source = %listing.source, "New job");
    }

    if opts.dry_run {
        info!(would_add = fresh.len(), "Dry run; README left untouched");
        return Ok(summary);
    }

    let rows = fresh
        .iter()
        .map(|l| TableRow::from_listing(l, opts.now))
        .collect();
    table.prepend_rows(rows);
    table.save(&opts.readme).await?;
    info!(added = summary.added, skipped = summary.skipped, "README updated");
    Ok(summary)
}

/// Write the dated report and mail it when SMTP is configured.
async fn write_daily_report(
    listings: &[JobListing],
    out_dir: &Path,
    opts: &RunOptions,
) -> Result<(), Box<dyn Error>> {
    let date = opts.now.date().format("%Y-%m-%d").to_string();
    let body = report::render_report(&date, listings, opts.now);
    if opts.dry_run {
        debug!(bytes = body.len(), "Dry run; report not written");
        return Ok(());
    }
    report::write_report(out_dir, &date, &body).await?;
    email::send_report(&report::report_title(&date), &body).await;
    Ok(())
}

/// `boards`: Greenhouse and Lever boards from the config file.
pub async fn run_boards<F: Fetch>(
    client: &F,
    config: &AppConfig,
    include_remote: bool,
    out_dir: &Path,
    opts: &RunOptions,
) -> Result<PublishSummary, Box<dyn Error>> {
    let policy = config.location_policy(include_remote);
    let companies = config.pollable_companies();
    let mut listings = collect_board_listings(client, &companies, &policy).await;
    sort_newest_first(&mut listings, opts.now);
    info!(count = listings.len(), companies = companies.len(), "Collected board listings");

    write_daily_report(&listings, out_dir, opts).await?;
    Ok(publish(listings, opts).await?)
}

/// `adzuna`: one Adzuna search page.
pub async fn run_adzuna<F: Fetch>(
    client: &F,
    creds: &adzuna::Credentials,
    query: &adzuna::SearchQuery,
    policy: &LocationPolicy,
    out_dir: &Path,
    opts: &RunOptions,
) -> Result<PublishSummary, Box<dyn Error>> {
    let raw = match adzuna::search(client, creds, query).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(status = ?e.status_code(), error = %e, "Adzuna search failed");
            Vec::new()
        }
    };
    let fetched = raw.len();
    let mut listings: Vec<JobListing> = raw
        .into_iter()
        .map(|r| r.into_listing("").with_normalized_location(policy))
        .filter(|l| !l.location.is_empty() && is_intern_role(&l.title, &l.description))
        .collect();
    sort_newest_first(&mut listings, opts.now);
    info!(fetched, kept = listings.len(), "Filtered Adzuna results");

    write_daily_report(&listings, out_dir, opts).await?;
    Ok(publish(listings, opts).await?)
}

/// Keep listings with a relevant location and drop product-manager roles.
pub fn keep_github_listing(listing: &JobListing) -> bool {
    !listing.closed && !listing.location.is_empty() && !is_excluded_product_role(&listing.title)
}

/// `github`: community README listings.
pub async fn run_github<F: Fetch>(
    client: &F,
    sources: &[ListingSource],
    policy: &LocationPolicy,
    opts: &RunOptions,
) -> Result<PublishSummary, TableError> {
    let mut all = Vec::new();
    for source in sources {
        info!(source = source.name, repo = %format!("{}/{}", source.owner, source.repo), "Fetching listing");
        match github::fetch_readme(client, source).await {
            Ok(content) => {
                let parsed = github::parse_listings(&content, source.name);
                let fetched = parsed.len();
                let before = all.len();
                all.extend(
                    parsed
                        .into_iter()
                        .map(|l| l.with_normalized_location(policy))
                        .filter(keep_github_listing),
                );
                info!(source = source.name, fetched, kept = all.len() - before, "Filtered listing");
            }
            Err(e) => warn!(source = source.name, error = %e, "Could not fetch listing"),
        }
    }
    publish(all, opts).await
}

/// Settings for `discover`.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub queries: Vec<String>,
    pub config_path: PathBuf,
    pub include_remote: bool,
    pub query_delay: Duration,
}

async fn board_exists<F: Fetch>(client: &F, provider: Provider, slug: &str) -> bool {
    match provider {
        Provider::Greenhouse => greenhouse::board_exists(client, slug).await,
        Provider::Lever => lever::board_exists(client, slug).await,
        Provider::Unsupported => false,
    }
}

/// Search for boards, validate each slug once, and return the valid ones.
#[instrument(level = "info", skip_all, fields(queries = queries.len()))]
pub async fn discover_boards<F: Fetch>(
    client: &F,
    api_key: &str,
    queries: &[String],
    query_delay: Duration,
) -> BTreeSet<(Provider, String)> {
    let mut valid = BTreeSet::new();
    let mut checked = BTreeSet::new();

    for (idx, query) in queries.iter().enumerate() {
        if idx > 0 && !query_delay.is_zero() {
            sleep(query_delay).await;
        }
        let links = match serpapi::search(client, api_key, query).await {
            Ok(links) => links,
            Err(e) => {
                warn!(%query, error = %e, "Search failed; skipping query");
                continue;
            }
        };
        for board in links.iter().filter_map(|l| serpapi::board_for_link(l)) {
            if !checked.insert(board.clone()) {
                continue;
            }
            if board_exists(client, board.0, &board.1).await {
                debug!(provider = board.0.as_str(), slug = %board.1, "Valid board");
                valid.insert(board);
            }
        }
    }
    info!(found = valid.len(), "Discovery complete");
    valid
}

/// `discover`: find new boards, merge them into the config, then run the
/// boards pipeline over just the new companies.
pub async fn run_discover<F: Fetch>(
    client: &F,
    api_key: &str,
    discover: &DiscoverOptions,
    opts: &RunOptions,
) -> Result<PublishSummary, Box<dyn Error>> {
    let found = discover_boards(client, api_key, &discover.queries, discover.query_delay).await;
    for provider in [Provider::Greenhouse, Provider::Lever] {
        let slugs: Vec<&str> = found
            .iter()
            .filter(|(p, _)| *p == provider)
            .map(|(_, s)| s.as_str())
            .collect();
        info!(provider = provider.as_str(), ?slugs, "Discovered slugs");
    }

    let added = if opts.dry_run {
        found
            .iter()
            .map(|(p, s)| CompanyConfig::discovered(*p, s))
            .collect()
    } else {
        merge_companies(&discover.config_path, &found).await?
    };
    if added.is_empty() {
        info!("No newly discovered companies");
        return Ok(PublishSummary::default());
    }

    let config = match crate::config::load_config(&discover.config_path).await {
        Ok(config) => config,
        Err(ConfigError::Read { .. }) if opts.dry_run => AppConfig::default(),
        Err(e) => return Err(e.into()),
    };
    let policy = config.location_policy(discover.include_remote || config.include_remote);
    let listings = collect_board_listings(client, &added, &policy).await;
    Ok(publish(listings, opts).await?)
}

/// `fix-locations`: re-run the normalizer over the README's location column.
#[instrument(level = "info", skip_all, fields(readme = %readme.display()))]
pub async fn run_fix_locations(
    readme: &Path,
    policy: &LocationPolicy,
    dry_run: bool,
) -> Result<usize, TableError> {
    let mut table = ReadmeTable::load(readme).await?;
    let changed = table.fix_locations(policy);
    info!(changed, rows = table.len(), "Normalized README locations");
    if changed > 0 && !dry_run {
        table.save(readme).await?;
    }
    Ok(changed)
}

/// `sort`: order README rows newest first.
#[instrument(level = "info", skip_all, fields(readme = %readme.display()))]
pub async fn run_sort(readme: &Path, dry_run: bool) -> Result<usize, TableError> {
    let mut table = ReadmeTable::load(readme).await?;
    table.sort_by_date();
    if !dry_run {
        table.save(readme).await?;
    }
    info!(rows = table.len(), "Sorted README by date");
    Ok(table.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{instant_policy, ScriptedFetcher};
    use crate::api::Retrying;
    use crate::outputs::readme::{HEADER, SEPARATOR};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn opts(readme: PathBuf, key: DedupKey) -> RunOptions {
        RunOptions {
            readme,
            dry_run: false,
            dedup_key: key,
            now: now(),
        }
    }

    fn config(yaml: &str) -> AppConfig {
        AppConfig::from_yaml(yaml, Path::new("companies.yml")).unwrap()
    }

    const CONFIG: &str = r#"
companies:
  - {name: Acme, provider: greenhouse, slug: acme}
  - {name: Globex, provider: lever, slug: globex}
  - {name: Broken, provider: greenhouse, slug: broken}
include_remote: false
"#;

    const ACME_BOARD: &str = r#"{"jobs": [
        {"title": "Software Engineering Intern", "absolute_url": "https://acme.io/1",
         "location": {"name": "BostonMA"}, "updated_at": "2025-10-15T00:00:00Z"},
        {"title": "Senior Backend Engineer Intern", "absolute_url": "https://acme.io/2",
         "location": {"name": "Boston, MA"}, "updated_at": "2025-10-16T00:00:00Z"},
        {"title": "Software Engineering Intern, Austin", "absolute_url": "https://acme.io/3",
         "location": {"name": "Austin, TX"}, "updated_at": "2025-10-16T00:00:00Z"},
        {"title": "Accountant", "absolute_url": "https://acme.io/4",
         "location": {"name": "Boston, MA"}}
    ]}"#;

    const GLOBEX_POSTINGS: &str = r#"[
        {"text": "Backend Intern", "hostedUrl": "https://jobs.lever.co/globex/1",
         "categories": {"location": "Cambridge, MA"}, "createdAt": 1760659200000},
        {"text": "Platform Intern", "hostedUrl": "https://jobs.lever.co/globex/2",
         "categories": {"location": "Remote"}, "createdAt": 1760659200000}
    ]"#;

    fn board_fetcher() -> Retrying<ScriptedFetcher> {
        let fetcher = ScriptedFetcher::new()
            .reply(&greenhouse::board_url("acme"), ACME_BOARD)
            .reply(&lever::postings_url("globex"), GLOBEX_POSTINGS)
            .fail(&greenhouse::board_url("broken"), 500);
        Retrying::new(fetcher, instant_policy())
    }

    #[tokio::test]
    async fn test_boards_pipeline_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let readme = tmp.path().join("README.md");
        let out_dir = tmp.path().join("reports");
        let existing = format!(
            "# Jobs\n\n{HEADER}\n{SEPARATOR}\n| Old | Intern | Boston, MA | 01/01/2025 | [APPLY](https://old.io/1) |\n"
        );
        tokio::fs::write(&readme, &existing).await.unwrap();

        let summary = run_boards(
            &board_fetcher(),
            &config(CONFIG),
            false,
            &out_dir,
            &opts(readme.clone(), DedupKey::ApplyUrl),
        )
        .await
        .unwrap();
        assert_eq!(summary.added, 2);

        let text = tokio::fs::read_to_string(&readme).await.unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[4], "| Globex | Backend Intern | Cambridge, MA | 10/17/2025 | [APPLY](https://jobs.lever.co/globex/1) |");
        assert_eq!(lines[5], "| Acme | Software Engineering Intern | Boston, MA | 10/15/2025 | [APPLY](https://acme.io/1) |");
        assert_eq!(lines[6], "| Old | Intern | Boston, MA | 01/01/2025 | [APPLY](https://old.io/1) |");
        assert!(!text.contains("Platform Intern"));
        assert!(!text.contains("Senior"));

        let report = tokio::fs::read_to_string(out_dir.join("jobs-2025-10-20.md"))
            .await
            .unwrap();
        assert!(report.contains("[Backend Intern](https://jobs.lever.co/globex/1)"));

        // A second run adds nothing.
        let again = run_boards(
            &board_fetcher(),
            &config(CONFIG),
            false,
            &out_dir,
            &opts(readme.clone(), DedupKey::ApplyUrl),
        )
        .await
        .unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(tokio::fs::read_to_string(&readme).await.unwrap(), text);
    }

    #[tokio::test]
    async fn test_boards_include_remote() {
        let tmp = tempfile::tempdir().unwrap();
        let readme = tmp.path().join("README.md");
        let mut options = opts(readme.clone(), DedupKey::ApplyUrl);
        options.dry_run = true;

        let summary = run_boards(&board_fetcher(), &config(CONFIG), true, tmp.path(), &options)
            .await
            .unwrap();
        assert_eq!(summary.added, 3);
        assert!(!readme.exists());
    }

    #[tokio::test]
    async fn test_github_pipeline_dedups_across_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let readme = tmp.path().join("README.md");
        let sources = [
            ListingSource { name: "one", owner: "o", repo: "r1", url: "https://raw.example/one" },
            ListingSource { name: "two", owner: "o", repo: "r2", url: "https://raw.example/two" },
            ListingSource { name: "gone", owner: "o", repo: "r3", url: "https://raw.example/gone" },
        ];
        let md_one = "| Company | Role | Location | Link | Age |\n|---|---|---|---|---|\n| Acme | Software Intern | Boston, MA | [Apply](https://a.io/1) | 2d |\n| Acme | PM Intern, Product Manager | Boston, MA | [Apply](https://a.io/2) | 2d |\n| Hooli | ML Intern | London, UK | [Apply](https://h.io/1) | 1d |\n| Umbrella 🔒 | Backend Intern | Boston, MA | | 1d |\n";
        let md_two = "| Company | Role | Location | Link | Age |\n|---|---|---|---|---|\n| ACME | software intern | Cambridge, MA | [Apply](https://a.io/9) | 1d |\n| Initech | QA Intern | Remote in USA | [Apply](https://i.io/1) | 5d |\n";
        let fetcher = ScriptedFetcher::new()
            .reply("https://raw.example/one", md_one)
            .reply("https://raw.example/two", md_two);

        let summary = run_github(
            &fetcher,
            &sources,
            &LocationPolicy::boston(true),
            &opts(readme.clone(), DedupKey::CompanyTitle),
        )
        .await
        .unwrap();
        assert_eq!(summary.added, 2);

        let table = ReadmeTable::load(&readme).await.unwrap();
        let companies: Vec<String> = table.rows().iter().map(|r| r.company()).collect();
        assert_eq!(companies, vec!["Acme", "Initech"]);
        assert_eq!(table.rows()[0].location(), "Boston, MA");
        assert_eq!(table.rows()[1].location(), "Remote in USA");
    }

    #[tokio::test]
    async fn test_discover_merges_and_fetches_new_boards() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("companies.yml");
        tokio::fs::write(&config_path, "companies:\n  - {name: Globex, provider: lever, slug: globex}\n")
            .await
            .unwrap();
        let readme = tmp.path().join("README.md");

        let fetcher = ScriptedFetcher::new()
            .reply(
                serpapi::ENDPOINT,
                r#"{"organic_results": [
                    {"link": "https://boards.greenhouse.io/acme/jobs/1"},
                    {"link": "https://boards.greenhouse.io/acme/jobs/2"},
                    {"link": "https://jobs.lever.co/globex/abc"},
                    {"link": "https://jobs.lever.co/ghost/xyz"}
                ]}"#,
            )
            .reply(&greenhouse::board_url("acme"), ACME_BOARD)
            .reply(&lever::postings_url("globex"), GLOBEX_POSTINGS);

        let discover = DiscoverOptions {
            queries: vec![r#"site:boards.greenhouse.io "Boston" intern"#.to_string()],
            config_path: config_path.clone(),
            include_remote: false,
            query_delay: Duration::ZERO,
        };
        let summary = run_discover(&fetcher, "key", &discover, &opts(readme.clone(), DedupKey::ApplyUrl))
            .await
            .unwrap();
        assert_eq!(summary.added, 1);

        let config = crate::config::load_config(&config_path).await.unwrap();
        let slugs: Vec<&str> = config.companies.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, vec!["globex", "acme"]);
        assert_eq!(config.companies[1].name, "Acme");

        // acme validated once, globex validated, ghost rejected, acme fetched again for jobs.
        let acme_calls = fetcher
            .urls()
            .iter()
            .filter(|u| **u == greenhouse::board_url("acme"))
            .count();
        assert_eq!(acme_calls, 2);
        assert!(tokio::fs::read_to_string(&readme).await.unwrap().contains("https://acme.io/1"));
    }

    #[tokio::test]
    async fn test_publish_twice_with_piped_title_adds_once() {
        let tmp = tempfile::tempdir().unwrap();
        let readme = tmp.path().join("README.md");
        let options = opts(readme.clone(), DedupKey::CompanyTitle);
        let batch = || {
            vec![JobListing::new("Acme", "Software Engineer Intern | Summer 2026", "Boston, MA", "SimplifyJobs")
                .with_apply_url("https://a.io/1")]
        };

        let first = publish(batch(), &options).await.unwrap();
        let second = publish(batch(), &options).await.unwrap();
        assert_eq!(first.added, 1);
        assert_eq!(second.added, 0);

        let table = ReadmeTable::load(&readme).await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.rows()[0].raw(),
            "| Acme | Software Engineer Intern \\| Summer 2026 | Boston, MA | N/A | [APPLY](https://a.io/1) |"
        );
    }

    #[tokio::test]
    async fn test_fix_locations_and_sort() {
        let tmp = tempfile::tempdir().unwrap();
        let readme = tmp.path().join("README.md");
        tokio::fs::write(
            &readme,
            format!("{HEADER}\n{SEPARATOR}\n| A | Intern | BostonMA | 10/01/2025 | |\n| B | Intern | Cambridge, MA | 10/10/2025 | |\n"),
        )
        .await
        .unwrap();

        let changed = run_fix_locations(&readme, &LocationPolicy::boston(true), false)
            .await
            .unwrap();
        assert_eq!(changed, 1);
        run_sort(&readme, false).await.unwrap();

        let table = ReadmeTable::load(&readme).await.unwrap();
        assert_eq!(table.rows()[0].company(), "B");
        assert_eq!(table.rows()[1].location(), "Boston, MA");
    }

    #[tokio::test]
    async fn test_sort_dry_run_leaves_file() {
        let tmp = tempfile::tempdir().unwrap();
        let readme = tmp.path().join("README.md");
        let content = format!("{HEADER}\n{SEPARATOR}\n| A | Intern | Boston | N/A | |\n| B | Intern | Boston | 10/10/2025 | |\n");
        tokio::fs::write(&readme, &content).await.unwrap();
        run_sort(&readme, true).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&readme).await.unwrap(), content);
    }
}
