//! Command-line interface definitions.
//!
//! One subcommand per pipeline. Credentials can come from flags or from the
//! environment; every default is shown in `--help`.

use crate::config::{DEFAULT_CONFIG_PATH, DEFAULT_OUT_DIR};
use crate::dedup::DedupKey;
use crate::scrapers::{adzuna, serpapi};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Aggregate Boston-area and US-remote internships into a README table.
///
/// # Examples
///
/// ```sh
/// # Poll configured Greenhouse/Lever boards
/// intern_report boards --config config/companies.yml
///
/// # Pull community listings without touching the README
/// intern_report --dry-run github
///
/// # Find new boards and add them to the config
/// SERPAPI_KEY=... intern_report discover --cities "Boston,Cambridge" --max 20
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// README containing the job table
    #[arg(long, global = true, default_value = "README.md")]
    pub readme: PathBuf,

    /// Log what would change without writing any file
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Field deciding that a posting is already listed
    /// (default: url, or company-title for `github`)
    #[arg(long, global = true, value_enum)]
    pub dedup_key: Option<DedupKey>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Poll Greenhouse and Lever boards listed in the config file
    Boards {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Also keep US-remote postings
        #[arg(long)]
        include_remote: bool,

        /// Directory for the daily report (default: config `out_dir`)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run one Adzuna search
    Adzuna {
        /// Adzuna `what` query
        #[arg(long, default_value = adzuna::DEFAULT_WHAT, hide_default_value = true)]
        what: String,

        #[arg(long, default_value = adzuna::DEFAULT_LOCATION)]
        location: String,

        #[arg(long, default_value_t = adzuna::DEFAULT_MAX_DAYS_OLD)]
        max_days_old: u32,

        /// Ask Adzuna for remote postings and keep them
        #[arg(long)]
        include_remote: bool,

        #[arg(long, default_value = DEFAULT_OUT_DIR)]
        out: PathBuf,

        #[arg(long, env = "ADZUNA_APP_ID", hide_env_values = true)]
        app_id: Option<String>,

        #[arg(long, env = "ADZUNA_APP_KEY", hide_env_values = true)]
        app_key: Option<String>,
    },

    /// Pull community-maintained GitHub README listings
    Github {
        /// Drop US-remote postings
        #[arg(long)]
        no_remote: bool,
    },

    /// Search for new Greenhouse/Lever boards and add them to the config
    Discover {
        /// Comma-separated cities
        #[arg(long, default_value = serpapi::DEFAULT_CITIES)]
        cities: String,

        /// Space-separated keywords; the first ten are used per city
        #[arg(long, default_value = serpapi::DEFAULT_KEYWORDS, hide_default_value = true)]
        keywords: String,

        /// Maximum number of search queries
        #[arg(long, default_value_t = serpapi::DEFAULT_MAX_QUERIES)]
        max: usize,

        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Also keep US-remote postings from new boards
        #[arg(long)]
        include_remote: bool,

        #[arg(long, env = "SERPAPI_KEY", hide_env_values = true)]
        serpapi_key: Option<String>,
    },

    /// Re-normalize the Location column of the README
    FixLocations {
        /// Treat remote entries as irrelevant
        #[arg(long)]
        no_remote: bool,
    },

    /// Sort README rows newest first
    Sort,
}

impl Cli {
    /// The dedup key for this run, defaulting per subcommand.
    pub fn dedup_key(&self) -> DedupKey {
        self.dedup_key.unwrap_or(match self.command {
            Command::Github { .. } => DedupKey::CompanyTitle,
            _ => DedupKey::ApplyUrl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boards_defaults() {
        let cli = Cli::parse_from(["intern_report", "boards"]);
        assert_eq!(cli.readme, PathBuf::from("README.md"));
        assert!(!cli.dry_run);
        assert_eq!(cli.dedup_key(), DedupKey::ApplyUrl);
        match cli.command {
            Command::Boards { config, include_remote, out } => {
                assert_eq!(config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(!include_remote);
                assert!(out.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "intern_report",
            "github",
            "--readme",
            "/tmp/JOBS.md",
            "--dry-run",
            "--no-remote",
        ]);
        assert_eq!(cli.readme, PathBuf::from("/tmp/JOBS.md"));
        assert!(cli.dry_run);
        assert_eq!(cli.dedup_key(), DedupKey::CompanyTitle);
        assert!(matches!(cli.command, Command::Github { no_remote: true }));
    }

    #[test]
    fn test_dedup_key_override() {
        let cli = Cli::parse_from(["intern_report", "--dedup-key", "url", "github"]);
        assert_eq!(cli.dedup_key(), DedupKey::ApplyUrl);

        let cli = Cli::parse_from(["intern_report", "--dedup-key", "company-title", "sort"]);
        assert_eq!(cli.dedup_key(), DedupKey::CompanyTitle);
    }

    #[test]
    fn test_discover_options() {
        let cli = Cli::parse_from([
            "intern_report",
            "discover",
            "--cities",
            "Boston,Cambridge",
            "--keywords",
            "intern backend",
            "--max",
            "4",
            "--serpapi-key",
            "k",
        ]);
        match cli.command {
            Command::Discover { cities, keywords, max, serpapi_key, .. } => {
                assert_eq!(cities, "Boston,Cambridge");
                assert_eq!(keywords, "intern backend");
                assert_eq!(max, 4);
                assert_eq!(serpapi_key.as_deref(), Some("k"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_adzuna_options() {
        let cli = Cli::parse_from([
            "intern_report",
            "adzuna",
            "--max-days-old",
            "3",
            "--include-remote",
            "--app-id",
            "id",
            "--app-key",
            "key",
        ]);
        match cli.command {
            Command::Adzuna { location, max_days_old, include_remote, app_id, .. } => {
                assert_eq!(location, adzuna::DEFAULT_LOCATION);
                assert_eq!(max_days_old, 3);
                assert!(include_remote);
                assert_eq!(app_id.as_deref(), Some("id"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
