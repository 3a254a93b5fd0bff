//! Daily Markdown report written next to the README update.
//!
//! # Output Path
//!
//! `{out_dir}/jobs-{YYYY-MM-DD}.md`

use crate::models::JobListing;
use crate::utils::{ensure_writable_dir, escape_pipes};
use chrono::NaiveDateTime;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Report title for `date` (`YYYY-MM-DD`).
pub fn report_title(date: &str) -> String {
    format!("Boston/Remote Internship Report — {date}")
}

/// Render the report body.
pub fn render_report(date: &str, listings: &[JobListing], now: NaiveDateTime) -> String {
    let header = format!("# {}\n\n", report_title(date));
    if listings.is_empty() {
        return header + "_No matching postings found today._\n";
    }

    let mut lines = vec![
        header,
        "| Title | Company | Location | Source | Updated |".to_string(),
        "|---|---|---|---|---|".to_string(),
    ];
    for listing in listings {
        let title = escape_pipes(&listing.title);
        let link = match &listing.apply_url {
            Some(url) => format!("[{title}]({url})"),
            None => title,
        };
        lines.push(format!(
            "| {} | {} | {} | {} | {} |",
            link,
            escape_pipes(&listing.company),
            escape_pipes(&listing.location),
            listing.source,
            listing.date_display(now),
        ));
    }
    lines.join("\n") + "\n"
}

/// Write the report into `out_dir`, creating the directory when needed.
#[instrument(level = "info", skip(body), fields(out_dir = %out_dir.display()))]
pub async fn write_report(out_dir: &Path, date: &str, body: &str) -> Result<PathBuf, Box<dyn Error>> {
    ensure_writable_dir(out_dir).await?;
    let path = out_dir.join(format!("jobs-{date}.md"));
    fs::write(&path, body).await?;
    info!(path = %path.display(), "Wrote daily report");
    Ok(path)
}
