//! Community internship listings kept as GitHub READMEs.
//!
//! Two layouts are understood:
//! - SimplifyJobs style: one HTML `<table>` per `## ...` section
//! - speedyapply / vanshb03 style: plain Markdown tables
//!
//! HTML is tried first; if no section table yields a row the document is
//! parsed as Markdown. Closed rows (`🔒`) are flagged on the listing and a `↳` company cell
//! repeats the previous row's company.

use crate::api::{Fetch, FetchError, HttpRequest};
use crate::models::JobListing;
use crate::outputs::readme::split_cells;
use crate::utils::{clean_markdown, extract_company_name, extract_url};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const TIMEOUT: Duration = Duration::from_secs(30);

const CLOSED: char = '🔒';
const CONTINUATION: char = '↳';

/// A GitHub README listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingSource {
    pub name: &'static str,
    pub owner: &'static str,
    pub repo: &'static str,
    pub url: &'static str,
}

pub const GITHUB_SOURCES: &[ListingSource] = &[
    ListingSource {
        name: "SimplifyJobs",
        owner: "SimplifyJobs",
        repo: "Summer2026-Internships",
        url: "https://raw.githubusercontent.com/SimplifyJobs/Summer2026-Internships/dev/README.md",
    },
    ListingSource {
        name: "speedyapply",
        owner: "speedyapply",
        repo: "2026-SWE-College-Jobs",
        url: "https://raw.githubusercontent.com/speedyapply/2026-SWE-College-Jobs/main/README.md",
    },
    ListingSource {
        name: "vanshb03",
        owner: "vanshb03",
        repo: "Summer2026-Internships",
        url: "https://raw.githubusercontent.com/vanshb03/Summer2026-Internships/main/README.md",
    },
];

/// SimplifyJobs section headings whose tables are scraped.
pub const SECTIONS: &[&str] = &[
    "Software Engineering Internship Roles",
    "Data Science, AI & Machine Learning Internship Roles",
    "Quantitative Finance Internship Roles",
    "Hardware Engineering Internship Roles",
];

static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?br\s*/?>").unwrap());
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

#[instrument(level = "info", skip(client), fields(source = source.name))]
pub async fn fetch_readme<F: Fetch>(client: &F, source: &ListingSource) -> Result<String, FetchError> {
    let body = client.fetch(&HttpRequest::get(source.url, TIMEOUT)).await?;
    info!(bytes = body.len(), "Fetched listing README");
    Ok(body)
}

/// Parse every open listing in a README, HTML sections first.
pub fn parse_listings(content: &str, source_name: &str) -> Vec<JobListing> {
    let html = parse_html_sections(content, source_name);
    if !html.is_empty() {
        info!(source = source_name, count = html.len(), "Parsed HTML listings");
        return html;
    }
    let md = parse_markdown_tables(content, source_name);
    info!(source = source_name, count = md.len(), "Parsed Markdown listings");
    md
}

/// Raw `<table>...</table>` text under a `## {section}` heading.
fn section_table<'a>(lines: &[&'a str], section: &str) -> Option<Vec<&'a str>> {
    let start = lines
        .iter()
        .position(|l| l.starts_with("## ") && l.contains(section))?;
    let mut table = Vec::new();
    for line in &lines[start + 1..] {
        if line.starts_with("## ") {
            break;
        }
        if table.is_empty() && !line.contains("<table") {
            continue;
        }
        table.push(*line);
        if line.contains("</table>") {
            break;
        }
    }
    (!table.is_empty()).then_some(table)
}

pub fn parse_html_sections(content: &str, source_name: &str) -> Vec<JobListing> {
    let lines: Vec<&str> = content.lines().collect();
    let mut listings = Vec::new();

    for section in SECTIONS {
        let Some(table) = section_table(&lines, section) else {
            debug!(section, "No table in section");
            continue;
        };
        let fragment = Html::parse_fragment(&table.join("\n"));
        let mut previous_company = String::new();
        let before = listings.len();

        for row in fragment.select(&ROW) {
            let cells: Vec<ElementRef> = row.select(&CELL).collect();
            if cells.len() < 4 {
                continue;
            }
            if let Some(listing) = parse_html_row(&cells, source_name, &mut previous_company) {
                listings.push(listing);
            }
        }
        debug!(section, count = listings.len() - before, "Parsed section");
    }
    listings
}

fn cell_text(cell: &ElementRef, separator: &str) -> String {
    cell.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn parse_html_row(
    cells: &[ElementRef],
    source_name: &str,
    previous_company: &mut String,
) -> Option<JobListing> {
    let company_cell = cell_text(&cells[0], " ");
    let role_cell = cell_text(&cells[1], " ");
    // Multi-location cells put each city in its own text node.
    let location_cell = cell_text(&cells[2], "; ");
    let apply_url = cells[3]
        .select(&ANCHOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);
    let date_cell = cells.get(4).map(|c| cell_text(c, " ")).unwrap_or_default();

    let company = resolve_company(extract_company_name(&company_cell), &company_cell, previous_company)?;
    let closed = cells.iter().any(|c| c.html().contains(CLOSED));

    let title = clean_markdown(&role_cell);
    if title.is_empty() {
        return None;
    }

    Some(
        JobListing::new(company, title, clean_markdown(&location_cell), source_name)
            .with_apply_url(apply_url.unwrap_or_default())
            .with_date_posted(date_cell)
            .with_closed(closed),
    )
}

/// Apply `↳` inheritance and remember the company for the next row.
fn resolve_company(name: String, raw_cell: &str, previous: &mut String) -> Option<String> {
    let company = if name.is_empty() && raw_cell.contains(CONTINUATION) {
        previous.clone()
    } else {
        name
    };
    if company.is_empty() {
        return None;
    }
    previous.clone_from(&company);
    Some(company)
}

pub fn parse_markdown_tables(content: &str, source_name: &str) -> Vec<JobListing> {
    let mut listings = Vec::new();
    let mut in_table = false;
    let mut previous_company = String::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.contains('|') && (trimmed.contains("---") || trimmed.contains("===")) {
            in_table = true;
            continue;
        }
        if !trimmed.starts_with('|') {
            in_table = false;
            continue;
        }
        if in_table {
            if let Some(listing) = parse_markdown_row(trimmed, source_name, &mut previous_company) {
                listings.push(listing);
            }
        }
    }
    listings
}

fn parse_markdown_row(
    line: &str,
    source_name: &str,
    previous_company: &mut String,
) -> Option<JobListing> {
    let cells = split_cells(line);
    if cells.len() < 3 {
        return None;
    }
    let (company_cell, position_cell, location_cell) = (&cells[0], &cells[1], &cells[2]);

    let company = resolve_company(extract_company_name(company_cell), company_cell, previous_company)?;
    let closed = line.contains(CLOSED)
        || cells
            .iter()
            .any(|c| c.eq_ignore_ascii_case("closed") || c.eq_ignore_ascii_case("filled"));

    let title = clean_markdown(position_cell);
    if title.is_empty() {
        warn!(source = source_name, %company, "Row without a title");
        return None;
    }

    // Link columns sit between the location and the trailing date column.
    let link_cells = if cells.len() > 4 {
        &cells[3..cells.len() - 1]
    } else {
        cells.get(3..).unwrap_or_default()
    };
    let apply_url = link_cells
        .iter()
        .chain([position_cell, company_cell])
        .find_map(|c| extract_url(c));
    let date_cell = if cells.len() > 4 {
        clean_markdown(&cells[cells.len() - 1])
    } else {
        String::new()
    };
    let location = clean_markdown(&LINE_BREAK.replace_all(location_cell, "; "));

    Some(
        JobListing::new(company, title, location, source_name)
            .with_apply_url(apply_url.unwrap_or_default())
            .with_date_posted(date_cell)
            .with_closed(closed),
    )
}
