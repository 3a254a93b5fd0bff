//! The Markdown job table kept in the README.
//!
//! The file is parsed once into three parts: everything up to and including
//! the separator line, the contiguous table rows, and everything after the
//! last row. Untouched parts are written back byte-for-byte, so appending a
//! batch only adds lines directly beneath the separator.
//!
//! ```text
//! # Job Listings
//!
//! | Company Name | Job Title | Location | Date Posted | APPLY |
//! |---|---|---|---|---|
//! | Acme | Software Intern | Boston, MA | 10/17/2025 | [APPLY](https://...) |
//! ```

use crate::dates::sort_key;
use crate::location::{normalize_location, LocationPolicy};
use crate::models::JobListing;
use crate::utils::{clean_markdown, escape_pipes};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

pub const TITLE: &str = "# Job Listings";
pub const HEADER: &str = "| Company Name | Job Title | Location | Date Posted | APPLY |";
pub const SEPARATOR: &str = "|---|---|---|---|---|";

const COMPANY: usize = 0;
const TITLE_COL: usize = 1;
const LOCATION: usize = 2;
const DATE: usize = 3;

static APPLY_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[APPLY\]\((https?://[^\)]+)\)").unwrap());
static ANCHOR_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a href="(https?://[^"]+)""#).unwrap());

#[derive(Debug, Error)]
pub enum TableError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One table row: the original line plus its split cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    raw: String,
    cells: Vec<String>,
}

impl TableRow {
    pub fn parse(line: &str) -> Self {
        Self {
            raw: line.to_string(),
            cells: split_cells(line),
        }
    }

    /// Render a new row for `listing`; pipes inside values are escaped.
    pub fn from_listing(listing: &JobListing, now: NaiveDateTime) -> Self {
        let apply = listing
            .apply_url
            .as_deref()
            .map(|url| format!("[APPLY]({url})"))
            .unwrap_or_default();
        let cells = vec![
            escape_pipes(&listing.company),
            escape_pipes(&listing.title),
            escape_pipes(&listing.location),
            listing.date_display(now),
            apply,
        ];
        Self {
            raw: render_cells(&cells),
            cells,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    /// Company as plain text, pipe escapes undone.
    pub fn company(&self) -> String {
        unescape_pipes(&clean_markdown(self.cell(COMPANY)))
    }

    /// Title as plain text, pipe escapes undone.
    pub fn title(&self) -> String {
        unescape_pipes(&clean_markdown(self.cell(TITLE_COL)))
    }

    /// Location cell with pipe escapes undone; `<br>` markers are kept.
    pub fn location(&self) -> String {
        unescape_pipes(self.cell(LOCATION))
    }

    pub fn date(&self) -> &str {
        self.cell(DATE)
    }

    /// Same row with a different location cell; the raw line is re-rendered.
    fn with_location(&self, location: &str) -> Self {
        let mut cells = self.cells.clone();
        while cells.len() <= LOCATION {
            cells.push(String::new());
        }
        cells[LOCATION] = escape_pipes(location);
        Self {
            raw: render_cells(&cells),
            cells,
        }
    }
}

fn unescape_pipes(s: &str) -> String {
    s.replace("\\|", "|")
}

/// `| a | b | |`: empty cells render as a single space.
fn render_cells(cells: &[String]) -> String {
    cells.iter().fold(String::from("|"), |mut line, cell| {
        if !cell.is_empty() {
            line.push(' ');
            line.push_str(cell);
        }
        line.push_str(" |");
        line
    })
}

/// Split a Markdown table line on unescaped pipes, trimming each cell.
/// Interior empty cells are kept so columns stay aligned.
pub fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = match inner.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => inner,
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('\\');
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// The README split around its job table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadmeTable {
    /// Lines up to and including the separator.
    head: Vec<String>,
    rows: Vec<TableRow>,
    /// Lines after the last row; a trailing `""` keeps the final newline.
    tail: Vec<String>,
}

impl ReadmeTable {
    /// A fresh document: title, blank line, header and separator.
    pub fn empty() -> Self {
        Self {
            head: vec![
                TITLE.to_string(),
                String::new(),
                HEADER.to_string(),
                SEPARATOR.to_string(),
            ],
            rows: Vec::new(),
            tail: vec![String::new()],
        }
    }

    /// Parse README content. Content without a table gets a new table
    /// appended after it.
    pub fn parse(content: &str) -> Self {
        if content.trim().is_empty() {
            return Self::empty();
        }
        let lines: Vec<&str> = content.split('\n').collect();

        let Some(sep) = lines.iter().position(|l| is_separator(l)) else {
            let mut head: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
            if head.last().is_some_and(|l| l.is_empty()) {
                head.pop();
            }
            head.extend([String::new(), HEADER.to_string(), SEPARATOR.to_string()]);
            return Self {
                head,
                rows: Vec::new(),
                tail: vec![String::new()],
            };
        };

        let end = lines[sep + 1..]
            .iter()
            .position(|l| !l.trim_start().starts_with('|'))
            .map(|offset| sep + 1 + offset)
            .unwrap_or(lines.len());

        Self {
            head: lines[..=sep].iter().map(|l| l.to_string()).collect(),
            rows: lines[sep + 1..end].iter().map(|l| TableRow::parse(l)).collect(),
            tail: lines[end..].iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out: Vec<&str> = self.head.iter().map(String::as_str).collect();
        out.extend(self.rows.iter().map(TableRow::raw));
        if self.tail.is_empty() {
            // Rows ran to EOF without a newline; keep the file newline-terminated.
            out.push("");
        } else {
            out.extend(self.tail.iter().map(String::as_str));
        }
        out.join("\n")
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Apply URLs anywhere in the document, in `[APPLY](url)` or
    /// `<a href="url"` form.
    pub fn apply_urls(&self) -> HashSet<String> {
        self.head
            .iter()
            .map(String::as_str)
            .chain(self.rows.iter().map(TableRow::raw))
            .chain(self.tail.iter().map(String::as_str))
            .flat_map(|line| {
                APPLY_LINK
                    .captures_iter(line)
                    .chain(ANCHOR_HREF.captures_iter(line))
                    .map(|c| c[1].to_string())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Insert rows directly beneath the separator, keeping their order.
    pub fn prepend_rows(&mut self, rows: Vec<TableRow>) {
        let added = rows.len();
        self.rows.splice(0..0, rows);
        debug!(added, total = self.rows.len(), "Inserted table rows");
    }

    /// Newest first; unparseable dates sink to the bottom. Stable.
    pub fn sort_by_date(&mut self) {
        self.rows
            .sort_by_key(|row| Reverse(sort_key(&clean_markdown(row.date()))));
    }

    /// Re-run the location normalizer over every row. Only rows whose
    /// normalized location is non-empty and different are rewritten.
    /// Returns the number of rewritten rows.
    pub fn fix_locations(&mut self, policy: &LocationPolicy) -> usize {
        let mut changed = 0;
        for row in self.rows.iter_mut() {
            let current = row.location();
            let normalized = normalize_location(&current, policy);
            if !normalized.is_empty() && normalized != current {
                debug!(from = %current, to = %normalized, "Rewriting location");
                *row = row.with_location(&normalized);
                changed += 1;
            }
        }
        changed
    }

    /// Load the README at `path`; a missing file yields [`ReadmeTable::empty`].
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, TableError> {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let table = Self::parse(&content);
                info!(rows = table.len(), "Loaded README table");
                Ok(table)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("README not found; starting a new table");
                Ok(Self::empty())
            }
            Err(source) => Err(TableError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write to a sibling temp file, then rename over `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn save(&self, path: &Path) -> Result<(), TableError> {
        let write_err = |source| TableError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut tmp_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "README.md".into());
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        fs::write(&tmp, self.render()).await.map_err(write_err)?;
        fs::rename(&tmp, path).await.map_err(write_err)?;
        info!(rows = self.len(), "Wrote README table");
        Ok(())
    }
}

static SEPARATOR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|(?:\s*:?-{3,}:?\s*\|){5}$").unwrap());

/// The five-column separator, compact (`|---|`) or padded (`| :--- |`).
fn is_separator(line: &str) -> bool {
    SEPARATOR_LINE.is_match(line.trim())
}
