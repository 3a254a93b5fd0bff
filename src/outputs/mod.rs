//! Output generation: the README table, daily reports, and email.
//!
//! # Submodules
//!
//! - [`readme`]: Parses and rewrites the Markdown job table in the README
//! - [`report`]: Writes the dated daily report
//! - [`email`]: Mails the daily report (behind the `email` feature)
//!
//! # Output Structure
//!
//! ```text
//! README.md                  # Running job table, newest rows first
//! out_dir/
//! ├── jobs-2025-10-19.md     # Daily report
//! └── jobs-2025-10-20.md
//! ```

pub mod email;
pub mod readme;
pub mod report;
