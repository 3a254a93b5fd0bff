//! Job sources.
//!
//! Each submodule wraps one external source behind the [`crate::api::Fetch`]
//! trait and returns raw records (or document text) for the pipeline to
//! normalize. Failures surface as [`crate::api::FetchError`]; the pipeline
//! logs them and moves on to the next source.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Greenhouse | [`greenhouse`] | Board API | One request per configured slug |
//! | Lever | [`lever`] | Postings API | One request per configured slug |
//! | Adzuna | [`adzuna`] | Search API | Requires app id and key |
//! | GitHub listings | [`github`] | Raw README | HTML sections or Markdown tables |
//! | SerpAPI | [`serpapi`] | Google search | Discovers new board slugs |

pub mod adzuna;
pub mod github;
pub mod greenhouse;
pub mod lever;
pub mod serpapi;
