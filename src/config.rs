//! YAML configuration: the companies to poll and the location policy.
//!
//! ```yaml
//! companies:
//!   - name: Acme Robotics
//!     provider: greenhouse
//!     slug: acmerobotics
//!     include_keywords: [robotics, software]
//!     exclude_keywords: [hardware]
//! boston_locations: [boston, cambridge, somerville]
//! include_remote: true
//! out_dir: ./reports
//! ```

use crate::location::{LocationPolicy, BOSTON_AREA_CITIES};
use crate::utils::capitalize;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/companies.yml";

/// Default directory for daily reports.
pub const DEFAULT_OUT_DIR: &str = "./reports";

#[derive(Debug, Error)]
pub enum ConfigError {
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

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path} must be a YAML mapping")]
    NotAMapping { path: PathBuf },

    #[error("missing credential: set {0} in the environment")]
    MissingCredential(&'static str),
}

/// Job-board provider of a configured company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Greenhouse,
    Lever,
    /// Any provider tag this tool cannot poll; logged and skipped.
    #[serde(other)]
    Unsupported,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Greenhouse => "greenhouse",
            Provider::Lever => "lever",
            Provider::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompanyConfig {
    pub name: String,
    pub provider: Provider,
    pub slug: String,
    #[serde(default)]
    pub include_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
}

impl CompanyConfig {
    /// Entry for a board found by slug discovery.
    pub fn discovered(provider: Provider, slug: &str) -> Self {
        Self {
            name: capitalize(slug),
            provider,
            slug: slug.to_string(),
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub companies: Vec<CompanyConfig>,
    #[serde(default = "default_locations", alias = "target_locations")]
    pub boston_locations: Vec<String>,
    #[serde(default)]
    pub include_remote: bool,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
}

fn default_locations() -> Vec<String> {
    BOSTON_AREA_CITIES.iter().map(|c| c.to_string()).collect()
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUT_DIR)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            companies: Vec::new(),
            boston_locations: default_locations(),
            include_remote: false,
            out_dir: default_out_dir(),
        }
    }
}

impl AppConfig {
    /// Parse a config document and lowercase keywords and locations.
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: AppConfig =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        for company in &mut config.companies {
            lowercase_all(&mut company.include_keywords);
            lowercase_all(&mut company.exclude_keywords);
        }
        lowercase_all(&mut config.boston_locations);
        Ok(config)
    }

    /// Location policy for this config; an empty location list falls back
    /// to the Boston defaults.
    pub fn location_policy(&self, include_remote: bool) -> LocationPolicy {
        if self.boston_locations.iter().all(|l| l.trim().is_empty()) {
            LocationPolicy::boston(include_remote)
        } else {
            LocationPolicy::from_locations(&self.boston_locations, include_remote)
        }
    }

    /// Companies this tool can poll; unsupported providers are logged and dropped.
    pub fn pollable_companies(&self) -> Vec<CompanyConfig> {
        self.companies
            .iter()
            .filter(|c| {
                if c.provider == Provider::Unsupported {
                    warn!(company = %c.name, slug = %c.slug, "Unsupported provider; skipping");
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect()
    }
}

fn lowercase_all(values: &mut [String]) {
    for v in values.iter_mut() {
        *v = v.trim().to_lowercase();
    }
}

/// Load the YAML config at `path`.
///
/// # Errors
///
/// A missing or unreadable file and invalid YAML are both fatal.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let config = AppConfig::from_yaml(&text, path)?;
    info!(
        companies = config.companies.len(),
        locations = config.boston_locations.len(),
        include_remote = config.include_remote,
        "Loaded configuration"
    );
    Ok(config)
}

/// Read an environment credential, failing with [`ConfigError::MissingCredential`].
pub fn require_env(name: &'static str, value: Option<&str>) -> Result<String, ConfigError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingCredential(name)),
    }
}

/// Merge discovered `(provider, slug)` pairs into the YAML config at `path`.
///
/// The file is edited as a generic YAML document so unknown keys and
/// unsupported providers survive the rewrite. A missing file is created with
/// default settings. Returns the entries that were actually added, in
/// `(provider, slug)` order.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn merge_companies(
    path: &Path,
    discovered: &BTreeSet<(Provider, String)>,
) -> Result<Vec<CompanyConfig>, ConfigError> {
    let mut doc = match fs::read_to_string(path).await {
        Ok(text) if !text.trim().is_empty() => {
            serde_yaml::from_str::<Value>(&text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        }
        Ok(_) => Value::Mapping(default_document()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Mapping(default_document()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let added = merge_into_document(&mut doc, discovered)
        .ok_or_else(|| ConfigError::NotAMapping { path: path.to_path_buf() })?;

    if added.is_empty() {
        info!("No new companies to add");
        return Ok(added);
    }

    let text = serde_yaml::to_string(&doc).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
    }
    fs::write(path, text)
        .await
        .map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    info!(added = added.len(), "Merged discovered companies into config");
    Ok(added)
}

fn default_document() -> Mapping {
    let mut m = Mapping::new();
    m.insert("companies".into(), Value::Sequence(Vec::new()));
    m.insert(
        "boston_locations".into(),
        Value::Sequence(default_locations().into_iter().map(Value::from).collect()),
    );
    m.insert("include_remote".into(), Value::Bool(false));
    m.insert("out_dir".into(), Value::from(DEFAULT_OUT_DIR));
    m
}

/// Append unseen pairs to the `companies` sequence. `None` when the document
/// is not a mapping or `companies` is not a sequence.
fn merge_into_document(
    doc: &mut Value,
    discovered: &BTreeSet<(Provider, String)>,
) -> Option<Vec<CompanyConfig>> {
    let map = doc.as_mapping_mut()?;
    let companies = map
        .entry("companies".into())
        .or_insert_with(|| Value::Sequence(Vec::new()));
    if companies.is_null() {
        *companies = Value::Sequence(Vec::new());
    }
    let list = companies.as_sequence_mut()?;

    let mut known: BTreeSet<(String, String)> = list
        .iter()
        .filter_map(|c| {
            let provider = c.get("provider")?.as_str()?.to_lowercase();
            let slug = c.get("slug")?.as_str()?.to_string();
            Some((provider, slug))
        })
        .collect();

    let mut added = Vec::new();
    for (provider, slug) in discovered {
        if *provider == Provider::Unsupported {
            continue;
        }
        if !known.insert((provider.as_str().to_string(), slug.clone())) {
            continue;
        }
        let entry = CompanyConfig::discovered(*provider, slug);
        let mut m = Mapping::new();
        m.insert("name".into(), Value::from(entry.name.clone()));
        m.insert("provider".into(), Value::from(provider.as_str()));
        m.insert("slug".into(), Value::from(slug.clone()));
        m.insert("include_keywords".into(), Value::Sequence(Vec::new()));
        m.insert("exclude_keywords".into(), Value::Sequence(Vec::new()));
        list.push(Value::Mapping(m));
        added.push(entry);
    }
    Some(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
companies:
  - name: Acme Robotics
    provider: greenhouse
    slug: acmerobotics
    include_keywords: [Robotics, " Software "]
    exclude_keywords: [HARDWARE]
  - name: Globex
    provider: lever
    slug: globex
  - name: Initech
    provider: workday
    slug: initech
boston_locations: [Boston, Cambridge]
include_remote: true
"#;

    #[test]
    fn test_parse_and_lowercase() {
        let config = AppConfig::from_yaml(SAMPLE, Path::new("companies.yml")).unwrap();
        assert_eq!(config.companies.len(), 3);
        assert_eq!(config.companies[0].include_keywords, vec!["robotics", "software"]);
        assert_eq!(config.companies[0].exclude_keywords, vec!["hardware"]);
        assert!(config.companies[1].include_keywords.is_empty());
        assert_eq!(config.companies[2].provider, Provider::Unsupported);
        assert_eq!(config.boston_locations, vec!["boston", "cambridge"]);
        assert!(config.include_remote);
        assert_eq!(config.out_dir, PathBuf::from("./reports"));
    }

    #[test]
    fn test_unsupported_providers_are_not_polled() {
        let config = AppConfig::from_yaml(SAMPLE, Path::new("companies.yml")).unwrap();
        let pollable = config.pollable_companies();
        assert_eq!(pollable.len(), 2);
        assert!(pollable.iter().all(|c| c.provider != Provider::Unsupported));
    }

    #[test]
    fn test_target_locations_alias_and_defaults() {
        let config =
            AppConfig::from_yaml("target_locations: [Waltham]\n", Path::new("c.yml")).unwrap();
        assert_eq!(config.boston_locations, vec!["waltham"]);
        assert!(!config.include_remote);

        let config = AppConfig::from_yaml("companies: []\n", Path::new("c.yml")).unwrap();
        assert!(config.boston_locations.contains(&"boston".to_string()));
    }

    #[test]
    fn test_empty_locations_fall_back_to_boston_policy() {
        let config = AppConfig::from_yaml("boston_locations: []\n", Path::new("c.yml")).unwrap();
        let policy = config.location_policy(false);
        assert!(policy.is_relevant("Boston, MA"));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let err = AppConfig::from_yaml("companies: [", Path::new("bad.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn test_require_env() {
        assert_eq!(require_env("X", Some(" id ")).unwrap(), "id");
        assert!(matches!(
            require_env("ADZUNA_APP_ID", Some("")),
            Err(ConfigError::MissingCredential("ADZUNA_APP_ID"))
        ));
        assert!(require_env("SERPAPI_KEY", None).is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config(&tmp.path().join("nope.yml")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[tokio::test]
    async fn test_merge_companies_adds_only_new_pairs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("companies.yml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let discovered: BTreeSet<(Provider, String)> = [
            (Provider::Greenhouse, "acmerobotics".to_string()),
            (Provider::Greenhouse, "hooli".to_string()),
            (Provider::Lever, "acmerobotics".to_string()),
        ]
        .into_iter()
        .collect();

        let added = merge_companies(&path, &discovered).await.unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].name, "Hooli");
        assert_eq!(added[1].provider, Provider::Lever);

        let reloaded = load_config(&path).await.unwrap();
        assert_eq!(reloaded.companies.len(), 5);
        assert!(reloaded.include_remote);
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.contains("workday"));

        // Idempotent on a second run.
        let again = merge_companies(&path, &discovered).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_merge_companies_creates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config/companies.yml");
        let discovered: BTreeSet<(Provider, String)> =
            [(Provider::Lever, "globex".to_string())].into_iter().collect();

        merge_companies(&path, &discovered).await.unwrap();
        let config = load_config(&path).await.unwrap();
        assert_eq!(config.companies.len(), 1);
        assert_eq!(config.companies[0].name, "Globex");
        assert!(!config.boston_locations.is_empty());
    }
}
