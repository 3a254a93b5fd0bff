//! Location normalization and geographic relevance.
//!
//! Job boards and community listings hand us location strings in every
//! imaginable state of disrepair: concatenated fragments scraped out of
//! collapsed HTML (`5 locationsBoston, MANew York, NY`), duplicated cities,
//! bare state codes split from their city, and qualified remote markers.
//! [`normalize_location`] turns one of those into a short display string
//! containing only the entries that are in scope (Boston area or US remote),
//! or `""` when nothing relevant remains. Callers drop the record on `""`.
//!
//! The transformation is an ordered list of small rules:
//!
//! 1. [`extract_more_marker`]: strip a `+N more` suffix left by a previous run
//! 2. [`protect_phrases`]: isolate `Remote in <country>` phrases
//! 3. [`insert_separators`]: split concatenated fragments
//! 4. [`split_entries`]: split on `,`/`;` and restore protected phrases
//! 5. [`merge_state_codes`]: re-attach bare state codes to their city
//! 6. [`dedup_entries`]: case-insensitive, first-seen order
//! 7. [`LocationPolicy::is_relevant`]: allow/deny filtering
//! 8. [`truncate_entries`]: cap the display length
//!
//! The result is a fixed point: normalizing an accepted output again returns
//! it unchanged.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum number of entries shown before collapsing into `+N more`.
pub const MAX_ENTRIES: usize = 3;
/// Maximum display length (in characters) of the joined entries.
pub const MAX_DISPLAY_LEN: usize = 50;
/// Separator placed between accepted entries.
pub const ENTRY_SEPARATOR: &str = "; ";

/// Unambiguous Boston-area place names.
pub const BOSTON_AREA_CITIES: &[&str] = &[
    "boston",
    "cambridge",
    "somerville",
    "lexington",
    "needham",
    "waltham",
    "watertown",
    "brookline",
    "quincy",
    "norwood",
    "framingham",
    "lowell",
    "worcester",
    "andover",
    "marlborough",
    "peabody",
    "dedham",
    "acton",
    "bedford",
    "pittsfield",
    "fall river",
    "attleboro",
    "westborough",
];

/// City names that also exist outside Massachusetts; accepted only when a
/// Massachusetts marker co-occurs.
pub const AMBIGUOUS_CITIES: &[&str] = &["newton", "burlington", "lawrence"];

/// Phrases that must survive separator insertion untouched, longest first.
const PROTECTED_PHRASES: &[(&str, &str)] = &[
    ("Remote in USA", "__remote_usa__"),
    ("Remote in US", "__remote_us__"),
    ("Remote in UK", "__remote_uk__"),
    ("Remote in Canada", "__remote_canada__"),
    ("Remote in India", "__remote_india__"),
    ("Remote in Europe", "__remote_europe__"),
];

static MORE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:<br\s*/?>)?\s*\(?\+(\d+)\s+(?:more|other)(?:\s+locations?)?\)?\s*$").unwrap()
});

/// Separator rules, applied in order and repeated until nothing changes.
static SEPARATOR_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // "3 locationsBoston" -> "3 locations; Boston"
        (Regex::new(r"(\d+ locations?)([A-Z])").unwrap(), "$1; $2"),
        // "NHMississippi" -> "NH; Mississippi"
        (Regex::new(r"([A-Z]{2})([A-Z][a-z]{2,})").unwrap(), "$1; $2"),
        // "BostonCambridge" -> "Boston; Cambridge"
        (Regex::new(r"([a-z]{3})([A-Z][a-z])").unwrap(), "$1; $2"),
        // "BostonMA" -> "Boston, MA"
        (Regex::new(r"([a-z]{3})([A-Z]{2})\b").unwrap(), "$1, $2"),
    ]
});

static STATE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());

/// Full US state names, used to re-attach `City, State` pairs after splitting.
const US_STATE_NAMES: &[&str] = &[
    "alabama", "alaska", "arizona", "arkansas", "california", "colorado", "connecticut",
    "delaware", "florida", "georgia", "hawaii", "idaho", "illinois", "indiana", "iowa",
    "kansas", "kentucky", "louisiana", "maine", "maryland", "massachusetts", "michigan",
    "minnesota", "mississippi", "missouri", "montana", "nebraska", "nevada", "new hampshire",
    "new jersey", "new mexico", "new york", "north carolina", "north dakota", "ohio",
    "oklahoma", "oregon", "pennsylvania", "rhode island", "south carolina", "south dakota",
    "tennessee", "texas", "utah", "vermont", "virginia", "washington", "west virginia",
    "wisconsin", "wyoming",
];

static NON_US_COUNTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:uk|united kingdom|england|canada|india|mexico|europe|australia|brazil|israel|china|japan|singapore|germany|france|netherlands|spain|italy)\b",
    )
    .unwrap()
});

static NON_TARGET_STATE_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r",\s*(?:AL|AK|AZ|AR|CA|CO|CT|DE|DC|FL|GA|HI|ID|IL|IN|IA|KS|KY|LA|ME|MD|MI|MN|MS|MO|MT|NE|NV|NH|NJ|NM|NY|NC|ND|OH|OK|OR|PA|RI|SC|SD|TN|TX|UT|VT|VA|WA|WV|WI|WY)\b",
    )
    .unwrap()
});

static NON_TARGET_STATE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:alabama|alaska|arizona|arkansas|california|colorado|connecticut|delaware|florida|georgia|hawaii|idaho|illinois|indiana|iowa|kansas|kentucky|louisiana|maine|maryland|michigan|minnesota|mississippi|missouri|montana|nebraska|nevada|new hampshire|new jersey|new mexico|new york|north carolina|north dakota|ohio|oklahoma|oregon|pennsylvania|rhode island|south carolina|south dakota|tennessee|texas|utah|vermont|virginia|washington|west virginia|wisconsin|wyoming)\b",
    )
    .unwrap()
});

static MASSACHUSETTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s,(])ma\b|\bmassachusetts\b").unwrap());

static REMOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bremote\b").unwrap());

static REMOTE_IN_US: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bremote in (?:the )?(?:usa|us|u\.s\.a?\.?|united states)\b").unwrap()
});

/// Allow/deny rules deciding whether a single location entry is in scope.
#[derive(Debug, Clone)]
pub struct LocationPolicy {
    /// Lowercase place names accepted on their own.
    pub target_cities: Vec<String>,
    /// Lowercase place names accepted only alongside a Massachusetts marker.
    pub ambiguous_cities: Vec<String>,
    /// Whether unqualified or US-qualified remote entries are accepted.
    pub include_remote: bool,
}

impl Default for LocationPolicy {
    fn default() -> Self {
        Self::boston(true)
    }
}

impl LocationPolicy {
    /// The built-in Boston-area policy.
    pub fn boston(include_remote: bool) -> Self {
        Self {
            target_cities: BOSTON_AREA_CITIES.iter().map(|c| c.to_string()).collect(),
            ambiguous_cities: AMBIGUOUS_CITIES.iter().map(|c| c.to_string()).collect(),
            include_remote,
        }
    }

    /// Build a policy from a configured list of target locations.
    ///
    /// Names known to be ambiguous stay on the ambiguous list so they still
    /// require a Massachusetts marker. An empty list falls back to the
    /// built-in Boston policy.
    pub fn from_locations(locations: &[String], include_remote: bool) -> Self {
        if locations.is_empty() {
            return Self::boston(include_remote);
        }
        let target_cities = locations
            .iter()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty() && !AMBIGUOUS_CITIES.contains(&l.as_str()))
            .unique()
            .collect();
        Self {
            target_cities,
            ambiguous_cities: AMBIGUOUS_CITIES.iter().map(|c| c.to_string()).collect(),
            include_remote,
        }
    }

    /// Decide whether one (already split) location entry is in scope.
    ///
    /// Rules, first match wins:
    /// 1. a non-US country anywhere in the entry rejects it
    /// 2. a non-Massachusetts state (code after a comma, or full name) rejects it
    /// 3. an ambiguous city is accepted only with a Massachusetts marker
    /// 4. a target city or a Massachusetts marker accepts it
    /// 5. remote entries are accepted when remote inclusion is on, unless they
    ///    are explicitly qualified with a non-US region
    pub fn is_relevant(&self, entry: &str) -> bool {
        let lower = entry.trim().to_lowercase();
        if lower.is_empty() {
            return false;
        }

        if NON_US_COUNTRY.is_match(&lower) {
            return false;
        }
        // State codes are only meaningful in upper case ("Austin, TX" but not "Boston, in-office").
        if NON_TARGET_STATE_CODE.is_match(entry) || NON_TARGET_STATE_NAME.is_match(&lower) {
            return false;
        }

        let has_ma = MASSACHUSETTS.is_match(&lower);
        if self
            .ambiguous_cities
            .iter()
            .any(|city| contains_word(&lower, city))
        {
            return has_ma;
        }

        if has_ma || self.target_cities.iter().any(|city| contains_word(&lower, city)) {
            return true;
        }

        if REMOTE.is_match(&lower) {
            if !self.include_remote {
                return false;
            }
            if lower.contains("remote in ") {
                return REMOTE_IN_US.is_match(&lower);
            }
            return true;
        }

        false
    }
}

/// Normalize a raw location string for display, keeping only entries that
/// `policy` accepts. Returns `""` when nothing relevant remains.
///
/// # Examples
///
/// ```ignore
/// let policy = LocationPolicy::default();
/// assert_eq!(normalize_location("Boston, MACambridge, MA", &policy), "Boston, MA; Cambridge, MA");
/// assert_eq!(normalize_location("Newton", &policy), "");
/// ```
pub fn normalize_location(raw: &str, policy: &LocationPolicy) -> String {
    let (body, hidden) = extract_more_marker(raw);
    if body.trim().is_empty() {
        return String::new();
    }

    let protected = protect_phrases(body);
    let separated = insert_separators(&protected);
    let entries = split_entries(&separated);
    let entries = merge_state_codes(entries);
    let entries = dedup_entries(entries);

    let accepted: Vec<String> = entries
        .into_iter()
        .filter(|e| policy.is_relevant(e))
        .collect();
    if accepted.is_empty() {
        return String::new();
    }

    truncate_entries(&accepted, hidden)
}

/// Strip a trailing `+N more` marker, returning the remaining text and `N`.
pub fn extract_more_marker(raw: &str) -> (&str, usize) {
    match MORE_MARKER.captures(raw) {
        Some(caps) => {
            let hidden = caps[1].parse().unwrap_or(0);
            let start = caps.get(0).map_or(raw.len(), |m| m.start());
            (&raw[..start], hidden)
        }
        None => (raw, 0),
    }
}

/// Replace protected phrases with standalone lowercase sentinel segments.
pub fn protect_phrases(location: &str) -> String {
    PROTECTED_PHRASES
        .iter()
        .fold(location.to_string(), |acc, (phrase, sentinel)| {
            acc.replace(phrase, &format!(";{sentinel};"))
        })
}

fn restore_phrases(segment: &str) -> String {
    PROTECTED_PHRASES
        .iter()
        .fold(segment.to_string(), |acc, (phrase, sentinel)| {
            acc.replace(sentinel, phrase)
        })
}

/// Insert separators between concatenated location fragments.
pub fn insert_separators(location: &str) -> String {
    let mut current = location.to_string();
    // Each pass only ever adds separators, so this settles quickly.
    for _ in 0..8 {
        let next = SEPARATOR_RULES
            .iter()
            .fold(current.clone(), |acc, (re, rep)| re.replace_all(&acc, *rep).into_owned());
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Split on commas and semicolons, trimming and dropping empty pieces.
pub fn split_entries(location: &str) -> Vec<String> {
    location
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(restore_phrases)
        .collect()
}

/// Re-attach a bare state (two-letter code or full name) to the city token
/// before it, unless that token already carries a state.
pub fn merge_state_codes(entries: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        let attach = is_state(&entry)
            && merged
                .last()
                .is_some_and(|prev| !prev.contains(',') && !is_state(prev));
        match merged.last_mut() {
            Some(prev) if attach => {
                prev.push_str(", ");
                prev.push_str(&entry);
            }
            _ => merged.push(entry),
        }
    }
    merged
}

fn is_state(entry: &str) -> bool {
    STATE_CODE.is_match(entry) || US_STATE_NAMES.contains(&entry.to_lowercase().as_str())
}

/// Drop case-insensitive duplicates, keeping the first occurrence.
pub fn dedup_entries(entries: Vec<String>) -> Vec<String> {
    entries.into_iter().unique_by(|e| e.to_lowercase()).collect()
}

/// Join entries for display, collapsing overflow into a `<br>+N more` marker.
///
/// Overflow happens when there are more than [`MAX_ENTRIES`] entries or the
/// joined text exceeds [`MAX_DISPLAY_LEN`] characters. At least one entry is
/// always kept. `hidden` counts entries already collapsed by an earlier run.
pub fn truncate_entries(entries: &[String], hidden: usize) -> String {
    let joined_len = entries.iter().map(|e| e.chars().count()).sum::<usize>()
        + ENTRY_SEPARATOR.len() * entries.len().saturating_sub(1);

    let kept: Vec<&String> = if entries.len() > MAX_ENTRIES || joined_len > MAX_DISPLAY_LEN {
        let mut kept = Vec::new();
        let mut total = 0;
        for entry in entries.iter().take(MAX_ENTRIES) {
            let len = entry.chars().count();
            if !kept.is_empty() && total + len > MAX_DISPLAY_LEN {
                break;
            }
            kept.push(entry);
            total += len + ENTRY_SEPARATOR.len();
        }
        kept
    } else {
        entries.iter().collect()
    };

    let remaining = entries.len() - kept.len() + hidden;
    let mut result = kept.iter().join(ENTRY_SEPARATOR);
    if remaining > 0 {
        result.push_str(&format!("<br>+{remaining} more"));
    }
    result
}

/// Whole-word containment check for lowercase text.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
