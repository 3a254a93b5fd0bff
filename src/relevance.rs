//! Role-level relevance predicates.
//!
//! Geographic relevance lives in [`crate::location`]; this module decides
//! whether a posting is an internship at the right seniority and whether it
//! matches a company's keyword configuration. Everything here is a pure
//! predicate over lowercase text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default role keywords used when a company configures no include list.
pub const ROLE_KEYWORDS_DEFAULT: &[&str] = &[
    "intern", "internship", "co-op", "coop", "student", "graduate", "new grad", "entry",
    "junior", "systems", "infrastructure", "backend", "core systems", "frontend", "front end",
    "full stack", "web", "mobile", "reliability", "site reliability", "sre", "devops", "cloud",
    "security", "qa", "quality assurance", "support", "it", "compiler", "compilers",
    "algorithm", "algorithms", "quant", "quantitative", "simulation", "modeling",
    "data infrastructure", "data platform", "analytics", "data science", "ml systems",
    "machine learning systems", "ml infra", "ml platform", "product", "ux", "ui", "design",
    "research", "campus", "university", "fall", "spring", "summer", "platform",
];

/// Seniority terms that disqualify a title.
pub const EXCLUDE_TITLE_TERMS: &[&str] = &[
    "senior", "sr", "staff", "principal", "lead", "manager", "director", "head", "vp", "chief",
];

static INTERN_SIGNAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:interns?|internships?|co-?op|co op)\b").unwrap());

static SENIORITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", EXCLUDE_TITLE_TERMS.join("|"))).unwrap()
});

/// True when the posting looks like an internship and the title carries no
/// seniority term.
///
/// The internship signal may come from the title or the description; the
/// seniority check only looks at the title.
///
/// # Examples
///
/// ```ignore
/// assert!(is_intern_role("Software Engineering Intern", ""));
/// assert!(!is_intern_role("Senior Backend Engineer Intern", ""));
/// ```
pub fn is_intern_role(title: &str, description: &str) -> bool {
    let looks_intern = INTERN_SIGNAL.is_match(title) || INTERN_SIGNAL.is_match(description);
    looks_intern && !SENIORITY.is_match(title)
}

/// Company-level keyword gate.
///
/// The title must contain at least one include keyword (falling back to
/// [`ROLE_KEYWORDS_DEFAULT`] when `include` is empty) and none of the
/// exclude keywords. Keywords are matched as lowercase substrings.
pub fn title_matches_keywords(title: &str, include: &[String], exclude: &[String]) -> bool {
    let t = title.to_lowercase();
    let included = if include.is_empty() {
        ROLE_KEYWORDS_DEFAULT.iter().any(|k| t.contains(k))
    } else {
        include.iter().any(|k| t.contains(&k.to_lowercase()))
    };
    included && !exclude.iter().any(|k| t.contains(&k.to_lowercase()))
}

/// Product-management titles are dropped from listings unless they are
/// clearly engineering roles.
pub fn is_excluded_product_role(title: &str) -> bool {
    let t = title.to_lowercase();
    (t.contains("product manager") || t.contains("product management"))
        && !t.contains("software")
        && !t.contains("engineer")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_signal_in_title_or_description() {
        assert!(is_intern_role("Software Engineering Intern", ""));
        assert!(is_intern_role("Summer 2026 Internship - Robotics", ""));
        assert!(is_intern_role("Co-op, Embedded Firmware", ""));
        assert!(is_intern_role("Research Assistant", "This is a paid internship."));
    }

    #[test]
    fn test_missing_intern_signal_is_rejected() {
        assert!(!is_intern_role("Software Engineer", "Join our team"));
        assert!(!is_intern_role("International Tax Analyst", "Internal tools"));
    }

    #[test]
    fn test_seniority_terms_reject_even_with_intern_signal() {
        assert!(!is_intern_role("Senior Backend Engineer Intern", ""));
        assert!(!is_intern_role("Intern Program Manager", ""));
        assert!(!is_intern_role("Sr. Data Intern", ""));
        assert!(!is_intern_role("Tech Lead, Interns", ""));
    }

    #[test]
    fn test_seniority_terms_are_whole_words() {
        assert!(is_intern_role("Leadership Development Intern", ""));
        assert!(is_intern_role("Headquarters Operations Intern", ""));
    }

    #[test]
    fn test_title_keywords_default_list() {
        assert!(title_matches_keywords("Backend Intern", &[], &[]));
        assert!(!title_matches_keywords("Accountant", &[], &[]));
    }

    #[test]
    fn test_title_keywords_company_lists() {
        let include = vec!["robotics".to_string()];
        let exclude = vec!["hardware".to_string()];
        assert!(title_matches_keywords("Robotics Software Intern", &include, &exclude));
        assert!(!title_matches_keywords("Robotics Hardware Intern", &include, &exclude));
        assert!(!title_matches_keywords("Backend Intern", &include, &exclude));
    }

    #[test]
    fn test_product_role_exclusion() {
        assert!(is_excluded_product_role("Product Manager Intern"));
        assert!(!is_excluded_product_role("Software Engineer Intern, Product Management Tools"));
        assert!(!is_excluded_product_role("Backend Intern"));
    }
}
