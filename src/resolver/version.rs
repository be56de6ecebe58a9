//! Lenient semver handling for package versions.
//!
//! Module versions in the wild are not always strict semver: `v0.1.0`, `1.2`
//! and `0.100` all occur. Parsing strips a leading `v` and zero-fills missing
//! components; anything still unparsable sorts below every parsable version
//! and is compared lexically among its peers.

use std::cmp::Ordering;

use semver::Version;

/// Parse a version leniently.
pub fn parse_lenient(s: &str) -> Option<Version> {
    let s = s.trim();
    let s = s
        .strip_prefix('v')
        .or_else(|| s.strip_prefix('V'))
        .unwrap_or(s);

    if let Ok(version) = Version::parse(s) {
        return Some(version);
    }

    let split = s.find(['-', '+']).unwrap_or(s.len());
    let (core, rest) = s.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    Version::parse(&format!("{}{}", padded, rest)).ok()
}

/// Total order over version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_lenient(a), parse_lenient(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Whether `available` satisfies an exact version request.
pub fn versions_match(requested: &str, available: &str) -> bool {
    compare_versions(requested, available) == Ordering::Equal
}
