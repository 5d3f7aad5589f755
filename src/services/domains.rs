//! College email domain rule.
//!
//! One pure rule answers "does this address plausibly belong to college X"
//! for every flow that asks: login moderator promotion, join requests and
//! profile verification.
//!
//! TRADE-OFFS
//! ==========
//! The rule is permissive (substring fallback). It signals
//! affiliation, it does not authenticate it.

use std::collections::BTreeSet;

/// Colleges whose real domains do not follow the generated patterns.
const KNOWN_DOMAINS: &[(&str, &[&str])] = &[
    ("mit", &["mit.edu"]),
    ("harvard", &["harvard.edu", "seas.harvard.edu", "hbs.edu"]),
    ("stanford", &["stanford.edu"]),
    ("berkeley", &["berkeley.edu"]),
    ("iit", &["iitb.ac.in", "iitd.ac.in", "iitm.ac.in", "iitk.ac.in"]),
    ("nitk", &["nitk.edu.in", "nitk.ac.in"]),
    ("bits", &["bits-pilani.ac.in", "hyderabad.bits-pilani.ac.in"]),
    ("oxford", &["ox.ac.uk"]),
    ("cambridge", &["cam.ac.uk"]),
];

/// `{id}` is replaced with the lowercased college id.
const DOMAIN_PATTERNS: &[&str] = &[
    "{id}.edu",
    "{id}.ac.in",
    "{id}.edu.in",
    "{id}-university.edu",
    "{id}-university.ac.in",
    "{id}.college.edu",
    "{id}-regional.edu",
    "{id}-regional.ac.in",
    "department.{id}.edu",
    "department.{id}.ac.in",
    "student.{id}.edu",
    "student.{id}.ac.in",
    "alumni.{id}.edu",
    "{id}.ac.uk",
    "{id}.edu.au",
    "{id}.ca",
    "{id}-tech.edu",
    "{id}-tech.ac.in",
];

/// Example placeholders for the join form, keyed by college id.
const PLACEHOLDERS: &[(&str, &str)] = &[
    ("mit", "username@mit.edu"),
    ("harvard", "username@harvard.edu"),
    ("stanford", "username@stanford.edu"),
    ("iit", "username@iitb.ac.in"),
    ("nitk", "username@nitk.ac.in"),
    ("bits", "username@hyderabad.bits-pilani.ac.in"),
];

/// Normalize an address: trimmed, lowercased, exactly one `@` with both
/// sides non-empty.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

/// Domain part of an already-normalized address.
#[must_use]
pub fn email_domain(email: &str) -> Option<&str> {
    email.split_once('@').map(|(_, domain)| domain)
}

fn known_domains(college_id: &str) -> &'static [&'static str] {
    for (id, domains) in KNOWN_DOMAINS {
        if *id == college_id {
            return domains;
        }
    }
    &[]
}

/// Every exact domain accepted for a college: the known exceptions plus the
/// generated conventional patterns.
#[must_use]
pub fn valid_domains_for(college_id: &str) -> BTreeSet<String> {
    let id = college_id.trim().to_ascii_lowercase();
    if id.is_empty() {
        return BTreeSet::new();
    }
    let mut domains: BTreeSet<String> = known_domains(&id).iter().map(|d| (*d).to_owned()).collect();
    domains.extend(DOMAIN_PATTERNS.iter().map(|p| p.replace("{id}", &id)));
    domains
}

/// Whether a bare domain is acceptable for a college.
#[must_use]
pub fn domain_matches_college(domain: &str, college_id: &str) -> bool {
    let domain = domain.trim().to_ascii_lowercase();
    let id = college_id.trim().to_ascii_lowercase();
    if domain.is_empty() || id.is_empty() {
        return false;
    }
    if valid_domains_for(&id).contains(&domain) {
        return true;
    }
    if known_domains(&id).iter().any(|known| domain.contains(known)) {
        return true;
    }
    domain.contains(&id)
}

/// Whether an address is acceptable for a college. Malformed addresses never match.
#[must_use]
pub fn email_matches_college(email: &str, college_id: &str) -> bool {
    let Some(normalized) = normalize_email(email) else {
        return false;
    };
    email_domain(&normalized).is_some_and(|domain| domain_matches_college(domain, college_id))
}

/// Example address shown to users of a college.
#[must_use]
pub fn email_placeholder(college_id: &str) -> String {
    let id = college_id.trim().to_ascii_lowercase();
    PLACEHOLDERS
        .iter()
        .find(|(key, _)| *key == id)
        .map_or_else(|| format!("username@{id}.edu"), |(_, example)| (*example).to_owned())
}

/// Short list of example domains for an error message.
#[must_use]
pub fn example_domains(college_id: &str) -> String {
    let id = college_id.trim().to_ascii_lowercase();
    let known = known_domains(&id);
    if known.is_empty() {
        format!("{id}.edu, {id}.ac.in")
    } else {
        known.join(", ")
    }
}

#[cfg(test)]
#[path = "domains_test.rs"]
mod tests;
