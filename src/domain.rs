//! Domain name helpers: validation, parent-domain selection and the small
//! normalizations applied to raw lookup answers.

use once_cell::sync::Lazy;
use publicsuffix::{IcannList, Psl};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::error;

use crate::dns::MxRecord;
use crate::errors::IntelError;

static STATUS_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-zA-Z]+Prohibited)").expect("status code pattern is valid"));

const PUBLIC_SUFFIX_DATA: &str = include_str!("../data/public_suffix_list.dat");

// ICANN section only: private entries such as `github.io` are not WHOIS registries.
pub(crate) static SUFFIX_LIST: Lazy<IcannList> = Lazy::new(|| {
    match PUBLIC_SUFFIX_DATA.parse::<IcannList>() {
        Ok(list) => list,
        Err(e) => {
            error!("Embedded public suffix list is invalid: {}", e);
            IcannList::default()
        }
    }
});

/// How the domain handed to WHOIS is derived from the requested name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentDomainStrategy {
    /// Last two labels when the second-to-last label is longer than three characters.
    #[default]
    Heuristic,
    /// Registrable domain according to the suffix list.
    #[serde(alias = "psl")]
    PublicSuffix,
}

impl FromStr for ParentDomainStrategy {
    type Err = IntelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "public_suffix" | "psl" => Ok(Self::PublicSuffix),
            other => Err(IntelError::Internal(format!(
                "Unknown parent domain strategy: {other}"
            ))),
        }
    }
}

/// Normalize and validate a requested domain name.
pub fn validate_domain(domain: &str) -> Result<String, IntelError> {
    let mut domain = domain.trim().to_lowercase();
    if domain.ends_with('.') {
        domain.pop();
    }

    if domain.is_empty() {
        return Err(IntelError::InvalidDomain(
            "Domain name is required".to_string(),
        ));
    }

    if domain.len() > 253 {
        return Err(IntelError::InvalidDomain("Domain name too long".to_string()));
    }

    if !domain.contains('.') || domain.split('.').any(str::is_empty) {
        return Err(IntelError::InvalidDomain(
            "Invalid domain format".to_string(),
        ));
    }

    if domain.chars().any(char::is_whitespace) {
        return Err(IntelError::InvalidDomain(
            "Invalid domain format".to_string(),
        ));
    }

    Ok(domain)
}

/// Domain used for WHOIS queries.
pub fn parent_domain(domain: &str, strategy: ParentDomainStrategy) -> String {
    match strategy {
        ParentDomainStrategy::Heuristic => heuristic_parent(domain),
        ParentDomainStrategy::PublicSuffix => registrable_domain(domain)
            .unwrap_or_else(|| heuristic_parent(domain)),
    }
}

/// `sub.example.com` -> `example.com`, but `www.example.co.uk` is left untouched
/// because `co` is too short to be taken for a registrable label.
fn heuristic_parent(domain: &str) -> String {
    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() > 2 && parts[parts.len() - 2].len() > 3 {
        parts[parts.len() - 2..].join(".")
    } else {
        domain.to_string()
    }
}

fn registrable_domain(domain: &str) -> Option<String> {
    let parsed = SUFFIX_LIST.domain(domain.as_bytes())?;
    std::str::from_utf8(parsed.as_bytes()).ok().map(str::to_string)
}

/// EPP `...Prohibited` codes in first-seen order, without duplicates.
pub fn extract_status_codes(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let mut codes: Vec<String> = Vec::new();
    for capture in STATUS_CODE.captures_iter(raw) {
        let code = &capture[1];
        if !codes.iter().any(|existing| existing == code) {
            codes.push(code.to_string());
        }
    }
    codes
}

pub fn format_mx(records: &[MxRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            format!(
                "{} (priority: {})",
                record.exchange.trim_end_matches('.'),
                record.priority
            )
        })
        .collect()
}

pub fn flatten_txt(records: Vec<Vec<String>>) -> Vec<String> {
    records.into_iter().flatten().collect()
}
