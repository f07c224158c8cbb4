//! Cleaning rules for individual tag keys and values.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters that may not appear in an output key.
pub static PROBLEM_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[=\+/&<>;'"\?%#$@,\. \t\r\n]"#).expect("valid regex"));

static POSTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}(-[0-9]{4})?").expect("valid regex"));

static PHONE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{3,10}").expect("valid regex"));

pub const POSTCODE_FIXME: &str = "fixme";

/// Lookup tables used when cleaning values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NormalizationTables {
    /// Whitespace-delimited street token to its full form. Keys are case sensitive.
    pub street_abbreviations: HashMap<String, String>,
    /// Known malformed city names, matched after capitalisation.
    pub city_corrections: HashMap<String, String>,
}

impl Default for NormalizationTables {
    fn default() -> Self {
        let street_abbreviations = [
            ("ave", "Avenue"),
            ("Ave", "Avenue"),
            ("Avenu", "Avenue"),
            ("Bl", "Boulevard"),
            ("Blvd", "Boulevard"),
            ("Cir", "Circle"),
            ("Ct", "Court"),
            ("Dr", "Drive"),
            ("line", "Line"),
            ("Pkwy", "Parkway"),
            ("PW", "Parkway"),
            ("Rd", "Road"),
            ("St", "Street"),
            ("Stree", "Street"),
            // Also hits initials such as "John F Kennedy"; accepted.
            ("N", "North"),
            ("S", "South"),
            ("E", "East"),
            ("W", "West"),
        ];
        let city_corrections = [
            ("East Rochester Town", "East Rochester"),
            ("Rochester, NY", "Rochester"),
            ("Rochestet", "Rochester"),
            ("W Commercial St", "East Rochester"),
        ];

        NormalizationTables {
            street_abbreviations: street_abbreviations
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            city_corrections: city_corrections
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Fewer than ten digits were left after dropping the country code.
    PhoneTooShort { digits: String },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::PhoneTooShort { digits } => {
                write!(f, "phone number has too few digits ({:?})", digits)
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

pub fn has_problem_chars(key: &str) -> bool {
    PROBLEM_CHARS.is_match(key)
}

/// Replaces every disallowed character in `key` with an underscore.
pub fn fix_problem_chars(key: &str) -> Cow<'_, str> {
    PROBLEM_CHARS.replace_all(key, "_")
}

pub fn expand_street_abbreviations(street: &str, abbreviations: &HashMap<String, String>) -> String {
    street
        .split_whitespace()
        .map(|token| abbreviations.get(token).map(String::as_str).unwrap_or(token))
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Uppercases the first letter, then applies the correction table.
pub fn correct_city(city: &str, corrections: &HashMap<String, String>) -> String {
    let mut chars = city.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    match corrections.get(&capitalized) {
        Some(corrected) => corrected.clone(),
        None => capitalized,
    }
}

/// Five digits with an optional `-dddd` suffix pass through, anything else
/// becomes [`POSTCODE_FIXME`].
pub fn validate_postcode(code: &str) -> String {
    if POSTCODE.is_match(code) {
        code.to_string()
    } else {
        POSTCODE_FIXME.to_string()
    }
}

/// Reformats a phone number as `ddd-ddd-dddd`.
///
/// Digit runs of three to ten characters are collected. With more than three runs
/// the first is taken to be a country code and dropped. Digits past the tenth are
/// discarded.
pub fn format_phone_number(raw: &str) -> Result<String, NormalizeError> {
    let mut clusters: Vec<&str> = PHONE_DIGITS.find_iter(raw).map(|m| m.as_str()).collect();
    if clusters.len() > 3 {
        clusters.remove(0);
    }
    let digits = clusters.concat();
    if digits.len() < 10 {
        return Err(NormalizeError::PhoneTooShort { digits });
    }
    Ok(format!("{}-{}-{}", &digits[0..3], &digits[3..6], &digits[6..10]))
}
