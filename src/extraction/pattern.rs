use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::PriceToken;
use crate::stats::round2;
use crate::{Result, ScoutError};

static NUMERIC_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("numeric pattern is valid"));

/// Currency-token matcher: marker, optional whitespace, integer part with optional comma
/// grouping, optional one- or two-digit fraction.
#[derive(Debug, Clone)]
pub struct CurrencyPattern {
    marker: String,
    regex: Regex,
}

impl CurrencyPattern {
    pub fn new(marker: &str) -> Result<Self> {
        if marker.trim().is_empty() {
            return Err(ScoutError::ConfigError(
                "currency marker must not be empty".into(),
            ));
        }

        // A word boundary only makes sense in front of word characters ("R"), not symbols ("$").
        let boundary = if marker.chars().next().is_some_and(char::is_alphanumeric) {
            r"\b"
        } else {
            ""
        };
        let source = format!(
            r"{}{}\s*(?:\d{{1,3}}(?:,\d{{3}})+|\d+)(?:\.\d{{1,2}})?",
            boundary,
            regex::escape(marker)
        );
        let regex = Regex::new(&source)
            .map_err(|e| ScoutError::ConfigError(format!("invalid currency pattern: {}", e)))?;

        Ok(Self {
            marker: marker.to_string(),
            regex,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// First price token in `text`, used for one-token-per-element scans.
    pub fn first(&self, text: &str) -> Option<PriceToken> {
        self.regex
            .find_iter(text)
            .find_map(|m| PriceParser::token(m.as_str()))
    }

    /// Every price token in `text`, in document order.
    pub fn scan(&self, text: &str) -> Vec<PriceToken> {
        self.regex
            .find_iter(text)
            .filter_map(|m| PriceParser::token(m.as_str()))
            .collect()
    }
}

pub struct PriceParser;

impl PriceParser {
    /// Numeric value of a raw currency match, or `None` when it holds no positive number.
    pub fn normalize(raw_match: &str) -> Option<f64> {
        let digits = NUMERIC_PART.find(raw_match)?.as_str().replace(',', "");
        let value: f64 = digits.parse().ok()?;
        (value.is_finite() && value > 0.0).then(|| round2(value))
    }

    pub fn token(raw_match: &str) -> Option<PriceToken> {
        Self::normalize(raw_match).map(|value| PriceToken {
            raw_match: raw_match.to_string(),
            value,
        })
    }
}
