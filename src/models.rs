use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ScoutError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    term: String,
    debug: bool,
}

impl SearchQuery {
    /// Rejects blank terms up front so no rendering context is ever opened for them.
    pub fn new(term: impl Into<String>, debug: bool) -> Result<Self> {
        let term = term.into().trim().to_string();
        if term.is_empty() {
            return Err(ScoutError::InvalidInput(
                "search term must not be empty".into(),
            ));
        }
        Ok(Self { term, debug })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}

/// Rendered page content handed from the session to the extraction pipeline.
#[derive(Debug, Clone, Default)]
pub struct PageArtifact {
    pub markup: String,
    pub image: Option<Vec<u8>>,
}

impl PageArtifact {
    pub fn new(markup: String, image: Option<Vec<u8>>) -> Self {
        Self { markup, image }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceToken {
    pub raw_match: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    Structured,
    MarkupScan,
    Ocr,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Structured => "STRUCTURED",
            Self::MarkupScan => "MARKUP_SCAN",
            Self::Ocr => "OCR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: StrategyKind,
    #[serde(rename = "yield")]
    pub yield_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub strategy: StrategyKind,
    pub values: Vec<f64>,
    pub attempts: Vec<StrategyAttempt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PriceStatistics {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub search_term: String,
    pub timestamp: DateTime<Utc>,
    pub extraction: ExtractionResult,
    pub stats: PriceStatistics,
    pub diagnostics: Option<Diagnostics>,
}

/// Extra detail attached to a result when the query asked for debug output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub request_id: String,
    pub url: String,
    pub strategy: StrategyKind,
    pub attempts: Vec<StrategyAttempt>,
    pub states: Vec<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub search_term: String,
    pub timestamp: String,
    pub results: ResultsBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Diagnostics>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsBody {
    pub total_prices_found: usize,
    pub prices: Vec<f64>,
    pub stats: PriceStatistics,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&SearchResult> for SearchResponse {
    fn from(result: &SearchResult) -> Self {
        Self {
            search_term: result.search_term.clone(),
            timestamp: result.timestamp.to_rfc3339(),
            results: ResultsBody {
                total_prices_found: result.extraction.values.len(),
                prices: result.extraction.values.clone(),
                stats: result.stats,
            },
            debug: result.diagnostics.clone(),
        }
    }
}

impl From<&ScoutError> for ErrorResponse {
    fn from(err: &ScoutError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}
