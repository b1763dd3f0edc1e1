use scraper::{Html, Selector};
use std::sync::Arc;

use super::pattern::CurrencyPattern;
use super::{ExtractionContext, ExtractionStrategy};
use crate::models::{PriceToken, StrategyKind};
use crate::ocr::OcrEngine;
use crate::{Result, ScoutError};

/// Reads prices from dedicated price elements, trying selectors from most to least specific.
pub struct StructuredScan {
    selectors: Vec<String>,
    pattern: CurrencyPattern,
}

impl StructuredScan {
    pub fn new(selectors: Vec<String>, pattern: CurrencyPattern) -> Result<Self> {
        for selector in &selectors {
            Selector::parse(selector).map_err(|e| {
                ScoutError::ConfigError(format!("invalid price selector '{}': {}", selector, e))
            })?;
        }
        Ok(Self { selectors, pattern })
    }

    /// One token per matched element, from the first selector that yields anything.
    pub fn scan(&self, markup: &str) -> Vec<PriceToken> {
        let document = Html::parse_document(markup);

        for raw in &self.selectors {
            let Ok(selector) = Selector::parse(raw) else {
                continue;
            };

            let tokens: Vec<PriceToken> = document
                .select(&selector)
                .filter_map(|element| {
                    let text = element.text().collect::<Vec<_>>().join(" ");
                    self.pattern.first(&text)
                })
                .collect();

            if tokens.is_empty() {
                tracing::debug!(
                    error = %ScoutError::ElementNotFound { selector: raw.clone() },
                    "Price selector yielded nothing"
                );
                continue;
            }

            tracing::debug!(selector = %raw, prices = tokens.len(), "Price selector matched");
            return tokens;
        }

        Vec::new()
    }
}

#[async_trait::async_trait]
impl ExtractionStrategy for StructuredScan {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structured
    }

    async fn attempt(&self, context: &mut ExtractionContext<'_>) -> Result<Vec<PriceToken>> {
        let markup = context.markup().await?;
        Ok(self.scan(markup))
    }
}

/// Pattern scan over the whole serialized page.
pub struct MarkupScan {
    pattern: CurrencyPattern,
}

impl MarkupScan {
    pub fn new(pattern: CurrencyPattern) -> Self {
        Self { pattern }
    }
}

#[async_trait::async_trait]
impl ExtractionStrategy for MarkupScan {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MarkupScan
    }

    async fn attempt(&self, context: &mut ExtractionContext<'_>) -> Result<Vec<PriceToken>> {
        let markup = context.markup().await?;
        Ok(self.pattern.scan(markup))
    }
}

/// Pattern scan over text recognized from the rendered page image.
pub struct OcrScan {
    engine: Arc<dyn OcrEngine>,
    pattern: CurrencyPattern,
}

impl OcrScan {
    pub fn new(engine: Arc<dyn OcrEngine>, pattern: CurrencyPattern) -> Self {
        Self { engine, pattern }
    }
}

#[async_trait::async_trait]
impl ExtractionStrategy for OcrScan {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Ocr
    }

    async fn attempt(&self, context: &mut ExtractionContext<'_>) -> Result<Vec<PriceToken>> {
        let image = context.image().await?;
        let text = self.engine.recognize(image).await?;
        tracing::debug!(chars = text.len(), "OCR text recognized");
        Ok(self.pattern.scan(&text))
    }
}
