pub mod pattern;
pub mod strategies;

use std::sync::Arc;

pub use pattern::{CurrencyPattern, PriceParser};
pub use strategies::{MarkupScan, OcrScan, StructuredScan};

use crate::config::ExtractionConfig;
use crate::models::{ExtractionResult, PageArtifact, PriceToken, StrategyAttempt, StrategyKind};
use crate::ocr::OcrEngine;
use crate::{Result, ScoutError};

/// Anything that can hand over the rendered page, optionally with a full-page image.
#[async_trait::async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn capture(&self, include_image: bool) -> Result<PageArtifact>;
}

/// Lazily captured page state shared by the strategies of one pipeline run.
pub struct ExtractionContext<'a> {
    source: &'a dyn ArtifactSource,
    artifact: Option<PageArtifact>,
    captures: usize,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(source: &'a dyn ArtifactSource) -> Self {
        Self {
            source,
            artifact: None,
            captures: 0,
        }
    }

    pub async fn markup(&mut self) -> Result<&str> {
        if self.artifact.is_none() {
            self.artifact = Some(self.source.capture(false).await?);
            self.captures += 1;
        }
        Ok(self
            .artifact
            .as_ref()
            .map(|artifact| artifact.markup.as_str())
            .unwrap_or_default())
    }

    /// The page image; recaptures when the cached artifact was taken without one.
    pub async fn image(&mut self) -> Result<&[u8]> {
        let has_image = self
            .artifact
            .as_ref()
            .is_some_and(|artifact| artifact.image.is_some());
        if !has_image {
            self.artifact = Some(self.source.capture(true).await?);
            self.captures += 1;
        }
        self.artifact
            .as_ref()
            .and_then(|artifact| artifact.image.as_deref())
            .ok_or_else(|| ScoutError::Protocol("page capture returned no image".into()))
    }

    pub fn captures(&self) -> usize {
        self.captures
    }
}

#[async_trait::async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn attempt(&self, context: &mut ExtractionContext<'_>) -> Result<Vec<PriceToken>>;
}

/// Runs strategies in order and stops at the first one that clears the confidence threshold.
pub struct ExtractionPipeline {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    min_confidence: usize,
}

impl ExtractionPipeline {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>, min_confidence: usize) -> Self {
        Self {
            strategies,
            min_confidence,
        }
    }

    /// Structured scan, then markup scan, then OCR when an engine is available.
    pub fn from_config(
        config: &ExtractionConfig,
        ocr: Option<Arc<dyn OcrEngine>>,
    ) -> Result<Self> {
        let pattern = CurrencyPattern::new(&config.currency_marker)?;

        let mut strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(StructuredScan::new(
                config.price_selectors.clone(),
                pattern.clone(),
            )?),
            Box::new(MarkupScan::new(pattern.clone())),
        ];
        if let Some(engine) = ocr {
            strategies.push(Box::new(OcrScan::new(engine, pattern)));
        }

        Ok(Self::new(strategies, config.min_confidence))
    }

    pub fn min_confidence(&self) -> usize {
        self.min_confidence
    }

    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Failures of intermediate strategies count as an empty yield; a failure of the last
    /// strategy ends the run.
    pub async fn run(&self, source: &dyn ArtifactSource) -> Result<ExtractionResult> {
        let mut context = ExtractionContext::new(source);
        let mut attempts = Vec::with_capacity(self.strategies.len());
        let mut best: Option<(StrategyKind, Vec<PriceToken>)> = None;
        let last = self.strategies.len().saturating_sub(1);

        for (index, strategy) in self.strategies.iter().enumerate() {
            let kind = strategy.kind();
            let tokens = match strategy.attempt(&mut context).await {
                Ok(tokens) => tokens,
                Err(e) if index == last => {
                    tracing::error!(strategy = %kind, error = %e, "Final extraction strategy failed");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(strategy = %kind, error = %e, "Extraction strategy failed, continuing");
                    Vec::new()
                }
            };

            let count = tokens.len();
            attempts.push(StrategyAttempt {
                strategy: kind,
                yield_count: count,
            });
            tracing::info!(strategy = %kind, prices = count, threshold = self.min_confidence, "Extraction strategy finished");

            if count >= self.min_confidence {
                tracing::debug!(captures = context.captures(), "Extraction settled");
                return Ok(Self::result(kind, tokens, attempts));
            }
            if best.as_ref().is_none_or(|(_, found)| count > found.len()) {
                best = Some((kind, tokens));
            }
        }

        let (kind, tokens) = best.unwrap_or((StrategyKind::Structured, Vec::new()));
        tracing::info!(strategy = %kind, prices = tokens.len(), captures = context.captures(), "No strategy reached the threshold, using best yield");
        Ok(Self::result(kind, tokens, attempts))
    }

    fn result(
        strategy: StrategyKind,
        tokens: Vec<PriceToken>,
        attempts: Vec<StrategyAttempt>,
    ) -> ExtractionResult {
        ExtractionResult {
            strategy,
            values: tokens.into_iter().map(|token| token.value).collect(),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource {
        markup: String,
        captures: AtomicUsize,
        image_captures: AtomicUsize,
    }

    impl StaticSource {
        fn new(markup: &str) -> Self {
            Self {
                markup: markup.to_string(),
                captures: AtomicUsize::new(0),
                image_captures: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ArtifactSource for StaticSource {
        async fn capture(&self, include_image: bool) -> Result<PageArtifact> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            let image = if include_image {
                self.image_captures.fetch_add(1, Ordering::SeqCst);
                Some(vec![0u8; 4])
            } else {
                None
            };
            Ok(PageArtifact::new(self.markup.clone(), image))
        }
    }

    enum Outcome {
        Prices(Vec<f64>),
        Fail,
    }

    struct ScriptedStrategy {
        kind: StrategyKind,
        outcome: Outcome,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedStrategy {
        fn boxed(kind: StrategyKind, outcome: Outcome, calls: &Arc<AtomicUsize>) -> Box<dyn ExtractionStrategy> {
            Box::new(Self {
                kind,
                outcome,
                calls: Arc::clone(calls),
            })
        }
    }

    #[async_trait::async_trait]
    impl ExtractionStrategy for ScriptedStrategy {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        async fn attempt(&self, context: &mut ExtractionContext<'_>) -> Result<Vec<PriceToken>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            context.markup().await?;
            match &self.outcome {
                Outcome::Prices(values) => Ok(values
                    .iter()
                    .map(|v| PriceToken {
                        raw_match: format!("R{}", v),
                        value: *v,
                    })
                    .collect()),
                Outcome::Fail => Err(ScoutError::RecognitionFailed("scripted".into())),
            }
        }
    }

    fn prices(n: usize) -> Outcome {
        Outcome::Prices((1..=n).map(|i| i as f64 * 10.0).collect())
    }

    fn counters() -> [Arc<AtomicUsize>; 3] {
        std::array::from_fn(|_| Arc::new(AtomicUsize::new(0)))
    }

    #[tokio::test]
    async fn test_first_strategy_meets_threshold() {
        let calls = counters();
        let pipeline = ExtractionPipeline::new(
            vec![
                ScriptedStrategy::boxed(StrategyKind::Structured, prices(12), &calls[0]),
                ScriptedStrategy::boxed(StrategyKind::MarkupScan, prices(40), &calls[1]),
                ScriptedStrategy::boxed(StrategyKind::Ocr, prices(3), &calls[2]),
            ],
            5,
        );

        let result = pipeline.run(&StaticSource::new("")).await.unwrap();
        assert_eq!(result.strategy, StrategyKind::Structured);
        assert_eq!(result.values.len(), 12);
        assert_eq!(calls[1].load(Ordering::SeqCst), 0);
        assert_eq!(calls[2].load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_strategy_meets_threshold() {
        let calls = counters();
        let pipeline = ExtractionPipeline::new(
            vec![
                ScriptedStrategy::boxed(StrategyKind::Structured, prices(2), &calls[0]),
                ScriptedStrategy::boxed(StrategyKind::MarkupScan, prices(7), &calls[1]),
                ScriptedStrategy::boxed(StrategyKind::Ocr, prices(30), &calls[2]),
            ],
            5,
        );

        let result = pipeline.run(&StaticSource::new("")).await.unwrap();
        assert_eq!(result.strategy, StrategyKind::MarkupScan);
        assert_eq!(result.values.len(), 7);
        assert_eq!(calls[2].load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_best_yield_when_nothing_meets_threshold() {
        let calls = counters();
        let pipeline = ExtractionPipeline::new(
            vec![
                ScriptedStrategy::boxed(StrategyKind::Structured, prices(2), &calls[0]),
                ScriptedStrategy::boxed(StrategyKind::MarkupScan, prices(3), &calls[1]),
                ScriptedStrategy::boxed(StrategyKind::Ocr, prices(4), &calls[2]),
            ],
            5,
        );

        let result = pipeline.run(&StaticSource::new("")).await.unwrap();
        assert_eq!(result.strategy, StrategyKind::Ocr);
        assert_eq!(result.values.len(), 4);
        assert_eq!(result.attempts.len(), 3);
    }

    #[tokio::test]
    async fn test_ties_prefer_earlier_strategy() {
        let calls = counters();
        let pipeline = ExtractionPipeline::new(
            vec![
                ScriptedStrategy::boxed(StrategyKind::Structured, prices(3), &calls[0]),
                ScriptedStrategy::boxed(StrategyKind::MarkupScan, prices(3), &calls[1]),
                ScriptedStrategy::boxed(StrategyKind::Ocr, prices(0), &calls[2]),
            ],
            5,
        );

        let result = pipeline.run(&StaticSource::new("")).await.unwrap();
        assert_eq!(result.strategy, StrategyKind::Structured);
    }

    #[tokio::test]
    async fn test_all_empty_is_success() {
        let calls = counters();
        let pipeline = ExtractionPipeline::new(
            vec![
                ScriptedStrategy::boxed(StrategyKind::Structured, prices(0), &calls[0]),
                ScriptedStrategy::boxed(StrategyKind::MarkupScan, prices(0), &calls[1]),
                ScriptedStrategy::boxed(StrategyKind::Ocr, prices(0), &calls[2]),
            ],
            5,
        );

        let result = pipeline.run(&StaticSource::new("")).await.unwrap();
        assert!(result.values.is_empty());
        assert!(result.attempts.iter().all(|a| a.yield_count == 0));
    }

    #[tokio::test]
    async fn test_intermediate_failure_counts_as_empty() {
        let calls = counters();
        let pipeline = ExtractionPipeline::new(
            vec![
                ScriptedStrategy::boxed(StrategyKind::Structured, Outcome::Fail, &calls[0]),
                ScriptedStrategy::boxed(StrategyKind::MarkupScan, prices(6), &calls[1]),
            ],
            5,
        );

        let result = pipeline.run(&StaticSource::new("")).await.unwrap();
        assert_eq!(result.strategy, StrategyKind::MarkupScan);
        assert_eq!(result.attempts[0].yield_count, 0);
    }

    #[tokio::test]
    async fn test_final_failure_propagates() {
        let calls = counters();
        let pipeline = ExtractionPipeline::new(
            vec![
                ScriptedStrategy::boxed(StrategyKind::Structured, prices(1), &calls[0]),
                ScriptedStrategy::boxed(StrategyKind::Ocr, Outcome::Fail, &calls[1]),
            ],
            5,
        );

        let err = pipeline.run(&StaticSource::new("")).await.unwrap_err();
        assert!(matches!(err, ScoutError::RecognitionFailed(_)));
    }

    #[tokio::test]
    async fn test_markup_captured_once() {
        let calls = counters();
        let source = StaticSource::new("<html></html>");
        let pipeline = ExtractionPipeline::new(
            vec![
                ScriptedStrategy::boxed(StrategyKind::Structured, prices(0), &calls[0]),
                ScriptedStrategy::boxed(StrategyKind::MarkupScan, prices(0), &calls[1]),
            ],
            5,
        );

        pipeline.run(&source).await.unwrap();
        assert_eq!(source.captures.load(Ordering::SeqCst), 1);
        assert_eq!(source.image_captures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_image_recaptured_on_demand() {
        let source = StaticSource::new("<p>R10</p>");
        let mut context = ExtractionContext::new(&source);

        assert_eq!(context.markup().await.unwrap(), "<p>R10</p>");
        assert_eq!(context.image().await.unwrap().len(), 4);
        assert_eq!(context.image().await.unwrap().len(), 4);
        assert_eq!(context.captures(), 2);
        assert_eq!(source.image_captures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_from_config_without_ocr() {
        let pipeline = ExtractionPipeline::from_config(&ExtractionConfig::default(), None).unwrap();
        assert_eq!(
            pipeline.strategy_kinds(),
            vec![StrategyKind::Structured, StrategyKind::MarkupScan]
        );
        assert_eq!(pipeline.min_confidence(), 5);
    }
}
