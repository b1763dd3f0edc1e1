use crate::models::PriceStatistics;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct StatisticsEngine;

impl StatisticsEngine {
    pub fn compute(values: &[f64]) -> PriceStatistics {
        if values.is_empty() {
            return PriceStatistics::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        PriceStatistics {
            average: round2(sum / count as f64),
            median: round2(median),
            min: sorted[0],
            max: sorted[count - 1],
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let stats = StatisticsEngine::compute(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 0.0);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.median, 0.0);
    }

    #[test]
    fn test_odd_median() {
        let stats = StatisticsEngine::compute(&[30.0, 10.0, 20.0]);
        assert_eq!(stats.median, 20.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.average, 20.0);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn test_even_median() {
        let stats = StatisticsEngine::compute(&[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(stats.median, 25.0);
        assert_eq!(stats.average, 25.0);
    }

    #[test]
    fn test_rounding() {
        let stats = StatisticsEngine::compute(&[10.0, 10.0, 10.01]);
        assert_eq!(stats.average, 10.0);

        let stats = StatisticsEngine::compute(&[1.0, 2.0, 2.0]);
        assert_eq!(stats.average, 1.67);

        let stats = StatisticsEngine::compute(&[1.0, 2.25]);
        assert_eq!(stats.median, 1.63);
    }

    #[test]
    fn test_single_value() {
        let stats = StatisticsEngine::compute(&[1299.99]);
        assert_eq!(stats.min, 1299.99);
        assert_eq!(stats.max, 1299.99);
        assert_eq!(stats.median, 1299.99);
        assert_eq!(stats.average, 1299.99);
    }

    #[test]
    fn test_ordering_invariants() {
        let samples: [&[f64]; 4] = [
            &[5.0, 1.0, 1000.0],
            &[99.99, 99.99, 100.0, 1.0],
            &[0.5, 12_345.67, 18.0, 19.5, 20.0, 3.0],
            &[7.0],
        ];

        for values in samples {
            let stats = StatisticsEngine::compute(values);
            assert!(stats.min <= stats.median && stats.median <= stats.max);
            assert!(stats.min <= stats.average && stats.average <= stats.max);
            assert_eq!(stats.count, values.len());
        }
    }

    #[test]
    fn test_input_not_mutated() {
        let values = vec![3.0, 1.0, 2.0];
        let _ = StatisticsEngine::compute(&values);
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
    }
}
