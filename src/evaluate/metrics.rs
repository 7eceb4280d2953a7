use crate::output::Prediction;
use crate::predictor::geodesic_distance;
use crate::query::QueryId;
use std::collections::HashMap;

/// Per-item errors for the predictions that had comparable ground truth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scorecard {
    /// Meters.
    pub location_errors: Vec<f64>,
    /// Seconds.
    pub time_errors: Vec<f64>,
    /// Predictions with no ground truth under their id.
    pub unmatched: usize,
    /// Predictions whose ground truth is of the other kind.
    pub mismatched: usize,
}

impl Scorecard {
    pub fn location_stats(&self) -> Option<ErrorStats> {
        ErrorStats::from_errors(&self.location_errors)
    }

    pub fn time_stats(&self) -> Option<ErrorStats> {
        ErrorStats::from_errors(&self.time_errors)
    }
}

/// Compares each prediction with the ground truth under the same id.
/// Missing or different-kind truth is skipped and only counted.
pub fn score(predictions: &[Prediction], truth: &HashMap<QueryId, Prediction>) -> Scorecard {
    let mut card = Scorecard::default();

    for prediction in predictions {
        let Some(expected) = truth.get(prediction.id()) else {
            card.unmatched += 1;
            continue;
        };
        match (prediction, expected) {
            (Prediction::Location(_, lat, lon), Prediction::Location(_, true_lat, true_lon)) => {
                card.location_errors
                    .push(geodesic_distance(*lat, *lon, *true_lat, *true_lon));
            }
            (Prediction::Time(_, ts), Prediction::Time(_, true_ts)) => {
                card.time_errors.push(ts.abs_diff(*true_ts) as f64 / 1000.0);
            }
            _ => card.mismatched += 1,
        }
    }

    card
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorStats {
    pub count: usize,
    pub mean_absolute: f64,
    pub root_mean_square: f64,
    pub max: f64,
}

impl ErrorStats {
    /// `None` when there is nothing to aggregate.
    pub fn from_errors(errors: &[f64]) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        let n = errors.len() as f64;
        let mean_absolute = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let root_mean_square = (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt();
        let max = errors.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            count: errors.len(),
            mean_absolute,
            root_mean_square,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_errors() {
        let stats = ErrorStats::from_errors(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]).unwrap();
        assert_eq!(stats.count, 7);
        assert_eq!(stats.mean_absolute, 4.0);
        assert_eq!(stats.max, 7.0);
        assert!((stats.root_mean_square - (140.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_errors_report_no_data() {
        assert_eq!(ErrorStats::from_errors(&[]), None);
    }

    #[test]
    fn unmatched_predictions_are_excluded() {
        let mut predictions = Vec::new();
        let mut truth = HashMap::new();
        for i in 0..10 {
            let id = QueryId::Number(i);
            predictions.push(Prediction::Location(id.clone(), 0.0, 0.0));
            if i < 7 {
                truth.insert(id.clone(), Prediction::Location(id, 0.0, 0.0));
            }
        }

        let card = score(&predictions, &truth);

        assert_eq!(card.location_errors, vec![0.0; 7]);
        assert_eq!(card.unmatched, 3);
        assert_eq!(card.location_stats().map(|s| s.count), Some(7));
        assert_eq!(card.time_stats(), None);
    }

    #[test]
    fn location_errors_are_geodesic_meters() {
        let id = QueryId::Text("a".into());
        let predictions = vec![Prediction::Location(id.clone(), 0.0, 0.0)];
        let truth = HashMap::from([(id.clone(), Prediction::Location(id, 1.0, 0.0))]);

        let card = score(&predictions, &truth);

        assert_eq!(card.location_errors.len(), 1);
        assert!((card.location_errors[0] - 110_574.4).abs() < 1.0);
    }

    #[test]
    fn time_errors_are_absolute_seconds() {
        let predictions = vec![
            Prediction::Time(QueryId::Number(1), 10_000),
            Prediction::Time(QueryId::Number(2), 10_000),
        ];
        let truth = HashMap::from([
            (QueryId::Number(1), Prediction::Time(QueryId::Number(1), 70_000)),
            (QueryId::Number(2), Prediction::Time(QueryId::Number(2), 4_000)),
        ]);

        let card = score(&predictions, &truth);

        assert_eq!(card.time_errors, vec![60.0, 6.0]);
        let stats = card.time_stats().unwrap();
        assert_eq!(stats.mean_absolute, 33.0);
        assert_eq!(stats.max, 60.0);
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let predictions = vec![Prediction::Time(QueryId::Number(1), 1000)];
        let truth = HashMap::from([(
            QueryId::Number(1),
            Prediction::Time(QueryId::Number(1), i64::MIN),
        )]);

        let card = score(&predictions, &truth);

        assert_eq!(card.time_errors.len(), 1);
        assert!(card.time_errors[0] > 9.2e15);
    }

    #[test]
    fn kind_mismatch_is_skipped() {
        let predictions = vec![Prediction::Time(QueryId::Number(1), 10_000)];
        let truth = HashMap::from([(
            QueryId::Number(1),
            Prediction::Location(QueryId::Number(1), 0.0, 0.0),
        )]);

        let card = score(&predictions, &truth);

        assert!(card.time_errors.is_empty());
        assert!(card.location_errors.is_empty());
        assert_eq!(card.mismatched, 1);
    }

    #[test]
    fn empty_truth_scores_nothing() {
        let predictions = vec![
            Prediction::Time(QueryId::Number(1), 10_000),
            Prediction::Location(QueryId::Number(2), 1.0, 1.0),
        ];
        let card = score(&predictions, &HashMap::new());

        assert_eq!(card.location_stats(), None);
        assert_eq!(card.time_stats(), None);
        assert_eq!(card.unmatched, 2);
    }
}
