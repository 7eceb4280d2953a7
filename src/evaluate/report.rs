use crate::evaluate::metrics::{ErrorStats, Scorecard};
use chrono::{DateTime, Utc};

/// Everything the text report needs besides the scorecard.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub generated_at: DateTime<Utc>,
    pub total_predictions: usize,
    pub total_truth: usize,
}

pub fn render_report(context: &ReportContext, card: &Scorecard) -> String {
    let mut lines = vec![
        "--- Prediction Performance Report ---".to_string(),
        format!(
            "Evaluated at: {}",
            context.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        format!("Predictions submitted: {}", context.total_predictions),
        format!("Ground truth answers: {}", context.total_truth),
        format!(
            "Skipped: {} without ground truth, {} of a different kind",
            card.unmatched, card.mismatched
        ),
    ];

    lines.extend(section("Location error", "meters", card.location_stats()));
    lines.extend(section("Time error", "seconds", card.time_stats()));
    lines.join("\n") + "\n"
}

fn section(title: &str, unit: &str, stats: Option<ErrorStats>) -> Vec<String> {
    let mut lines = vec![String::new(), format!("--- {} ---", title)];
    match stats {
        Some(stats) => {
            lines.push(format!("Evaluated: {}", stats.count));
            lines.push(format!("MAE: {:.2} {}", stats.mean_absolute, unit));
            lines.push(format!("RMSE: {:.2} {}", stats.root_mean_square, unit));
            lines.push(format!("Max: {:.2} {}", stats.max, unit));
        }
        None => lines.push(
            "No data: no prediction of this kind matched the ground truth.".to_string(),
        ),
    }
    lines
}
