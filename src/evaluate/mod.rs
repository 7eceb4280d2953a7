pub mod metrics;
pub mod report;
pub mod truth;

pub use metrics::score;
pub use report::{render_report, ReportContext};
pub use truth::load_ground_truth;
