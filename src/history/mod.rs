pub mod fields;
pub mod filter;
pub mod index;
pub mod normalizer;
pub mod types;
pub mod window;

pub use filter::HistoryFilter;
pub use index::TimeIndex;
pub use normalizer::{NormalizerConfig, RecordNormalizer, ServiceHours};
pub use types::{HourKey, PingRecord, RouteAllowList, TimeWindow};
pub use window::{DayCache, WindowLoader};
