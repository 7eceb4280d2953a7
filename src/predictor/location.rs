use crate::history::PingRecord;

/// Estimates where the bus was at `target` (epoch ms) by interpolating
/// linearly in time between the pings that bracket it. Outside the history the
/// nearest end is returned. `history` must be sorted by timestamp.
pub fn predict_location(history: &[PingRecord], target: i64) -> Option<(f64, f64)> {
    let mut prev: Option<&PingRecord> = None;
    let mut next: Option<&PingRecord> = None;

    for record in history {
        if record.timestamp <= target {
            prev = Some(record);
        } else {
            next = Some(record);
            break;
        }
    }

    match (prev, next) {
        (None, Some(next)) => Some((next.latitude, next.longitude)),
        (Some(prev), Some(next)) => {
            let span = next.timestamp - prev.timestamp;
            if span == 0 {
                return Some((prev.latitude, prev.longitude));
            }
            let fraction = (target - prev.timestamp) as f64 / span as f64;
            Some((
                prev.latitude + fraction * (next.latitude - prev.latitude),
                prev.longitude + fraction * (next.longitude - prev.longitude),
            ))
        }
        (Some(prev), None) => Some((prev.latitude, prev.longitude)),
        (None, None) => None,
    }
}
