use crate::history::PingRecord;
use crate::predictor::proximity::geodesic_distance;

/// Estimates when the bus reaches (`latitude`, `longitude`) as the timestamp
/// of the geodesically closest ping. Ties keep the first ping in scan order.
pub fn predict_arrival_time(history: &[PingRecord], latitude: f64, longitude: f64) -> Option<i64> {
    let mut best: Option<(f64, i64)> = None;

    for record in history {
        let dist = geodesic_distance(record.latitude, record.longitude, latitude, longitude);
        if best.map_or(true, |(min, _)| dist < min) {
            best = Some((dist, record.timestamp));
        }
    }

    best.map(|(_, timestamp)| timestamp)
}
