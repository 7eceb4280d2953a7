use crate::history::{DayCache, PingRecord, RouteAllowList, TimeWindow};

/// Pulls one vehicle's pings on one route out of the day cache.
#[derive(Debug, Clone, Copy)]
pub struct HistoryFilter<'a> {
    routes: &'a RouteAllowList,
}

impl<'a> HistoryFilter<'a> {
    pub fn new(routes: &'a RouteAllowList) -> Self {
        Self { routes }
    }

    /// Pings of `vehicle_id` on `route_id` inside `window` (inclusive), oldest
    /// first. An empty result is normal: the bus may simply not have reported.
    pub fn filter(
        &self,
        cache: &DayCache,
        vehicle_id: &str,
        route_id: &str,
        window: TimeWindow,
    ) -> Vec<PingRecord> {
        if !self.routes.permits(route_id) {
            return Vec::new();
        }

        let mut history: Vec<PingRecord> = window
            .hour_keys(cache.timezone())
            .iter()
            .filter_map(|key| cache.bucket(key))
            .flatten()
            .filter(|r| {
                window.contains(r.timestamp)
                    && r.vehicle_id == vehicle_id
                    && r.route_id == route_id
                    && self.routes.permits(&r.route_id)
            })
            .cloned()
            .collect();

        history.sort_by_key(|r| r.timestamp);
        history
    }
}
