pub mod arrival;
pub mod location;
pub mod proximity;

pub use arrival::predict_arrival_time;
pub use location::predict_location;
pub use proximity::geodesic_distance;
