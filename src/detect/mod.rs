mod prediction;
mod response;

pub use prediction::{BoundingBox, Prediction};
pub use response::{parse_error_detail, parse_health, parse_predictions, HealthStatus};
