mod error;
mod health;

pub use error::{ErrorBody, ErrorInfo};
pub use health::HealthResponse;
