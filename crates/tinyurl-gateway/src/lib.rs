//! HTTP surface of the TinyURL service.

pub mod app;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;
pub mod telemetry;
pub mod warmup;

pub use app::App;
pub use error::AppError;
pub use state::AppState;
