//! Shared utilities

pub mod error;
pub mod logging;

pub use error::{AppError, AppResult};
pub use logging::{init_tracing, DEFAULT_LOG_FILTER};
