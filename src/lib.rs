pub mod alerts;
pub mod config;
pub mod extractor;
pub mod models;
pub mod monitor;
pub mod platforms;
pub mod scheduler;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
