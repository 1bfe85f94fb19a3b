pub mod checkin;
pub mod config;
pub mod detector;
pub mod models;
pub mod parser;
pub mod plugins;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
