pub mod error;
pub mod http;
pub mod user_agent;

pub use error::{AppError, Result};
pub use http::build_client;
pub use user_agent::random_user_agent;
