pub mod config;
pub mod error;
pub mod logger;

// Re-export commonly used types
pub use crate::config::AppConfig;
pub use crate::error::CosMatchError;
pub type Result<T> = std::result::Result<T, CosMatchError>;
