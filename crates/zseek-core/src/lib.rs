pub mod config;
pub mod error;
pub mod types;

pub use error::{ZseekError, ZseekResult, ERR_BEYOND_END_SEEK, ERR_NEGATIVE_SEEK, ERR_OTHER};
pub use types::IndexMode;
