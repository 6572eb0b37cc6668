pub mod config;
pub mod error;
pub mod types;

pub use config::TunechatConfig;
pub use error::{Result, TunechatError};
pub use types::*;
