pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod matrix;
pub mod search;
pub mod utils;

pub use config::Config;
pub use data::*;
pub use error::SearchError;
pub use matrix::*;
pub use search::*;

pub type Result<T> = anyhow::Result<T>;
