pub mod config;
pub mod result;

pub use serde;
