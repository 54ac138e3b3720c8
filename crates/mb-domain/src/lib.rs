pub mod config;
pub mod error;
pub mod platform;

pub use error::{Error, Result};
pub use platform::Platform;
