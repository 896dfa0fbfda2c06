pub mod config;
pub mod error;
pub mod quality;
pub mod safety;
pub mod types;

pub use config::Config;
pub use error::CuratorError;
pub use quality::*;
pub use safety::{ContentPolicy, PolicyCategory, PolicyCheck, PolicyFlag, Severity};
pub use types::*;
