//! Service configuration: one struct built at startup and passed down.

mod builder;
mod types;

pub use builder::{ServiceConfigBuilder, compile_glob_pattern};
pub use types::ServiceConfig;
