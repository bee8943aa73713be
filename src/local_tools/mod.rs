pub mod paths;
mod registry;
pub mod tools;

pub use registry::{LocalSettings, LocalTool, DEFAULT_READ_LIMIT_BYTES};
pub use tools::TRUNCATION_MARKER;
