pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod profiler;
pub mod utils;

pub use error::{ProfilerError, Result};
pub use profiler::Profiler;
