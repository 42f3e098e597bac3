//! Utility functions shared across the pipeline stages

pub mod json;
pub mod text;

// Re-export commonly used utilities
pub use json::{decode_model_json, extract_json_block};
pub use text::{flatten_line, strip_code_fences, truncate_chars};
