pub mod gemini;
pub mod resilient;
pub mod traits;

pub use gemini::GeminiClient;
pub use resilient::{CallPolicy, Generation, ResilientModel};
pub use traits::{GenerativeModel, ImagePart, ModelError, ModelPrompt};
