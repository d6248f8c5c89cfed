//! Upstream provider implementations

pub mod gemini;
pub mod openai;
pub mod mock;

// Re-export for convenience
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use mock::mock_response;
