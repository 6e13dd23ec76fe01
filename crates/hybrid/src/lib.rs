pub mod backend;
pub mod config;
pub mod events;
pub mod generative;
pub mod pipeline;
pub mod prompt;

pub use backend::GenerativeBackend;
pub use config::{NotecheckConfig, DEFAULT_CONFIG};
pub use events::StreamEvent;
pub use generative::{GenerativeChecker, GenerativeReport, Usage, DEFAULT_MIN_CHARS};
pub use notecheck_llm::{LlmClient, LlmProvider, LlmRequest, LlmResponse};
pub use pipeline::{CheckRequest, FullCheckReport, FullCheckStats, GenerativeStats, HybridChecker};
