pub mod cuisines;
pub mod draft;
pub mod fallback;
pub mod generation;
pub mod llm;
pub mod parser;
pub mod prompt;
pub mod recommender;

pub use cuisines::CuisineAdvisor;
pub use generation::{
    GenerationOrchestrator, GenerationReport, GenerationSettings, GenerationStart,
    GenerationStatus,
};
pub use llm::{GenerationClient, OpenAiClient, RetryPolicy, TransportError};
pub use recommender::{RecipeIndex, Recommender};
