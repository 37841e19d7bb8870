pub mod error;
pub mod metrics;
pub mod normalizer;
pub mod prompt;
pub mod providers;
pub mod review;

pub use error::ReviewError;
pub use normalizer::{normalize_analysis, normalize_chat_reply, NormalizeError};
pub use prompt::{DocumentPayload, PromptError};
pub use providers::{CompletionProvider, ProviderError};
pub use review::{CredentialSource, ReviewService};
