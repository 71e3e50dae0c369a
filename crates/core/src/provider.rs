//! Provider trait: the abstraction over language-model backends.
//!
//! The execution core only ever asks a provider for one thing: turn a prompt
//! into text. Any failure surfaces as a [`ProviderError`], which the loop
//! treats as a step fault.

use async_trait::async_trait;

use crate::error::ProviderError;

#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}
