//! Model providers for Loopwright.
//!
//! All providers implement the `loopwright_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
