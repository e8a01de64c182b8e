//! AI implementations for the contract library.
//!
//! Reference implementations of the [`AI`](crate::traits::ai::AI) trait.
//! Users can use these directly or implement their own.

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAI;
