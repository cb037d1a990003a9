//! # anvil-provider
//!
//! Completion capability abstraction for Anvil.
//!
//! The HTTP client to the completion API lives outside this workspace; it is
//! consumed through [`CompletionProvider`] as an opaque
//! `complete(prompt, params) -> text | stream` capability.
//!
//! ## Features
//! - Whole-text or chunked streaming replies
//! - Cancellable collection of streamed text (partial text is kept)
//! - [`ReplayProvider`] for recorded replies (CLI `run`, tests)

pub mod error;
pub mod replay;
pub mod r#trait;

pub use error::ProviderError;
pub use r#trait::{Collected, Completion, CompletionParams, CompletionProvider, CompletionStream};
pub use replay::ReplayProvider;
