//! # Notegate Providers
//!
//! Upstream generative-AI client and response classification.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod traits;
mod army;
mod classify;

pub use traits::{ProviderError, Upstream, UpstreamReply};
pub use army::GeminiArmyProvider;
pub use classify::{UpstreamOutcome, classify};
