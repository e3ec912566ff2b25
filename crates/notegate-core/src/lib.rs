//! # Notegate Core
//!
//! Core types, configuration, and secrets for notegate.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format, env overrides)
//! - Wire types for the extraction endpoint and the upstream service
//! - Extraction request validation
//! - Prompt templating for note extraction
//! - Secret wrappers that keep access keys out of logs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod prompt;
pub mod secrets;
pub mod types;
pub mod validation;

pub use config::{CommitPolicy, Config, ConfigError};
pub use prompt::extraction_prompt;
pub use secrets::ApiKey;
pub use types::{ErrorResponse, ExtractionRequest, GenerateRequest, ProviderUnavailableResponse};
pub use validation::{ValidationError, parse_extraction_request, validate_extraction_request};

