//! Notebook Buddy Remote - HTTP clients for the Notebook Buddy backend
//!
//! This crate provides:
//! - Client: Shared reqwest plumbing, response envelope and error sanitizing
//! - Store: [`nbuddy_canvas::CanvasStore`] over the `/projects` and `/notecrafts` endpoints
//! - Generation: [`nbuddy_canvas::GenerationService`] over `/upload` and `/generate-text-blocks`
//! - Error: Transport error types, convertible into [`nbuddy_canvas::Error`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
pub mod error;
pub mod generation;
pub mod store;

pub use client::{ApiConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, USER_ID_HEADER};
pub use error::{Error, Result};
pub use generation::{HttpGenerationClient, DEFAULT_GENERATION_TIMEOUT};
pub use store::{HttpCanvasStore, SearchHit, DEFAULT_TOP_K};
