//! Shared domain types for the music-brief gateway: error type, environment
//! configuration, LLM wire model, and the brief/schedule data model.

pub mod brief;
pub mod config;
pub mod error;
pub mod llm;
pub mod stream;

pub use error::{Error, Result};
