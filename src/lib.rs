//! Tubescribe - Transcript Acquisition & Language Negotiation
//!
//! Turns a video reference into a normalized, timestamped transcript: picks
//! among manual and auto-generated caption tracks, falls back to provider-side
//! translation when the preferred language is missing, and rides out an
//! unreliable captions source with strategy rotation and backoff.

pub mod assemble;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod provider;
pub mod select;
pub mod translate;
pub mod video;

pub use assemble::TranscriptResult;
pub use engine::TranscriptEngine;
pub use error::{ErrorKind, Result, TubescribeError};
pub use select::Language;
