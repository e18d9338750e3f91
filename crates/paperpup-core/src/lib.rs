//! # paperpup-core
//!
//! Core error handling for the PaperPup engine.

pub mod error;

pub use error::{Error, Result};
