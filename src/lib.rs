//! Turns a directory of independently authored BPMN files into one versioned
//! process hierarchy, and explains how that hierarchy changes over time.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;

pub use crate::core::Engine;
pub use crate::error::{AtlasError, Result};
