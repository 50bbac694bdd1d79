//! Storage Layer
//!
//! Handles data persistence: the JSON configuration file.

pub mod config;

pub use config::*;
