//! Data Models
//!
//! Contains all data structures used throughout the application.

pub mod emergency;
pub mod settings;
pub mod workorder;

pub use emergency::*;
pub use settings::*;
pub use workorder::*;
