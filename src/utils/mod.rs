//! Utilities for contentdb

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use logging::init_logging;
pub use naming::{derived_name, foreign_key_name, index_name, primary_index_name, unique_index_name};
