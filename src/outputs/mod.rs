//! Report output.
//!
//! # Submodules
//!
//! - [`table`]: Renders the consolidated report as console text
//! - [`json`]: Writes the consolidated report to a dated JSON file

pub mod json;
pub mod table;
