//! Command-line interface for mediadl.

mod commands;
pub mod icons;

pub use commands::{is_verbose, run};
