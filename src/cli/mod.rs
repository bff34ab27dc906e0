//! CLI module for the kajian-notes application
//!
//! This module handles the command-line interface on top of the note
//! repository, settings store and reference lookups.
mod app;
mod args;

pub use app::*;
pub use args::*;
