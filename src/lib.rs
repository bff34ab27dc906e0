//! Lecture note-taking library
//!
//! This library stores lecture notes locally, filters them by text and tags,
//! and looks up hadith and Quran verses that can be inserted into a note as
//! formatted quotations.

mod cli;
mod config;
mod errors;
pub mod hadith;
mod helper;
mod note;
pub mod quran;
mod repository;
mod settings;
mod storage;
mod types;

// Re-export key components
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use hadith::HadithService;
pub use helper::*;
pub use note::*;
pub use quran::{AlQuranCloud, VerseProvider, VerseQuery, VerseResolver};
pub use repository::*;
pub use settings::*;
pub use storage::*;
pub use types::*;
