use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use which::which;

use crate::{NotesError, Result};

const DEFAULT_PROVIDER_URL: &str = "https://api.alquran.cloud/v1";

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the notes and settings namespaces
    pub data_dir: PathBuf,

    /// Base URL of the verse reference provider
    pub provider_base_url: String,

    /// Provider edition used for the original-language text
    pub original_edition: String,

    /// Provider edition used for the translation
    pub translation_edition: String,

    /// How many verses a bare chapter number resolves to
    pub chapter_preview_count: u32,

    /// HTTP timeout for provider calls, in seconds
    pub request_timeout_secs: u64,

    /// Clipboard command override, e.g. "xclip -selection clipboard"
    pub clipboard_command: Option<String>,

    /// Editor used to write note content; falls back to $EDITOR
    pub editor_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: project_dirs()
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".kajian-notes")),
            provider_base_url: DEFAULT_PROVIDER_URL.to_string(),
            original_edition: "quran-uthmani".to_string(),
            translation_edition: "en.asad".to_string(),
            chapter_preview_count: 5,
            request_timeout_secs: 30,
            clipboard_command: None,
            editor_command: None,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "kajian", "kajian-notes")
}

impl Config {
    /// Location of the config file in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Reads the config file at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|e| NotesError::ConfigError {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        let config: Config = serde_json::from_str(&raw).map_err(|e| NotesError::ConfigError {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })?;

        if config.chapter_preview_count == 0 {
            return Err(NotesError::ConfigError {
                message: "chapter_preview_count must be at least 1".to_string(),
            });
        }

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    // Smart fallbacks when no editor is configured
    pub fn get_editor_command(&self) -> String {
        if let Some(editor) = &self.editor_command {
            return editor.clone();
        }

        if let Ok(editor) = std::env::var("EDITOR") {
            return editor;
        }

        if cfg!(windows) {
            "notepad".to_string()
        } else if cfg!(target_os = "macos") {
            "open -W -t".to_string()
        } else {
            for editor in &["nano", "vim", "vi"] {
                if which(editor).is_ok() {
                    return editor.to_string();
                }
            }
            "nano".to_string()
        }
    }

    /// Loads from the platform config directory, or defaults when there is none
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}
