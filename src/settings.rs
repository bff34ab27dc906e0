//! User preferences, persisted as a single record.
use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{Gateway, Namespace, NotesError, Result};

/// Key of the singleton record in the settings namespace
pub const SETTINGS_KEY: &str = "app-settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Sm,
    #[default]
    Md,
    Lg,
}

/// Application preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub language: Language,
    pub auto_save: bool,
    pub font_size: FontSize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            language: Language::En,
            auto_save: true,
            font_size: FontSize::Md,
        }
    }
}

impl Settings {
    /// Applies a `name=value` assignment, as given on the command line.
    pub fn set(&mut self, assignment: &str) -> Result<()> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| NotesError::invalid_input(format!("expected name=value, got {:?}", assignment)))?;
        let value = value.trim();

        match name.trim() {
            "theme" => self.theme = value.parse()?,
            "language" => self.language = value.parse()?,
            "font_size" | "fontSize" => self.font_size = value.parse()?,
            "auto_save" | "autoSave" => {
                self.auto_save = value
                    .parse()
                    .map_err(|_| NotesError::invalid_input(format!("auto_save must be true or false, got {:?}", value)))?
            }
            other => {
                return Err(NotesError::invalid_input(format!("unknown setting {:?}", other)));
            }
        }
        Ok(())
    }
}

// The serde names double as the textual form used by the CLI
macro_rules! lowercase_enum_text {
    ($ty:ty, $($variant:ident => $text:literal),+) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($text),)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = NotesError;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(NotesError::invalid_input(format!(
                        "{:?} is not a valid {}",
                        s,
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

lowercase_enum_text!(Theme, Light => "light", Dark => "dark");
lowercase_enum_text!(Language, En => "en", Ar => "ar");
lowercase_enum_text!(FontSize, Sm => "sm", Md => "md", Lg => "lg");

/// Holds the current preferences and writes changes through the gateway.
pub struct SettingsStore {
    gateway: Arc<dyn Gateway>,
    current: Mutex<Settings>,
}

impl SettingsStore {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            current: Mutex::new(Settings::default()),
        }
    }

    /// Reads the stored preferences; absent or unreadable records fall back
    /// to the defaults.
    pub async fn load(&self) -> Settings {
        let loaded = match self.gateway.get(Namespace::Settings, SETTINGS_KEY).await {
            Ok(Some(record)) => match serde_json::from_value::<Settings>(record) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Stored settings are malformed, using defaults: {}", e);
                    Settings::default()
                }
            },
            Ok(None) => {
                debug!("No stored settings, using defaults");
                Settings::default()
            }
            Err(e) => {
                error!("Failed to read settings, using defaults: {}", e);
                Settings::default()
            }
        };

        self.replace(loaded.clone());
        loaded
    }

    /// Snapshot of the preferences in effect
    pub fn current(&self) -> Settings {
        match self.current.lock() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, settings: Settings) {
        match self.current.lock() {
            Ok(mut current) => *current = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }

    /// Applies `change` to a copy of the current preferences and persists it.
    ///
    /// The held value only changes once the write succeeded.
    pub async fn update<F>(&self, change: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut updated = self.current();
        change(&mut updated);

        self.gateway
            .put(Namespace::Settings, SETTINGS_KEY, serde_json::to_value(&updated)?)
            .await
            .map_err(|e| {
                error!("Failed to save settings: {}", e);
                e
            })?;

        self.replace(updated.clone());
        info!("Settings updated");
        Ok(updated)
    }

    pub async fn toggle_theme(&self) -> Result<Settings> {
        self.update(|s| {
            s.theme = match s.theme {
                Theme::Light => Theme::Dark,
                Theme::Dark => Theme::Light,
            }
        })
        .await
    }
}
