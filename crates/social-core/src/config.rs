//! Configuration for the social data layer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{SocialError, SocialResult};
use crate::preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, ThemePreference, DEFAULT_THEME};

/// Environment variable pointing at the preference file
pub const ENV_PREFERENCES_PATH: &str = "CLGVIBE_PREFERENCES_PATH";
/// Environment variable overriding the default theme
pub const ENV_DEFAULT_THEME: &str = "CLGVIBE_DEFAULT_THEME";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    /// Preference file; `None` keeps preferences in memory only
    pub preferences_path: Option<PathBuf>,
    /// Theme used until the user picks one
    pub default_theme: String,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            preferences_path: None,
            default_theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl SocialConfig {
    pub fn with_preferences_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.preferences_path = Some(path.into());
        self
    }

    pub fn with_default_theme(mut self, theme: impl Into<String>) -> Self {
        self.default_theme = theme.into();
        self
    }

    /// Load from `CLGVIBE_*` environment variables on top of the defaults
    pub fn from_env() -> SocialResult<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(ENV_PREFERENCES_PATH) {
            config.preferences_path = Some(PathBuf::from(path));
        }
        if let Ok(theme) = std::env::var(ENV_DEFAULT_THEME) {
            config.default_theme = theme;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SocialResult<()> {
        if self.default_theme.trim().is_empty() {
            return Err(SocialError::configuration("default_theme", "theme name must not be empty"));
        }
        if let Some(path) = &self.preferences_path {
            if path.as_os_str().is_empty() {
                return Err(SocialError::configuration("preferences_path", "path must not be empty"));
            }
        }
        Ok(())
    }

    /// Open the configured preference store
    pub fn open_preferences(&self) -> SocialResult<Arc<dyn PreferenceStore>> {
        let store: Arc<dyn PreferenceStore> = match &self.preferences_path {
            Some(path) => Arc::new(FilePreferenceStore::open(path.clone())?),
            None => Arc::new(MemoryPreferenceStore::new()),
        };
        Ok(store)
    }

    /// Theme preference over the configured store
    pub fn theme_preference(&self) -> SocialResult<ThemePreference> {
        Ok(ThemePreference::with_default(
            self.open_preferences()?,
            self.default_theme.clone(),
        ))
    }
}
