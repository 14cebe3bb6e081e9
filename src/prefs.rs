//! User preferences persistence.
//!
//! Saves the theme and last used backend to ~/.config/webtrace/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use webtrace::state::Action;

/// User preferences
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Prefs {
    /// Selected theme name
    pub theme: Option<String>,
    /// Backend base URL used last
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Action selected when the TUI last exited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl Prefs {
    /// Get config file path: ~/.config/webtrace/config.toml
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("webtrace").join("config.toml"))
    }

    /// Load preferences from disk (returns default if missing/invalid)
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save preferences to disk
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(path) = Self::path() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, toml::to_string_pretty(self)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefs_default() {
        let prefs = Prefs::default();
        assert!(prefs.theme.is_none());
        assert!(prefs.server.is_none());
        assert!(prefs.action.is_none());
    }

    #[test]
    fn test_prefs_serialization() {
        let prefs = Prefs {
            theme: Some("nord".to_string()),
            server: Some("http://lg.example.net:5000".to_string()),
            action: Some(Action::Mtr),
        };
        let toml_str = toml::to_string_pretty(&prefs).unwrap();
        assert!(toml_str.contains("theme = \"nord\""));
        assert!(toml_str.contains("server = \"http://lg.example.net:5000\""));
        assert!(toml_str.contains("action = \"mtr\""));

        let loaded: Prefs = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded.theme.as_deref(), Some("nord"));
        assert_eq!(loaded.action, Some(Action::Mtr));
    }

    #[test]
    fn test_unset_fields_omitted() {
        let prefs = Prefs {
            theme: Some("default".to_string()),
            ..Prefs::default()
        };
        let toml_str = toml::to_string_pretty(&prefs).unwrap();
        assert!(!toml_str.contains("server"));
        assert!(!toml_str.contains("action"));
    }

    #[test]
    fn test_prefs_tolerates_old_files() {
        // Older files only carried the theme
        let loaded: Prefs = toml::from_str("theme = \"dracula\"\n").unwrap();
        assert_eq!(loaded.theme.as_deref(), Some("dracula"));
        assert!(loaded.server.is_none());
    }
}
