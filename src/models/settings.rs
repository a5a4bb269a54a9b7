//! User display name and persona, stored as a flat JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_PERSONA: &str = "You are Pixel, a friendly AI assistant.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub user_name: Option<String>,

    #[serde(default = "default_persona")]
    pub persona_instructions: String,
}

fn default_persona() -> String {
    DEFAULT_PERSONA.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_name: None,
            persona_instructions: default_persona(),
        }
    }
}

impl Settings {
    /// Read the settings file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        crate::utils::write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    /// Apply a partial update; absent fields keep their current value.
    pub fn merge(&mut self, user_name: Option<String>, persona: Option<String>) {
        if let Some(name) = user_name {
            self.user_name = Some(name);
        }
        if let Some(persona) = persona {
            self.persona_instructions = persona;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_default_persona() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(settings.persona_instructions, DEFAULT_PERSONA);
        assert!(settings.user_name.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut settings = Settings::default();
        settings.merge(Some("Ada".to_string()), None);
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.user_name.as_deref(), Some("Ada"));
        assert_eq!(loaded.persona_instructions, DEFAULT_PERSONA);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"persona_instructions\""));
    }
}
