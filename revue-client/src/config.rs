use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:54321";
pub const DEFAULT_ANON_KEY: &str = "revue-local-anon-key";

/// Where the client connects and which key it presents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub service_url: String,
    pub anon_key: String,
    /// Privileged key for maintenance commands; never needed by regular users
    pub service_role_key: Option<String>,
}

impl ClientSettings {
    /// Read settings from the environment, falling back to the local defaults.
    /// A CLI override for the URL wins over `REVUE_SERVICE_URL`.
    pub fn from_env(url_override: Option<String>) -> Self {
        let service_url = url_override
            .or_else(|| non_empty_var("REVUE_SERVICE_URL"))
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());

        Self {
            service_url,
            anon_key: non_empty_var("REVUE_ANON_KEY").unwrap_or_else(|| DEFAULT_ANON_KEY.to_string()),
            service_role_key: non_empty_var("REVUE_SERVICE_ROLE_KEY"),
        }
    }

    /// The `apikey` to present: the service-role key lets maintenance commands
    /// act for any user
    pub fn api_key(&self, service_role: bool) -> Result<&str> {
        if !service_role {
            return Ok(&self.anon_key);
        }
        self.service_role_key
            .as_deref()
            .context("--service-role needs REVUE_SERVICE_ROLE_KEY to be set")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Session data stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub username: String,
    pub user_id: Uuid,
    pub access_token: String,
}

/// Configuration manager for the .revue directory
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Could not determine home directory")?;
        Self::with_dir(home_dir.join(".revue"))
    }

    /// Use an explicit directory, created if missing
    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create .revue directory")?;
        }
        Ok(Self { config_dir })
    }

    fn session_file(&self) -> PathBuf {
        self.config_dir.join("session.json")
    }

    pub fn save_session(&self, session: &SessionData) -> Result<()> {
        let json = serde_json::to_string_pretty(session).context("Failed to serialize session data")?;
        fs::write(self.session_file(), json).context("Failed to write session file")?;
        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<SessionData>> {
        let session_file = self.session_file();
        if !session_file.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&session_file).context("Failed to read session file")?;
        let session = serde_json::from_str(&json).context("Failed to parse session data")?;
        Ok(Some(session))
    }

    /// Remove the stored session; a missing file is not an error
    pub fn delete_session(&self) -> Result<()> {
        let session_file = self.session_file();
        if session_file.exists() {
            fs::remove_file(&session_file).context("Failed to delete session file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session() -> SessionData {
        SessionData {
            username: "ada".to_string(),
            user_id: Uuid::new_v4(),
            access_token: "token-123".to_string(),
        }
    }

    #[test]
    fn test_session_save_load_delete() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path().join("nested")).unwrap();
        assert!(manager.load_session().unwrap().is_none());

        let stored = session();
        manager.save_session(&stored).unwrap();
        assert_eq!(manager.load_session().unwrap(), Some(stored));

        manager.delete_session().unwrap();
        assert!(manager.load_session().unwrap().is_none());
        manager.delete_session().unwrap();
    }

    #[test]
    fn test_corrupt_session_is_an_error() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path()).unwrap();
        fs::write(dir.path().join("session.json"), "{not json").unwrap();
        assert!(manager.load_session().is_err());
    }

    #[test]
    fn test_api_key_selection() {
        let mut settings = ClientSettings {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            anon_key: "anon".to_string(),
            service_role_key: None,
        };
        assert_eq!(settings.api_key(false).unwrap(), "anon");
        assert!(settings.api_key(true).is_err());

        settings.service_role_key = Some("role".to_string());
        assert_eq!(settings.api_key(true).unwrap(), "role");
        assert_eq!(settings.api_key(false).unwrap(), "anon");
    }

    #[test]
    fn test_url_override_wins() {
        let settings = ClientSettings::from_env(Some("http://example.test".to_string()));
        assert_eq!(settings.service_url, "http://example.test");
    }
}
