use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub path: String,
    /// Insert the demo profiles and media catalogue on startup
    pub seed_demo_data: bool,
}

/// Deployment key pair. The anon key is shipped with clients, the service-role
/// key is reserved for administrative tooling.
#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    pub anon_key: String,
    pub service_role_key: String,
    pub session_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub auth: Auth,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Try to load from settings.toml (optional for deployment)
        let config_file_name = "settings.toml";

        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        // Check in revue-server directory (for development)
        let dev_path = PathBuf::from("revue-server").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        // 2. Defaults, overridden by environment variables (highest priority)
        builder = builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 54321)?
            .set_default("database.path", "revue.db")?
            .set_default("database.seed_demo_data", true)?
            .set_default("auth.anon_key", "revue-local-anon-key")?
            .set_default("auth.service_role_key", "revue-local-service-role-key")?
            .set_default("auth.session_ttl_days", 30)?;

        if let Ok(db_path) = std::env::var("DATABASE_PATH") {
            builder = builder.set_override("database.path", db_path)?;
        }
        if let Ok(seed) = std::env::var("REVUE_SEED_DEMO_DATA") {
            builder = builder.set_override("database.seed_demo_data", seed)?;
        }
        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }
        if let Ok(host) = std::env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }
        if let Ok(key) = std::env::var("REVUE_ANON_KEY") {
            builder = builder.set_override("auth.anon_key", key)?;
        }
        if let Ok(key) = std::env::var("REVUE_SERVICE_ROLE_KEY") {
            builder = builder.set_override("auth.service_role_key", key)?;
        }

        let s = builder.build()?;
        s.try_deserialize()
    }
}

impl Auth {
    /// Keys used by tests and local development
    pub fn local() -> Self {
        Self {
            anon_key: "revue-local-anon-key".to_string(),
            service_role_key: "revue-local-service-role-key".to_string(),
            session_ttl_days: 30,
        }
    }
}
