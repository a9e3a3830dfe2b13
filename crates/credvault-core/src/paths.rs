//! Standard paths used by credvault

use std::path::PathBuf;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "CREDVAULT_CONFIG";

/// Standard credvault paths
pub struct Paths {
    /// Data directory (~/.local/share/credvault)
    pub data: PathBuf,
    /// Config directory (~/.config/credvault)
    pub config: PathBuf,
    /// Home directory, used to locate the password store
    pub home: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("credvault");

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("credvault");

        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Self { data, config, home }
    }

    /// Path of the config file, honouring `CREDVAULT_CONFIG`
    pub fn config_file(&self) -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => self.config.join("config.json"),
        }
    }

    /// Default root of the age-encrypted credential tree
    pub fn store_dir(&self) -> PathBuf {
        self.data.clone()
    }

    /// Root of the `pass` password store (`PASSWORD_STORE_DIR` or ~/.password-store)
    pub fn password_store(&self) -> PathBuf {
        match std::env::var_os("PASSWORD_STORE_DIR") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => self.home.join(".password-store"),
        }
    }
}
