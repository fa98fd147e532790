//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Runtime settings (API keys, chunk limits, retry counts) live in the
//! database `settings` table and are resolved by each service.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "INKF_ROOT_FOLDER";

/// Directory name used under the platform config/data dirs
pub const APP_DIR_NAME: &str = "inkfluence";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "inkfluence.db";

/// Compiled defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub bind_address: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional so that a missing or partial file never prevents
/// startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub bind_address: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Base URL under which uploaded files are publicly reachable
    #[serde(default)]
    pub public_base_url: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default)]
    pub stripe_webhook_secret: Option<String>,

    /// Override for the speech API base URL (e.g. a local proxy)
    #[serde(default)]
    pub speech_base_url: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the config for a module, falling back to defaults
    ///
    /// An explicit path that cannot be read is still not fatal: the service
    /// logs a warning and starts with defaults.
    pub fn load_or_default(explicit: Option<&Path>, module_name: &str) -> Self {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(module_name).filter(|p| p.exists()),
        };

        let Some(path) = path else {
            info!("No TOML config found for {}, using defaults", module_name);
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded TOML config: {}", path.display());
                config
            }
            Err(e) => {
                warn!("{} - using defaults", e);
                Self::default()
            }
        }
    }
}

/// Platform config path for a module, e.g. `~/.config/inkfluence/inkf-audiobook.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(format!("{}.toml", module_name)))
}

/// Write a TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Root folder resolution in priority order: CLI → ENV → TOML → default
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder from TOML config: {}", path.display());
            return path.clone();
        }

        let path = default_root_folder();
        info!(module = %self.module_name, "Root folder from compiled default: {}", path.display());
        path
    }
}

/// Creates the root folder layout and hands out well-known paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder and the files directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
        }
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.files_path())?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// Directory served publicly under `/files`
    pub fn files_path(&self) -> PathBuf {
        self.root_folder.join("files")
    }
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("/var/lib/inkfluence"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/inkfluence"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\inkfluence"))
    } else {
        PathBuf::from("./inkfluence_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults_for_missing_fields() {
        let config: TomlConfig = toml::from_str("port = 6000\n").unwrap();
        assert_eq!(config.port, Some(6000));
        assert!(config.root_folder.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_logging_section_parses() {
        let config: TomlConfig = toml::from_str(
            r#"
            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_initializer_paths() {
        let init = RootFolderInitializer::new(PathBuf::from("/srv/ink"));
        assert_eq!(init.database_path(), PathBuf::from("/srv/ink/inkfluence.db"));
        assert_eq!(init.files_path(), PathBuf::from("/srv/ink/files"));
    }
}
