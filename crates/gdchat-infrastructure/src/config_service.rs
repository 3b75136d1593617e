//! Loading of `config.toml` and `secret.json`.

use crate::paths::GdchatPaths;
use gdchat_core::config::{ChatConfig, GeminiConfig, SecretConfig};
use gdchat_core::error::{ChatError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Reads configuration and credentials from the config directory.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config_file: PathBuf,
    secret_file: PathBuf,
}

impl ConfigService {
    pub fn new(paths: &GdchatPaths) -> Self {
        Self {
            config_file: paths.config_file(),
            secret_file: paths.secret_file(),
        }
    }

    /// Loads the chat configuration. A missing file yields the defaults.
    pub fn load_config(&self) -> Result<ChatConfig> {
        load_config_file(&self.config_file)
    }

    /// Loads `secret.json`. A missing file yields an empty secret.
    pub fn load_secrets(&self) -> Result<SecretConfig> {
        let Some(content) = read_optional(&self.secret_file)? else {
            return Ok(SecretConfig::default());
        };
        serde_json::from_str(&content).map_err(|e| {
            ChatError::config(format!("{}: {e}", self.secret_file.display()))
        })
    }

    /// The API key, taken from the environment first and `secret.json` second.
    pub fn api_key(&self) -> Result<String> {
        let from_env = std::env::var(API_KEY_ENV).ok();
        resolve_api_key(from_env, &self.load_secrets()?).ok_or_else(|| {
            ChatError::config(format!(
                "no API key: set {API_KEY_ENV} or fill gemini.api_key in {}",
                self.secret_file.display()
            ))
        })
    }

    /// Writes an empty secret template if none exists and returns its path.
    ///
    /// # Security Note
    ///
    /// On Unix the file is created with mode 600.
    pub fn ensure_secret_file(&self) -> Result<PathBuf> {
        if self.secret_file.exists() {
            return Ok(self.secret_file.clone());
        }
        if let Some(parent) = self.secret_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let template = SecretConfig {
            gemini: Some(GeminiConfig {
                api_key: String::new(),
            }),
        };
        fs::write(&self.secret_file, serde_json::to_string_pretty(&template)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.secret_file, fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!(
            "[Config] Created secret template at {}",
            self.secret_file.display()
        );
        Ok(self.secret_file.clone())
    }
}

/// Parses a `config.toml`; absent or blank files give the defaults.
pub fn load_config_file(path: &Path) -> Result<ChatConfig> {
    let Some(content) = read_optional(path)? else {
        tracing::debug!("[Config] No config at {}, using defaults", path.display());
        return Ok(ChatConfig::default());
    };
    if content.trim().is_empty() {
        return Ok(ChatConfig::default());
    }
    toml::from_str(&content).map_err(|e| ChatError::config(format!("{}: {e}", path.display())))
}

/// Picks the first non-blank key: environment, then stored secret.
pub fn resolve_api_key(from_env: Option<String>, secrets: &SecretConfig) -> Option<String> {
    from_env
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .or_else(|| {
            secrets
                .gemini
                .as_ref()
                .map(|gemini| gemini.api_key.trim().to_string())
                .filter(|key| !key.is_empty())
        })
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(key: &str) -> SecretConfig {
        SecretConfig {
            gemini: Some(GeminiConfig {
                api_key: key.to_string(),
            }),
        }
    }

    #[test]
    fn test_env_key_wins() {
        let key = resolve_api_key(Some("from-env".into()), &secret("from-file"));
        assert_eq!(key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_blank_env_falls_back_to_file() {
        let key = resolve_api_key(Some("  ".into()), &secret("from-file"));
        assert_eq!(key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_no_key_anywhere() {
        assert_eq!(resolve_api_key(None, &SecretConfig::default()), None);
        assert_eq!(resolve_api_key(None, &secret("")), None);
    }
}
