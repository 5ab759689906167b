pub mod model;
pub mod nickname;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use model::{AppConfig, EngineConfig, LoggingConfig, ServerConfig};

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crabline")
        .join("config.toml")
}

/// Load from `path`, or the default location. A missing file yields defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: Option<&Path>) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).with_context(|| "Failed to serialize config")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("crabline-missing-config.toml");
        let _ = std::fs::remove_file(&path);
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.engine.read_chunk, 4096);
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir()
            .join(format!("crabline-config-{}", std::process::id()))
            .join("config.toml");
        let mut config = AppConfig::default();
        config.server.host = "irc.example.net".into();
        config.server.channels = vec!["#a".into(), "#b".into()];
        save_config(&config, Some(&path)).unwrap();
        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.server.host, "irc.example.net");
        assert_eq!(loaded.server.channels.len(), 2);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_parse_error_names_file() {
        let path = std::env::temp_dir().join(format!("crabline-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[server\nhost = 1").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err}").contains("Failed to parse config file"));
        let _ = std::fs::remove_file(&path);
    }
}
