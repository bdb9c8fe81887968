mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./stillbox.toml",
        "~/.config/stillbox/config.toml",
        "/etc/stillbox/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.uploads.session_idle_secs == 0 {
        anyhow::bail!("session_idle_secs cannot be 0");
    }

    if let Some(parent) = config.storage.data_dir.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tracing::warn!("Parent of data directory does not exist: {:?}", parent);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.uploads.session_idle_secs, 3600);
        assert_eq!(config.uploads.prune_grace_days, 7);
        assert_eq!(
            config.storage.upload_root(),
            std::path::PathBuf::from("./data/uploads")
        );
        assert_eq!(
            config.storage.temp_root(),
            std::path::PathBuf::from("./data/tmp")
        );
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[storage]
data_dir = "/var/lib/stillbox"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(
            config.storage.db_path(),
            std::path::PathBuf::from("/var/lib/stillbox/stillbox.db")
        );
        // Unspecified sections fall back to defaults
        assert_eq!(config.uploads.temp_max_age_secs, 3600);
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 0").unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_upload_dir_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[storage]
data_dir = "/data"
upload_dir = "/mnt/images"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config.storage.upload_root(),
            std::path::PathBuf::from("/mnt/images")
        );
        assert_eq!(
            config.storage.temp_root(),
            std::path::PathBuf::from("/data/tmp")
        );
    }
}
