use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base data directory. The database, upload root, and temp root live
    /// here unless overridden below.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Root for persisted images (`<upload_dir>/<user_id>/<filename>`).
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,

    /// Root for in-flight chunk assembly files, keyed by session token.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            upload_dir: None,
            temp_dir: None,
        }
    }
}

impl StorageConfig {
    pub fn upload_root(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("uploads"))
    }

    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("tmp"))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("stillbox.db")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Seconds of inactivity before an upload session is reclaimed.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// Days an unreferenced post/comment image survives before pruning.
    #[serde(default = "default_prune_grace_days")]
    pub prune_grace_days: u64,

    /// Seconds before a stale temp file becomes a prune candidate.
    #[serde(default = "default_temp_max_age_secs")]
    pub temp_max_age_secs: u64,
}

fn default_session_idle_secs() -> u64 {
    3600
}

fn default_prune_grace_days() -> u64 {
    7
}

fn default_temp_max_age_secs() -> u64 {
    3600
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            session_idle_secs: default_session_idle_secs(),
            prune_grace_days: default_prune_grace_days(),
            temp_max_age_secs: default_temp_max_age_secs(),
        }
    }
}
