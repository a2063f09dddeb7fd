use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_download_threads")]
    pub download_threads: usize,
    /// Failed-attempt budget for the retry loop; `-1` retries forever.
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
    /// Album labels excluded from the remote list before diffing.
    #[serde(default)]
    pub ignore_albums: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            download_threads: default_download_threads(),
            max_retries: default_max_retries(),
            ignore_albums: Vec::new(),
        }
    }
}

fn default_download_threads() -> usize {
    4
}

fn default_max_retries() -> i64 {
    -1
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let url = env::var("REMOTE_URL")
            .map_err(|_| anyhow::anyhow!("REMOTE_URL environment variable is required"))?;

        let api_key = env::var("REMOTE_API_KEY")
            .map_err(|_| anyhow::anyhow!("REMOTE_API_KEY environment variable is required"))?;

        let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "./photos".to_string());

        let download_threads: usize = env::var("SYNC_DOWNLOAD_THREADS")
            .unwrap_or_else(|_| default_download_threads().to_string())
            .parse()
            .unwrap_or_else(|_| default_download_threads());

        let max_retries: i64 = env::var("SYNC_MAX_RETRIES")
            .unwrap_or_else(|_| default_max_retries().to_string())
            .parse()
            .unwrap_or_else(|_| default_max_retries());

        let ignore_albums: Vec<String> = env::var("SYNC_IGNORE_ALBUMS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            remote: RemoteConfig { url, api_key },
            storage: StorageConfig {
                data_dir: PathBuf::from(data_dir),
            },
            sync: SyncConfig {
                download_threads,
                max_retries,
                ignore_albums,
            },
        })
    }
}
