use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MEDIA_BASE_URL: &str =
    "http://adb.arcadeitalia.net/media/mess.current/ingames/{catalog}/";

/// Persisted defaults, stored as `~/.romsync/config.json`. Command-line flags
/// override these per invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 0 = automatic (cores, capped at 8)
    pub copy_workers: usize,
    pub download_workers: usize,
    /// Total attempts per job, first one included
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub extensions: Vec<String>,
    /// Keywords `copy` skips unless `--skip` is given; other tools skip nothing by default
    pub skip_keywords: Vec<String>,
    pub media_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            copy_workers: 0,
            download_workers: crate::concurrency::DEFAULT_DOWNLOAD_WORKERS,
            max_attempts: 3,
            backoff_ms: 1000,
            timeout_secs: 20,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            extensions: vec![".zip".into(), ".7z".into(), ".rar".into()],
            skip_keywords: vec!["bios".into(), "in-1".into(), "demo".into()],
            media_base_url: DEFAULT_MEDIA_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Load `~/.romsync/config.json`, writing the defaults on first use.
    pub fn init() -> Result<Self> {
        let dir = config_dir()?;
        let path = dir.join("config.json");
        if !path.exists() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("cannot create config directory {}", dir.display()))?;
            Config::default().save_to(&path)?;
        }
        Config::read_from(&path)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(config_dir()?.join("config.json"))
    }
}

/// `~/.romsync`
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("cannot find user's home dir")?;
    Ok(home.join(".".to_owned() + env!("CARGO_PKG_NAME")))
}

/// `~/.romsync/logs`, created on demand.
pub fn logs_dir() -> Result<PathBuf> {
    let dir = config_dir()?.join("logs");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    Ok(dir)
}

/// JSON persistence for config-like values. Missing files read as defaults.
pub trait StorageObject: Serialize + DeserializeOwned + Default {
    fn pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize failed")
    }

    fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.pretty_json()?)
            .with_context(|| format!("cannot write {}", path.display()))
    }

    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read {}", path.display()));
            }
        };
        serde_json::from_str::<Self>(&text)
            .with_context(|| format!("cannot parse {}", path.display()))
    }
}

impl<T: Serialize + DeserializeOwned + Default> StorageObject for T {}
