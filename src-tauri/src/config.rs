use std::env;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use tracing::info;

pub const DB_PATH_VAR: &str = "HABITLINE_DB_PATH";
pub const LOG_DIR_VAR: &str = "HABITLINE_LOG_DIR";

/// Bundle identifier from `tauri.conf.json`; Tauri's `app_data_dir` is the
/// platform data dir joined with it.
pub const APP_IDENTIFIER: &str = "app.habitline.desktop";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Config {
    /// Resolves paths from the environment, defaulting under the app data dir.
    /// Both the shell and `initdb` go through here.
    pub fn load() -> anyhow::Result<Self> {
        let data_dir = app_data_dir()?;
        Ok(Self::from_lookup(&data_dir, |key| env::var(key).ok()))
    }

    fn from_lookup(data_dir: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db_path: path_or_default(&lookup, DB_PATH_VAR, data_dir.join("habitline.db")),
            log_dir: path_or_default(&lookup, LOG_DIR_VAR, data_dir.join("logs")),
        }
    }
}

pub fn app_data_dir() -> anyhow::Result<PathBuf> {
    dirs::data_dir()
        .map(|base| base.join(APP_IDENTIFIER))
        .ok_or_else(|| anyhow!("no platform data directory available"))
}

fn path_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: PathBuf) -> PathBuf {
    match lookup(key).map(|raw| raw.trim().to_string()) {
        Some(raw) if !raw.is_empty() => PathBuf::from(raw),
        _ => {
            info!("{key} not set, using default: {}", default.display());
            default
        }
    }
}
