//! Configuration.
//!
//! Paths are resolved from, in order: command line flags, the
//! `HADES_SAVE_DIR` / `HADES_BACKUP_ROOT` environment variables, the settings
//! file (`~/.config/hades-backup/config.toml`), then platform defaults.
//!
//! The last-used tag is process-wide state kept in `config.json` under the
//! backup root.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::GlobalArgs;
use crate::error::{IoContext, Result};
use crate::fsutil;
use crate::platform::{self, Platform};
use crate::store::Layout;

pub const SAVE_DIR_ENV: &str = "HADES_SAVE_DIR";
pub const BACKUP_ROOT_ENV: &str = "HADES_BACKUP_ROOT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("could not determine {0}; pass it explicitly or set it in the settings file")]
    Unresolved(&'static str),
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_root: Option<PathBuf>,
}

impl Settings {
    /// A missing file yields default settings.
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Path choices from a single source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub save_dir: Option<PathBuf>,
    pub backup_root: Option<PathBuf>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Overrides {
            save_dir: non_empty_env(SAVE_DIR_ENV),
            backup_root: non_empty_env(BACKUP_ROOT_ENV),
        }
    }
}

fn non_empty_env(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

pub struct Config {
    pub save_dir: PathBuf,
    pub backup_root: PathBuf,
}

impl Config {
    pub fn from_args(args: &GlobalArgs) -> std::result::Result<Self, ConfigError> {
        let settings_path = args.config.clone().or_else(platform::settings_file);
        let settings = match &settings_path {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        let cli = Overrides {
            save_dir: args.save_dir.clone(),
            backup_root: args.backup_root.clone(),
        };

        Config::resolve(cli, Overrides::from_env(), settings, platform::detect())
    }

    pub fn resolve(
        cli: Overrides,
        env: Overrides,
        settings: Settings,
        platform: Platform,
    ) -> std::result::Result<Self, ConfigError> {
        let save_dir = cli
            .save_dir
            .or(env.save_dir)
            .or(settings.save_dir)
            .or_else(|| platform::default_save_dir(platform))
            .ok_or(ConfigError::Unresolved("save directory"))?;

        let backup_root = cli
            .backup_root
            .or(env.backup_root)
            .or(settings.backup_root)
            .or_else(platform::default_backup_root)
            .ok_or(ConfigError::Unresolved("backup root"))?;

        Ok(Config {
            save_dir,
            backup_root,
        })
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.save_dir, &self.backup_root)
    }
}

/// The tag last selected or created by the user, if any.
pub fn last_tag(layout: &Layout) -> Option<String> {
    let content = fs::read_to_string(layout.state_file()).ok()?;
    let state: serde_json::Value = serde_json::from_str(&content).ok()?;
    state.get("last_tag")?.as_str().map(str::to_string)
}

/// Records `tag` as last used. Other keys in the state file are kept.
pub fn set_last_tag(layout: &Layout, tag: &str) -> Result<()> {
    let path = layout.state_file();

    let mut state = fs::read_to_string(&path)
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&content).ok())
        .unwrap_or_default();
    state.insert("last_tag".to_string(), serde_json::Value::String(tag.to_string()));

    fs::create_dir_all(layout.root())
        .context(|| format!("failed to create {}", layout.root().display()))?;
    fsutil::write_json_atomic(&path, &state)
}
