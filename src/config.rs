use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::UserDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of external touch slots shared by all screens.
    pub capacity: usize,
    /// Only attach the screen with this identity.
    pub screen: Option<String>,
    pub device_dir: PathBuf,
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 10,
            screen: None,
            device_dir: PathBuf::from("/dev/input"),
            poll_interval_ms: 8,
        }
    }
}

pub fn config_dir() -> Option<PathBuf> {
    let home = UserDirs::new()?.home_dir().to_path_buf();
    Some(home.join(".config").join("touchmux"))
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

impl Config {
    /// Load `~/.config/touchmux/config.toml`, or defaults when it is absent.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(p) if p.exists() => Self::load_from(&p),
            Some(p) => {
                debug!("no config at {}, using defaults", p.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let cfg = Self::parse(&txt)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        info!("loaded config from {}", path.display());
        Ok(cfg)
    }

    pub fn parse(txt: &str) -> Result<Self> {
        let cfg: Config =
            toml::from_str(txt).map_err(|e| Error::Config(format!("failed to parse: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config("capacity must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        if self.screen.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(Error::Config("screen must not be empty".into()));
        }
        Ok(())
    }
}
