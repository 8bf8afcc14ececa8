use std::{
    fs::File,
    io,
    path::PathBuf,
    sync::Arc,
};

use parking_lot::Mutex;
use platform_dirs::AppDirs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tunebridge_core::{coordinator::CoordinatorConfig, error::Error, storage::mkdir_if_not_exists};

const APP_NAME: &str = "TuneBridge";
const CONFIG_FILENAME: &str = "config.json";
const STORAGE_FILENAME: &str = "storage.json";

pub type SharedConfig = Arc<Mutex<Config>>;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub coordinator: CoordinatorConfig,
    pub lastfm_api_secret: String,
    /// Preferences, the ones that may be synced between browsers.
    pub settings: Map<String, Value>,
    /// Machine-local preferences, including the Last.fm session.
    pub local_settings: Map<String, Value>,
}

impl Config {
    fn app_dirs() -> Option<AppDirs> {
        const USE_XDG_ON_MACOS: bool = false;

        AppDirs::new(Some(APP_NAME), USE_XDG_ON_MACOS)
    }

    pub fn config_dir() -> Option<PathBuf> {
        Self::app_dirs().map(|dirs| dirs.config_dir)
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CONFIG_FILENAME))
    }

    /// Durable storage for state that has to survive a reload.
    pub fn storage_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(STORAGE_FILENAME))
    }

    pub fn load() -> Result<Config, Error> {
        let path = Self::config_path()
            .ok_or_else(|| Error::ConfigError("failed to get config path".into()))?;
        match File::open(&path) {
            Ok(file) => {
                log::info!("loading config: {:?}", &path);
                Ok(serde_json::from_reader(file)?)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self) -> Result<(), Error> {
        let dir = Self::config_dir()
            .ok_or_else(|| Error::ConfigError("failed to get config dir".into()))?;
        mkdir_if_not_exists(&dir)?;
        let file = File::create(dir.join(CONFIG_FILENAME))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn session_key(&self) -> Option<String> {
        self.local_settings
            .get("lastfmSessionKey")
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    pub fn has_api_credentials(&self) -> bool {
        !self.coordinator.lastfm_api_key.is_empty() && !self.lastfm_api_secret.is_empty()
    }
}
