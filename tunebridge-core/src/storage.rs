use std::{
    collections::{BTreeMap, HashMap},
    fs,
    fs::File,
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

pub mod key {
    pub const UPDATE_BACKUP: &str = "updateBackup";
    pub const PREVIOUS_VERSION: &str = "previousVersion";
    pub const VIEW_UPDATE_NOTIFIER: &str = "viewUpdateNotifier";
}

/// Durable string key/value storage that survives reloads.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<(), Error>;

    fn remove(&mut self, key: &str) -> Result<(), Error>;
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), Error> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Storage kept in a single JSON file, rewritten on every change.
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    pub fn open(path: PathBuf) -> Result<Self, Error> {
        if let Some(dir) = path.parent() {
            mkdir_if_not_exists(dir)?;
        }
        let entries = match File::open(&path) {
            Ok(file) => {
                log::info!("loading storage: {:?}", &path);
                serde_json::from_reader(file)?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<(), Error> {
        let file = File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &self.entries)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), Error> {
        self.entries.insert(key.to_owned(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), Error> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

pub fn mkdir_if_not_exists(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).or_else(|err| {
        if err.kind() == io::ErrorKind::AlreadyExists {
            Ok(())
        } else {
            Err(err)
        }
    })
}

/// In-flight session state carried over a reload for an update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateBackup {
    pub miniplayer_open: bool,
    pub now_playing_sent: bool,
    pub scrobbled: bool,
    pub toasted: bool,
    pub song_timestamp: i64,
    pub song_ff: bool,
    pub song_position: String,
    pub song_info: Value,
}

impl UpdateBackup {
    pub fn store(&self, storage: &mut dyn Storage) -> Result<(), Error> {
        storage.set(key::UPDATE_BACKUP, serde_json::to_string(self)?)
    }

    /// Read and remove the stored backup.  It is only ever applied once.
    pub fn take(storage: &mut dyn Storage) -> Option<Self> {
        let raw = storage.get(key::UPDATE_BACKUP)?;
        if let Err(err) = storage.remove(key::UPDATE_BACKUP) {
            log::error!("failed to remove update backup: {}", err);
        }
        serde_json::from_str(&raw)
            .map_err(|err| log::error!("discarding unreadable update backup: {}", err))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn backup() -> UpdateBackup {
        UpdateBackup {
            miniplayer_open: true,
            now_playing_sent: true,
            scrobbled: false,
            toasted: true,
            song_timestamp: 1_700_000_000,
            song_ff: false,
            song_position: "1:10".into(),
            song_info: json!({ "title": "T", "artist": "A", "album": "", "duration": "3:00" }),
        }
    }

    #[test]
    fn backup_is_taken_once() {
        let mut storage = MemoryStorage::new();
        backup().store(&mut storage).unwrap();
        assert_eq!(UpdateBackup::take(&mut storage), Some(backup()));
        assert_eq!(UpdateBackup::take(&mut storage), None);
    }

    #[test]
    fn unreadable_backup_is_discarded() {
        let mut storage = MemoryStorage::new();
        storage.set(key::UPDATE_BACKUP, "{not json".into()).unwrap();
        assert_eq!(UpdateBackup::take(&mut storage), None);
        assert_eq!(storage.get(key::UPDATE_BACKUP), None);
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let mut storage = FileStorage::open(path.clone()).unwrap();
        storage.set(key::PREVIOUS_VERSION, "1.2".into()).unwrap();
        storage.set(key::VIEW_UPDATE_NOTIFIER, "true".into()).unwrap();
        storage.remove(key::VIEW_UPDATE_NOTIFIER).unwrap();

        let storage = FileStorage::open(path).unwrap();
        assert_eq!(storage.get(key::PREVIOUS_VERSION), Some("1.2".into()));
        assert_eq!(storage.get(key::VIEW_UPDATE_NOTIFIER), None);
    }
}
