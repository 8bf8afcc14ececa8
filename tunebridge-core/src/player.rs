use serde_json::{json, Map, Value};

use crate::record::{fields, ObservableRecord};

pub mod field {
    pub const RATING_MODE: &str = "ratingMode";
    pub const SHUFFLE: &str = "shuffle";
    pub const REPEAT: &str = "repeat";
    pub const PLAYLISTS: &str = "playlists";
    pub const PLAYING: &str = "playing";
}

/// Player state as reported by the music page.
pub struct Player {
    record: ObservableRecord,
}

impl Player {
    pub fn defaults() -> Map<String, Value> {
        fields([
            (field::RATING_MODE, Value::Null),
            (field::SHUFFLE, json!("")),
            (field::REPEAT, json!("")),
            (field::PLAYLISTS, json!([])),
            (field::PLAYING, json!(false)),
        ])
    }

    pub fn new() -> Self {
        Self {
            record: ObservableRecord::new(Self::defaults()),
        }
    }

    pub fn record(&self) -> &ObservableRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut ObservableRecord {
        &mut self.record
    }

    pub fn playing(&self) -> bool {
        self.record
            .get(field::PLAYING)
            .as_bool()
            .unwrap_or(false)
    }
}
