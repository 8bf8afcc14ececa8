use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::Error,
    song::{self, DEFAULT_POSITION},
};

const SONG_PREFIX: &str = "song-";
const PLAYER_PREFIX: &str = "player-";

/// Keyed update posted by the content script, e.g.
/// `{"type": "song-position", "value": "1:23"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PageUpdate {
    Song { field: String, value: Value },
    Player { field: String, value: Value },
}

impl PageMessage {
    pub fn new(kind: impl Into<String>, value: Value) -> Self {
        Self {
            kind: kind.into(),
            value,
        }
    }

    /// Record write this message stands for, if any.
    pub fn into_update(self) -> Option<PageUpdate> {
        if let Some(field) = self.kind.strip_prefix(SONG_PREFIX) {
            let value = match self.value {
                Value::String(position) if field == song::field::POSITION && position.is_empty() => {
                    json!(DEFAULT_POSITION)
                }
                value => value,
            };
            Some(PageUpdate::Song {
                field: field.to_owned(),
                value,
            })
        } else {
            self.kind
                .strip_prefix(PLAYER_PREFIX)
                .map(|field| PageUpdate::Player {
                    field: field.to_owned(),
                    value: self.value,
                })
        }
    }
}

/// Global keyboard shortcuts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShortcutCommand {
    PlayPause,
    PrevSong,
    NextSong,
    OpenMiniplayer,
}

impl ShortcutCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayPause => "playPause",
            Self::PrevSong => "prevSong",
            Self::NextSong => "nextSong",
            Self::OpenMiniplayer => "openMiniplayer",
        }
    }
}

impl FromStr for ShortcutCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "playPause" => Ok(Self::PlayPause),
            "prevSong" => Ok(Self::PrevSong),
            "nextSong" => Ok(Self::NextSong),
            "openMiniplayer" => Ok(Self::OpenMiniplayer),
            other => Err(Error::MalformedMessage(format!("unknown command {other}"))),
        }
    }
}
