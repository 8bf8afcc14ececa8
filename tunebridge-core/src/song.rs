use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use time::OffsetDateTime;

use crate::record::{fields, ObservableRecord};

pub mod field {
    pub const POSITION: &str = "position";
    pub const POSITION_SEC: &str = "positionSec";
    pub const INFO: &str = "info";
    pub const RATING: &str = "rating";
    pub const NOW_PLAYING_SENT: &str = "nowPlayingSent";
    pub const SCROBBLED: &str = "scrobbled";
    pub const TOASTED: &str = "toasted";
    pub const SCROBBLE_TIME: &str = "scrobbleTime";
    pub const TIMESTAMP: &str = "timestamp";
    pub const FF: &str = "ff";
}

pub const DEFAULT_POSITION: &str = "0:00";

/// Metadata of the track shown on the music page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongInfo {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Duration as displayed by the page, e.g. "4:05".
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub duration_sec: i64,
    /// Anything else the page sends along (cover art URL, ...), kept for the
    /// UI surfaces.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SongInfo {
    /// Parse a page-provided `info` value.  `null` and malformed values both
    /// mean "no track".
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        match serde_json::from_value::<SongInfo>(value.clone()) {
            Ok(mut info) => {
                info.duration_sec = parse_seconds(&info.duration);
                Some(info)
            }
            Err(err) => {
                log::warn!("ignoring malformed song info: {}", err);
                None
            }
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Two `info` values describe the same track if title, artist, album and
/// duration match.  Other attributes the page sends do not matter.
pub fn same_track(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (a, b) => ["duration", "title", "artist", "album"]
            .iter()
            .all(|key| a.get(key) == b.get(key)),
    }
}

/// Parse "h:mm:ss", "m:ss" or plain seconds.  Anything unparsable or out of
/// range is 0.
pub fn parse_seconds(time: &str) -> i64 {
    try_parse_seconds(time).unwrap_or(0)
}

fn try_parse_seconds(time: &str) -> Option<i64> {
    let mut seconds: i64 = 0;
    let mut factor: i64 = 1;
    for part in time.trim().rsplit(':') {
        let value = part.trim().parse::<i64>().ok()?;
        seconds = seconds.checked_add(value.checked_mul(factor)?)?;
        factor = factor.checked_mul(60)?;
    }
    Some(seconds)
}

pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// The track currently shown on the connected page, plus per-track
/// scrobbling state.
pub struct Song {
    record: ObservableRecord,
}

impl Song {
    pub fn defaults() -> Map<String, Value> {
        fields([
            (field::POSITION, json!(DEFAULT_POSITION)),
            (field::POSITION_SEC, json!(0)),
            (field::INFO, Value::Null),
            (field::RATING, json!(0)),
            (field::NOW_PLAYING_SENT, json!(false)),
            (field::SCROBBLED, json!(false)),
            (field::TOASTED, json!(false)),
            (field::SCROBBLE_TIME, json!(-1)),
            (field::TIMESTAMP, json!(0)),
            (field::FF, json!(false)),
        ])
    }

    pub fn new() -> Self {
        let mut record = ObservableRecord::new(Self::defaults());
        record.set_equals_fn(field::INFO, same_track);
        Self { record }
    }

    pub fn record(&self) -> &ObservableRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut ObservableRecord {
        &mut self.record
    }

    pub fn position(&self) -> &str {
        self.record
            .get(field::POSITION)
            .as_str()
            .unwrap_or(DEFAULT_POSITION)
    }

    pub fn position_sec(&self) -> i64 {
        self.record.get(field::POSITION_SEC).as_i64().unwrap_or(0)
    }

    pub fn info(&self) -> Option<SongInfo> {
        SongInfo::from_value(self.record.get(field::INFO))
    }

    pub fn has_info(&self) -> bool {
        !self.record.get(field::INFO).is_null()
    }

    pub fn now_playing_sent(&self) -> bool {
        self.flag(field::NOW_PLAYING_SENT)
    }

    pub fn scrobbled(&self) -> bool {
        self.flag(field::SCROBBLED)
    }

    pub fn toasted(&self) -> bool {
        self.flag(field::TOASTED)
    }

    pub fn ff(&self) -> bool {
        self.flag(field::FF)
    }

    /// Elapsed seconds at which the track gets scrobbled, `None` when it will
    /// not be scrobbled.
    pub fn scrobble_time(&self) -> Option<f64> {
        self.record
            .get(field::SCROBBLE_TIME)
            .as_f64()
            .filter(|time| *time >= 0.0)
    }

    pub fn timestamp(&self) -> i64 {
        self.record.get(field::TIMESTAMP).as_i64().unwrap_or(0)
    }

    pub fn set_flag(&mut self, field: &str, value: bool) -> bool {
        self.record.set(field, json!(value))
    }

    pub fn set_scrobble_time(&mut self, time: Option<f64>) -> bool {
        let value = match time {
            Some(time) if time.fract() == 0.0 => json!(time as i64),
            Some(time) => json!(time),
            None => json!(-1),
        };
        self.record.set(field::SCROBBLE_TIME, value)
    }

    pub fn set_timestamp(&mut self, timestamp: i64) -> bool {
        self.record.set(field::TIMESTAMP, json!(timestamp))
    }

    fn flag(&self, field: &str) -> bool {
        self.record.get(field).as_bool().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clock_strings() {
        assert_eq!(parse_seconds("0:00"), 0);
        assert_eq!(parse_seconds("4:05"), 245);
        assert_eq!(parse_seconds("1:02:03"), 3723);
        assert_eq!(parse_seconds("42"), 42);
        assert_eq!(parse_seconds(""), 0);
        assert_eq!(parse_seconds("live"), 0);
    }

    #[test]
    fn out_of_range_clock_strings_are_zero() {
        assert_eq!(parse_seconds("0:0:0:0:0:0:0:0:0:0:0:0"), 0);
        assert_eq!(parse_seconds("9223372036854775807:00"), 0);
        assert_eq!(parse_seconds("99999999999999999999"), 0);
        assert_eq!(parse_seconds("9223372036854775807"), i64::MAX);
    }

    #[test]
    fn same_track_ignores_extra_attributes() {
        let a = json!({ "title": "T", "artist": "A", "album": "B", "duration": "3:00", "cover": "x" });
        let b = json!({ "title": "T", "artist": "A", "album": "B", "duration": "3:00", "cover": "y" });
        let c = json!({ "title": "T", "artist": "A", "album": "B", "duration": "3:01" });
        assert!(same_track(&a, &b));
        assert!(!same_track(&a, &c));
        assert!(same_track(&Value::Null, &Value::Null));
        assert!(!same_track(&a, &Value::Null));
    }

    #[test]
    fn info_gets_duration_in_seconds() {
        let info = SongInfo::from_value(&json!({
            "title": "Title",
            "artist": "Artist",
            "album": "Album",
            "duration": "4:00",
            "cover": "http://cover"
        }))
        .unwrap();
        assert_eq!(info.duration_sec, 240);
        assert_eq!(info.extra.get("cover"), Some(&json!("http://cover")));
        assert_eq!(info.to_value()["durationSec"], json!(240));
    }

    #[test]
    fn malformed_info_means_no_track() {
        assert_eq!(SongInfo::from_value(&json!("garbage")), None);
        assert_eq!(SongInfo::from_value(&Value::Null), None);
    }

    #[test]
    fn scrobble_time_sentinel() {
        let mut song = Song::new();
        assert_eq!(song.scrobble_time(), None);
        song.set_scrobble_time(Some(120.0));
        assert_eq!(song.record().get(field::SCROBBLE_TIME), &json!(120));
        assert_eq!(song.scrobble_time(), Some(120.0));
        song.set_scrobble_time(None);
        assert_eq!(song.record().get(field::SCROBBLE_TIME), &json!(-1));
    }
}
