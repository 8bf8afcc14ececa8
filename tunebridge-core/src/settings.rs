use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::record::{fields, ObservableRecord};

pub mod field {
    pub const SCROBBLE: &str = "scrobble";
    pub const SCROBBLE_PERCENT: &str = "scrobblePercent";
    pub const SCROBBLE_TIME: &str = "scrobbleTime";
    pub const SCROBBLE_MAX_DURATION: &str = "scrobbleMaxDuration";
    pub const DISABLE_SCROBBLE_ON_FF: &str = "disableScrobbleOnFf";
    pub const LINK_RATINGS: &str = "linkRatings";
    pub const TOAST: &str = "toast";
    pub const TOAST_DURATION: &str = "toastDuration";
    pub const HIDE_TOAST_PLAYCONTROLS: &str = "hideToastPlaycontrols";
    pub const MINIPLAYER_TYPE: &str = "miniplayerType";
    pub const LAYOUT: &str = "layout";
    pub const COLOR: &str = "color";
    pub const ICON_CLICK_MINIPLAYER: &str = "iconClickMiniplayer";
    pub const ICON_CLICK_CONNECT: &str = "iconClickConnect";
    pub const OPEN_PAGE_PINNED: &str = "openPagePinned";
    pub const UPDATE_NOTIFIER: &str = "updateNotifier";
    pub const GA_ENABLED: &str = "gaEnabled";

    pub const LASTFM_SESSION_KEY: &str = "lastfmSessionKey";
    pub const LASTFM_SESSION_NAME: &str = "lastfmSessionName";
    pub const SYNC_SETTINGS: &str = "syncSettings";
    pub const MINIPLAYER_SIZING: &str = "miniplayerSizing";
}

/// Settings reported to analytics once it gets enabled.
pub const RECORDED_SETTINGS: &[&str] = &[
    field::SCROBBLE,
    field::SCROBBLE_PERCENT,
    field::SCROBBLE_TIME,
    field::SCROBBLE_MAX_DURATION,
    field::DISABLE_SCROBBLE_ON_FF,
    field::LINK_RATINGS,
    field::TOAST,
    field::TOAST_DURATION,
    field::HIDE_TOAST_PLAYCONTROLS,
    field::MINIPLAYER_TYPE,
    field::LAYOUT,
    field::COLOR,
    field::ICON_CLICK_MINIPLAYER,
    field::ICON_CLICK_CONNECT,
    field::OPEN_PAGE_PINNED,
    field::UPDATE_NOTIFIER,
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiniplayerType {
    Notification,
    Popup,
    Normal,
    Panel,
    DetachedPanel,
}

impl Default for MiniplayerType {
    fn default() -> Self {
        Self::Popup
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Sizing {
    pub width: i64,
    pub height: i64,
    pub left: i64,
    pub top: i64,
}

/// User preferences, possibly synced between browser profiles.
pub struct Settings {
    record: ObservableRecord,
}

impl Settings {
    pub fn defaults() -> Map<String, Value> {
        fields([
            (field::SCROBBLE, json!(true)),
            (field::SCROBBLE_PERCENT, json!(50)),
            (field::SCROBBLE_TIME, json!(240)),
            (field::SCROBBLE_MAX_DURATION, json!(30)),
            (field::DISABLE_SCROBBLE_ON_FF, json!(false)),
            (field::LINK_RATINGS, json!(false)),
            (field::TOAST, json!(true)),
            (field::TOAST_DURATION, json!(5)),
            (field::HIDE_TOAST_PLAYCONTROLS, json!(true)),
            (field::MINIPLAYER_TYPE, json!("popup")),
            (field::LAYOUT, json!("normal")),
            (field::COLOR, json!("turq")),
            (field::ICON_CLICK_MINIPLAYER, json!(false)),
            (field::ICON_CLICK_CONNECT, json!(false)),
            (field::OPEN_PAGE_PINNED, json!(false)),
            (field::UPDATE_NOTIFIER, json!(true)),
            (field::GA_ENABLED, json!(true)),
        ])
    }

    pub fn new(stored: Map<String, Value>) -> Self {
        Self {
            record: ObservableRecord::with_values(Self::defaults(), stored),
        }
    }

    pub fn record(&self) -> &ObservableRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut ObservableRecord {
        &mut self.record
    }

    pub fn scrobble(&self) -> bool {
        flag(&self.record, field::SCROBBLE)
    }

    pub fn scrobble_percent(&self) -> f64 {
        number(&self.record, field::SCROBBLE_PERCENT)
    }

    pub fn scrobble_time(&self) -> f64 {
        number(&self.record, field::SCROBBLE_TIME)
    }

    /// Longest track (in minutes) that still gets scrobbled, 0 for no limit.
    pub fn scrobble_max_duration(&self) -> f64 {
        number(&self.record, field::SCROBBLE_MAX_DURATION)
    }

    pub fn disable_scrobble_on_ff(&self) -> bool {
        flag(&self.record, field::DISABLE_SCROBBLE_ON_FF)
    }

    pub fn toast(&self) -> bool {
        flag(&self.record, field::TOAST)
    }

    pub fn toast_duration(&self) -> f64 {
        number(&self.record, field::TOAST_DURATION)
    }

    pub fn miniplayer_type(&self) -> MiniplayerType {
        serde_json::from_value(self.record.get(field::MINIPLAYER_TYPE).clone()).unwrap_or_default()
    }

    pub fn layout(&self) -> &str {
        self.record.get(field::LAYOUT).as_str().unwrap_or("normal")
    }

    pub fn icon_click_miniplayer(&self) -> bool {
        flag(&self.record, field::ICON_CLICK_MINIPLAYER)
    }

    pub fn icon_click_connect(&self) -> bool {
        flag(&self.record, field::ICON_CLICK_CONNECT)
    }

    pub fn open_page_pinned(&self) -> bool {
        flag(&self.record, field::OPEN_PAGE_PINNED)
    }

    pub fn ga_enabled(&self) -> bool {
        flag(&self.record, field::GA_ENABLED)
    }
}

/// Machine-local preferences.  These hold the Last.fm session and are never
/// synced.
pub struct LocalSettings {
    record: ObservableRecord,
}

impl LocalSettings {
    pub fn defaults() -> Map<String, Value> {
        fields([
            (field::LASTFM_SESSION_KEY, Value::Null),
            (field::LASTFM_SESSION_NAME, Value::Null),
            (field::SYNC_SETTINGS, json!(false)),
            (
                field::MINIPLAYER_SIZING,
                json!({
                    "normal":   { "width": 271, "height": 116, "left": 0, "top": 0 },
                    "compact1": { "width": 271, "height": 84,  "left": 0, "top": 0 },
                    "compact2": { "width": 180, "height": 133, "left": 0, "top": 0 },
                    "hbar":     { "width": 476, "height": 31,  "left": 0, "top": 0 }
                }),
            ),
        ])
    }

    pub fn new(stored: Map<String, Value>) -> Self {
        Self {
            record: ObservableRecord::with_values(Self::defaults(), stored),
        }
    }

    pub fn record(&self) -> &ObservableRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut ObservableRecord {
        &mut self.record
    }

    pub fn session_key(&self) -> Option<&str> {
        self.record.get(field::LASTFM_SESSION_KEY).as_str()
    }

    pub fn session_name(&self) -> Option<&str> {
        self.record.get(field::LASTFM_SESSION_NAME).as_str()
    }

    /// Stored window geometry of the miniplayer for `layout`.
    pub fn miniplayer_sizing(&self, layout: &str) -> Sizing {
        let parse = |all: &Value| -> Option<Sizing> {
            all.get(layout)
                .and_then(|sizing| serde_json::from_value(sizing.clone()).ok())
        };
        parse(self.record.get(field::MINIPLAYER_SIZING))
            .or_else(|| parse(self.record.default_of(field::MINIPLAYER_SIZING)))
            .unwrap_or_default()
    }
}

fn flag(record: &ObservableRecord, field: &str) -> bool {
    record.get(field).as_bool().unwrap_or(false)
}

fn number(record: &ObservableRecord, field: &str) -> f64 {
    record.get(field).as_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_values_win_over_defaults() {
        let mut stored = Map::new();
        stored.insert(field::MINIPLAYER_TYPE.into(), json!("detached_panel"));
        stored.insert(field::SCROBBLE_PERCENT.into(), json!(75));
        let settings = Settings::new(stored);
        assert_eq!(settings.miniplayer_type(), MiniplayerType::DetachedPanel);
        assert_eq!(settings.scrobble_percent(), 75.0);
        assert!(settings.scrobble());
    }

    #[test]
    fn unknown_miniplayer_type_falls_back_to_popup() {
        let mut stored = Map::new();
        stored.insert(field::MINIPLAYER_TYPE.into(), json!("floating"));
        assert_eq!(Settings::new(stored).miniplayer_type(), MiniplayerType::Popup);
    }

    #[test]
    fn sizing_per_layout() {
        let local = LocalSettings::new(Map::new());
        assert_eq!(
            local.miniplayer_sizing("hbar"),
            Sizing {
                width: 476,
                height: 31,
                left: 0,
                top: 0
            }
        );
        assert_eq!(local.miniplayer_sizing("unknown"), Sizing::default());
    }

    #[test]
    fn partially_stored_sizing_falls_back_per_layout() {
        let mut stored = Map::new();
        stored.insert(
            field::MINIPLAYER_SIZING.into(),
            json!({ "normal": { "width": 300, "height": 120, "left": 10, "top": 20 } }),
        );
        let local = LocalSettings::new(stored);
        assert_eq!(local.miniplayer_sizing("normal").left, 10);
        assert_eq!(local.miniplayer_sizing("compact2").width, 180);
        assert_eq!(local.session_name(), None);
    }
}
