//! Side effects requested by the coordinator and carried out by the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    connection::TabId,
    scrobble::TrackSubmission,
    settings::{MiniplayerType, Sizing},
};

pub type WindowId = i64;

/// Toolbar icon variants.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Updated,
    NotConnected,
    Connected,
    Play { scrobbled: bool },
    Pause { scrobbled: bool },
}

/// What a click on the toolbar icon does.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconAction {
    UpdateNotifierPopup,
    ConnectPage,
    OpenMiniplayer,
    PlayerPopup,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiniplayerHandle {
    Window(WindowId),
    Notification,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiniplayerSurface {
    Notification,
    Window {
        window_type: MiniplayerType,
        sizing: Sizing,
    },
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub category: String,
    pub action: String,
    /// Extension version.
    pub label: String,
    pub value: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "data", rename_all = "snake_case")]
pub enum Effect {
    SetIcon(Icon),
    SetIconAction(IconAction),
    /// Inject the content script into already open music tabs.
    InjectContentScripts { url_pattern: String },
    SendNowPlaying(TrackSubmission),
    Scrobble(TrackSubmission),
    ExchangeLastfmToken(String),
    ShowToast { duration_secs: f64 },
    CloseToast,
    OpenMiniplayer(MiniplayerSurface),
    CloseMiniplayer(MiniplayerHandle),
    ResizeMiniplayer {
        window: WindowId,
        width: i64,
        height: i64,
    },
    OpenTab { url: String, pinned: bool },
    FocusTab(TabId),
    /// Navigate an existing tab and focus it.
    UpdateTab { tab: TabId, url: String },
    ShowReloginPrompt,
    CloseReloginPrompt,
    SetSettingsSync(bool),
    PersistLocalSettings(Value),
    InitAnalytics,
    Analytics(AnalyticsEvent),
    /// Reload the whole extension, after the update backup has been stored.
    Reload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effects_serialize_with_tag() {
        let json = serde_json::to_value(Effect::FocusTab(4)).unwrap();
        assert_eq!(json, serde_json::json!({ "effect": "focus_tab", "data": 4 }));
    }
}
