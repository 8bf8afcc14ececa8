//! Events read from the browser side, one JSON object per line.

use serde::Deserialize;
use serde_json::Value;
use tunebridge_core::{
    connection::TabId,
    coordinator::{Event, InstallReason},
    effect::MiniplayerHandle,
    error::Error,
    message::{PageMessage, ShortcutCommand},
};

use crate::{
    config::SharedConfig,
    host::{Output, StdoutPort},
};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Input {
    Connect {
        tab: TabId,
    },
    Disconnect {
        tab: TabId,
    },
    Page {
        tab: TabId,
        message: PageMessage,
    },
    Setting {
        field: String,
        value: Value,
    },
    LocalSetting {
        field: String,
        value: Value,
    },
    Command {
        command: ShortcutCommand,
    },
    Execute {
        command: String,
        #[serde(default)]
        options: Value,
    },
    IconClicked,
    Installed {
        reason: InstallReason,
        #[serde(default)]
        previous_version: Option<String>,
    },
    UpdateAvailable,
    Suspend,
    MiniplayerOpened {
        handle: MiniplayerHandle,
    },
    MiniplayerClosed {
        handle: MiniplayerHandle,
    },
    MiniplayerFailed,
    ToastClosed,
    LastfmLogin,
    LastfmLogout,
    LastfmToken {
        token: String,
    },
    ReloginAccepted,
    OpenPage,
    OpenOptions,
    OptionsTabOpened {
        tab: TabId,
    },
    OptionsTabClosed,
    UpdateInfosViewed,
    UpdateNotifierDone,
}

/// Parse one input line.  Blank lines are skipped.
pub fn parse_line(line: &str) -> Result<Option<Input>, Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|err| Error::MalformedMessage(format!("{err}: {line}")))
}

impl Input {
    /// Keep preference changes in the config file, so they apply on the next
    /// start as well.
    pub fn remember(&self, config: &SharedConfig) {
        let mut config = config.lock();
        match self {
            Input::Setting { field, value } => {
                config.settings.insert(field.clone(), value.clone());
            }
            Input::LocalSetting { field, value } => {
                config.local_settings.insert(field.clone(), value.clone());
            }
            _ => return,
        }
        if let Err(err) = config.save() {
            log::error!("failed to save config: {}", err);
        }
    }

    pub fn into_event(self, output: Output) -> Event<StdoutPort> {
        match self {
            Input::Connect { tab } => Event::Connect(StdoutPort::new(tab, output)),
            Input::Disconnect { tab } => Event::Disconnect(tab),
            Input::Page { tab, message } => Event::PageMessage { tab, message },
            Input::Setting { field, value } => Event::SettingChanged { field, value },
            Input::LocalSetting { field, value } => Event::LocalSettingChanged { field, value },
            Input::Command { command } => Event::Command(command),
            Input::Execute { command, options } => Event::ExecuteInPage { command, options },
            Input::IconClicked => Event::IconClicked,
            Input::Installed {
                reason,
                previous_version,
            } => Event::Installed {
                reason,
                previous_version,
            },
            Input::UpdateAvailable => Event::UpdateAvailable,
            Input::Suspend => Event::Suspend,
            Input::MiniplayerOpened { handle } => Event::MiniplayerOpened(handle),
            Input::MiniplayerClosed { handle } => Event::MiniplayerClosed(handle),
            Input::MiniplayerFailed => Event::MiniplayerFailed,
            Input::ToastClosed => Event::ToastClosed,
            Input::LastfmLogin => Event::LastfmLogin,
            Input::LastfmLogout => Event::LastfmLogout,
            Input::LastfmToken { token } => Event::LastfmToken(token),
            Input::ReloginAccepted => Event::ReloginAccepted,
            Input::OpenPage => Event::OpenPage,
            Input::OpenOptions => Event::OpenOptions,
            Input::OptionsTabOpened { tab } => Event::OptionsTabOpened(tab),
            Input::OptionsTabClosed => Event::OptionsTabClosed,
            Input::UpdateInfosViewed => Event::UpdateInfosViewed,
            Input::UpdateNotifierDone => Event::UpdateNotifierDone,
        }
    }
}
