//! The background coordinator.
//!
//! `Coordinator` owns the song, player and settings records, the page ports
//! and the UI surface state.  Every input arrives as an `Event`; `dispatch`
//! applies it and returns the effects the host has to carry out.
//!
//! Record listeners never recompute derived state themselves.  They only
//! queue effects or mark work as pending, and `settle` runs the pending
//! recomputations in a fixed order after each event:
//!
//! 1. scrobble deadline (scrobbling settings, Last.fm session),
//! 2. miniplayer reopen (type) and resize (layout),
//! 3. persisting local settings,
//! 4. icon click behaviour,
//! 5. icon.

use std::{
    cell::{Cell, RefCell},
    mem,
    rc::Rc,
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    connection::{ConnectOutcome, DisconnectOutcome, Port, PortArbiter, PortMessage, TabId},
    effect::{AnalyticsEvent, Effect, Icon, IconAction, MiniplayerHandle, MiniplayerSurface},
    lastfm::{generate_lastfm_auth_url, LastfmSession, SubmissionFailure},
    message::{PageMessage, PageUpdate, ShortcutCommand},
    miniplayer::{window_sizing, Miniplayer, MiniplayerState},
    player::{self, Player},
    record::ObservableRecord,
    scrobble::{
        detect_seek, due_submission, scrobble_deadline, ScrobblePolicy, ScrobbleThresholds, Seek,
        SubmissionKind, TrackSubmission,
    },
    settings::{field as settings_field, LocalSettings, MiniplayerType, Settings, RECORDED_SETTINGS},
    song::{field as song_field, parse_seconds, unix_now, Song, SongInfo, DEFAULT_POSITION},
    storage::{key, Storage, UpdateBackup},
    version::is_newer_version,
};

/// Static configuration of the coordinator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub version: String,
    /// Opened when the user asks for the music page and none is connected.
    pub page_url: String,
    /// Tabs matching this get the content script injected on startup.
    pub page_url_pattern: String,
    pub options_url: String,
    pub lastfm_api_key: String,
    pub thresholds: ScrobbleThresholds,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            page_url: "http://play.google.com/music/listen".to_owned(),
            page_url_pattern: "*://play.google.com/music/listen*".to_owned(),
            options_url: "chrome-extension://tunebridge/options.html".to_owned(),
            lastfm_api_key: String::new(),
            thresholds: ScrobbleThresholds::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    BrowserUpdate,
}

pub enum Event<P> {
    Startup,
    Connect(P),
    Disconnect(TabId),
    PageMessage {
        tab: TabId,
        message: PageMessage,
    },
    SettingChanged {
        field: String,
        value: Value,
    },
    LocalSettingChanged {
        field: String,
        value: Value,
    },
    Command(ShortcutCommand),
    /// Forward a command from a UI surface to the page.
    ExecuteInPage {
        command: String,
        options: Value,
    },
    IconClicked,
    Installed {
        reason: InstallReason,
        previous_version: Option<String>,
    },
    UpdateAvailable,
    Suspend,
    MiniplayerOpened(MiniplayerHandle),
    MiniplayerClosed(MiniplayerHandle),
    /// The host could not create the requested miniplayer window.
    MiniplayerFailed,
    ToastClosed,
    SubmissionFinished {
        kind: SubmissionKind,
        result: Result<(), SubmissionFailure>,
    },
    LastfmLogin,
    LastfmLogout,
    LastfmToken(String),
    LastfmSession(LastfmSession),
    ReloginAccepted,
    OpenPage,
    OpenOptions,
    OptionsTabOpened(TabId),
    OptionsTabClosed,
    UpdateInfosViewed,
    UpdateNotifierDone,
    Shutdown,
}

#[derive(Copy, Clone, Debug)]
enum Recompute {
    ScrobbleTime,
    MiniplayerType,
    MiniplayerLayout,
    LocalSettings,
    IconAction,
    Icon,
}

/// Recomputations requested by record listeners, run by `settle`.
#[derive(Default)]
struct Pending(Cell<u8>);

impl Pending {
    fn raise(&self, what: Recompute) {
        self.0.set(self.0.get() | 1 << what as u8);
    }

    fn take(&self, what: Recompute) -> bool {
        let bit = 1 << what as u8;
        let raised = self.0.get() & bit != 0;
        self.0.set(self.0.get() & !bit);
        raised
    }
}

#[derive(Clone, Default)]
struct EffectQueue(Rc<RefCell<Vec<Effect>>>);

impl EffectQueue {
    fn push(&self, effect: Effect) {
        self.0.borrow_mut().push(effect);
    }

    fn drain(&self) -> Vec<Effect> {
        mem::take(&mut *self.0.borrow_mut())
    }
}

#[derive(Debug, Default)]
struct UpdateNotice {
    view: bool,
    previous_version: Option<String>,
}

pub struct Coordinator<P> {
    config: CoordinatorConfig,
    song: Song,
    player: Player,
    settings: Settings,
    local_settings: LocalSettings,
    ports: PortArbiter<P>,
    storage: Box<dyn Storage>,
    miniplayer: Miniplayer,
    toast_open: bool,
    options_tab: Option<TabId>,
    update_notice: UpdateNotice,
    handle_install_events: Rc<Cell<bool>>,
    handle_update_available: bool,
    pending: Rc<Pending>,
    effects: EffectQueue,
}

impl<P: Port> Coordinator<P> {
    pub fn new(
        config: CoordinatorConfig,
        settings: Settings,
        local_settings: LocalSettings,
        storage: Box<dyn Storage>,
    ) -> Self {
        let update_notice = UpdateNotice {
            view: storage
                .get(key::VIEW_UPDATE_NOTIFIER)
                .is_some_and(|view| view == "true"),
            previous_version: storage.get(key::PREVIOUS_VERSION),
        };
        let mut coordinator = Self {
            config,
            song: Song::new(),
            player: Player::new(),
            settings,
            local_settings,
            ports: PortArbiter::new(),
            storage,
            miniplayer: Miniplayer::new(),
            toast_open: false,
            options_tab: None,
            update_notice,
            handle_install_events: Rc::new(Cell::new(false)),
            handle_update_available: true,
            pending: Rc::default(),
            effects: EffectQueue::default(),
        };
        coordinator.wire();
        coordinator
    }

    /// Subscribe to the record fields that drive derived state and effects.
    fn wire(&mut self) {
        let pending = self.pending.clone();
        let raise = move |what: Recompute| {
            let pending = pending.clone();
            move |_: &mut ObservableRecord, _: &Value, _: &Value| pending.raise(what)
        };

        let settings = self.settings.record_mut();
        settings.watch(settings_field::UPDATE_NOTIFIER, {
            let handle = self.handle_install_events.clone();
            move |_, enabled, _| handle.set(enabled.as_bool().unwrap_or(false))
        });
        self.wire_analytics();
        let settings = self.settings.record_mut();
        settings.watch(settings_field::ICON_CLICK_MINIPLAYER, raise(Recompute::IconAction));
        settings.add_listener(settings_field::ICON_CLICK_CONNECT, raise(Recompute::IconAction));
        settings.add_listener(settings_field::MINIPLAYER_TYPE, raise(Recompute::MiniplayerType));
        settings.add_listener(settings_field::LAYOUT, raise(Recompute::MiniplayerLayout));
        for field in [
            settings_field::SCROBBLE,
            settings_field::SCROBBLE_MAX_DURATION,
            settings_field::SCROBBLE_PERCENT,
            settings_field::SCROBBLE_TIME,
            settings_field::DISABLE_SCROBBLE_ON_FF,
        ] {
            settings.add_listener(field, raise(Recompute::ScrobbleTime));
        }

        let local = self.local_settings.record_mut();
        local.watch(settings_field::SYNC_SETTINGS, {
            let effects = self.effects.clone();
            move |_, sync, _| effects.push(Effect::SetSettingsSync(sync.as_bool().unwrap_or(false)))
        });
        local.add_listener(settings_field::LASTFM_SESSION_NAME, raise(Recompute::ScrobbleTime));
        local.add_listener(settings_field::LASTFM_SESSION_NAME, raise(Recompute::LocalSettings));
        local.add_listener(settings_field::LASTFM_SESSION_KEY, raise(Recompute::LocalSettings));

        self.player
            .record_mut()
            .add_listener(player::field::PLAYING, raise(Recompute::Icon));
        let song = self.song.record_mut();
        song.add_listener(song_field::SCROBBLED, raise(Recompute::Icon));
        song.add_listener(song_field::INFO, raise(Recompute::Icon));
    }

    /// Once analytics is enabled, initialize it and report the current
    /// settings.  This happens at most once per process.
    fn wire_analytics(&mut self) {
        let own_id = Rc::new(Cell::new(None));
        let id = self.settings.record_mut().watch(settings_field::GA_ENABLED, {
            let effects = self.effects.clone();
            let version = self.config.version.clone();
            let own_id = own_id.clone();
            let mut recorded = false;
            move |settings, enabled, _| {
                if recorded || enabled.as_bool() != Some(true) {
                    return;
                }
                recorded = true;
                if let Some(id) = own_id.get() {
                    settings.remove_listener(settings_field::GA_ENABLED, id);
                }
                effects.push(Effect::InitAnalytics);
                for field in RECORDED_SETTINGS {
                    effects.push(Effect::Analytics(setting_event(
                        field,
                        settings.get(field),
                        &version,
                    )));
                }
            }
        });
        if self.settings.ga_enabled() {
            self.settings
                .record_mut()
                .remove_listener(settings_field::GA_ENABLED, id);
        } else {
            own_id.set(Some(id));
        }
    }

    pub fn dispatch(&mut self, event: Event<P>) -> Vec<Effect> {
        match event {
            Event::Startup => self.startup(),
            Event::Connect(port) => self.connect(port),
            Event::Disconnect(tab) => self.disconnect(tab),
            Event::PageMessage { tab, message } => self.page_message(tab, message),
            Event::SettingChanged { field, value } => {
                self.settings.record_mut().set(&field, value);
            }
            Event::LocalSettingChanged { field, value } => {
                self.local_settings.record_mut().set(&field, value);
            }
            Event::Command(command) => self.command(command),
            Event::ExecuteInPage { command, options } => self.execute_in_page(&command, options),
            Event::IconClicked => self.icon_clicked(),
            Event::Installed {
                reason,
                previous_version,
            } => self.installed(reason, previous_version),
            Event::UpdateAvailable => {
                if self.handle_update_available {
                    self.reload_for_update();
                }
            }
            Event::Suspend => self.handle_update_available = false,
            Event::MiniplayerOpened(handle) => self.miniplayer_opened(handle),
            Event::MiniplayerClosed(handle) => self.miniplayer_closed(handle),
            Event::MiniplayerFailed => self.miniplayer_failed(),
            Event::ToastClosed => self.toast_open = false,
            Event::SubmissionFinished { kind, result } => self.submission_finished(kind, result),
            Event::LastfmLogin => self.lastfm_login(),
            Event::LastfmLogout => self.lastfm_logout(),
            Event::LastfmToken(token) => self.effects.push(Effect::ExchangeLastfmToken(token)),
            Event::LastfmSession(session) => self.lastfm_session(session),
            Event::ReloginAccepted => {
                self.lastfm_login();
                self.effects.push(Effect::CloseReloginPrompt);
            }
            Event::OpenPage => self.open_page(),
            Event::OpenOptions => self.open_options(),
            Event::OptionsTabOpened(tab) => self.options_tab = Some(tab),
            Event::OptionsTabClosed => self.options_tab = None,
            Event::UpdateInfosViewed => self.update_infos_viewed(),
            Event::UpdateNotifierDone => self.update_notifier_done(),
            Event::Shutdown => {}
        }
        self.settle();
        self.effects.drain()
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn local_settings(&self) -> &LocalSettings {
        &self.local_settings
    }

    pub fn ports(&self) -> &PortArbiter<P> {
        &self.ports
    }

    pub fn miniplayer_state(&self) -> MiniplayerState {
        self.miniplayer.state()
    }

    /// Version the extension was updated from, while the update notice is
    /// relevant.
    pub fn previous_version(&self) -> Option<&str> {
        self.update_notice.previous_version.as_deref()
    }

    pub fn icon(&self) -> Icon {
        if self.update_notice.view {
            Icon::Updated
        } else if !self.ports.is_connected() {
            Icon::NotConnected
        } else if self.song.has_info() {
            let scrobbled = self.song.scrobbled();
            if self.player.playing() {
                Icon::Play { scrobbled }
            } else {
                Icon::Pause { scrobbled }
            }
        } else {
            Icon::Connected
        }
    }

    pub fn icon_action(&self) -> IconAction {
        if self.update_notice.view {
            IconAction::UpdateNotifierPopup
        } else if self.settings.icon_click_connect() && !self.ports.is_connected() {
            IconAction::ConnectPage
        } else if self.settings.icon_click_miniplayer() {
            IconAction::OpenMiniplayer
        } else {
            IconAction::PlayerPopup
        }
    }

    pub fn scrobbling_enabled(&self) -> bool {
        self.settings.scrobble() && self.local_settings.session_name().is_some()
    }

    fn settle(&mut self) {
        if self.pending.take(Recompute::ScrobbleTime) {
            self.calc_scrobble_time();
        }
        if self.pending.take(Recompute::MiniplayerType) && self.miniplayer.is_open() {
            self.open_miniplayer();
        }
        if self.pending.take(Recompute::MiniplayerLayout) {
            self.resize_miniplayer();
        }
        if self.pending.take(Recompute::LocalSettings) {
            self.effects
                .push(Effect::PersistLocalSettings(self.local_settings.record().to_json()));
        }
        if self.pending.take(Recompute::IconAction) {
            self.effects.push(Effect::SetIconAction(self.icon_action()));
        }
        if self.pending.take(Recompute::Icon) {
            self.effects.push(Effect::SetIcon(self.icon()));
        }
    }

    fn startup(&mut self) {
        self.effects.push(Effect::InjectContentScripts {
            url_pattern: self.config.page_url_pattern.clone(),
        });
        self.restore_backup();
        self.pending.raise(Recompute::IconAction);
        self.pending.raise(Recompute::Icon);
    }

    fn connect(&mut self, port: P) {
        if self.ports.connect(port) == ConnectOutcome::Live {
            self.connected();
        }
    }

    fn connected(&mut self) {
        self.pending.raise(Recompute::IconAction);
        self.pending.raise(Recompute::Icon);
    }

    fn disconnect(&mut self, tab: TabId) {
        if self.ports.disconnect(tab) != DisconnectOutcome::LiveLost {
            return;
        }
        self.pending.raise(Recompute::IconAction);
        self.pending.raise(Recompute::Icon);
        self.player.record_mut().reset_to_defaults();
        self.song.record_mut().reset_to_defaults();
        if let Some(tab) = self.ports.promote_next() {
            log::info!("promoted parked port of tab {}", tab);
            self.connected();
        }
    }

    fn page_message(&mut self, tab: TabId, message: PageMessage) {
        if self.ports.live_tab() != Some(tab) {
            log::debug!("ignoring message from inactive tab {}", tab);
            return;
        }
        match message.into_update() {
            Some(PageUpdate::Song { field, value }) => self.apply_song_update(&field, value),
            Some(PageUpdate::Player { field, value }) => {
                self.player.record_mut().set(&field, value);
            }
            None => log::debug!("ignoring unknown page message"),
        }
    }

    fn apply_song_update(&mut self, field: &str, value: Value) {
        match field {
            song_field::POSITION => {
                if self.song.record_mut().set(field, value) {
                    self.track_position();
                }
            }
            song_field::INFO => {
                let info = SongInfo::from_value(&value)
                    .map(|info| info.to_value())
                    .unwrap_or(Value::Null);
                if self.song.record_mut().set(field, info) {
                    self.start_track();
                }
            }
            _ => {
                self.song.record_mut().set(field, value);
            }
        }
    }

    /// Follow a position change: detect seeking, then send now-playing or
    /// scrobble once they are due.
    fn track_position(&mut self) {
        let thresholds = self.config.thresholds;
        let previous = self.song.position_sec();
        let current = parse_seconds(self.song.position());
        self.song
            .record_mut()
            .set(song_field::POSITION_SEC, json!(current));

        match detect_seek(previous, current, self.song.ff(), &thresholds) {
            Some(Seek::FastForward) => {
                log::debug!("fast-forward from {}s to {}s", previous, current);
                self.song.set_flag(song_field::FF, true);
                self.song.set_scrobble_time(None);
            }
            Some(Seek::BackToStart) => {
                self.song.set_flag(song_field::FF, false);
                self.calc_scrobble_time();
            }
            None => {}
        }

        if !(self.player.playing() && self.song.has_info() && self.scrobbling_enabled()) {
            return;
        }
        match due_submission(
            current,
            self.song.scrobble_time(),
            self.song.now_playing_sent(),
            self.song.scrobbled(),
            &thresholds,
        ) {
            Some(SubmissionKind::NowPlaying) => {
                self.song.set_flag(song_field::NOW_PLAYING_SENT, true);
                self.submit(SubmissionKind::NowPlaying);
            }
            Some(SubmissionKind::Scrobble) => {
                self.song.set_flag(song_field::SCROBBLED, true);
                self.submit(SubmissionKind::Scrobble);
            }
            None => {}
        }
    }

    /// A different track is shown: start a fresh song session.
    fn start_track(&mut self) {
        for flag in [
            song_field::NOW_PLAYING_SENT,
            song_field::SCROBBLED,
            song_field::TOASTED,
            song_field::FF,
        ] {
            self.song.set_flag(flag, false);
        }
        if self.song.has_info() {
            self.song.set_timestamp(unix_now());
            if self.player.playing() {
                self.toast_popup();
            }
        } else {
            self.song.set_timestamp(0);
        }
        self.calc_scrobble_time();
    }

    fn calc_scrobble_time(&mut self) {
        let policy = ScrobblePolicy::from_settings(&self.settings, &self.local_settings);
        let duration = self.song.info().map(|info| info.duration_sec);
        let deadline = scrobble_deadline(duration, self.song.ff(), &policy);
        self.song.set_scrobble_time(deadline);
    }

    fn submit(&mut self, kind: SubmissionKind) {
        let Some(info) = self.song.info() else {
            return;
        };
        let track = TrackSubmission::new(&info, self.song.timestamp());
        log::info!("submitting {:?} for {} - {}", kind, track.artist, track.title);
        self.effects.push(match kind {
            SubmissionKind::NowPlaying => Effect::SendNowPlaying(track),
            SubmissionKind::Scrobble => Effect::Scrobble(track),
        });
    }

    fn submission_finished(&mut self, kind: SubmissionKind, result: Result<(), SubmissionFailure>) {
        let name = match kind {
            SubmissionKind::NowPlaying => "NowPlaying",
            SubmissionKind::Scrobble => "Scrobble",
        };
        match result {
            Ok(()) => self.analytics("LastFM", &format!("{name}OK"), None),
            Err(failure) => {
                log::warn!("{} failed with code {}", name, failure.code);
                self.analytics("LastFM", &format!("{name}Error-{}", failure.code), None);
                if failure.session_expired && self.local_settings.session_name().is_some() {
                    self.relogin();
                }
            }
        }
    }

    fn toast_popup(&mut self) {
        if self.song.toasted() || !self.settings.toast() || self.miniplayer.is_open() {
            return;
        }
        self.song.set_flag(song_field::TOASTED, true);
        if self.toast_open {
            self.effects.push(Effect::CloseToast);
        }
        self.effects.push(Effect::ShowToast {
            duration_secs: self.settings.toast_duration(),
        });
        self.toast_open = true;
    }

    fn command(&mut self, command: ShortcutCommand) {
        match command {
            ShortcutCommand::PlayPause | ShortcutCommand::PrevSong | ShortcutCommand::NextSong => {
                self.execute_in_page(command.as_str(), json!({}));
            }
            ShortcutCommand::OpenMiniplayer => self.open_miniplayer(),
        }
    }

    fn execute_in_page(&mut self, command: &str, options: Value) {
        let options = if options.is_null() { json!({}) } else { options };
        let message = PortMessage::Execute {
            command: command.to_owned(),
            options,
        };
        if let Err(err) = self.ports.post_to_live(&message) {
            log::debug!("not executing {} in page: {}", command, err);
        }
    }

    fn icon_clicked(&mut self) {
        match self.icon_action() {
            IconAction::ConnectPage => self.open_page(),
            IconAction::OpenMiniplayer => self.open_miniplayer(),
            IconAction::UpdateNotifierPopup | IconAction::PlayerPopup => {}
        }
    }

    fn open_miniplayer(&mut self) {
        if self.toast_open {
            self.toast_open = false;
            self.effects.push(Effect::CloseToast);
        }
        match self.miniplayer.state() {
            MiniplayerState::Open(handle) => {
                // Opened again once the close is reported.
                self.miniplayer.request_reopen();
                self.effects.push(Effect::CloseMiniplayer(handle));
                return;
            }
            MiniplayerState::Opening => {
                self.miniplayer.request_reopen();
                return;
            }
            MiniplayerState::Closed => {}
        }

        let reopened = self.miniplayer.take_reopen();
        match self.settings.miniplayer_type() {
            MiniplayerType::Notification => {
                self.effects
                    .push(Effect::OpenMiniplayer(MiniplayerSurface::Notification));
                self.miniplayer.opened(MiniplayerHandle::Notification);
            }
            window_type => {
                let sizing = window_sizing(
                    window_type,
                    self.local_settings.miniplayer_sizing(self.settings.layout()),
                );
                self.effects
                    .push(Effect::OpenMiniplayer(MiniplayerSurface::Window {
                        window_type,
                        sizing,
                    }));
                self.miniplayer.opening();
            }
        }
        let action = if reopened {
            "MiniplayerReopened"
        } else {
            "MiniplayerOpened"
        };
        self.analytics("Internal", action, None);
    }

    fn miniplayer_opened(&mut self, handle: MiniplayerHandle) {
        if self.miniplayer.state() != MiniplayerState::Opening {
            log::warn!("unexpected miniplayer {:?} reported open", handle);
            return;
        }
        self.miniplayer.opened(handle);
        if self.miniplayer.close_pending() {
            self.effects.push(Effect::CloseMiniplayer(handle));
        }
    }

    fn miniplayer_closed(&mut self, handle: MiniplayerHandle) {
        if let Some(true) = self.miniplayer.closed(handle) {
            self.open_miniplayer();
        }
    }

    fn miniplayer_failed(&mut self) {
        if self.miniplayer.failed() {
            log::warn!("miniplayer window could not be created");
        }
    }

    fn resize_miniplayer(&mut self) {
        let Some(window) = self.miniplayer.window() else {
            return;
        };
        let sizing = window_sizing(
            self.settings.miniplayer_type(),
            self.local_settings.miniplayer_sizing(self.settings.layout()),
        );
        self.effects.push(Effect::ResizeMiniplayer {
            window,
            width: sizing.width,
            height: sizing.height,
        });
    }

    fn open_page(&mut self) {
        match self.ports.live_tab() {
            Some(tab) => self.effects.push(Effect::FocusTab(tab)),
            None => self.effects.push(Effect::OpenTab {
                url: self.config.page_url.clone(),
                pinned: self.settings.open_page_pinned(),
            }),
        }
    }

    fn open_options(&mut self) {
        match self.options_tab {
            Some(tab) => self.effects.push(Effect::FocusTab(tab)),
            None => self.effects.push(Effect::OpenTab {
                url: self.config.options_url.clone(),
                pinned: false,
            }),
        }
    }

    fn lastfm_login(&mut self) {
        let url = match generate_lastfm_auth_url(
            &self.config.lastfm_api_key,
            &self.config.options_url,
        ) {
            Ok(url) => url,
            Err(err) => {
                log::error!("failed to build Last.fm auth URL: {}", err);
                return;
            }
        };
        match self.options_tab {
            Some(tab) => self.effects.push(Effect::UpdateTab { tab, url }),
            None => self.effects.push(Effect::OpenTab { url, pinned: false }),
        }
        self.analytics("LastFM", "AuthorizeStarted", None);
    }

    fn lastfm_logout(&mut self) {
        let local = self.local_settings.record_mut();
        local.set(settings_field::LASTFM_SESSION_KEY, Value::Null);
        local.set(settings_field::LASTFM_SESSION_NAME, Value::Null);
    }

    fn lastfm_session(&mut self, session: LastfmSession) {
        log::info!("Last.fm session obtained for {}", session.name);
        let local = self.local_settings.record_mut();
        local.set(settings_field::LASTFM_SESSION_KEY, json!(session.key));
        local.set(settings_field::LASTFM_SESSION_NAME, json!(session.name));
    }

    fn relogin(&mut self) {
        log::warn!("Last.fm session expired, asking to log in again");
        self.lastfm_logout();
        self.effects.push(Effect::ShowReloginPrompt);
    }

    fn installed(&mut self, reason: InstallReason, previous_version: Option<String>) {
        if !self.handle_install_events.get() || reason != InstallReason::Update {
            return;
        }
        let Some(previous) = previous_version else {
            return;
        };
        if !is_newer_version(&self.config.version, &previous) {
            return;
        }
        log::info!("updated from {} to {}", previous, self.config.version);
        self.store(key::PREVIOUS_VERSION, previous.clone());
        self.store(key::VIEW_UPDATE_NOTIFIER, "true".to_owned());
        self.update_notice = UpdateNotice {
            view: true,
            previous_version: Some(previous),
        };
        self.pending.raise(Recompute::IconAction);
        self.pending.raise(Recompute::Icon);
    }

    fn update_infos_viewed(&mut self) {
        self.update_notice.previous_version = None;
        self.unstore(key::PREVIOUS_VERSION);
        self.update_notifier_done();
    }

    fn update_notifier_done(&mut self) {
        self.update_notice.view = false;
        self.unstore(key::VIEW_UPDATE_NOTIFIER);
        self.pending.raise(Recompute::IconAction);
        self.pending.raise(Recompute::Icon);
    }

    /// Save the in-flight session, drop all ports and ask for a reload.
    fn reload_for_update(&mut self) {
        let backup = UpdateBackup {
            miniplayer_open: self.miniplayer.is_open(),
            now_playing_sent: self.song.now_playing_sent(),
            scrobbled: self.song.scrobbled(),
            toasted: self.song.toasted(),
            song_timestamp: self.song.timestamp(),
            song_ff: self.song.ff(),
            song_position: self.song.position().to_owned(),
            song_info: self.song.record().get(song_field::INFO).clone(),
        };
        if let Err(err) = backup.store(self.storage.as_mut()) {
            log::error!("failed to store update backup: {}", err);
        }
        self.ports.disconnect_all();
        self.effects.push(Effect::Reload);
    }

    fn restore_backup(&mut self) {
        let Some(backup) = UpdateBackup::take(self.storage.as_mut()) else {
            return;
        };
        log::info!("restoring session from update backup");
        let info = SongInfo::from_value(&backup.song_info)
            .map(|info| info.to_value())
            .unwrap_or(Value::Null);
        if self.song.record_mut().set(song_field::INFO, info) {
            self.start_track();
        }
        let position = if backup.song_position.is_empty() {
            DEFAULT_POSITION.to_owned()
        } else {
            backup.song_position
        };
        let song = self.song.record_mut();
        song.set(song_field::POSITION_SEC, json!(parse_seconds(&position)));
        song.set(song_field::POSITION, json!(position));
        self.song.set_flag(song_field::FF, backup.song_ff);
        self.song
            .set_flag(song_field::NOW_PLAYING_SENT, backup.now_playing_sent);
        self.song.set_flag(song_field::SCROBBLED, backup.scrobbled);
        self.song.set_flag(song_field::TOASTED, backup.toasted);
        self.song.set_timestamp(backup.song_timestamp);
        self.calc_scrobble_time();
        if backup.miniplayer_open {
            self.open_miniplayer();
        }
    }

    fn analytics(&self, category: &str, action: &str, value: Option<i64>) {
        if self.settings.ga_enabled() {
            self.effects.push(Effect::Analytics(AnalyticsEvent {
                category: category.to_owned(),
                action: action.to_owned(),
                label: self.config.version.clone(),
                value,
            }));
        }
    }

    fn store(&mut self, key: &str, value: String) {
        if let Err(err) = self.storage.set(key, value) {
            log::error!("failed to store {}: {}", key, err);
        }
    }

    fn unstore(&mut self, key: &str) {
        if let Err(err) = self.storage.remove(key) {
            log::error!("failed to remove {}: {}", key, err);
        }
    }
}

/// Analytics event describing the current value of a setting.
fn setting_event(field: &str, value: &Value, version: &str) -> AnalyticsEvent {
    let (action, value) = match value {
        Value::Bool(on) => (format!("{field}-{}", if *on { "On" } else { "Off" }), None),
        Value::Number(number) => (
            field.to_owned(),
            number.as_i64().or_else(|| number.as_f64().map(|n| n.round() as i64)),
        ),
        Value::String(text) => (format!("{field}-{text}"), None),
        other => (format!("{field}-{other}"), None),
    };
    AnalyticsEvent {
        category: "Settings".to_owned(),
        action,
        label: version.to_owned(),
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_flags_are_independent() {
        let pending = Pending::default();
        pending.raise(Recompute::Icon);
        pending.raise(Recompute::ScrobbleTime);
        assert!(!pending.take(Recompute::IconAction));
        assert!(pending.take(Recompute::Icon));
        assert!(!pending.take(Recompute::Icon));
        assert!(pending.take(Recompute::ScrobbleTime));
    }

    #[test]
    fn settings_are_described_by_type() {
        let event = setting_event("toast", &json!(true), "1.0");
        assert_eq!(event.action, "toast-On");
        let event = setting_event("scrobblePercent", &json!(50), "1.0");
        assert_eq!((event.action.as_str(), event.value), ("scrobblePercent", Some(50)));
        let event = setting_event("layout", &json!("hbar"), "1.0");
        assert_eq!(event.action, "layout-hbar");
        assert_eq!(event.category, "Settings");
    }
}
