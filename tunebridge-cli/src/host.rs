//! Carries out coordinator effects.  Last.fm requests run on their own
//! threads and report back as events, everything the browser has to do is
//! written to stdout as one JSON object per line.

use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use crossbeam_channel::Sender;
use serde::Serialize;
use serde_json::Value;
use tunebridge_core::{
    connection::{Port, PortMessage, TabId},
    coordinator::Event,
    effect::Effect,
    error::Error,
    lastfm::{exchange_token_for_session, LastFmClient, SubmissionFailure},
    scrobble::{SubmissionKind, TrackSubmission},
    service::EffectHandler,
};

use crate::config::SharedConfig;

/// Line-oriented JSON output shared by the host and the ports.
#[derive(Clone, Copy)]
pub struct Output;

impl Output {
    pub fn stdout() -> Self {
        Output
    }

    pub fn emit(&self, value: &impl Serialize) -> Result<(), Error> {
        let mut out = io::stdout().lock();
        serde_json::to_writer(&mut out, value)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    port: TabId,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a PortMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    disconnect: bool,
}

/// A content script port, reached through stdout.
pub struct StdoutPort {
    tab: TabId,
    closed: Arc<AtomicBool>,
    output: Output,
}

impl StdoutPort {
    pub fn new(tab: TabId, output: Output) -> Self {
        Self {
            tab,
            closed: Arc::default(),
            output,
        }
    }
}

impl Port for StdoutPort {
    fn tab_id(&self) -> TabId {
        self.tab
    }

    fn post(&self, message: &PortMessage) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::PortDisconnected);
        }
        self.output.emit(&PortOutput {
            port: self.tab,
            message: Some(message),
            disconnect: false,
        })
    }

    fn disconnect(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let result = self.output.emit(&PortOutput {
            port: self.tab,
            message: None,
            disconnect: true,
        });
        if let Err(err) = result {
            log::warn!("failed to disconnect port of tab {}: {}", self.tab, err);
        }
    }
}

pub struct CliHost {
    sender: Sender<Event<StdoutPort>>,
    config: SharedConfig,
    output: Output,
}

impl CliHost {
    pub fn new(sender: Sender<Event<StdoutPort>>, config: SharedConfig, output: Output) -> Self {
        Self {
            sender,
            config,
            output,
        }
    }

    fn submit(&self, kind: SubmissionKind, track: TrackSubmission) {
        let (api_key, api_secret, session_key) = {
            let config = self.config.lock();
            (
                config.coordinator.lastfm_api_key.clone(),
                config.lastfm_api_secret.clone(),
                config.session_key(),
            )
        };
        let sender = self.sender.clone();
        thread::spawn(move || {
            let result = LastFmClient::create_scrobbler(
                (!api_key.is_empty()).then_some(api_key.as_str()),
                (!api_secret.is_empty()).then_some(api_secret.as_str()),
                session_key.as_deref(),
            )
            .and_then(|scrobbler| match kind {
                SubmissionKind::NowPlaying => LastFmClient::now_playing_song(&scrobbler, &track),
                SubmissionKind::Scrobble => LastFmClient::scrobble_song(&scrobbler, &track),
            })
            .map_err(|err| {
                log::warn!("Last.fm {:?} failed: {}", kind, err);
                SubmissionFailure::from_error(&err)
            });
            if sender
                .send(Event::SubmissionFinished { kind, result })
                .is_err()
            {
                log::warn!("coordinator gone before {:?} finished", kind);
            }
        });
    }

    fn exchange_token(&self, token: String) {
        let (api_key, api_secret) = {
            let config = self.config.lock();
            (
                config.coordinator.lastfm_api_key.clone(),
                config.lastfm_api_secret.clone(),
            )
        };
        let sender = self.sender.clone();
        thread::spawn(move || match exchange_token_for_session(&api_key, &api_secret, &token) {
            Ok(session) => {
                if sender.send(Event::LastfmSession(session)).is_err() {
                    log::warn!("coordinator gone before Last.fm login finished");
                }
            }
            Err(err) => log::error!("Last.fm login failed: {}", err),
        });
    }

    fn persist_local_settings(&self, local: Value) -> Result<(), Error> {
        let Value::Object(local) = local else {
            return Err(Error::ConfigError("local settings are not an object".into()));
        };
        let mut config = self.config.lock();
        config.local_settings = local;
        config.save()
    }
}

impl EffectHandler for CliHost {
    fn apply(&mut self, effect: Effect) -> Result<(), Error> {
        match effect {
            Effect::SendNowPlaying(track) => self.submit(SubmissionKind::NowPlaying, track),
            Effect::Scrobble(track) => self.submit(SubmissionKind::Scrobble, track),
            Effect::ExchangeLastfmToken(token) => self.exchange_token(token),
            Effect::PersistLocalSettings(local) => self.persist_local_settings(local)?,
            effect => self.output.emit(&effect)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn port_output_shape() {
        let message = PortMessage::Connected;
        let posted = serde_json::to_value(PortOutput {
            port: 3,
            message: Some(&message),
            disconnect: false,
        })
        .unwrap();
        assert_eq!(posted, json!({ "port": 3, "message": { "type": "connected" } }));

        let closed = serde_json::to_value(PortOutput {
            port: 3,
            message: None,
            disconnect: true,
        })
        .unwrap();
        assert_eq!(closed, json!({ "port": 3, "disconnect": true }));
    }

    #[test]
    fn closed_port_refuses_messages() {
        let port = StdoutPort::new(1, Output::stdout());
        port.closed.store(true, Ordering::Release);
        assert!(matches!(
            port.post(&PortMessage::Connected),
            Err(Error::PortDisconnected)
        ));
    }
}
