use crate::{error::Error, scrobble::TrackSubmission};
use rustfm_scrobble::{responses::SessionResponse, Scrobble, Scrobbler, ScrobblerError};
use serde::{Deserialize, Serialize};
use url::Url;

/// Last.fm error code for an invalid or expired session key.
pub const INVALID_SESSION_CODE: &str = "9";

pub struct LastFmClient;

impl LastFmClient {
    /// Report a track as "now playing" to Last.fm using an existing Scrobbler instance.
    pub fn now_playing_song(scrobbler: &Scrobbler, track: &TrackSubmission) -> Result<(), Error> {
        scrobbler
            .now_playing(&to_scrobble(track))
            .map(|_| ())
            .map_err(Error::from)
    }

    /// Scrobble a track, dated to the time it started playing.
    pub fn scrobble_song(scrobbler: &Scrobbler, track: &TrackSubmission) -> Result<(), Error> {
        let mut song = to_scrobble(track);
        if track.timestamp > 0 {
            song.with_timestamp(track.timestamp as u64);
        }
        scrobbler.scrobble(&song).map(|_| ()).map_err(Error::from)
    }

    /// Creates an authenticated Last.fm Scrobbler instance with provided credentials.
    /// Note: This assumes the session_key is valid. Validity is checked on first API call.
    pub fn create_scrobbler(
        api_key: Option<&str>,
        api_secret: Option<&str>,
        session_key: Option<&str>,
    ) -> Result<Scrobbler, Error> {
        let (Some(api_key), Some(api_secret)) = (api_key, api_secret) else {
            log::warn!("missing Last.fm API key or secret for scrobbler creation.");
            return Err(Error::ConfigError(
                "Last.fm API key and secret are not configured".into(),
            ));
        };
        let Some(session_key) = session_key else {
            return Err(Error::MissingSession);
        };

        let mut scrobbler = Scrobbler::new(api_key, api_secret);
        scrobbler.authenticate_with_session_key(session_key);
        Ok(scrobbler)
    }
}

// `duration_sec` is not sent: `rustfm_scrobble::Scrobble` only carries
// artist, track, album and timestamp.
fn to_scrobble(track: &TrackSubmission) -> Scrobble {
    Scrobble::new(&track.artist, &track.title, &track.album)
}

impl From<ScrobblerError> for Error {
    fn from(value: ScrobblerError) -> Self {
        Self::ScrobblerError(Box::new(value))
    }
}

/// Generate a Last.fm authentication URL
pub fn generate_lastfm_auth_url(
    api_key: &str,
    callback_url: &str,
) -> Result<String, url::ParseError> {
    let base = "http://www.last.fm/api/auth/";
    let url = Url::parse_with_params(base, &[("api_key", api_key), ("cb", callback_url)])?;
    Ok(url.to_string())
}

/// Session obtained from an authentication token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastfmSession {
    pub key: String,
    pub name: String,
}

/// Exchange a token for a Last.fm session
pub fn exchange_token_for_session(
    api_key: &str,
    api_secret: &str,
    token: &str,
) -> Result<LastfmSession, Error> {
    let mut scrobbler = Scrobbler::new(api_key, api_secret);
    scrobbler
        .authenticate_with_token(token)
        .map(|response: SessionResponse| LastfmSession {
            key: response.key,
            name: response.name,
        })
        .map_err(Error::from)
}

/// Why a now-playing or scrobble request failed, as far as the coordinator
/// cares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFailure {
    pub code: String,
    pub session_expired: bool,
}

impl SubmissionFailure {
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::ScrobblerError(err) if is_session_error(&err.to_string()) => Self::session_expired(),
            Error::MissingSession => Self::session_expired(),
            Error::ScrobblerError(_) => Self::new("api"),
            Error::IoError(_) => Self::new("io"),
            _ => Self::new("other"),
        }
    }

    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            session_expired: false,
        }
    }

    pub fn session_expired() -> Self {
        Self {
            code: INVALID_SESSION_CODE.to_owned(),
            session_expired: true,
        }
    }
}

fn is_session_error(message: &str) -> bool {
    message.to_lowercase().contains("session key")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_url_carries_key_and_callback() {
        let url = generate_lastfm_auth_url("KEY", "chrome-extension://abc/options.html").unwrap();
        assert!(url.starts_with("http://www.last.fm/api/auth/?api_key=KEY&cb="));
        assert!(url.contains("options.html"));
    }

    #[test]
    fn missing_credentials_are_rejected() {
        assert!(matches!(
            LastFmClient::create_scrobbler(Some("key"), Some("secret"), None),
            Err(Error::MissingSession)
        ));
        for (key, secret) in [(Some("key"), None), (None, Some("secret")), (None, None)] {
            assert!(matches!(
                LastFmClient::create_scrobbler(key, secret, Some("sk")),
                Err(Error::ConfigError(_))
            ));
        }
    }

    #[test]
    fn unconfigured_api_is_not_an_expired_session() {
        let err = LastFmClient::create_scrobbler(Some("key"), None, Some("sk")).err();
        let failure = SubmissionFailure::from_error(&err.unwrap());
        assert_eq!(failure, SubmissionFailure::new("other"));
        assert!(!failure.session_expired);
    }

    #[test]
    fn failures_are_classified() {
        assert!(SubmissionFailure::from_error(&Error::MissingSession).session_expired);
        let io = Error::IoError(std::io::Error::other("reset"));
        assert_eq!(SubmissionFailure::from_error(&io), SubmissionFailure::new("io"));
        assert!(is_session_error("Invalid session key - Please re-authenticate"));
    }
}
