//! Scrobble timing: when a track counts as listened to, and how seeking
//! affects it.

use serde::{Deserialize, Serialize};

use crate::{
    settings::{LocalSettings, Settings},
    song::SongInfo,
};

/// Seek detection and now-playing thresholds, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrobbleThresholds {
    /// A position jump forward by more than this counts as fast-forwarding.
    pub ff_jump_secs: i64,
    /// Going back to this position or earlier ends fast-forwarding.
    pub ff_reset_secs: i64,
    /// Elapsed time after which "now playing" is reported.
    pub now_playing_after_secs: i64,
}

impl Default for ScrobbleThresholds {
    fn default() -> Self {
        Self {
            ff_jump_secs: 5,
            ff_reset_secs: 5,
            now_playing_after_secs: 3,
        }
    }
}

/// Scrobbling preferences relevant to the deadline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrobblePolicy {
    pub enabled: bool,
    pub percent: f64,
    /// Absolute deadline ceiling in seconds, 0 for none.
    pub time_cap: f64,
    /// Longest scrobbled track in minutes, 0 for no limit.
    pub max_duration_mins: f64,
    pub disable_on_ff: bool,
}

impl ScrobblePolicy {
    pub fn from_settings(settings: &Settings, local: &LocalSettings) -> Self {
        Self {
            enabled: settings.scrobble() && local.session_name().is_some(),
            percent: settings.scrobble_percent(),
            time_cap: settings.scrobble_time(),
            max_duration_mins: settings.scrobble_max_duration(),
            disable_on_ff: settings.disable_scrobble_on_ff(),
        }
    }
}

/// Elapsed seconds after which a track of `duration_sec` gets scrobbled, or
/// `None` if it should not be scrobbled at all.
pub fn scrobble_deadline(duration_sec: Option<i64>, ff: bool, policy: &ScrobblePolicy) -> Option<f64> {
    let duration = duration_sec.filter(|duration| *duration > 0)? as f64;
    if !policy.enabled || (ff && policy.disable_on_ff) {
        return None;
    }
    if policy.max_duration_mins > 0.0 && duration > policy.max_duration_mins * 60.0 {
        return None;
    }
    let deadline = duration * (policy.percent / 100.0);
    if policy.time_cap > 0.0 && deadline > policy.time_cap {
        Some(policy.time_cap)
    } else {
        Some(deadline)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Seek {
    /// Playback jumped ahead, scrobbling is suspended.
    FastForward,
    /// Playback went back near the start after fast-forwarding.
    BackToStart,
}

pub fn detect_seek(
    previous_sec: i64,
    current_sec: i64,
    ff: bool,
    thresholds: &ScrobbleThresholds,
) -> Option<Seek> {
    if !ff && current_sec > previous_sec.saturating_add(thresholds.ff_jump_secs) {
        Some(Seek::FastForward)
    } else if ff && current_sec <= thresholds.ff_reset_secs {
        Some(Seek::BackToStart)
    } else {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    NowPlaying,
    Scrobble,
}

/// Which one-shot submission, if any, is due at `elapsed_sec`.  At most one
/// is due per position sample; now-playing wins when both are.
pub fn due_submission(
    elapsed_sec: i64,
    deadline: Option<f64>,
    now_playing_sent: bool,
    scrobbled: bool,
    thresholds: &ScrobbleThresholds,
) -> Option<SubmissionKind> {
    if !now_playing_sent && elapsed_sec >= thresholds.now_playing_after_secs {
        Some(SubmissionKind::NowPlaying)
    } else if !scrobbled && deadline.is_some_and(|deadline| elapsed_sec as f64 >= deadline) {
        Some(SubmissionKind::Scrobble)
    } else {
        None
    }
}

/// Track data sent to the scrobbling service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSubmission {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_sec: i64,
    /// Unix time the track started playing.
    pub timestamp: i64,
}

impl TrackSubmission {
    pub fn new(info: &SongInfo, timestamp: i64) -> Self {
        Self {
            title: info.title.clone(),
            artist: info.artist.clone(),
            album: info.album.clone(),
            duration_sec: info.duration_sec,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ScrobblePolicy {
        ScrobblePolicy {
            enabled: true,
            percent: 50.0,
            time_cap: 0.0,
            max_duration_mins: 0.0,
            disable_on_ff: false,
        }
    }

    #[test]
    fn deadline_is_a_share_of_the_duration() {
        assert_eq!(scrobble_deadline(Some(240), false, &policy()), Some(120.0));
        assert_eq!(scrobble_deadline(Some(245), false, &policy()), Some(122.5));
    }

    #[test]
    fn deadline_is_capped() {
        let policy = ScrobblePolicy {
            time_cap: 90.0,
            ..policy()
        };
        assert_eq!(scrobble_deadline(Some(240), false, &policy), Some(90.0));
        assert_eq!(scrobble_deadline(Some(100), false, &policy), Some(50.0));
    }

    #[test]
    fn overlong_tracks_are_not_scrobbled() {
        let policy = ScrobblePolicy {
            max_duration_mins: 30.0,
            ..policy()
        };
        assert_eq!(scrobble_deadline(Some(2000), false, &policy), None);
        assert_eq!(scrobble_deadline(Some(1800), false, &policy), Some(900.0));
    }

    #[test]
    fn no_deadline_without_duration_or_when_disabled() {
        assert_eq!(scrobble_deadline(None, false, &policy()), None);
        assert_eq!(scrobble_deadline(Some(0), false, &policy()), None);
        let disabled = ScrobblePolicy {
            enabled: false,
            ..policy()
        };
        assert_eq!(scrobble_deadline(Some(240), false, &disabled), None);
    }

    #[test]
    fn fast_forward_only_matters_when_configured() {
        assert_eq!(scrobble_deadline(Some(240), true, &policy()), Some(120.0));
        let strict = ScrobblePolicy {
            disable_on_ff: true,
            ..policy()
        };
        assert_eq!(scrobble_deadline(Some(240), true, &strict), None);
    }

    #[test]
    fn seek_detection_near_the_integer_limit() {
        let thresholds = ScrobbleThresholds::default();
        assert_eq!(detect_seek(i64::MAX, i64::MAX, false, &thresholds), None);
        assert_eq!(detect_seek(i64::MAX, 0, false, &thresholds), None);
    }

    #[test]
    fn seek_detection_is_asymmetric() {
        let thresholds = ScrobbleThresholds::default();
        assert_eq!(detect_seek(10, 15, false, &thresholds), None);
        assert_eq!(detect_seek(10, 16, false, &thresholds), Some(Seek::FastForward));
        assert_eq!(detect_seek(20, 40, true, &thresholds), None);
        assert_eq!(detect_seek(20, 6, true, &thresholds), None);
        assert_eq!(detect_seek(20, 5, true, &thresholds), Some(Seek::BackToStart));
    }

    #[test]
    fn now_playing_goes_before_scrobble() {
        let thresholds = ScrobbleThresholds::default();
        assert_eq!(due_submission(2, Some(120.0), false, false, &thresholds), None);
        assert_eq!(
            due_submission(200, Some(120.0), false, false, &thresholds),
            Some(SubmissionKind::NowPlaying)
        );
        assert_eq!(
            due_submission(200, Some(120.0), true, false, &thresholds),
            Some(SubmissionKind::Scrobble)
        );
        assert_eq!(due_submission(200, Some(120.0), true, true, &thresholds), None);
        assert_eq!(due_submission(200, None, true, false, &thresholds), None);
    }
}
