use std::fmt;

/// TrackState is the readiness of a media source.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrackState {
    #[default]
    Unspecified,

    /// The source is producing media.
    Live,

    /// The source will never produce media again.
    Ended,
}

const TRACK_STATE_LIVE_STR: &str = "live";
const TRACK_STATE_ENDED_STR: &str = "ended";

impl From<&str> for TrackState {
    fn from(raw: &str) -> Self {
        match raw {
            TRACK_STATE_LIVE_STR => TrackState::Live,
            TRACK_STATE_ENDED_STR => TrackState::Ended,
            _ => TrackState::Unspecified,
        }
    }
}

impl From<u8> for TrackState {
    fn from(v: u8) -> Self {
        match v {
            1 => TrackState::Live,
            2 => TrackState::Ended,
            _ => TrackState::Unspecified,
        }
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            TrackState::Live => TRACK_STATE_LIVE_STR,
            TrackState::Ended => TRACK_STATE_ENDED_STR,
            TrackState::Unspecified => crate::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}
