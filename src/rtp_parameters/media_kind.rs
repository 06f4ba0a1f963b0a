use std::fmt;

use serde::{Deserialize, Serialize};

/// MediaKind determines the kind of a track, codec or media section
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified = 0,

    /// MediaKindAudio indicates an audio track or codec
    #[serde(rename = "audio")]
    Audio = 1,

    /// MediaKindVideo indicates a video track or codec
    #[serde(rename = "video")]
    Video = 2,

    /// MediaKindApplication is only used by SCTP media sections
    #[serde(rename = "application")]
    Application = 3,
}

const MEDIA_KIND_AUDIO_STR: &str = "audio";
const MEDIA_KIND_VIDEO_STR: &str = "video";
const MEDIA_KIND_APPLICATION_STR: &str = "application";

impl From<&str> for MediaKind {
    fn from(raw: &str) -> Self {
        match raw {
            MEDIA_KIND_AUDIO_STR => MediaKind::Audio,
            MEDIA_KIND_VIDEO_STR => MediaKind::Video,
            MEDIA_KIND_APPLICATION_STR => MediaKind::Application,
            _ => MediaKind::Unspecified,
        }
    }
}

impl From<u8> for MediaKind {
    fn from(v: u8) -> Self {
        match v {
            1 => MediaKind::Audio,
            2 => MediaKind::Video,
            3 => MediaKind::Application,
            _ => MediaKind::Unspecified,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaKind::Audio => MEDIA_KIND_AUDIO_STR,
            MediaKind::Video => MEDIA_KIND_VIDEO_STR,
            MediaKind::Application => MEDIA_KIND_APPLICATION_STR,
            MediaKind::Unspecified => crate::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl MediaKind {
    /// is_media reports whether the kind can carry RTP (audio or video).
    pub fn is_media(&self) -> bool {
        matches!(self, MediaKind::Audio | MediaKind::Video)
    }
}
