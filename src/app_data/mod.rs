use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rtp_parameters::MediaKind;

/// MediaType is the role a stream plays in the call. It is finer grained
/// than MediaKind: a second microphone and a screen share are told apart
/// from the main audio and camera streams.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[default]
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "audioSlave")]
    AudioSlave,
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "screenShare")]
    ScreenShare,
}

const MEDIA_TYPE_AUDIO_STR: &str = "audio";
const MEDIA_TYPE_AUDIO_SLAVE_STR: &str = "audioSlave";
const MEDIA_TYPE_VIDEO_STR: &str = "video";
const MEDIA_TYPE_SCREEN_SHARE_STR: &str = "screenShare";

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaType::Audio => MEDIA_TYPE_AUDIO_STR,
            MediaType::AudioSlave => MEDIA_TYPE_AUDIO_SLAVE_STR,
            MediaType::Video => MEDIA_TYPE_VIDEO_STR,
            MediaType::ScreenShare => MEDIA_TYPE_SCREEN_SHARE_STR,
        };
        write!(f, "{s}")
    }
}

impl MediaType {
    /// kind is the track kind every stream of this type carries.
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaType::Audio | MediaType::AudioSlave => MediaKind::Audio,
            MediaType::Video | MediaType::ScreenShare => MediaKind::Video,
        }
    }

    /// default_for is the media type assumed when the caller gives none.
    pub fn default_for(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => MediaType::Video,
            _ => MediaType::Audio,
        }
    }
}

/// AppData is the caller metadata attached to a Producer or a Consumer.
/// It is set once at construction and never replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mediaType")]
pub enum AppData {
    #[serde(rename = "audio", rename_all = "camelCase")]
    Audio {
        #[serde(default)]
        device_id: Option<String>,
    },
    #[serde(rename = "audioSlave", rename_all = "camelCase")]
    AudioSlave {
        #[serde(default)]
        device_id: Option<String>,
    },
    #[serde(rename = "video", rename_all = "camelCase")]
    Video {
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        device_id_low: Option<String>,
    },
    #[serde(rename = "screenShare", rename_all = "camelCase")]
    ScreenShare {
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        device_id_low: Option<String>,
    },
    /// A stream received from a remote participant.
    #[serde(rename = "remote", rename_all = "camelCase")]
    Remote {
        remote_uid: String,
        remote_media_type: MediaType,
    },
}

impl AppData {
    /// default_for is the app data of a local stream when the caller gives none.
    pub fn default_for(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => AppData::Video {
                device_id: None,
                device_id_low: None,
            },
            _ => AppData::Audio { device_id: None },
        }
    }

    /// default_remote is the app data of a received stream when the caller
    /// gives none. It carries no remote uid.
    pub fn default_remote(kind: MediaKind) -> Self {
        AppData::Remote {
            remote_uid: String::new(),
            remote_media_type: MediaType::default_for(kind),
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            AppData::Audio { .. } => MediaType::Audio,
            AppData::AudioSlave { .. } => MediaType::AudioSlave,
            AppData::Video { .. } => MediaType::Video,
            AppData::ScreenShare { .. } => MediaType::ScreenShare,
            AppData::Remote {
                remote_media_type, ..
            } => *remote_media_type,
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            AppData::Audio { device_id }
            | AppData::AudioSlave { device_id }
            | AppData::Video { device_id, .. }
            | AppData::ScreenShare { device_id, .. } => device_id.as_deref(),
            AppData::Remote { .. } => None,
        }
    }

    pub fn device_id_low(&self) -> Option<&str> {
        match self {
            AppData::Video { device_id_low, .. } | AppData::ScreenShare { device_id_low, .. } => {
                device_id_low.as_deref()
            }
            _ => None,
        }
    }

    pub fn remote_uid(&self) -> Option<&str> {
        match self {
            AppData::Remote { remote_uid, .. } if !remote_uid.is_empty() => Some(remote_uid),
            _ => None,
        }
    }

    /// validate_local checks the app data of a stream sent with a track of
    /// the given kind.
    pub(crate) fn validate_local(&self, kind: MediaKind) -> Result<()> {
        if matches!(self, AppData::Remote { .. }) {
            return Err(Error::ErrParameter(
                "remote appData given for a local track".to_owned(),
            ));
        }
        if self.media_type().kind() != kind {
            return Err(Error::ErrParameter(format!(
                "appData mediaType {} does not match track kind {}",
                self.media_type(),
                kind
            )));
        }
        Ok(())
    }

    /// validate_remote checks the app data of a received stream of the given
    /// kind.
    pub(crate) fn validate_remote(&self, kind: MediaKind) -> Result<()> {
        match self {
            AppData::Remote {
                remote_uid,
                remote_media_type,
            } => {
                if remote_uid.is_empty() {
                    return Err(Error::ErrParameter("missing appData.remoteUid".to_owned()));
                }
                if remote_media_type.kind() != kind {
                    return Err(Error::ErrParameter(format!(
                        "appData mediaType {remote_media_type} does not match kind {kind}"
                    )));
                }
                Ok(())
            }
            _ => Err(Error::ErrParameter(
                "local appData given for a remote stream".to_owned(),
            )),
        }
    }
}
