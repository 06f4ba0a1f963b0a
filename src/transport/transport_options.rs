use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::app_data::AppData;
use crate::dtls_transport::DtlsParameters;
use crate::error::{Error, Result};
use crate::handler::AudioProfile;
use crate::ice_transport::{IceCandidate, IceParameters, IceServer, IceTransportPolicy};
use crate::rtp_parameters::{
    MediaKind, ProducerCodecOptions, RtpCodecCapability, RtpEncodingParameters, RtpParameters,
};
use crate::sctp_transport::SctpParameters;
use crate::track::MediaStreamTrack;

/// TransportOptions are the server side parameters of a transport as they
/// arrive over signaling.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportOptions {
    pub id: String,
    #[serde(default)]
    pub ice_parameters: Option<IceParameters>,
    #[serde(default)]
    pub ice_candidates: Vec<IceCandidate>,
    #[serde(default)]
    pub dtls_parameters: Option<DtlsParameters>,
    #[serde(default)]
    pub sctp_parameters: Option<SctpParameters>,
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
    #[serde(default)]
    pub ice_transport_policy: Option<IceTransportPolicy>,
    /// Passed untouched to the native engine configuration.
    #[serde(default)]
    pub additional_settings: Option<serde_json::Value>,
    #[serde(default)]
    pub app_data: Option<serde_json::Value>,
    /// Overrides the SettingEngine default for this transport.
    #[serde(default)]
    pub reuse_media_sections: Option<bool>,
}

impl TransportOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::ErrParameter("missing id".to_owned()));
        }
        if let Some(ice_parameters) = &self.ice_parameters {
            ice_parameters.validate()?;
        }
        if let Some(dtls_parameters) = &self.dtls_parameters {
            dtls_parameters.validate()?;
        }
        for ice_server in &self.ice_servers {
            ice_server.validate()?;
        }
        Ok(())
    }
}

/// ProducerOptions describes a track to send.
#[derive(Default, Debug, Clone)]
pub struct ProducerOptions {
    pub track: Option<Arc<MediaStreamTrack>>,
    /// Low resolution copy of a video track, sent as its own stream.
    pub track_low: Option<Arc<MediaStreamTrack>>,
    pub encodings: Vec<RtpEncodingParameters>,
    pub codec_options: Option<ProducerCodecOptions>,
    /// Preferred codec. Must be one of the device's RTP capabilities.
    pub codec: Option<RtpCodecCapability>,
    /// `None` takes the SettingEngine default.
    pub stop_tracks: Option<bool>,
    pub disable_track_on_pause: Option<bool>,
    pub zero_rtp_on_pause: Option<bool>,
    pub app_data: Option<AppData>,
}

/// ConsumerOptions describes a remote stream to receive, as the server
/// announces it.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerOptions {
    pub id: String,
    pub producer_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    #[serde(default)]
    pub app_data: Option<AppData>,
    #[serde(default)]
    pub offer: Option<String>,
    #[serde(default)]
    pub ice_parameters: Option<IceParameters>,
    #[serde(default)]
    pub ice_candidates: Vec<IceCandidate>,
    #[serde(default)]
    pub dtls_parameters: Option<DtlsParameters>,
    #[serde(default)]
    pub sctp_parameters: Option<SctpParameters>,
    /// Receives the probator stream instead of a producer.
    #[serde(default)]
    pub probe_ssrc: Option<u32>,
}

/// RemoteRecvSdpOptions carry the server answer to a locally sent offer.
#[derive(Debug, Clone)]
pub struct RemoteRecvSdpOptions {
    pub kind: MediaKind,
    pub app_data: Option<AppData>,
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
    pub sctp_parameters: Option<SctpParameters>,
    pub sending_rtp_parameters: RtpParameters,
    pub codec_options: Option<ProducerCodecOptions>,
    pub offer: String,
    pub codec: Option<RtpCodecCapability>,
    pub audio_profile: Option<AudioProfile>,
}

/// ProduceRequest is what the signaling layer has to tell the server for a
/// new Producer.
#[derive(Debug, Clone)]
pub struct ProduceRequest {
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub app_data: Arc<AppData>,
    /// Set on the first produce of the transport.
    pub local_dtls_parameters: Option<DtlsParameters>,
    pub offer: String,
}

/// Resolves to the server side id of the new Producer.
pub type OnProduceHdlrFn = Box<
    dyn (FnMut(ProduceRequest) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'static>>)
        + Send
        + Sync,
>;
