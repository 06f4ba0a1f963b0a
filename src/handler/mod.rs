pub mod fake_handler;
pub mod fake_parameters;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app_data::{AppData, MediaType};
use crate::dtls_transport::DtlsParameters;
use crate::error::Result;
use crate::ice_transport::{IceCandidate, IceParameters, IceServer, IceTransportPolicy};
use crate::ortc::ExtendedRtpCapabilities;
use crate::rtp_parameters::{
    MediaKind, ProducerCodecOptions, RtpCapabilities, RtpCodecCapability, RtpEncodingParameters,
    RtpParameters,
};
use crate::sctp_transport::{SctpCapabilities, SctpParameters};
use crate::track::MediaStreamTrack;
use crate::transport::{ConnectionState, TransportDirection};

/// Invoked when the handler needs the remote side to learn the local DTLS
/// parameters. Resolves once the signaling exchange completed.
pub type OnConnectHdlrFn = Box<
    dyn (FnMut(DtlsParameters) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnConnectionStateChangeHdlrFn = Box<
    dyn (FnMut(ConnectionState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

/// HandlerFactory builds a fresh handler for every transport and for every
/// capability query.
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn Handler> + Send + Sync>;

/// Opaque native sender or receiver object a handler may hand out.
pub type NativeHandle = Arc<dyn Any + Send + Sync>;

/// Statistics as reported by the native engine, keyed by report id.
pub type StatsReport = serde_json::Map<String, serde_json::Value>;

/// Everything a handler needs to set up its native transport.
#[derive(Default, Debug, Clone)]
pub struct HandlerRunOptions {
    pub direction: TransportDirection,
    pub ice_parameters: Option<IceParameters>,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: Option<DtlsParameters>,
    pub sctp_parameters: Option<SctpParameters>,
    pub ice_servers: Vec<IceServer>,
    pub ice_transport_policy: Option<IceTransportPolicy>,
    pub additional_settings: Option<serde_json::Value>,
    pub extended_rtp_capabilities: ExtendedRtpCapabilities,
    pub reuse_media_sections: bool,
    pub app_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct HandlerSendOptions {
    pub track: Arc<MediaStreamTrack>,
    /// Secondary low resolution source sent on its own section.
    pub track_low: Option<Arc<MediaStreamTrack>>,
    /// Normalized encodings. Empty lets the handler pick one from the offer.
    pub encodings: Vec<RtpEncodingParameters>,
    pub codec_options: Option<ProducerCodecOptions>,
    pub codec: Option<RtpCodecCapability>,
    pub app_data: Arc<AppData>,
}

pub struct HandlerSendResult {
    pub local_id: String,
    pub local_id_low: Option<String>,
    pub rtp_parameters: RtpParameters,
    pub rtp_sender: Option<NativeHandle>,
    /// Local DTLS parameters, set the first time the transport is set up.
    pub dtls_parameters: Option<DtlsParameters>,
    pub offer: String,
}

#[derive(Debug, Clone)]
pub struct HandlerReceiveOptions {
    pub track_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub offer: Option<String>,
    pub remote_uid: Option<String>,
    pub probe_ssrc: Option<u32>,
    pub ice_parameters: Option<IceParameters>,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: Option<DtlsParameters>,
    pub sctp_parameters: Option<SctpParameters>,
}

pub struct HandlerReceiveResult {
    pub local_id: String,
    pub track: Arc<MediaStreamTrack>,
    pub rtp_receiver: Option<NativeHandle>,
}

/// Local offer prepared before asking the server for a stream.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct PrepareLocalSdpResult {
    pub dtls_parameters: Option<DtlsParameters>,
    /// Native capabilities of the engine, when it reports them.
    pub rtp_capabilities: Option<RtpCapabilities>,
    pub offer: String,
    pub mid: Option<String>,
}

/// Preset opus tunings applied to the answer of an audio stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioProfile {
    SpeechLowQuality,
    SpeechStandard,
    MusicStandard,
    StandardStereo,
    HighQuality,
    HighQualityStereo,
}

impl AudioProfile {
    /// apply merges the profile into `options`. Explicit options win.
    pub fn apply(&self, options: &mut ProducerCodecOptions) {
        let (playback_rate, average_bitrate, stereo) = match self {
            AudioProfile::SpeechLowQuality => (16000, Some(32000), false),
            AudioProfile::SpeechStandard => (32000, Some(36000), false),
            AudioProfile::MusicStandard => (48000, None, false),
            AudioProfile::StandardStereo => (48000, Some(56000), true),
            AudioProfile::HighQuality => (48000, Some(128000), false),
            AudioProfile::HighQualityStereo => (48000, Some(192000), true),
        };

        options.opus_max_playback_rate.get_or_insert(playback_rate);
        if let Some(bitrate) = average_bitrate {
            options.opus_max_average_bitrate.get_or_insert(bitrate);
        }
        if stereo {
            options.opus_stereo.get_or_insert(true);
        }
    }
}

impl fmt::Display for AudioProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            AudioProfile::SpeechLowQuality => "speech_low_quality",
            AudioProfile::SpeechStandard => "speech_standard",
            AudioProfile::MusicStandard => "music_standard",
            AudioProfile::StandardStereo => "standard_stereo",
            AudioProfile::HighQuality => "high_quality",
            AudioProfile::HighQualityStereo => "high_quality_stereo",
        };
        write!(f, "{s}")
    }
}

/// Answer of the server to a locally sent offer.
#[derive(Debug, Clone)]
pub struct FillRemoteRecvSdpOptions {
    pub kind: MediaKind,
    pub app_data: AppData,
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

/// Handler wraps the native negotiation primitive of one engine. A
/// transport owns exactly one handler and drives it from its operation
/// queue, so implementations never see two negotiations at once.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    async fn close(&self);

    async fn get_native_rtp_capabilities(&self) -> Result<RtpCapabilities>;

    async fn get_native_sctp_capabilities(&self) -> Result<SctpCapabilities>;

    async fn run(&self, options: HandlerRunOptions) -> Result<()>;

    async fn update_ice_servers(&self, ice_servers: Vec<IceServer>) -> Result<()>;

    async fn restart_ice(&self, ice_parameters: IceParameters) -> Result<()>;

    async fn get_transport_stats(&self) -> Result<StatsReport>;

    async fn send(&self, options: HandlerSendOptions) -> Result<HandlerSendResult>;

    async fn stop_sending(&self, local_id: &str, media_type: MediaType) -> Result<()>;

    /// replace_track swaps the source of a sender. `None` keeps the RTP
    /// session alive without media.
    async fn replace_track(
        &self,
        local_id: &str,
        track: Option<Arc<MediaStreamTrack>>,
    ) -> Result<()>;

    async fn set_max_spatial_layer(&self, local_id: &str, spatial_layer: u8) -> Result<()>;

    async fn set_rtp_encoding_parameters(
        &self,
        local_id: &str,
        params: RtpEncodingParameters,
    ) -> Result<()>;

    async fn get_sender_stats(&self, local_id: &str) -> Result<StatsReport>;

    async fn receive(&self, options: HandlerReceiveOptions) -> Result<HandlerReceiveResult>;

    async fn stop_receiving(&self, local_id: &str) -> Result<()>;

    async fn get_receiver_stats(&self, local_id: &str) -> Result<StatsReport>;

    async fn prepare_local_sdp(
        &self,
        kind: MediaKind,
        remote_uid: &str,
    ) -> Result<PrepareLocalSdpResult>;

    /// recover_transceiver marks the receiver on `mid` as free for the next
    /// prepare_local_sdp of the same kind.
    async fn recover_transceiver(
        &self,
        remote_uid: &str,
        mid: Option<&str>,
        kind: MediaKind,
    ) -> Result<()>;

    async fn fill_remote_recv_sdp(&self, options: FillRemoteRecvSdpOptions) -> Result<()>;

    fn on_connect(&self, f: OnConnectHdlrFn);

    fn on_connection_state_change(&self, f: OnConnectionStateChangeHdlrFn);
}
