#[cfg(test)]
mod rtp_parameters_test;

pub mod media_kind;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use media_kind::MediaKind;

/// A single value of a codec or header extension parameter. Values coming
/// from the signaling JSON are either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(u32),
    String(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Number(n) => write!(f, "{n}"),
            ParameterValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<u32> for ParameterValue {
    fn from(n: u32) -> Self {
        ParameterValue::Number(n)
    }
}

impl From<&str> for ParameterValue {
    fn from(s: &str) -> Self {
        ParameterValue::String(s.to_owned())
    }
}

pub type RtpParameterMap = BTreeMap<String, ParameterValue>;

/// fmtp_line renders codec parameters as an `a=fmtp` value.
pub fn fmtp_line(parameters: &RtpParameterMap) -> String {
    parameters
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// parse_fmtp_line is the inverse of fmtp_line. Numeric values are kept as
/// numbers.
pub fn parse_fmtp_line(line: &str) -> RtpParameterMap {
    let mut parameters = RtpParameterMap::new();
    for pair in line.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (pair, ""),
        };
        let value = match value.parse::<u32>() {
            Ok(n) => ParameterValue::Number(n),
            Err(_) => ParameterValue::String(value.to_owned()),
        };
        parameters.insert(key.to_owned(), value);
    }
    parameters
}

/// RtcpFeedback signals the connection to use additional RTCP packet types.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFeedback {
    /// Type is the type of feedback.
    /// see: <https://draft.ortc.org/#dom-rtcrtcpfeedback>
    /// valid: ack, ccm, nack, goog-remb, transport-cc
    #[serde(rename = "type")]
    pub typ: String,

    /// The parameter value depends on the type.
    /// For example, type="nack" parameter="pli" will send Picture Loss Indicator packets.
    #[serde(default)]
    pub parameter: String,
}

/// Codec supported by a device or a router.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    pub kind: MediaKind,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_payload_type: Option<u8>,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(default)]
    pub parameters: RtpParameterMap,
    #[serde(default)]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecCapability {
    pub fn is_rtx(&self) -> bool {
        is_rtx_mime_type(&self.mime_type)
    }
}

pub(crate) fn is_rtx_mime_type(mime_type: &str) -> bool {
    mime_type.to_lowercase().ends_with("/rtx")
}

/// Direction of a header extension as seen by the remote side.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RtpHeaderExtensionDirection {
    #[default]
    #[serde(rename = "sendrecv")]
    SendRecv,
    #[serde(rename = "sendonly")]
    SendOnly,
    #[serde(rename = "recvonly")]
    RecvOnly,
    #[serde(rename = "inactive")]
    Inactive,
}

/// Header extension supported by a device or a router.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtension {
    pub kind: MediaKind,
    pub uri: String,
    pub preferred_id: u16,
    #[serde(default)]
    pub preferred_encrypt: bool,
    #[serde(default)]
    pub direction: RtpHeaderExtensionDirection,
}

/// RtpCapabilities are the codecs and header extensions an endpoint supports.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    #[serde(default)]
    pub codecs: Vec<RtpCodecCapability>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtension>,
}

/// Codec negotiated for a single stream.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecParameters {
    pub mime_type: String,
    pub payload_type: u8,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(default)]
    pub parameters: RtpParameterMap,
    #[serde(default)]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecParameters {
    pub fn is_rtx(&self) -> bool {
        is_rtx_mime_type(&self.mime_type)
    }

    /// encoding_name is the subtype of the mime type (`opus` for `audio/opus`).
    pub fn encoding_name(&self) -> &str {
        self.mime_type
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(self.mime_type.as_str())
    }

    /// apt is the associated payload type of an RTX codec.
    pub fn apt(&self) -> Option<u8> {
        match self.parameters.get("apt") {
            Some(ParameterValue::Number(n)) => u8::try_from(*n).ok(),
            Some(ParameterValue::String(s)) => s.parse().ok(),
            None => None,
        }
    }
}

/// Header extension negotiated for a single stream.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtensionParameters {
    pub uri: String,
    pub id: u16,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub parameters: RtpParameterMap,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtxParameters {
    pub ssrc: u32,
}

/// Priority of an encoding relative to the other encodings of the sender.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RtpPriority {
    #[serde(rename = "very-low")]
    VeryLow,
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "high")]
    High,
}

/// RtpEncodingParameters provides information relating to both encoding and decoding.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpEncodingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_payload_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtx: Option<RtxParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtx: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalability_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_resolution_down_by: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_framerate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_ptime: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<RtpPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_priority: Option<RtpPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcpParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduced_size: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mux: Option<bool>,
}

/// RtpParameters describe one sending or receiving stream.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    #[serde(default)]
    pub codecs: Vec<RtpCodecParameters>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtensionParameters>,
    #[serde(default)]
    pub encodings: Vec<RtpEncodingParameters>,
    #[serde(default)]
    pub rtcp: RtcpParameters,
}

/// Per-producer codec tuning that ends up in the answer's fmtp lines.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerCodecOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_stereo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_fec: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_dtx: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_max_playback_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_max_average_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus_ptime: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_google_start_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_google_max_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_google_min_bitrate: Option<u32>,
}
