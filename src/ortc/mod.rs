#[cfg(test)]
mod ortc_test;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rtp_parameters::*;
use crate::sctp_transport::SctpCapabilities;

/// A codec supported by both the local engine and the router, annotated
/// with the payload types each side uses for it.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedCodec {
    pub mime_type: String,
    pub kind: MediaKind,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    pub local_payload_type: Option<u8>,
    pub local_rtx_payload_type: Option<u8>,
    pub remote_payload_type: Option<u8>,
    pub remote_rtx_payload_type: Option<u8>,
    pub local_parameters: RtpParameterMap,
    pub remote_parameters: RtpParameterMap,
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

/// A header extension supported by both sides.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedHeaderExtension {
    pub kind: MediaKind,
    pub uri: String,
    pub send_id: u16,
    pub recv_id: u16,
    pub encrypt: bool,
    pub direction: RtpHeaderExtensionDirection,
}

/// Intersection of the local and the router RTP capabilities.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRtpCapabilities {
    pub codecs: Vec<ExtendedCodec>,
    pub header_extensions: Vec<ExtendedHeaderExtension>,
}

/// validate_mime_type accepts `audio/<name>` and `video/<name>` and returns
/// the kind.
fn validate_mime_type(mime_type: &str) -> Result<MediaKind> {
    match mime_type.split_once('/') {
        Some((kind, name)) if !name.is_empty() => match MediaKind::from(kind) {
            kind @ (MediaKind::Audio | MediaKind::Video) => Ok(kind),
            _ => Err(Error::ErrParameter(format!("invalid codec.mimeType {mime_type}"))),
        },
        _ => Err(Error::ErrParameter(format!("invalid codec.mimeType {mime_type}"))),
    }
}

/// validate_rtp_capabilities checks the structure of RTP capabilities and
/// fills default values.
pub fn validate_rtp_capabilities(caps: &mut RtpCapabilities) -> Result<()> {
    for codec in &mut caps.codecs {
        validate_rtp_codec_capability(codec)?;
    }
    for ext in &mut caps.header_extensions {
        validate_rtp_header_extension(ext)?;
    }
    Ok(())
}

pub fn validate_rtp_codec_capability(codec: &mut RtpCodecCapability) -> Result<()> {
    // The kind is always taken from the mime type.
    codec.kind = validate_mime_type(&codec.mime_type)?;

    if codec.clock_rate == 0 {
        return Err(Error::ErrParameter(format!(
            "missing codec.clockRate for {}",
            codec.mime_type
        )));
    }

    match codec.kind {
        MediaKind::Audio => {
            if codec.channels.is_none() {
                codec.channels = Some(1);
            }
        }
        _ => codec.channels = None,
    }

    for fb in &codec.rtcp_feedback {
        if fb.typ.is_empty() {
            return Err(Error::ErrParameter("missing codec.rtcpFeedback.type".to_owned()));
        }
    }

    Ok(())
}

pub fn validate_rtp_header_extension(ext: &mut RtpHeaderExtension) -> Result<()> {
    if !ext.kind.is_media() {
        return Err(Error::ErrParameter(format!(
            "invalid ext.kind {} for {}",
            ext.kind, ext.uri
        )));
    }
    if ext.uri.is_empty() {
        return Err(Error::ErrParameter("missing ext.uri".to_owned()));
    }
    if ext.preferred_id == 0 {
        return Err(Error::ErrParameter(format!(
            "missing ext.preferredId for {}",
            ext.uri
        )));
    }
    Ok(())
}

/// validate_rtp_parameters checks the structure of RTP parameters and fills
/// default values.
pub fn validate_rtp_parameters(params: &mut RtpParameters) -> Result<()> {
    for codec in &mut params.codecs {
        let kind = validate_mime_type(&codec.mime_type)?;
        if codec.clock_rate == 0 {
            return Err(Error::ErrParameter(format!(
                "missing codec.clockRate for {}",
                codec.mime_type
            )));
        }
        match kind {
            MediaKind::Audio => {
                if codec.channels.is_none() {
                    codec.channels = Some(1);
                }
            }
            _ => codec.channels = None,
        }
    }

    for ext in &params.header_extensions {
        if ext.uri.is_empty() {
            return Err(Error::ErrParameter("missing ext.uri".to_owned()));
        }
        if ext.id == 0 {
            return Err(Error::ErrParameter(format!("missing ext.id for {}", ext.uri)));
        }
    }

    for encoding in &params.encodings {
        if let Some(rid) = &encoding.rid {
            if rid.is_empty() {
                return Err(Error::ErrParameter("empty encoding.rid".to_owned()));
            }
        }
    }

    if params.rtcp.reduced_size.is_none() {
        params.rtcp.reduced_size = Some(true);
    }

    Ok(())
}

pub fn validate_sctp_capabilities(caps: &SctpCapabilities) -> Result<()> {
    caps.validate()
}

fn h264_packetization_mode(parameters: &RtpParameterMap) -> u32 {
    match parameters.get("packetization-mode") {
        Some(ParameterValue::Number(n)) => *n,
        Some(ParameterValue::String(s)) => s.parse().unwrap_or(0),
        None => 0,
    }
}

/// The fields two codecs are compared on.
struct CodecKey<'a> {
    mime_type: &'a str,
    clock_rate: u32,
    channels: Option<u16>,
    parameters: &'a RtpParameterMap,
}

impl<'a> From<&'a RtpCodecCapability> for CodecKey<'a> {
    fn from(codec: &'a RtpCodecCapability) -> Self {
        CodecKey {
            mime_type: &codec.mime_type,
            clock_rate: codec.clock_rate,
            channels: codec.channels,
            parameters: &codec.parameters,
        }
    }
}

impl<'a> From<&'a RtpCodecParameters> for CodecKey<'a> {
    fn from(codec: &'a RtpCodecParameters) -> Self {
        CodecKey {
            mime_type: &codec.mime_type,
            clock_rate: codec.clock_rate,
            channels: codec.channels,
            parameters: &codec.parameters,
        }
    }
}

fn match_codecs(a: CodecKey<'_>, b: CodecKey<'_>) -> bool {
    let mime_type = a.mime_type.to_lowercase();
    if mime_type != b.mime_type.to_lowercase()
        || a.clock_rate != b.clock_rate
        || a.channels != b.channels
    {
        return false;
    }

    if mime_type == "video/h264"
        && h264_packetization_mode(a.parameters) != h264_packetization_mode(b.parameters)
    {
        return false;
    }

    true
}

fn capability_apt(codec: &RtpCodecCapability) -> Option<u8> {
    match codec.parameters.get("apt") {
        Some(ParameterValue::Number(n)) => u8::try_from(*n).ok(),
        Some(ParameterValue::String(s)) => s.parse().ok(),
        None => None,
    }
}

fn reduce_rtcp_feedback(local: &[RtcpFeedback], remote: &[RtcpFeedback]) -> Vec<RtcpFeedback> {
    remote
        .iter()
        .filter(|remote_fb| {
            local
                .iter()
                .any(|local_fb| {
                    local_fb.typ == remote_fb.typ && local_fb.parameter == remote_fb.parameter
                })
        })
        .cloned()
        .collect()
}

/// get_extended_rtp_capabilities intersects the local engine capabilities
/// with the router capabilities.
pub fn get_extended_rtp_capabilities(
    local_caps: &RtpCapabilities,
    remote_caps: &RtpCapabilities,
) -> ExtendedRtpCapabilities {
    let mut extended = ExtendedRtpCapabilities::default();

    for remote_codec in remote_caps.codecs.iter().filter(|c| !c.is_rtx()) {
        let matching_local = local_caps
            .codecs
            .iter()
            .filter(|c| !c.is_rtx())
            .find(|local| match_codecs((*local).into(), remote_codec.into()));

        if let Some(local_codec) = matching_local {
            extended.codecs.push(ExtendedCodec {
                mime_type: local_codec.mime_type.clone(),
                kind: local_codec.kind,
                clock_rate: local_codec.clock_rate,
                channels: local_codec.channels,
                local_payload_type: local_codec.preferred_payload_type,
                local_rtx_payload_type: None,
                remote_payload_type: remote_codec.preferred_payload_type,
                remote_rtx_payload_type: None,
                local_parameters: local_codec.parameters.clone(),
                remote_parameters: remote_codec.parameters.clone(),
                rtcp_feedback: reduce_rtcp_feedback(
                    &local_codec.rtcp_feedback,
                    &remote_codec.rtcp_feedback,
                ),
            });
        }
    }

    for extended_codec in &mut extended.codecs {
        let local_rtx = local_caps
            .codecs
            .iter()
            .find(|c| {
                c.is_rtx()
                    && capability_apt(c).is_some()
                    && capability_apt(c) == extended_codec.local_payload_type
            });
        let remote_rtx = remote_caps
            .codecs
            .iter()
            .find(|c| {
                c.is_rtx()
                    && capability_apt(c).is_some()
                    && capability_apt(c) == extended_codec.remote_payload_type
            });

        if let (Some(local_rtx), Some(remote_rtx)) = (local_rtx, remote_rtx) {
            extended_codec.local_rtx_payload_type = local_rtx.preferred_payload_type;
            extended_codec.remote_rtx_payload_type = remote_rtx.preferred_payload_type;
        }
    }

    for remote_ext in &remote_caps.header_extensions {
        let matching_local = local_caps
            .header_extensions
            .iter()
            .find(|local| local.kind == remote_ext.kind && local.uri == remote_ext.uri);

        if let Some(local_ext) = matching_local {
            let direction = match remote_ext.direction {
                RtpHeaderExtensionDirection::SendRecv => RtpHeaderExtensionDirection::SendRecv,
                RtpHeaderExtensionDirection::RecvOnly => RtpHeaderExtensionDirection::SendOnly,
                RtpHeaderExtensionDirection::SendOnly => RtpHeaderExtensionDirection::RecvOnly,
                RtpHeaderExtensionDirection::Inactive => RtpHeaderExtensionDirection::Inactive,
            };
            extended.header_extensions.push(ExtendedHeaderExtension {
                kind: remote_ext.kind,
                uri: remote_ext.uri.clone(),
                send_id: local_ext.preferred_id,
                recv_id: remote_ext.preferred_id,
                encrypt: local_ext.preferred_encrypt,
                direction,
            });
        }
    }

    extended
}

/// get_recv_rtp_capabilities derives the capabilities announced to the
/// router for receiving.
pub fn get_recv_rtp_capabilities(extended: &ExtendedRtpCapabilities) -> RtpCapabilities {
    let mut caps = RtpCapabilities::default();

    for extended_codec in &extended.codecs {
        caps.codecs.push(RtpCodecCapability {
            kind: extended_codec.kind,
            mime_type: extended_codec.mime_type.clone(),
            preferred_payload_type: extended_codec.remote_payload_type,
            clock_rate: extended_codec.clock_rate,
            channels: extended_codec.channels,
            parameters: extended_codec.local_parameters.clone(),
            rtcp_feedback: extended_codec.rtcp_feedback.clone(),
        });

        if let (Some(rtx_payload_type), Some(payload_type)) = (
            extended_codec.remote_rtx_payload_type,
            extended_codec.remote_payload_type,
        ) {
            let mut parameters = RtpParameterMap::new();
            parameters.insert("apt".to_owned(), ParameterValue::Number(payload_type as u32));
            caps.codecs.push(RtpCodecCapability {
                kind: extended_codec.kind,
                mime_type: format!("{}/rtx", extended_codec.kind),
                preferred_payload_type: Some(rtx_payload_type),
                clock_rate: extended_codec.clock_rate,
                channels: None,
                parameters,
                rtcp_feedback: vec![],
            });
        }
    }

    for extended_ext in &extended.header_extensions {
        if !matches!(
            extended_ext.direction,
            RtpHeaderExtensionDirection::SendRecv | RtpHeaderExtensionDirection::RecvOnly
        ) {
            continue;
        }
        caps.header_extensions.push(RtpHeaderExtension {
            kind: extended_ext.kind,
            uri: extended_ext.uri.clone(),
            preferred_id: extended_ext.recv_id,
            preferred_encrypt: extended_ext.encrypt,
            direction: extended_ext.direction,
        });
    }

    caps
}

fn sending_rtp_parameters(
    kind: MediaKind,
    extended: &ExtendedRtpCapabilities,
    remote: bool,
) -> RtpParameters {
    let mut params = RtpParameters::default();

    for extended_codec in extended.codecs.iter().filter(|c| c.kind == kind) {
        let Some(payload_type) = extended_codec.local_payload_type else {
            continue;
        };
        params.codecs.push(RtpCodecParameters {
            mime_type: extended_codec.mime_type.clone(),
            payload_type,
            clock_rate: extended_codec.clock_rate,
            channels: extended_codec.channels,
            parameters: if remote {
                extended_codec.remote_parameters.clone()
            } else {
                extended_codec.local_parameters.clone()
            },
            rtcp_feedback: extended_codec.rtcp_feedback.clone(),
        });

        if let Some(rtx_payload_type) = extended_codec.local_rtx_payload_type {
            let mut parameters = RtpParameterMap::new();
            parameters.insert("apt".to_owned(), ParameterValue::Number(payload_type as u32));
            params.codecs.push(RtpCodecParameters {
                mime_type: format!("{kind}/rtx"),
                payload_type: rtx_payload_type,
                clock_rate: extended_codec.clock_rate,
                channels: None,
                parameters,
                rtcp_feedback: vec![],
            });
        }
    }

    for extended_ext in extended.header_extensions.iter().filter(|e| e.kind == kind) {
        if !matches!(
            extended_ext.direction,
            RtpHeaderExtensionDirection::SendRecv | RtpHeaderExtensionDirection::SendOnly
        ) {
            continue;
        }
        params.header_extensions.push(RtpHeaderExtensionParameters {
            uri: extended_ext.uri.clone(),
            id: extended_ext.send_id,
            encrypt: extended_ext.encrypt,
            parameters: RtpParameterMap::new(),
        });
    }

    params
}

/// get_sending_rtp_parameters describes what the local engine sends for
/// `kind`, using the local codec parameters.
pub fn get_sending_rtp_parameters(kind: MediaKind, extended: &ExtendedRtpCapabilities) -> RtpParameters {
    sending_rtp_parameters(kind, extended, false)
}

/// get_sending_remote_rtp_parameters is like get_sending_rtp_parameters but
/// with the router's codec parameters, as they go into the remote answer.
pub fn get_sending_remote_rtp_parameters(
    kind: MediaKind,
    extended: &ExtendedRtpCapabilities,
) -> RtpParameters {
    sending_rtp_parameters(kind, extended, true)
}

/// reduce_codecs keeps the preferred codec (the first one, or the one
/// matching `cap_codec`) plus its RTX codec.
pub fn reduce_codecs(
    codecs: &[RtpCodecParameters],
    cap_codec: Option<&RtpCodecCapability>,
) -> Result<Vec<RtpCodecParameters>> {
    let index = match cap_codec {
        None => {
            if codecs.is_empty() {
                return Ok(vec![]);
            }
            0
        }
        Some(cap) => codecs
            .iter()
            .position(|codec| match_codecs(codec.into(), cap.into()))
            .ok_or_else(|| {
                Error::ErrParameter(format!("no matching codec found for {}", cap.mime_type))
            })?,
    };

    let mut filtered = vec![codecs[index].clone()];
    if let Some(next) = codecs.get(index + 1) {
        if next.is_rtx() && next.apt() == Some(codecs[index].payload_type) {
            filtered.push(next.clone());
        }
    }

    Ok(filtered)
}

/// can_send reports whether at least one codec of `kind` can be sent.
pub fn can_send(kind: MediaKind, extended: &ExtendedRtpCapabilities) -> bool {
    extended.codecs.iter().any(|codec| codec.kind == kind)
}

/// can_receive reports whether the first media codec of the given
/// parameters is known to the extended capabilities.
pub fn can_receive(rtp_parameters: &RtpParameters, extended: &ExtendedRtpCapabilities) -> Result<bool> {
    let mut rtp_parameters = rtp_parameters.clone();
    validate_rtp_parameters(&mut rtp_parameters)?;

    let Some(first_media_codec) = rtp_parameters.codecs.iter().find(|c| !c.is_rtx()) else {
        return Ok(false);
    };

    Ok(extended
        .codecs
        .iter()
        .any(|codec| codec.remote_payload_type == Some(first_media_codec.payload_type)))
}
