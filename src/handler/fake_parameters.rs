//! Canned router, engine and signaling parameters used by FakeHandler and
//! by the test suite.

use sdp::description::media::MediaDescription;
use sdp::description::session::{
    ATTR_KEY_EXT_MAP, ATTR_KEY_MID, ATTR_KEY_MSID, ATTR_KEY_RECV_ONLY, ATTR_KEY_RTCPMUX,
    ATTR_KEY_RTCPRSIZE, ATTR_KEY_SEND_ONLY, ATTR_KEY_SSRC, ATTR_KEY_SSRCGROUP,
    SEMANTIC_TOKEN_FLOW_IDENTIFICATION,
};

use crate::dtls_transport::{DtlsFingerprint, DtlsParameters, DtlsRole};
use crate::ice_transport::{IceCandidate, IceCandidateType, IceParameters, IceProtocol};
use crate::rtp_parameters::*;
use crate::sctp_transport::{NumSctpStreams, SctpCapabilities, SctpParameters};

const URI_MID: &str = "urn:ietf:params:rtp-hdrext:sdes:mid";
const URI_AUDIO_LEVEL: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";
const URI_ABS_SEND_TIME: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";
const URI_TRANSPORT_CC: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";
const URI_VIDEO_ORIENTATION: &str = "urn:3gpp:video-orientation";

fn parameters(pairs: &[(&str, ParameterValue)]) -> RtpParameterMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

fn feedback(typ: &str, parameter: &str) -> RtcpFeedback {
    RtcpFeedback {
        typ: typ.to_owned(),
        parameter: parameter.to_owned(),
    }
}

fn video_feedback() -> Vec<RtcpFeedback> {
    vec![
        feedback("goog-remb", ""),
        feedback("transport-cc", ""),
        feedback("ccm", "fir"),
        feedback("nack", ""),
        feedback("nack", "pli"),
    ]
}

fn rtx_capability(payload_type: u8, apt: u32) -> RtpCodecCapability {
    RtpCodecCapability {
        kind: MediaKind::Video,
        mime_type: "video/rtx".to_owned(),
        preferred_payload_type: Some(payload_type),
        clock_rate: 90000,
        parameters: parameters(&[("apt", apt.into())]),
        ..Default::default()
    }
}

fn header_extension(kind: MediaKind, uri: &str, preferred_id: u16) -> RtpHeaderExtension {
    RtpHeaderExtension {
        kind,
        uri: uri.to_owned(),
        preferred_id,
        ..Default::default()
    }
}

/// generate_router_rtp_capabilities is what the media server announces.
pub fn generate_router_rtp_capabilities() -> RtpCapabilities {
    RtpCapabilities {
        codecs: vec![
            RtpCodecCapability {
                kind: MediaKind::Audio,
                mime_type: "audio/opus".to_owned(),
                preferred_payload_type: Some(100),
                clock_rate: 48000,
                channels: Some(2),
                parameters: parameters(&[("useinbandfec", 1u32.into())]),
                rtcp_feedback: vec![feedback("transport-cc", "")],
            },
            RtpCodecCapability {
                kind: MediaKind::Video,
                mime_type: "video/VP8".to_owned(),
                preferred_payload_type: Some(101),
                clock_rate: 90000,
                parameters: parameters(&[("x-google-start-bitrate", 1500u32.into())]),
                rtcp_feedback: video_feedback(),
                ..Default::default()
            },
            rtx_capability(102, 101),
            RtpCodecCapability {
                kind: MediaKind::Video,
                mime_type: "video/H264".to_owned(),
                preferred_payload_type: Some(103),
                clock_rate: 90000,
                parameters: parameters(&[
                    ("level-asymmetry-allowed", 1u32.into()),
                    ("packetization-mode", 1u32.into()),
                    ("profile-level-id", "42e01f".into()),
                ]),
                rtcp_feedback: video_feedback(),
                ..Default::default()
            },
            rtx_capability(104, 103),
        ],
        header_extensions: vec![
            header_extension(MediaKind::Audio, URI_MID, 1),
            header_extension(MediaKind::Video, URI_MID, 1),
            header_extension(MediaKind::Audio, URI_ABS_SEND_TIME, 4),
            header_extension(MediaKind::Video, URI_ABS_SEND_TIME, 4),
            header_extension(MediaKind::Audio, URI_AUDIO_LEVEL, 10),
            header_extension(MediaKind::Video, URI_VIDEO_ORIENTATION, 11),
        ],
    }
}

/// generate_native_rtp_capabilities is what a desktop browser engine
/// supports.
pub fn generate_native_rtp_capabilities() -> RtpCapabilities {
    RtpCapabilities {
        codecs: vec![
            RtpCodecCapability {
                kind: MediaKind::Audio,
                mime_type: "audio/opus".to_owned(),
                preferred_payload_type: Some(111),
                clock_rate: 48000,
                channels: Some(2),
                parameters: parameters(&[("minptime", 10u32.into()), ("useinbandfec", 1u32.into())]),
                rtcp_feedback: vec![feedback("transport-cc", "")],
            },
            RtpCodecCapability {
                kind: MediaKind::Audio,
                mime_type: "audio/ISAC".to_owned(),
                preferred_payload_type: Some(103),
                clock_rate: 16000,
                ..Default::default()
            },
            RtpCodecCapability {
                kind: MediaKind::Video,
                mime_type: "video/VP8".to_owned(),
                preferred_payload_type: Some(96),
                clock_rate: 90000,
                rtcp_feedback: video_feedback(),
                ..Default::default()
            },
            rtx_capability(97, 96),
            RtpCodecCapability {
                kind: MediaKind::Video,
                mime_type: "video/H264".to_owned(),
                preferred_payload_type: Some(102),
                clock_rate: 90000,
                parameters: parameters(&[
                    ("level-asymmetry-allowed", 1u32.into()),
                    ("packetization-mode", 1u32.into()),
                    ("profile-level-id", "42001f".into()),
                ]),
                rtcp_feedback: video_feedback(),
                ..Default::default()
            },
            rtx_capability(121, 102),
        ],
        header_extensions: vec![
            header_extension(MediaKind::Audio, URI_AUDIO_LEVEL, 1),
            header_extension(MediaKind::Audio, URI_ABS_SEND_TIME, 2),
            header_extension(MediaKind::Audio, URI_TRANSPORT_CC, 3),
            header_extension(MediaKind::Audio, URI_MID, 4),
            header_extension(MediaKind::Video, URI_ABS_SEND_TIME, 2),
            header_extension(MediaKind::Video, URI_TRANSPORT_CC, 3),
            header_extension(MediaKind::Video, URI_MID, 4),
            header_extension(MediaKind::Video, URI_VIDEO_ORIENTATION, 13),
        ],
    }
}

pub fn generate_native_sctp_capabilities() -> SctpCapabilities {
    SctpCapabilities {
        num_streams: NumSctpStreams {
            os: 2048,
            mis: 2048,
        },
    }
}

/// generate_local_dtls_parameters is the DTLS identity of the local engine.
pub fn generate_local_dtls_parameters() -> DtlsParameters {
    DtlsParameters {
        role: DtlsRole::Auto,
        fingerprints: vec![DtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: "82:5A:68:3D:36:C3:0A:DE:AF:E7:32:43:D2:88:83:57:B2:C6:52:81:\
                    72:7A:2D:B6:2F:90:6E:AD:0E:5F:51:C5"
                .to_owned(),
        }],
    }
}

/// TransportRemoteParameters is the server's answer to a create transport
/// request.
#[derive(Debug, Clone)]
pub struct TransportRemoteParameters {
    pub id: String,
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
    pub sctp_parameters: SctpParameters,
}

pub fn generate_transport_remote_parameters() -> TransportRemoteParameters {
    TransportRemoteParameters {
        id: format!("transport-{:08x}", rand::random::<u32>()),
        ice_parameters: IceParameters {
            username_fragment: "lpiuj6mkb3y6jfwz".to_owned(),
            password: "xqsk3ad9e1lc6z6ywqt0r5vdbcqpx3ml".to_owned(),
            ice_lite: true,
        },
        ice_candidates: vec![
            IceCandidate {
                foundation: "udpcandidate".to_owned(),
                priority: 1078862079,
                ip: "9.9.9.9".to_owned(),
                protocol: IceProtocol::Udp,
                port: 40533,
                typ: IceCandidateType::Host,
                tcp_type: None,
            },
            IceCandidate {
                foundation: "tcpcandidate".to_owned(),
                priority: 1078862079,
                ip: "9.9.9.9".to_owned(),
                protocol: IceProtocol::Tcp,
                port: 44855,
                typ: IceCandidateType::Host,
                tcp_type: Some("passive".to_owned()),
            },
        ],
        dtls_parameters: DtlsParameters {
            role: DtlsRole::Auto,
            fingerprints: vec![
                DtlsFingerprint {
                    algorithm: "sha-256".to_owned(),
                    value: "A9:F4:E0:D2:74:D3:0F:D9:CA:A5:2F:9F:7F:47:FA:F0:C4:72:DD:73:\
                            49:D0:3B:14:90:20:51:30:1B:90:8E:71"
                        .to_owned(),
                },
                DtlsFingerprint {
                    algorithm: "sha-512".to_owned(),
                    value: "35:5A:44:8C:95:7A:B8:B1:5F:5A:62:7C:D2:34:2B:70:8E:6D:7D:4C:\
                            D1:C4:5E:9F:86:A4:3C:E3:43:BB:46:6B:35:C0:5B:C8:CF:E3:1B:3C:\
                            18:A5:32:02:1C:2E:C7:74:0A:62:DF:9E:71:8F:F8:1C:06:8E:F2:D5:\
                            E6:C2:2F:AB"
                        .to_owned(),
                },
            ],
        },
        sctp_parameters: SctpParameters {
            port: 5000,
            os: 2048,
            mis: 2048,
            max_message_size: 2000000,
        },
    }
}

/// ConsumerRemoteParameters is the server's answer to a consume request.
#[derive(Debug, Clone)]
pub struct ConsumerRemoteParameters {
    pub id: String,
    pub producer_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
}

/// generate_consumer_remote_parameters describes a stream the router sends
/// with codec `mime_type`, with router payload types.
pub fn generate_consumer_remote_parameters(mime_type: &str) -> ConsumerRemoteParameters {
    let ssrc = rand::random::<u32>() % 900_000_000 + 100_000_000;
    let cname = format!("{:08x}", rand::random::<u32>());
    let id = format!("consumer-{:08x}", rand::random::<u32>());
    let producer_id = format!("producer-{:08x}", rand::random::<u32>());

    if mime_type.eq_ignore_ascii_case("audio/opus") {
        return ConsumerRemoteParameters {
            id,
            producer_id,
            kind: MediaKind::Audio,
            rtp_parameters: RtpParameters {
                codecs: vec![RtpCodecParameters {
                    mime_type: "audio/opus".to_owned(),
                    payload_type: 100,
                    clock_rate: 48000,
                    channels: Some(2),
                    parameters: parameters(&[("useinbandfec", 1u32.into())]),
                    rtcp_feedback: vec![],
                }],
                header_extensions: vec![RtpHeaderExtensionParameters {
                    uri: URI_AUDIO_LEVEL.to_owned(),
                    id: 10,
                    ..Default::default()
                }],
                encodings: vec![RtpEncodingParameters {
                    ssrc: Some(ssrc),
                    ..Default::default()
                }],
                rtcp: RtcpParameters {
                    cname: Some(cname),
                    reduced_size: Some(true),
                    mux: Some(true),
                },
                ..Default::default()
            },
        };
    }

    let (codec, payload_type) = if mime_type.eq_ignore_ascii_case("video/H264") {
        (
            RtpCodecParameters {
                mime_type: "video/H264".to_owned(),
                payload_type: 103,
                clock_rate: 90000,
                parameters: parameters(&[
                    ("packetization-mode", 1u32.into()),
                    ("profile-level-id", "42e01f".into()),
                ]),
                rtcp_feedback: video_feedback(),
                ..Default::default()
            },
            103,
        )
    } else {
        (
            RtpCodecParameters {
                mime_type: "video/VP8".to_owned(),
                payload_type: 101,
                clock_rate: 90000,
                rtcp_feedback: video_feedback(),
                ..Default::default()
            },
            101,
        )
    };

    ConsumerRemoteParameters {
        id,
        producer_id,
        kind: MediaKind::Video,
        rtp_parameters: RtpParameters {
            codecs: vec![
                codec,
                RtpCodecParameters {
                    mime_type: "video/rtx".to_owned(),
                    payload_type: payload_type + 1,
                    clock_rate: 90000,
                    parameters: parameters(&[("apt", u32::from(payload_type).into())]),
                    ..Default::default()
                },
            ],
            header_extensions: vec![
                RtpHeaderExtensionParameters {
                    uri: URI_ABS_SEND_TIME.to_owned(),
                    id: 4,
                    ..Default::default()
                },
                RtpHeaderExtensionParameters {
                    uri: URI_VIDEO_ORIENTATION.to_owned(),
                    id: 11,
                    ..Default::default()
                },
            ],
            encodings: vec![RtpEncodingParameters {
                ssrc: Some(ssrc),
                rtx: Some(RtxParameters { ssrc: ssrc + 1 }),
                ..Default::default()
            }],
            rtcp: RtcpParameters {
                cname: Some(cname),
                reduced_size: Some(true),
                mux: Some(true),
            },
            ..Default::default()
        },
    }
}

/// generate_local_offer_media renders the section a browser engine puts in
/// its local offer when it starts sending `rtp_parameters` on `mid`.
pub fn generate_local_offer_media(
    mid: &str,
    kind: MediaKind,
    rtp_parameters: &RtpParameters,
    track_id: &str,
) -> MediaDescription {
    let mut media = MediaDescription::new_jsep_media_description(kind.to_string(), vec![])
        .with_value_attribute(ATTR_KEY_MID.to_owned(), mid.to_owned());

    for codec in &rtp_parameters.codecs {
        let channels = match codec.channels {
            Some(channels) if channels > 1 => channels,
            _ => 0,
        };
        media = media.with_codec(
            codec.payload_type,
            codec.encoding_name().to_owned(),
            codec.clock_rate,
            channels,
            fmtp_line(&codec.parameters),
        );
    }
    for ext in &rtp_parameters.header_extensions {
        media = media.with_value_attribute(
            ATTR_KEY_EXT_MAP.to_owned(),
            format!("{} {}", ext.id, ext.uri),
        );
    }
    media = media
        .with_property_attribute(ATTR_KEY_SEND_ONLY.to_owned())
        .with_value_attribute(ATTR_KEY_MSID.to_owned(), format!("- {track_id}"))
        .with_property_attribute(ATTR_KEY_RTCPMUX.to_owned())
        .with_property_attribute(ATTR_KEY_RTCPRSIZE.to_owned());

    if let Some(encoding) = rtp_parameters.encodings.first() {
        if let Some(ssrc) = encoding.ssrc {
            let cname = rtp_parameters.rtcp.cname.clone().unwrap_or_default();
            if let Some(rtx) = &encoding.rtx {
                media = media.with_value_attribute(
                    ATTR_KEY_SSRCGROUP.to_owned(),
                    format!("{SEMANTIC_TOKEN_FLOW_IDENTIFICATION} {ssrc} {}", rtx.ssrc),
                );
            }
            media = media.with_value_attribute(ATTR_KEY_SSRC.to_owned(), format!("{ssrc} cname:{cname}"));
            if let Some(rtx) = &encoding.rtx {
                media = media.with_value_attribute(
                    ATTR_KEY_SSRC.to_owned(),
                    format!("{} cname:{cname}", rtx.ssrc),
                );
            }
        }
    }

    media
}

/// generate_local_recv_media renders the recvonly section a browser engine
/// offers for a transceiver that waits for a remote stream of `kind`.
pub fn generate_local_recv_media(
    mid: &str,
    kind: MediaKind,
    native_rtp_capabilities: &RtpCapabilities,
) -> MediaDescription {
    let mut media = MediaDescription::new_jsep_media_description(kind.to_string(), vec![])
        .with_value_attribute(ATTR_KEY_MID.to_owned(), mid.to_owned());

    for codec in native_rtp_capabilities
        .codecs
        .iter()
        .filter(|codec| codec.kind == kind)
    {
        let Some(payload_type) = codec.preferred_payload_type else {
            continue;
        };
        let channels = match codec.channels {
            Some(channels) if channels > 1 => channels,
            _ => 0,
        };
        let encoding_name = codec
            .mime_type
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&codec.mime_type);
        media = media.with_codec(
            payload_type,
            encoding_name.to_owned(),
            codec.clock_rate,
            channels,
            fmtp_line(&codec.parameters),
        );
    }

    media
        .with_property_attribute(ATTR_KEY_RECV_ONLY.to_owned())
        .with_property_attribute(ATTR_KEY_RTCPMUX.to_owned())
        .with_property_attribute(ATTR_KEY_RTCPRSIZE.to_owned())
}
