use super::*;
use crate::error::Result;
use crate::handler::fake_parameters::*;

fn extended() -> Result<ExtendedRtpCapabilities> {
    let mut router = generate_router_rtp_capabilities();
    let mut native = generate_native_rtp_capabilities();
    validate_rtp_capabilities(&mut router)?;
    validate_rtp_capabilities(&mut native)?;
    Ok(get_extended_rtp_capabilities(&native, &router))
}

#[test]
fn test_validate_rtp_capabilities_fills_defaults() -> Result<()> {
    let mut caps = RtpCapabilities {
        codecs: vec![
            RtpCodecCapability {
                kind: MediaKind::Video,
                mime_type: "audio/PCMU".to_owned(),
                preferred_payload_type: Some(0),
                clock_rate: 8000,
                ..Default::default()
            },
            RtpCodecCapability {
                mime_type: "video/VP8".to_owned(),
                preferred_payload_type: Some(96),
                clock_rate: 90000,
                channels: Some(2),
                ..Default::default()
            },
        ],
        header_extensions: vec![],
    };

    validate_rtp_capabilities(&mut caps)?;
    assert_eq!(caps.codecs[0].kind, MediaKind::Audio);
    assert_eq!(caps.codecs[0].channels, Some(1));
    assert_eq!(caps.codecs[1].kind, MediaKind::Video);
    assert_eq!(caps.codecs[1].channels, None);

    Ok(())
}

#[test]
fn test_validate_rtp_capabilities_rejects_malformed() {
    let tests = vec![
        RtpCodecCapability {
            mime_type: "opus".to_owned(),
            clock_rate: 48000,
            ..Default::default()
        },
        RtpCodecCapability {
            mime_type: "text/plain".to_owned(),
            clock_rate: 48000,
            ..Default::default()
        },
        RtpCodecCapability {
            mime_type: "audio/opus".to_owned(),
            clock_rate: 0,
            ..Default::default()
        },
    ];

    for codec in tests {
        let mut caps = RtpCapabilities {
            codecs: vec![codec],
            header_extensions: vec![],
        };
        let err = validate_rtp_capabilities(&mut caps).expect_err("must fail");
        assert!(err.is_parameter());
    }

    let mut caps = RtpCapabilities {
        codecs: vec![],
        header_extensions: vec![RtpHeaderExtension {
            kind: MediaKind::Application,
            uri: "urn:ietf:params:rtp-hdrext:sdes:mid".to_owned(),
            preferred_id: 1,
            ..Default::default()
        }],
    };
    assert!(validate_rtp_capabilities(&mut caps).is_err());
}

#[test]
fn test_get_extended_rtp_capabilities() -> Result<()> {
    let extended = extended()?;

    let opus = extended
        .codecs
        .iter()
        .find(|c| c.mime_type == "audio/opus")
        .expect("opus must be negotiated");
    assert_eq!(opus.local_payload_type, Some(111));
    assert_eq!(opus.remote_payload_type, Some(100));

    let vp8 = extended
        .codecs
        .iter()
        .find(|c| c.mime_type == "video/VP8")
        .expect("VP8 must be negotiated");
    assert_eq!(vp8.local_rtx_payload_type, Some(97));
    assert_eq!(vp8.remote_rtx_payload_type, Some(102));
    assert!(vp8
        .rtcp_feedback
        .iter()
        .any(|fb| fb.typ == "nack" && fb.parameter == "pli"));

    let mid_ext = extended
        .header_extensions
        .iter()
        .find(|e| e.kind == MediaKind::Video && e.uri == "urn:ietf:params:rtp-hdrext:sdes:mid")
        .expect("mid extension must be negotiated");
    assert_eq!(mid_ext.send_id, 4);
    assert_eq!(mid_ext.recv_id, 1);

    assert!(can_send(MediaKind::Audio, &extended));
    assert!(can_send(MediaKind::Video, &extended));

    Ok(())
}

#[test]
fn test_can_send_without_common_audio_codec() -> Result<()> {
    let mut router = generate_router_rtp_capabilities();
    router.codecs.retain(|c| c.kind != MediaKind::Audio);
    let mut native = generate_native_rtp_capabilities();
    validate_rtp_capabilities(&mut router)?;
    validate_rtp_capabilities(&mut native)?;

    let extended = get_extended_rtp_capabilities(&native, &router);
    assert!(!can_send(MediaKind::Audio, &extended));
    assert!(can_send(MediaKind::Video, &extended));

    Ok(())
}

#[test]
fn test_get_recv_rtp_capabilities() -> Result<()> {
    let extended = extended()?;
    let mut recv = get_recv_rtp_capabilities(&extended);
    validate_rtp_capabilities(&mut recv)?;

    let rtx = recv
        .codecs
        .iter()
        .find(|c| c.is_rtx() && c.preferred_payload_type == Some(102))
        .expect("rtx must be announced");
    assert_eq!(rtx.parameters.get("apt"), Some(&ParameterValue::Number(101)));

    Ok(())
}

#[test]
fn test_sending_rtp_parameters_and_reduce_codecs() -> Result<()> {
    let extended = extended()?;
    let params = get_sending_rtp_parameters(MediaKind::Video, &extended);
    assert!(params.codecs.len() >= 4);
    assert_eq!(params.codecs[0].mime_type, "video/VP8");
    assert_eq!(params.codecs[1].apt(), Some(params.codecs[0].payload_type));

    let reduced = reduce_codecs(&params.codecs, None)?;
    assert_eq!(reduced.len(), 2);
    assert_eq!(reduced[0].mime_type, "video/VP8");

    let h264 = generate_native_rtp_capabilities()
        .codecs
        .into_iter()
        .find(|c| c.mime_type == "video/H264")
        .expect("native H264");
    let reduced = reduce_codecs(&params.codecs, Some(&h264))?;
    assert_eq!(reduced[0].mime_type, "video/H264");

    let unknown = RtpCodecCapability {
        kind: MediaKind::Video,
        mime_type: "video/AV1".to_owned(),
        clock_rate: 90000,
        ..Default::default()
    };
    assert!(reduce_codecs(&params.codecs, Some(&unknown)).is_err());

    let remote = get_sending_remote_rtp_parameters(MediaKind::Audio, &extended);
    assert_eq!(remote.codecs[0].mime_type, "audio/opus");

    Ok(())
}

#[test]
fn test_can_receive() -> Result<()> {
    let extended = extended()?;
    let consumer = generate_consumer_remote_parameters("audio/opus");
    assert!(can_receive(&consumer.rtp_parameters, &extended)?);

    let mut unknown = consumer.rtp_parameters.clone();
    unknown.codecs[0].payload_type = 42;
    assert!(!can_receive(&unknown, &extended)?);

    Ok(())
}
