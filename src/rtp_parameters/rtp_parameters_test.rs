use super::*;
use crate::error::Result;

#[test]
fn test_media_kind_string() {
    let tests = vec![
        (MediaKind::Unspecified, "Unspecified"),
        (MediaKind::Audio, "audio"),
        (MediaKind::Video, "video"),
        (MediaKind::Application, "application"),
    ];

    for (kind, expected_string) in tests {
        assert_eq!(kind.to_string(), expected_string);
        if kind != MediaKind::Unspecified {
            assert_eq!(MediaKind::from(expected_string), kind);
        }
    }
    assert_eq!(MediaKind::from("data"), MediaKind::Unspecified);
    assert_eq!(MediaKind::from(2u8), MediaKind::Video);
}

#[test]
fn test_fmtp_line() {
    let parameters = parse_fmtp_line("minptime=10;useinbandfec=1; profile-level-id=42e01f");
    assert_eq!(parameters.get("minptime"), Some(&ParameterValue::Number(10)));
    assert_eq!(
        parameters.get("profile-level-id"),
        Some(&ParameterValue::String("42e01f".to_owned()))
    );
    assert_eq!(
        fmtp_line(&parameters),
        "minptime=10;profile-level-id=42e01f;useinbandfec=1"
    );
    assert!(parse_fmtp_line("").is_empty());
}

#[test]
fn test_rtp_parameters_deserialize() -> Result<()> {
    let raw = r#"{
        "mid": "0",
        "codecs": [
            {
                "mimeType": "video/VP8",
                "payloadType": 101,
                "clockRate": 90000,
                "rtcpFeedback": [{ "type": "nack" }, { "type": "nack", "parameter": "pli" }]
            },
            {
                "mimeType": "video/rtx",
                "payloadType": 102,
                "clockRate": 90000,
                "parameters": { "apt": 101 }
            }
        ],
        "headerExtensions": [{ "uri": "urn:ietf:params:rtp-hdrext:sdes:mid", "id": 1 }],
        "encodings": [{ "ssrc": 1111, "rtx": { "ssrc": 2222 }, "maxBitrate": 500000 }],
        "rtcp": { "cname": "abc", "reducedSize": true }
    }"#;

    let params: RtpParameters = serde_json::from_str(raw)?;
    assert_eq!(params.mid.as_deref(), Some("0"));
    assert_eq!(params.codecs.len(), 2);
    assert_eq!(params.codecs[0].encoding_name(), "VP8");
    assert_eq!(params.codecs[0].rtcp_feedback[1].parameter, "pli");
    assert!(params.codecs[1].is_rtx());
    assert_eq!(params.codecs[1].apt(), Some(101));
    assert_eq!(params.encodings[0].rtx, Some(RtxParameters { ssrc: 2222 }));
    assert_eq!(params.encodings[0].max_bitrate, Some(500000));
    assert_eq!(params.rtcp.reduced_size, Some(true));

    let back = serde_json::to_value(&params)?;
    assert_eq!(back["codecs"][0]["mimeType"], "video/VP8");
    assert!(back["encodings"][0].get("dtx").is_none());

    Ok(())
}
