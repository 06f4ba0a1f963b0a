use std::io::Cursor;

use sdp::util::ConnectionRole;
use sdp::SessionDescription;

use super::*;
use crate::error::Result;

#[test]
fn test_dtls_role_string() {
    let tests = vec![
        (DtlsRole::Auto, "auto"),
        (DtlsRole::Client, "client"),
        (DtlsRole::Server, "server"),
    ];

    for (role, expected_string) in tests {
        assert_eq!(role.to_string(), expected_string);
        assert_eq!(DtlsRole::from(expected_string), role);
    }
}

#[test]
fn test_dtls_role_to_connection_role() {
    let tests = vec![
        (DtlsRole::Auto, ConnectionRole::Actpass, DtlsRole::Auto),
        (DtlsRole::Client, ConnectionRole::Active, DtlsRole::Server),
        (DtlsRole::Server, ConnectionRole::Passive, DtlsRole::Client),
    ];

    for (role, expected_connection_role, expected_opposite) in tests {
        assert_eq!(role.to_connection_role(), expected_connection_role);
        assert_eq!(role.opposite(), expected_opposite);
    }
}

#[test]
fn test_dtls_role_from_remote_sdp() -> Result<()> {
    const NO_MEDIA: &str = "v=0
o=- 4596489990601351948 2 IN IP4 127.0.0.1
s=-
t=0 0
";

    const MEDIA_NO_SETUP: &str = "v=0
o=- 4596489990601351948 2 IN IP4 127.0.0.1
s=-
t=0 0
m=application 47299 DTLS/SCTP 5000
c=IN IP4 192.168.20.129
";

    const MEDIA_SETUP_DECLARED: &str = "v=0
o=- 4596489990601351948 2 IN IP4 127.0.0.1
s=-
t=0 0
m=application 47299 DTLS/SCTP 5000
c=IN IP4 192.168.20.129
a=setup:%s
";

    let tests = vec![
        ("No MediaDescriptions", NO_MEDIA.to_owned(), DtlsRole::Auto),
        ("MediaDescription, no setup", MEDIA_NO_SETUP.to_owned(), DtlsRole::Auto),
        (
            "MediaDescription, setup:actpass",
            MEDIA_SETUP_DECLARED.replace("%s", "actpass"),
            DtlsRole::Auto,
        ),
        (
            "MediaDescription, setup:passive",
            MEDIA_SETUP_DECLARED.replace("%s", "passive"),
            DtlsRole::Server,
        ),
        (
            "MediaDescription, setup:active",
            MEDIA_SETUP_DECLARED.replace("%s", "active"),
            DtlsRole::Client,
        ),
    ];

    for (name, session_description_str, expected_role) in tests {
        let mut reader = Cursor::new(session_description_str.as_bytes());
        let session_description = SessionDescription::unmarshal(&mut reader)?;
        assert_eq!(
            DtlsRole::from(&session_description),
            expected_role,
            "{name} failed"
        );
    }

    Ok(())
}

#[test]
fn test_dtls_parameters_validate() -> Result<()> {
    let params: DtlsParameters = serde_json::from_str(
        r#"{"role":"auto","fingerprints":[{"algorithm":"sha-256","value":"AB:CD"},{"algorithm":"sha-512","value":"EF:01"}]}"#,
    )?;
    params.validate()?;
    assert_eq!(params.last_fingerprint().map(|f| f.algorithm.as_str()), Some("sha-512"));

    let empty = DtlsParameters::default();
    assert!(empty.validate().is_err());

    Ok(())
}
