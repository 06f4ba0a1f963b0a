use super::*;
use crate::error::Result;

#[test]
fn test_ice_server_validate_success() {
    let tests = vec![
        IceServer {
            urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
            username: "unittest".to_owned(),
            credential: "placeholder".to_owned(),
            credential_type: IceCredentialType::Password,
        },
        IceServer {
            urls: vec![
                "stun:stun.l.google.com:19302".to_owned(),
                "turns:turn.example.org:443?transport=tcp".to_owned(),
            ],
            username: "unittest".to_owned(),
            credential: "placeholder".to_owned(),
            credential_type: IceCredentialType::Oauth,
        },
        IceServer {
            urls: vec!["stun:stun.example.org".to_owned()],
            ..Default::default()
        },
    ];

    for ice_server in tests {
        assert!(ice_server.validate().is_ok(), "{ice_server:?}");
    }
}

#[test]
fn test_ice_server_validate_failure() {
    let tests = vec![
        IceServer {
            urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
            ..Default::default()
        },
        IceServer {
            urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
            username: "unittest".to_owned(),
            credential: "placeholder".to_owned(),
            credential_type: IceCredentialType::Unspecified,
        },
        IceServer {
            urls: vec!["http://example.org".to_owned()],
            ..Default::default()
        },
        IceServer {
            urls: vec!["not a url".to_owned()],
            ..Default::default()
        },
        IceServer::default(),
    ];

    for ice_server in tests {
        let err = ice_server.validate().expect_err("validation should fail");
        assert!(err.is_parameter(), "{err:?}");
    }
}

#[test]
fn test_ice_parameters_validate() {
    let ok = IceParameters {
        username_fragment: "ufrag".to_owned(),
        password: "pwd".to_owned(),
        ice_lite: true,
    };
    assert!(ok.validate().is_ok());

    let missing = IceParameters {
        password: "pwd".to_owned(),
        ..Default::default()
    };
    assert!(missing.validate().is_err());
}

#[test]
fn test_ice_candidate_sdp_value() -> Result<()> {
    let candidate: IceCandidate = serde_json::from_str(
        r#"{"foundation":"udpcandidate","priority":1078862079,"ip":"10.0.0.1","protocol":"udp","port":40000,"type":"host"}"#,
    )?;
    assert_eq!(
        candidate.to_sdp_value(),
        "udpcandidate 1 udp 1078862079 10.0.0.1 40000 typ host"
    );

    let tcp = IceCandidate {
        protocol: IceProtocol::Tcp,
        tcp_type: Some("passive".to_owned()),
        ..candidate
    };
    assert!(tcp.to_sdp_value().ends_with("typ host tcptype passive"));

    Ok(())
}

#[test]
fn test_ice_transport_policy_string() {
    let tests = vec![
        (IceTransportPolicy::All, "all"),
        (IceTransportPolicy::Relay, "relay"),
    ];

    for (policy, expected_string) in tests {
        assert_eq!(policy.to_string(), expected_string);
        assert_eq!(IceTransportPolicy::from(expected_string), policy);
    }
}
