use std::collections::HashSet;
use std::io::Cursor;

use sdp::description::session::ATTR_KEY_MID;

use super::*;
use crate::handler::fake_parameters::*;

fn remote_sdp(reuse_media_sections: bool) -> RemoteSdp {
    let remote = generate_transport_remote_parameters();
    RemoteSdp::new(RemoteSdpOptions {
        ice_parameters: Some(remote.ice_parameters),
        ice_candidates: remote.ice_candidates,
        dtls_parameters: Some(remote.dtls_parameters),
        sctp_parameters: Some(remote.sctp_parameters),
        plan_b: false,
        reuse_media_sections,
    })
}

fn receive(remote_sdp: &mut RemoteSdp, mid: &str, reuse_mid: Option<&str>) -> Result<()> {
    let consumer = generate_consumer_remote_parameters("video/VP8");
    remote_sdp.receive(ReceiveParams {
        mid,
        kind: consumer.kind,
        offer_rtp_parameters: &consumer.rtp_parameters,
        stream_id: "stream",
        track_id: &consumer.id,
        reuse_mid,
    })
}

fn parsed_mids(sdp: &str) -> Result<Vec<String>> {
    let parsed = SessionDescription::unmarshal(&mut Cursor::new(sdp.as_bytes()))?;
    Ok(parsed
        .media_descriptions
        .iter()
        .filter_map(|m| m.attribute(ATTR_KEY_MID).flatten().map(str::to_owned))
        .collect())
}

#[test]
fn test_receive_with_reuse_keeps_section_count() -> Result<()> {
    for n in [1usize, 10, 100] {
        let mut remote_sdp = remote_sdp(true);
        receive(&mut remote_sdp, "0", None)?;
        receive(&mut remote_sdp, "1", None)?;
        let count = remote_sdp.media_section_count();

        let mut mid = "1".to_owned();
        for i in 0..n {
            remote_sdp.disable_media_section(&mid)?;
            let new_mid = format!("{}", i + 2);
            receive(&mut remote_sdp, &new_mid, Some(&mid))?;

            assert_eq!(remote_sdp.media_section_count(), count, "cycle {i} of {n}");
            assert!(remote_sdp.is_consistent(), "cycle {i} of {n}");
            assert!(remote_sdp.media_section(&mid).is_none());
            mid = new_mid;
        }

        assert_eq!(remote_sdp.mids(), vec!["0".to_owned(), mid]);
    }

    Ok(())
}

#[test]
fn test_get_sdp_version_and_mids() -> Result<()> {
    let mut remote_sdp = remote_sdp(false);
    for mid in ["0", "1", "2"] {
        receive(&mut remote_sdp, mid, None)?;
    }
    remote_sdp.receive_sctp_association()?;

    let first = remote_sdp.get_sdp();
    let first_version = remote_sdp.session_version();
    let second = remote_sdp.get_sdp();
    let second_version = remote_sdp.session_version();
    assert!(second_version > first_version);
    assert!(first.contains(&format!("o=mediasoup-client 10000 {first_version} IN IP4")));

    let tracked: HashSet<String> = remote_sdp.mids().into_iter().collect();
    let parsed: HashSet<String> = parsed_mids(&second)?.into_iter().collect();
    assert_eq!(parsed, tracked);
    assert!(parsed.contains(DATA_CHANNEL_MID));

    Ok(())
}

#[test]
fn test_session_attributes() -> Result<()> {
    let mut remote_sdp = remote_sdp(false);
    receive(&mut remote_sdp, "0", None)?;
    let sdp = remote_sdp.get_sdp();

    assert!(sdp.contains("a=ice-lite\r\n"));
    assert!(sdp.contains("a=msid-semantic:WMS *\r\n"));
    // The last fingerprint is announced.
    assert!(sdp.contains("a=fingerprint:sha-512 35:5A:44:8C"));
    assert!(sdp.contains("a=group:BUNDLE 0\r\n"));
    assert!(sdp.contains("a=candidate:udpcandidate 1 udp 1078862079 9.9.9.9 40533 typ host\r\n"));
    assert!(sdp.contains("a=candidate:tcpcandidate 1 tcp 1078862079 9.9.9.9 44855 typ host tcptype passive\r\n"));
    assert!(sdp.contains("a=setup:actpass\r\n"));

    Ok(())
}

#[test]
fn test_close_first_mid_only_disables() -> Result<()> {
    let mut remote_sdp = remote_sdp(true);
    receive(&mut remote_sdp, "0", None)?;
    receive(&mut remote_sdp, "1", None)?;
    assert_eq!(remote_sdp.first_mid(), Some("0"));

    remote_sdp.close_media_section("0")?;
    let first = remote_sdp.media_section("0").expect("first section");
    assert!(!first.closed());
    assert_eq!(first.direction(), Some("inactive"));
    assert_eq!(
        remote_sdp.get_next_media_section_idx(),
        MediaSectionIdx {
            idx: 2,
            reuse_mid: None
        }
    );

    remote_sdp.close_media_section("1")?;
    let second = remote_sdp.media_section("1").expect("second section");
    assert!(second.closed());
    assert_eq!(second.media().media_name.port.value, 0);
    assert_eq!(remote_sdp.bundle_mids(), vec!["0".to_owned()]);
    assert_eq!(
        remote_sdp.get_next_media_section_idx(),
        MediaSectionIdx {
            idx: 1,
            reuse_mid: Some("1".to_owned())
        }
    );

    Ok(())
}

#[test]
fn test_next_media_section_idx_without_reuse() -> Result<()> {
    let mut remote_sdp = remote_sdp(false);
    receive(&mut remote_sdp, "0", None)?;
    receive(&mut remote_sdp, "1", None)?;
    remote_sdp.close_media_section("1")?;

    assert_eq!(
        remote_sdp.get_next_media_section_idx(),
        MediaSectionIdx {
            idx: 2,
            reuse_mid: None
        }
    );

    Ok(())
}

#[test]
fn test_unknown_mid_not_found() -> Result<()> {
    let mut remote_sdp = remote_sdp(false);
    receive(&mut remote_sdp, "0", None)?;

    let consumer = generate_consumer_remote_parameters("audio/opus");
    let results = vec![
        remote_sdp.disable_media_section("7"),
        remote_sdp.close_media_section("7"),
        remote_sdp.plan_b_stop_receiving("7", &consumer.rtp_parameters),
        receive(&mut remote_sdp, "1", Some("7")),
    ];
    for result in results {
        assert!(result.expect_err("unknown mid").is_not_found());
    }
    assert!(remote_sdp.is_consistent());
    assert_eq!(remote_sdp.media_section_count(), 1);

    Ok(())
}

#[test]
fn test_receive_known_mid_replaces_in_place() -> Result<()> {
    let mut remote_sdp = remote_sdp(false);
    receive(&mut remote_sdp, "0", None)?;
    receive(&mut remote_sdp, "1", None)?;
    remote_sdp.disable_media_section("1")?;

    receive(&mut remote_sdp, "1", None)?;
    assert_eq!(remote_sdp.media_section_count(), 2);
    let section = remote_sdp.media_section("1").expect("section");
    assert_eq!(section.role(), MediaSectionRole::Offer);
    assert_eq!(section.direction(), Some("sendonly"));

    Ok(())
}

#[test]
fn test_receive_offer_section_ssrcs() -> Result<()> {
    let mut remote_sdp = remote_sdp(false);
    let consumer = generate_consumer_remote_parameters("video/VP8");
    remote_sdp.receive(ReceiveParams {
        mid: "0",
        kind: consumer.kind,
        offer_rtp_parameters: &consumer.rtp_parameters,
        stream_id: "stream",
        track_id: "track",
        reuse_mid: None,
    })?;

    let ssrc = consumer.rtp_parameters.encodings[0].ssrc.expect("ssrc");
    let rtx_ssrc = ssrc + 1;
    let sdp = remote_sdp.get_sdp();
    assert!(sdp.contains("m=video 7 UDP/TLS/RTP/SAVPF 101 102\r\n"));
    assert!(sdp.contains("c=IN IP4 127.0.0.1\r\n"));
    assert!(sdp.contains("a=rtpmap:101 VP8/90000\r\n"));
    assert!(sdp.contains("a=fmtp:102 apt=101\r\n"));
    assert!(sdp.contains("a=rtcp-fb:101 nack pli\r\n"));
    assert!(sdp.contains("a=rtcp-fb:101 nack\r\n"));
    assert!(sdp.contains("a=msid:stream track\r\n"));
    assert!(sdp.contains(&format!("a=ssrc-group:FID {ssrc} {rtx_ssrc}\r\n")));
    assert!(sdp.contains(&format!("a=ssrc:{rtx_ssrc} msid:stream track\r\n")));

    remote_sdp.disable_media_section("0")?;
    let sdp = remote_sdp.get_sdp();
    assert!(!sdp.contains("a=ssrc:"));
    assert!(sdp.contains("a=inactive\r\n"));

    Ok(())
}

#[test]
fn test_send_answers_local_offer() -> Result<()> {
    let mut remote_sdp = remote_sdp(false);
    let mut router = generate_router_rtp_capabilities();
    let mut native = generate_native_rtp_capabilities();
    crate::ortc::validate_rtp_capabilities(&mut router)?;
    crate::ortc::validate_rtp_capabilities(&mut native)?;
    let extended = crate::ortc::get_extended_rtp_capabilities(&native, &router);

    let mut offer_rtp_parameters =
        crate::ortc::get_sending_rtp_parameters(MediaKind::Audio, &extended);
    offer_rtp_parameters.mid = Some("0".to_owned());
    offer_rtp_parameters
        .header_extensions
        .retain(|ext| ext.uri.ends_with("sdes:mid"));
    let answer_rtp_parameters =
        crate::ortc::get_sending_remote_rtp_parameters(MediaKind::Audio, &extended);
    let offer_media = generate_local_offer_media("0", MediaKind::Audio, &offer_rtp_parameters, "t");

    remote_sdp.send(SendParams {
        offer_media: std::slice::from_ref(&offer_media),
        reuse_mid: None,
        offer_rtp_parameters: &offer_rtp_parameters,
        answer_rtp_parameters: &answer_rtp_parameters,
        codec_options: Some(&ProducerCodecOptions {
            opus_stereo: Some(true),
            opus_dtx: Some(false),
            ..Default::default()
        }),
        extmap_allow_mixed: false,
    })?;

    let section = remote_sdp.media_section("0").expect("answer section");
    assert_eq!(section.role(), MediaSectionRole::Answer);
    assert_eq!(section.kind(), MediaKind::Audio);
    assert_eq!(section.direction(), Some("recvonly"));

    let sdp = remote_sdp.get_sdp();
    assert!(sdp.contains("a=rtpmap:111 opus/48000/2\r\n"));
    assert!(sdp.contains("a=fmtp:111 sprop-stereo=1;stereo=1;usedtx=0;useinbandfec=1\r\n"));
    // Only extensions present in the local offer are answered.
    assert!(sdp.contains("a=extmap:4 urn:ietf:params:rtp-hdrext:sdes:mid\r\n"));
    assert!(!sdp.contains("abs-send-time"));
    assert!(sdp.contains("a=rtcp-mux\r\n"));

    remote_sdp.update_dtls_role(DtlsRole::Client);
    assert!(remote_sdp.get_sdp().contains("a=setup:active\r\n"));

    Ok(())
}

#[test]
fn test_send_answers_simulcast_and_mixed_extmap() -> Result<()> {
    let mut router = generate_router_rtp_capabilities();
    let mut native = generate_native_rtp_capabilities();
    crate::ortc::validate_rtp_capabilities(&mut router)?;
    crate::ortc::validate_rtp_capabilities(&mut native)?;
    let extended = crate::ortc::get_extended_rtp_capabilities(&native, &router);

    let mut offer_rtp_parameters =
        crate::ortc::get_sending_rtp_parameters(MediaKind::Video, &extended);
    offer_rtp_parameters.mid = Some("0".to_owned());
    let answer_rtp_parameters =
        crate::ortc::get_sending_remote_rtp_parameters(MediaKind::Video, &extended);
    let offer_media = generate_local_offer_media("0", MediaKind::Video, &offer_rtp_parameters, "t")
        .with_property_attribute("extmap-allow-mixed".to_owned())
        .with_value_attribute("rid".to_owned(), "r0 send".to_owned())
        .with_value_attribute("rid".to_owned(), "r1 send".to_owned())
        .with_value_attribute("simulcast".to_owned(), "send r0;r1".to_owned());

    for (extmap_allow_mixed, want_mixed) in [(true, true), (false, false)] {
        let mut remote_sdp = remote_sdp(false);
        remote_sdp.send(SendParams {
            offer_media: std::slice::from_ref(&offer_media),
            reuse_mid: None,
            offer_rtp_parameters: &offer_rtp_parameters,
            answer_rtp_parameters: &answer_rtp_parameters,
            codec_options: None,
            extmap_allow_mixed,
        })?;

        let sdp = remote_sdp.get_sdp();
        assert_eq!(sdp.contains("a=extmap-allow-mixed\r\n"), want_mixed);
        assert!(sdp.contains("a=rid:r0 recv\r\n"));
        assert!(sdp.contains("a=rid:r1 recv\r\n"));
        assert!(sdp.contains("a=simulcast:recv r0;r1\r\n"));
    }

    // Rids without a simulcast attribute are not answered.
    let plain_offer = generate_local_offer_media("0", MediaKind::Video, &offer_rtp_parameters, "t")
        .with_value_attribute("rid".to_owned(), "r0 send".to_owned());
    let mut remote_sdp = remote_sdp(false);
    remote_sdp.send(SendParams {
        offer_media: std::slice::from_ref(&plain_offer),
        reuse_mid: None,
        offer_rtp_parameters: &offer_rtp_parameters,
        answer_rtp_parameters: &answer_rtp_parameters,
        codec_options: None,
        extmap_allow_mixed: true,
    })?;
    let sdp = remote_sdp.get_sdp();
    assert!(!sdp.contains("a=rid:"));
    assert!(!sdp.contains("a=extmap-allow-mixed"));

    Ok(())
}

#[test]
fn test_sort_repairs_out_of_order_reuse() -> Result<()> {
    let mut remote_sdp = remote_sdp(true);
    for mid in ["0", "1", "2"] {
        receive(&mut remote_sdp, mid, None)?;
    }
    remote_sdp.receive_sctp_association()?;
    remote_sdp.close_media_section("1")?;

    let next = remote_sdp.get_next_media_section_idx();
    assert_eq!(next.idx, 1);
    receive(&mut remote_sdp, "4", next.reuse_mid.as_deref())?;
    assert_eq!(remote_sdp.mids(), vec!["0", "4", "2", DATA_CHANNEL_MID]);

    let sdp = remote_sdp.get_sdp();
    assert_eq!(remote_sdp.mids(), vec!["0", "2", "4", DATA_CHANNEL_MID]);
    assert!(remote_sdp.is_consistent());
    assert_eq!(parsed_mids(&sdp)?, remote_sdp.mids());
    assert_eq!(
        remote_sdp.bundle_mids(),
        vec!["0", "2", "4", DATA_CHANNEL_MID]
    );

    Ok(())
}

#[test]
fn test_reconcile_media_sections() -> Result<()> {
    let mut remote_sdp = remote_sdp(false);
    receive(&mut remote_sdp, "0", None)?;

    let local_sections = vec![
        ("0".to_owned(), MediaKind::Video),
        ("1".to_owned(), MediaKind::Audio),
        ("2".to_owned(), MediaKind::Video),
        ("3".to_owned(), MediaKind::Video),
    ];
    let mut filler_codecs = generate_consumer_remote_parameters("audio/opus")
        .rtp_parameters
        .codecs;
    filler_codecs.extend(
        generate_consumer_remote_parameters("video/VP8")
            .rtp_parameters
            .codecs,
    );

    let filled = remote_sdp.reconcile_media_sections(&local_sections, Some("3"), &filler_codecs)?;
    assert_eq!(filled, vec!["1".to_owned(), "2".to_owned()]);
    assert_eq!(remote_sdp.media_section_count(), 3);
    assert!(remote_sdp.is_consistent());
    let filler = remote_sdp.media_section("1").expect("filler");
    assert_eq!(filler.kind(), MediaKind::Audio);
    assert_eq!(filler.direction(), Some("inactive"));
    let sdp = remote_sdp.get_sdp();
    assert!(sdp.contains("m=video 7 UDP/TLS/RTP/SAVPF 101 102\r\n"));
    assert_eq!(parsed_mids(&sdp)?, vec!["0", "1", "2"]);

    // Nothing left to fill once the pending section is received.
    receive(&mut remote_sdp, "3", None)?;
    let filled = remote_sdp.reconcile_media_sections(&local_sections, None, &filler_codecs)?;
    assert!(filled.is_empty());
    assert_eq!(remote_sdp.mids(), vec!["0", "1", "2", "3"]);

    Ok(())
}

#[test]
fn test_plan_b_stop_receiving() -> Result<()> {
    let remote = generate_transport_remote_parameters();
    let mut remote_sdp = RemoteSdp::new(RemoteSdpOptions {
        ice_parameters: Some(remote.ice_parameters),
        ice_candidates: remote.ice_candidates,
        dtls_parameters: Some(remote.dtls_parameters),
        plan_b: true,
        ..Default::default()
    });

    let first = generate_consumer_remote_parameters("video/VP8");
    let second = generate_consumer_remote_parameters("video/VP8");
    for consumer in [&first, &second] {
        remote_sdp.receive(ReceiveParams {
            mid: "video",
            kind: MediaKind::Video,
            offer_rtp_parameters: &consumer.rtp_parameters,
            stream_id: &consumer.producer_id,
            track_id: &consumer.id,
            reuse_mid: None,
        })?;
    }
    assert_eq!(remote_sdp.media_section_count(), 1);

    remote_sdp.plan_b_stop_receiving("video", &first.rtp_parameters)?;
    let sdp = remote_sdp.get_sdp();
    let first_ssrc = first.rtp_parameters.encodings[0].ssrc.expect("ssrc");
    let second_ssrc = second.rtp_parameters.encodings[0].ssrc.expect("ssrc");
    assert!(!sdp.contains(&format!("a=ssrc:{first_ssrc} ")));
    assert!(sdp.contains(&format!("a=ssrc:{second_ssrc} cname:")));

    Ok(())
}
