use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sdp::description::session::ATTR_KEY_MID;
use sdp::SessionDescription;
use webrtc_negotiator::api::setting_engine::SettingEngine;
use webrtc_negotiator::api::DeviceBuilder;
use webrtc_negotiator::app_data::{AppData, MediaType};
use webrtc_negotiator::consumer::ConsumerEvent;
use webrtc_negotiator::device::Device;
use webrtc_negotiator::handler::fake_handler::{FakeHandler, FakeHandlerFactory, HandlerRequest};
use webrtc_negotiator::handler::fake_parameters::*;
use webrtc_negotiator::producer::ProducerEvent;
use webrtc_negotiator::remote_sdp::{ReceiveParams, RemoteSdp, RemoteSdpOptions};
use webrtc_negotiator::rtp_parameters::MediaKind;
use webrtc_negotiator::track::MediaStreamTrack;
use webrtc_negotiator::transport::{
    ConnectionState, ConsumerOptions, ProducerOptions, Transport, TransportEvent,
    TransportOptions,
};
use webrtc_negotiator::Error;

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn loaded_device(factory: &FakeHandlerFactory, setting_engine: SettingEngine) -> Result<Device> {
    let device = DeviceBuilder::new()
        .with_handler_factory(factory.handler_factory())
        .with_setting_engine(setting_engine)
        .build();
    device.load(generate_router_rtp_capabilities()).await?;
    Ok(device)
}

fn transport_options() -> TransportOptions {
    let remote = generate_transport_remote_parameters();
    TransportOptions {
        id: remote.id,
        ice_parameters: Some(remote.ice_parameters),
        ice_candidates: remote.ice_candidates,
        dtls_parameters: Some(remote.dtls_parameters),
        sctp_parameters: Some(remote.sctp_parameters),
        ..Default::default()
    }
}

fn accept_signaling(transport: &Transport) {
    transport.on_connect(Box::new(|_| Box::pin(async { Ok(()) })));
    let next_id = Arc::new(AtomicUsize::new(0));
    transport.on_produce(Box::new(move |_| {
        let id = format!("producer-{}", next_id.fetch_add(1, Ordering::SeqCst));
        Box::pin(async move { Ok(id) })
    }));
}

fn last_handler(factory: &FakeHandlerFactory) -> Result<Arc<FakeHandler>> {
    factory
        .last()
        .ok_or_else(|| anyhow::anyhow!("no handler built"))
}

fn remote_audio(remote_uid: &str) -> ConsumerOptions {
    let remote = generate_consumer_remote_parameters("audio/opus");
    ConsumerOptions {
        id: remote.id,
        producer_id: remote.producer_id,
        kind: remote.kind,
        rtp_parameters: remote.rtp_parameters,
        app_data: Some(AppData::Remote {
            remote_uid: remote_uid.to_owned(),
            remote_media_type: MediaType::Audio,
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_load_twice_keeps_first_capabilities() -> Result<()> {
    init_log();

    let factory = FakeHandlerFactory::new();
    let device = loaded_device(&factory, SettingEngine::default()).await?;
    let rtp_capabilities = device.rtp_capabilities().await?;

    let mut other = generate_router_rtp_capabilities();
    other.codecs.truncate(1);
    let result = device.load(other).await;
    assert!(matches!(result, Err(err) if err.is_invalid_state()));

    assert_eq!(device.rtp_capabilities().await?, rtp_capabilities);
    assert!(device.can_produce(MediaKind::Video).await?);

    Ok(())
}

#[tokio::test]
async fn test_load_without_opus_cannot_produce_audio() -> Result<()> {
    init_log();

    let mut router_rtp_capabilities = generate_router_rtp_capabilities();
    router_rtp_capabilities.codecs.retain(|c| c.kind != MediaKind::Audio);

    let factory = FakeHandlerFactory::new();
    let device = DeviceBuilder::new()
        .with_handler_factory(factory.handler_factory())
        .build();
    device.load(router_rtp_capabilities).await?;

    // The native engine still supports opus.
    assert!(generate_native_rtp_capabilities()
        .codecs
        .iter()
        .any(|c| c.mime_type.eq_ignore_ascii_case("audio/opus")));
    assert!(!device.can_produce(MediaKind::Audio).await?);

    let transport = device.create_send_transport(transport_options()).await?;
    accept_signaling(&transport);
    let result = transport
        .produce(ProducerOptions {
            track: Some(MediaStreamTrack::new(MediaKind::Audio, "mic")),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(err) if err.is_unsupported()));

    Ok(())
}

#[tokio::test]
async fn test_produce_on_recv_transport() -> Result<()> {
    init_log();

    let factory = FakeHandlerFactory::new();
    let device = loaded_device(&factory, SettingEngine::default()).await?;
    let transport = device.create_recv_transport(transport_options()).await?;
    accept_signaling(&transport);

    let result = transport
        .produce(ProducerOptions {
            track: Some(MediaStreamTrack::new(MediaKind::Video, "camera")),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(err) if err.is_unsupported()));
    assert!(transport.producers().await.is_empty());
    assert!(last_handler(&factory)?.requests().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_queued_produce_rejected_on_close() -> Result<()> {
    init_log();

    let factory = FakeHandlerFactory::new();
    let device = loaded_device(&factory, SettingEngine::default()).await?;
    let transport = device.create_send_transport(transport_options()).await?;
    transport.on_connect(Box::new(|_| Box::pin(async { Ok(()) })));
    transport.on_produce(Box::new(|_| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok("blocking".to_owned())
        })
    }));

    // The first produce holds the queue while the second one waits.
    let running = {
        let transport = transport.clone();
        tokio::spawn(async move {
            transport
                .produce(ProducerOptions {
                    track: Some(MediaStreamTrack::new(MediaKind::Audio, "mic")),
                    ..Default::default()
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let queued = {
        let transport = transport.clone();
        tokio::spawn(async move {
            transport
                .produce(ProducerOptions {
                    track: Some(MediaStreamTrack::new(MediaKind::Video, "camera")),
                    ..Default::default()
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    transport.close().await;

    let queued = tokio::time::timeout(Duration::from_secs(1), queued).await??;
    assert_eq!(
        queued.err(),
        Some(Error::ErrInvalidState("closed".to_owned()))
    );
    let running = tokio::time::timeout(Duration::from_secs(1), running).await??;
    assert!(matches!(running, Err(err) if err.is_invalid_state()));
    assert!(transport.producers().await.is_empty());

    Ok(())
}

#[test]
fn test_media_section_reuse_is_bounded() -> Result<()> {
    init_log();

    for n in [1usize, 10, 100] {
        let remote = generate_transport_remote_parameters();
        let mut remote_sdp = RemoteSdp::new(RemoteSdpOptions {
            ice_parameters: Some(remote.ice_parameters),
            ice_candidates: remote.ice_candidates,
            dtls_parameters: Some(remote.dtls_parameters),
            sctp_parameters: None,
            plan_b: false,
            reuse_media_sections: true,
        });

        let receive = |remote_sdp: &mut RemoteSdp, mid: &str, reuse_mid: Option<&str>| {
            let consumer = generate_consumer_remote_parameters("audio/opus");
            remote_sdp.receive(ReceiveParams {
                mid,
                kind: consumer.kind,
                offer_rtp_parameters: &consumer.rtp_parameters,
                stream_id: "remote",
                track_id: &consumer.id,
                reuse_mid,
            })
        };

        // The first mid anchors the bundle, cycle the second one.
        receive(&mut remote_sdp, "0", None)?;
        receive(&mut remote_sdp, "1", None)?;
        let count = remote_sdp.media_section_count();

        let mut mid = "1".to_owned();
        for i in 1..=n {
            remote_sdp.disable_media_section(&mid)?;
            let new_mid = (i + 1).to_string();
            receive(&mut remote_sdp, &new_mid, Some(&mid))?;

            assert_eq!(remote_sdp.media_section_count(), count, "n={n} cycle={i}");
            assert!(remote_sdp.is_consistent(), "n={n} cycle={i}");
            mid = new_mid;
        }
        assert_eq!(remote_sdp.mids(), vec!["0".to_owned(), mid]);
    }

    Ok(())
}

#[test]
fn test_get_sdp_versions_and_mids() -> Result<()> {
    init_log();

    let remote = generate_transport_remote_parameters();
    let mut remote_sdp = RemoteSdp::new(RemoteSdpOptions {
        ice_parameters: Some(remote.ice_parameters),
        ice_candidates: remote.ice_candidates,
        dtls_parameters: Some(remote.dtls_parameters),
        sctp_parameters: None,
        plan_b: false,
        reuse_media_sections: false,
    });
    for mid in ["0", "1"] {
        let consumer = generate_consumer_remote_parameters("video/VP8");
        remote_sdp.receive(ReceiveParams {
            mid,
            kind: consumer.kind,
            offer_rtp_parameters: &consumer.rtp_parameters,
            stream_id: "remote",
            track_id: &consumer.id,
            reuse_mid: None,
        })?;
    }

    let first = SessionDescription::unmarshal(&mut Cursor::new(remote_sdp.get_sdp()))?;
    let second = SessionDescription::unmarshal(&mut Cursor::new(remote_sdp.get_sdp()))?;
    assert!(second.origin.session_version > first.origin.session_version);

    let parsed_mids: Vec<String> = second
        .media_descriptions
        .iter()
        .filter_map(|m| m.attribute(ATTR_KEY_MID).flatten().map(str::to_owned))
        .collect();
    assert_eq!(parsed_mids, remote_sdp.mids());

    Ok(())
}

#[tokio::test]
async fn test_produce_app_data_reaches_signaling() -> Result<()> {
    init_log();

    let factory = FakeHandlerFactory::new();
    let device = loaded_device(&factory, SettingEngine::default()).await?;
    let transport = device.create_send_transport(transport_options()).await?;
    accept_signaling(&transport);

    let signaled = Arc::new(std::sync::Mutex::new(vec![]));
    let s = Arc::clone(&signaled);
    transport.observer().subscribe(move |event| {
        if let TransportEvent::Produce(request) = event {
            if let Ok(mut signaled) = s.lock() {
                signaled.push(Arc::clone(&request.app_data));
            }
        }
        Ok(())
    });

    let producer = transport
        .produce(ProducerOptions {
            track: Some(MediaStreamTrack::new(MediaKind::Video, "screen")),
            app_data: Some(AppData::ScreenShare {
                device_id: Some("display-1".to_owned()),
                device_id_low: None,
            }),
            ..Default::default()
        })
        .await?;

    let signaled = signaled
        .lock()
        .map_err(|_| anyhow::anyhow!("poisoned"))?
        .clone();
    assert_eq!(signaled.len(), 1);
    assert_eq!(signaled[0].media_type(), MediaType::ScreenShare);
    assert_eq!(signaled[0].device_id(), Some("display-1"));
    assert!(Arc::ptr_eq(&signaled[0], &producer.app_data()));

    Ok(())
}

#[tokio::test]
async fn test_producer_pause_zero_rtp_reaches_handler() -> Result<()> {
    init_log();

    // (zero_rtp_on_pause, replace requests)
    let tests = vec![(true, 2), (false, 0)];

    for (zero_rtp_on_pause, replaces) in tests {
        let factory = FakeHandlerFactory::new();
        let device = loaded_device(&factory, SettingEngine::default()).await?;
        let transport = device.create_send_transport(transport_options()).await?;
        let handler = last_handler(&factory)?;
        accept_signaling(&transport);

        let track = MediaStreamTrack::new(MediaKind::Audio, "mic");
        let producer = transport
            .produce(ProducerOptions {
                track: Some(Arc::clone(&track)),
                zero_rtp_on_pause: Some(zero_rtp_on_pause),
                ..Default::default()
            })
            .await?;

        producer.pause().await;
        producer.resume().await;

        let replace_requests: Vec<HandlerRequest> = handler
            .requests()
            .await
            .into_iter()
            .filter(|r| matches!(r, HandlerRequest::ReplaceTrack { .. }))
            .collect();
        assert_eq!(replace_requests.len(), replaces, "zero_rtp_on_pause={zero_rtp_on_pause}");
        if replaces > 0 {
            assert_eq!(
                replace_requests,
                vec![
                    HandlerRequest::ReplaceTrack {
                        local_id: producer.local_id().to_owned(),
                        track_id: None,
                    },
                    HandlerRequest::ReplaceTrack {
                        local_id: producer.local_id().to_owned(),
                        track_id: Some(track.id().to_owned()),
                    },
                ]
            );
        }
    }

    Ok(())
}

#[tokio::test]
async fn test_consumer_close_twice_stops_receiving_once() -> Result<()> {
    init_log();

    let factory = FakeHandlerFactory::new();
    let device = loaded_device(&factory, SettingEngine::default()).await?;
    let transport = device.create_recv_transport(transport_options()).await?;
    let handler = last_handler(&factory)?;
    accept_signaling(&transport);

    let consumer = transport.consume(remote_audio("alice")).await?;
    consumer.close().await;
    consumer.close().await;
    transport.flush().await;

    assert!(transport.consumers().await.is_empty());
    let stop_requests: Vec<HandlerRequest> = handler
        .requests()
        .await
        .into_iter()
        .filter(|r| matches!(r, HandlerRequest::StopReceiving { .. }))
        .collect();
    assert_eq!(
        stop_requests,
        vec![HandlerRequest::StopReceiving {
            local_id: consumer.local_id().to_owned(),
        }]
    );

    Ok(())
}

#[tokio::test]
async fn test_transport_close_notifies_once() -> Result<()> {
    init_log();

    let factory = FakeHandlerFactory::new();
    let device = loaded_device(&factory, SettingEngine::default()).await?;
    let transport = device.create_recv_transport(transport_options()).await?;
    accept_signaling(&transport);

    let consumer = transport.consume(remote_audio("bob")).await?;
    let transport_closes = Arc::new(AtomicUsize::new(0));
    let t = Arc::clone(&transport_closes);
    consumer.observer().subscribe(move |event| {
        if *event == ConsumerEvent::TransportClose {
            t.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    });

    transport.close().await;
    transport.close().await;
    consumer.close().await;

    assert_eq!(transport_closes.load(Ordering::SeqCst), 1);
    assert!(consumer.closed());
    assert!(transport.get_stats().await.is_err());
    assert!(consumer.get_stats().await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_connection_state_notifications() -> Result<()> {
    init_log();

    let factory = FakeHandlerFactory::new();
    let device = loaded_device(&factory, SettingEngine::default()).await?;
    let transport = device.create_send_transport(transport_options()).await?;
    let handler = last_handler(&factory)?;

    let changes = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&changes);
    transport.observer().subscribe(move |event| {
        if let TransportEvent::ConnectionStateChange(_) = event {
            c.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    });

    handler.set_connection_state(ConnectionState::Connected).await;
    handler.set_connection_state(ConnectionState::Connected).await;
    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert_eq!(transport.connection_state(), ConnectionState::Connected);

    transport.close().await;
    handler.set_connection_state(ConnectionState::Failed).await;
    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert_eq!(transport.connection_state(), ConnectionState::Closed);

    Ok(())
}

#[tokio::test]
async fn test_producer_close_reaches_handler() -> Result<()> {
    init_log();

    let factory = FakeHandlerFactory::new();
    let device = loaded_device(&factory, SettingEngine::default()).await?;
    let transport = device.create_send_transport(transport_options()).await?;
    let handler = last_handler(&factory)?;
    accept_signaling(&transport);

    let producer = transport
        .produce(ProducerOptions {
            track: Some(MediaStreamTrack::new(MediaKind::Video, "camera")),
            ..Default::default()
        })
        .await?;
    producer.set_max_spatial_layer(0).await?;

    let closes = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&closes);
    producer.observer().subscribe(move |event| {
        if *event == ProducerEvent::Close {
            c.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    });
    producer.close().await;
    transport.flush().await;

    let local_id = producer.local_id().to_owned();
    let requests = handler.requests().await;
    assert_eq!(
        requests[1..],
        [
            HandlerRequest::SetMaxSpatialLayer {
                local_id: local_id.clone(),
                spatial_layer: 0,
            },
            HandlerRequest::StopSending {
                local_id,
                media_type: MediaType::Video,
            },
        ]
    );
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(transport.producer(producer.id()).await.is_none());

    Ok(())
}

#[tokio::test]
async fn test_transport_options_from_signaling_json() -> Result<()> {
    init_log();

    let remote = generate_transport_remote_parameters();
    let json = serde_json::json!({
        "id": "transport-json",
        "iceParameters": remote.ice_parameters,
        "iceCandidates": remote.ice_candidates,
        "dtlsParameters": remote.dtls_parameters,
        "sctpParameters": remote.sctp_parameters,
        "reuseMediaSections": true,
        "appData": { "room": "lobby" },
    });
    let options: TransportOptions = serde_json::from_value(json)?;

    let factory = FakeHandlerFactory::new();
    let device = loaded_device(&factory, SettingEngine::default()).await?;
    let transport = device.create_recv_transport(options).await?;
    assert_eq!(transport.id(), "transport-json");
    assert_eq!(
        transport.max_sctp_message_size(),
        Some(remote.sctp_parameters.max_message_size)
    );
    assert_eq!(
        transport.app_data(),
        Some(&serde_json::json!({ "room": "lobby" }))
    );

    Ok(())
}
