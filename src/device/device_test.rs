use std::sync::atomic::Ordering;

use portable_atomic::AtomicUsize;

use super::*;
use crate::api::DeviceBuilder;
use crate::handler::fake_handler::FakeHandlerFactory;
use crate::handler::fake_parameters::*;

fn new_device(factory: &FakeHandlerFactory) -> Device {
    DeviceBuilder::new()
        .with_handler_factory(factory.handler_factory())
        .build()
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

#[tokio::test]
async fn test_device_load() -> Result<()> {
    let factory = FakeHandlerFactory::new();
    let device = new_device(&factory);

    assert_eq!(device.handler_name(), "FakeHandler");
    assert!(!device.loaded().await);
    assert!(device.rtp_capabilities().await.is_err());

    device.load(generate_router_rtp_capabilities()).await?;
    assert!(device.loaded().await);

    let rtp_capabilities = device.rtp_capabilities().await?;
    assert!(rtp_capabilities
        .codecs
        .iter()
        .any(|codec| codec.mime_type.eq_ignore_ascii_case("audio/opus")));
    assert_eq!(
        device.sctp_capabilities().await?,
        generate_native_sctp_capabilities()
    );

    assert!(device.can_produce(MediaKind::Audio).await?);
    assert!(device.can_produce(MediaKind::Video).await?);

    // The temporary handler used to negotiate is released.
    let handlers = factory.handlers();
    assert!(handlers.last().map(|h| h.is_closed()).unwrap_or(false));

    Ok(())
}

#[tokio::test]
async fn test_device_load_twice() -> Result<()> {
    let factory = FakeHandlerFactory::new();
    let device = new_device(&factory);

    device.load(generate_router_rtp_capabilities()).await?;
    let result = device.load(generate_router_rtp_capabilities()).await;
    assert!(matches!(result, Err(err) if err.is_invalid_state()));
    assert!(device.loaded().await);

    Ok(())
}

#[tokio::test]
async fn test_device_load_without_opus() -> Result<()> {
    let mut router_rtp_capabilities = generate_router_rtp_capabilities();
    router_rtp_capabilities
        .codecs
        .retain(|codec| !codec.mime_type.eq_ignore_ascii_case("audio/opus"));

    let factory = FakeHandlerFactory::new();
    let device = new_device(&factory);
    device.load(router_rtp_capabilities).await?;

    assert!(!device.can_produce(MediaKind::Audio).await?);
    assert!(device.can_produce(MediaKind::Video).await?);

    Ok(())
}

#[tokio::test]
async fn test_device_load_invalid_capabilities() -> Result<()> {
    let mut router_rtp_capabilities = generate_router_rtp_capabilities();
    router_rtp_capabilities.codecs[0].mime_type = "opus".to_owned();

    let factory = FakeHandlerFactory::new();
    let device = new_device(&factory);

    let result = device.load(router_rtp_capabilities).await;
    assert!(matches!(result, Err(err) if err.is_parameter()));
    assert!(!device.loaded().await);
    assert!(factory.handlers().iter().skip(1).all(|h| h.is_closed()));

    // A failed load can be retried.
    device.load(generate_router_rtp_capabilities()).await?;
    assert!(device.loaded().await);

    Ok(())
}

#[tokio::test]
async fn test_device_can_produce() -> Result<()> {
    let factory = FakeHandlerFactory::new();
    let device = new_device(&factory);

    let result = device.can_produce(MediaKind::Audio).await;
    assert!(matches!(result, Err(err) if err.is_invalid_state()));

    device.load(generate_router_rtp_capabilities()).await?;

    let result = device.can_produce(MediaKind::Application).await;
    assert!(matches!(result, Err(err) if err.is_parameter()));

    Ok(())
}

#[tokio::test]
async fn test_device_create_transport() -> Result<()> {
    let factory = FakeHandlerFactory::new();
    let device = new_device(&factory);

    let result = device.create_send_transport(transport_options()).await;
    assert!(matches!(result, Err(err) if err.is_invalid_state()));

    device.load(generate_router_rtp_capabilities()).await?;

    let new_transports = Arc::new(AtomicUsize::new(0));
    let n = Arc::clone(&new_transports);
    device.observer().subscribe(move |event| {
        match event {
            DeviceEvent::NewTransport(_) => {
                n.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    });

    let send_transport = device.create_send_transport(transport_options()).await?;
    assert_eq!(send_transport.direction(), TransportDirection::Send);
    assert_eq!(send_transport.handler_name(), "FakeHandler");
    assert!(!send_transport.closed());

    let recv_transport = device.create_recv_transport(transport_options()).await?;
    assert_eq!(recv_transport.direction(), TransportDirection::Recv);
    assert_ne!(send_transport.id(), recv_transport.id());

    assert_eq!(new_transports.load(Ordering::SeqCst), 2);

    let result = device
        .create_send_transport(TransportOptions::default())
        .await;
    assert!(matches!(result, Err(err) if err.is_parameter()));
    assert_eq!(new_transports.load(Ordering::SeqCst), 2);

    send_transport.close().await;
    recv_transport.close().await;

    Ok(())
}
