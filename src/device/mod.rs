#[cfg(test)]
mod device_test;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::setting_engine::SettingEngine;
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerFactory};
use crate::observer::{Event, Observer};
use crate::ortc::{self, ExtendedRtpCapabilities};
use crate::rtp_parameters::{MediaKind, RtpCapabilities};
use crate::sctp_transport::SctpCapabilities;
use crate::transport::{Transport, TransportDirection, TransportOptions, TransportParams};

/// DeviceEvent is emitted by a Device.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    NewTransport(Transport),
}

impl Event for DeviceEvent {
    fn name(&self) -> &'static str {
        match self {
            DeviceEvent::NewTransport(_) => "newtransport",
        }
    }
}

/// Whether the negotiated capabilities allow sending each media kind.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct CanProduceByKind {
    pub(crate) audio: bool,
    pub(crate) video: bool,
}

impl CanProduceByKind {
    pub(crate) fn get(&self, kind: MediaKind) -> Option<bool> {
        match kind {
            MediaKind::Audio => Some(self.audio),
            MediaKind::Video => Some(self.video),
            _ => None,
        }
    }
}

#[derive(Default, Clone)]
struct LoadedState {
    extended_rtp_capabilities: ExtendedRtpCapabilities,
    recv_rtp_capabilities: RtpCapabilities,
    sctp_capabilities: SctpCapabilities,
    can_produce_by_kind: CanProduceByKind,
}

/// Device negotiates the media capabilities of the local engine with the
/// router once, and then creates the transports.
pub struct Device {
    handler_factory: HandlerFactory,
    handler_name: String,
    setting_engine: Arc<SettingEngine>,
    loaded: Mutex<Option<LoadedState>>,
    observer: Observer<DeviceEvent>,
}

impl Device {
    pub(crate) fn new(handler_factory: HandlerFactory, setting_engine: Arc<SettingEngine>) -> Self {
        let handler_name = {
            let handler = handler_factory();
            handler.name().to_owned()
        };
        log::debug!("new() [handler:{}]", handler_name);

        Device {
            handler_factory,
            handler_name,
            setting_engine,
            loaded: Mutex::new(None),
            observer: Observer::new(),
        }
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub async fn loaded(&self) -> bool {
        self.loaded.lock().await.is_some()
    }

    pub fn observer(&self) -> &Observer<DeviceEvent> {
        &self.observer
    }

    /// rtp_capabilities are the capabilities the server needs to send media
    /// to this device.
    pub async fn rtp_capabilities(&self) -> Result<RtpCapabilities> {
        Ok(self.state().await?.recv_rtp_capabilities)
    }

    pub async fn sctp_capabilities(&self) -> Result<SctpCapabilities> {
        Ok(self.state().await?.sctp_capabilities)
    }

    /// load negotiates with the router capabilities. It can only succeed
    /// once; a failed load may be retried. Concurrent calls are not
    /// supported.
    pub async fn load(&self, router_rtp_capabilities: RtpCapabilities) -> Result<()> {
        log::debug!("load()");

        if self.loaded().await {
            return Err(Error::ErrInvalidState("already loaded".to_owned()));
        }

        let handler = (self.handler_factory)();
        let result = self.negotiate(handler.as_ref(), router_rtp_capabilities).await;
        handler.close().await;

        match result {
            Ok(state) => {
                log::debug!(
                    "load() | succeeded [can_produce audio:{}, video:{}]",
                    state.can_produce_by_kind.audio,
                    state.can_produce_by_kind.video
                );
                *self.loaded.lock().await = Some(state);
                Ok(())
            }
            Err(err) => {
                log::error!("load() | failed: {}", err);
                Err(err)
            }
        }
    }

    async fn negotiate(
        &self,
        handler: &dyn Handler,
        mut router_rtp_capabilities: RtpCapabilities,
    ) -> Result<LoadedState> {
        ortc::validate_rtp_capabilities(&mut router_rtp_capabilities)?;

        let mut native_rtp_capabilities = handler.get_native_rtp_capabilities().await?;
        log::debug!(
            "load() | got native RTP capabilities [codecs:{}]",
            native_rtp_capabilities.codecs.len()
        );
        ortc::validate_rtp_capabilities(&mut native_rtp_capabilities)?;

        let extended_rtp_capabilities = ortc::get_extended_rtp_capabilities(
            &native_rtp_capabilities,
            &router_rtp_capabilities,
        );

        let can_produce_by_kind = CanProduceByKind {
            audio: ortc::can_send(MediaKind::Audio, &extended_rtp_capabilities),
            video: ortc::can_send(MediaKind::Video, &extended_rtp_capabilities),
        };

        let mut recv_rtp_capabilities = ortc::get_recv_rtp_capabilities(&extended_rtp_capabilities);
        ortc::validate_rtp_capabilities(&mut recv_rtp_capabilities)?;

        let sctp_capabilities = handler.get_native_sctp_capabilities().await?;
        ortc::validate_sctp_capabilities(&sctp_capabilities)?;

        Ok(LoadedState {
            extended_rtp_capabilities,
            recv_rtp_capabilities,
            sctp_capabilities,
            can_produce_by_kind,
        })
    }

    /// can_produce tells whether a track of `kind` can be sent.
    pub async fn can_produce(&self, kind: MediaKind) -> Result<bool> {
        let state = self.state().await?;
        state
            .can_produce_by_kind
            .get(kind)
            .ok_or_else(|| Error::ErrParameter(format!("invalid kind {kind}")))
    }

    pub async fn create_send_transport(&self, options: TransportOptions) -> Result<Transport> {
        log::debug!("create_send_transport()");
        self.create_transport(TransportDirection::Send, options).await
    }

    pub async fn create_recv_transport(&self, options: TransportOptions) -> Result<Transport> {
        log::debug!("create_recv_transport()");
        self.create_transport(TransportDirection::Recv, options).await
    }

    async fn create_transport(
        &self,
        direction: TransportDirection,
        options: TransportOptions,
    ) -> Result<Transport> {
        let state = self.state().await?;

        let transport = Transport::new(TransportParams {
            direction,
            options,
            handler: (self.handler_factory)(),
            extended_rtp_capabilities: state.extended_rtp_capabilities,
            recv_rtp_capabilities: state.recv_rtp_capabilities,
            can_produce_by_kind: state.can_produce_by_kind,
            setting_engine: Arc::clone(&self.setting_engine),
        })
        .await?;

        self.observer
            .safe_emit(DeviceEvent::NewTransport(transport.clone()));

        Ok(transport)
    }

    async fn state(&self) -> Result<LoadedState> {
        self.loaded
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::ErrInvalidState("not loaded".to_owned()))
    }
}
