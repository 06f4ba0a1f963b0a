
pub mod connection_state;
pub(crate) mod transport_internal;
pub mod transport_direction;
pub mod transport_options;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use portable_atomic::{AtomicBool, AtomicU8};
use tokio::sync::Mutex;

pub use connection_state::ConnectionState;
pub use transport_direction::TransportDirection;
pub use transport_options::{
    ConsumerOptions, OnProduceHdlrFn, ProduceRequest, ProducerOptions, RemoteRecvSdpOptions,
    TransportOptions,
};

use crate::api::setting_engine::SettingEngine;
use crate::app_data::{AppData, MediaType};
use crate::consumer::Consumer;
use crate::device::CanProduceByKind;
use crate::dtls_transport::DtlsParameters;
use crate::error::{Error, Result};
use crate::handler::{
    FillRemoteRecvSdpOptions, Handler, HandlerRunOptions, HandlerSendResult, OnConnectHdlrFn,
    PrepareLocalSdpResult, StatsReport,
};
use crate::ice_transport::{IceParameters, IceServer};
use crate::observer::{Event, Observer};
use crate::operation::Operations;
use crate::ortc::{self, ExtendedRtpCapabilities};
use crate::producer::Producer;
use crate::rtp_parameters::{MediaKind, RtpCapabilities, RtpEncodingParameters};
use crate::track::MediaStreamTrack;
use transport_internal::TransportInternal;

/// TransportEvent is emitted by a Transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The handler asked to signal the local DTLS parameters.
    Connect(DtlsParameters),
    ConnectionStateChange(ConnectionState),
    /// A new sender is about to be announced to the server.
    Produce(ProduceRequest),
    NewProducer(Arc<Producer>),
    NewConsumer(Arc<Consumer>),
    Close,
}

impl Event for TransportEvent {
    fn name(&self) -> &'static str {
        match self {
            TransportEvent::Connect(_) => "connect",
            TransportEvent::ConnectionStateChange(_) => "connectionstatechange",
            TransportEvent::Produce(_) => "produce",
            TransportEvent::NewProducer(_) => "newproducer",
            TransportEvent::NewConsumer(_) => "newconsumer",
            TransportEvent::Close => "close",
        }
    }
}

/// What a Device hands to every Transport it creates.
pub(crate) struct TransportParams {
    pub(crate) direction: TransportDirection,
    pub(crate) options: TransportOptions,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) extended_rtp_capabilities: ExtendedRtpCapabilities,
    pub(crate) recv_rtp_capabilities: RtpCapabilities,
    pub(crate) can_produce_by_kind: CanProduceByKind,
    pub(crate) setting_engine: Arc<SettingEngine>,
}

/// Transport is one native ICE/DTLS transport, either sending or
/// receiving. All negotiations on it run one at a time, in call order.
#[derive(Clone)]
pub struct Transport {
    internal: Arc<TransportInternal>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("id", &self.internal.id)
            .field("direction", &self.internal.direction)
            .field("connection_state", &self.connection_state())
            .field("closed", &self.closed())
            .finish()
    }
}

impl Transport {
    pub(crate) async fn new(params: TransportParams) -> Result<Self> {
        let TransportParams {
            direction,
            options,
            handler,
            extended_rtp_capabilities,
            recv_rtp_capabilities,
            can_produce_by_kind,
            setting_engine,
        } = params;
        log::debug!("new() [id:{}, direction:{}]", options.id, direction);

        options.validate()?;

        let reuse_media_sections = options
            .reuse_media_sections
            .unwrap_or(setting_engine.reuse_media_sections);

        let internal = Arc::new(TransportInternal {
            id: options.id.clone(),
            direction,
            handler: Arc::clone(&handler),
            extended_rtp_capabilities: extended_rtp_capabilities.clone(),
            recv_rtp_capabilities,
            can_produce_by_kind,
            max_sctp_message_size: options.sctp_parameters.map(|p| p.max_message_size),
            app_data: options.app_data.clone(),
            setting_engine,
            is_closed: AtomicBool::new(false),
            connection_state: AtomicU8::new(ConnectionState::New.into()),
            ops: Operations::new(),
            producers: Mutex::new(Default::default()),
            consumers: Mutex::new(Default::default()),
            on_connect_handler: ArcSwapOption::empty(),
            on_produce_handler: ArcSwapOption::empty(),
            observer: Observer::new(),
        });

        let weak = Arc::downgrade(&internal);
        handler.on_connect(Box::new(move |dtls_parameters: DtlsParameters| {
            let weak = weak.clone();
            Box::pin(async move {
                match weak.upgrade() {
                    Some(internal) => internal.handle_connect(dtls_parameters).await,
                    None => Err(Error::closed()),
                }
            })
        }));

        let weak = Arc::downgrade(&internal);
        handler.on_connection_state_change(Box::new(move |state: ConnectionState| {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(internal) = weak.upgrade() {
                    internal.handle_connection_state_change(state);
                }
            })
        }));

        handler
            .run(HandlerRunOptions {
                direction,
                ice_parameters: options.ice_parameters,
                ice_candidates: options.ice_candidates,
                dtls_parameters: options.dtls_parameters,
                sctp_parameters: options.sctp_parameters,
                ice_servers: options.ice_servers,
                ice_transport_policy: options.ice_transport_policy,
                additional_settings: options.additional_settings,
                extended_rtp_capabilities,
                reuse_media_sections,
                app_data: options.app_data,
            })
            .await?;

        Ok(Transport { internal })
    }

    pub fn id(&self) -> &str {
        &self.internal.id
    }

    pub fn direction(&self) -> TransportDirection {
        self.internal.direction
    }

    pub fn handler_name(&self) -> &str {
        self.internal.handler.name()
    }

    pub fn closed(&self) -> bool {
        self.internal.closed()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.internal.connection_state()
    }

    pub fn max_sctp_message_size(&self) -> Option<u32> {
        self.internal.max_sctp_message_size
    }

    pub fn app_data(&self) -> Option<&serde_json::Value> {
        self.internal.app_data.as_ref()
    }

    pub fn observer(&self) -> &Observer<TransportEvent> {
        &self.internal.observer
    }

    pub async fn producers(&self) -> Vec<Arc<Producer>> {
        self.internal.producers.lock().await.values().cloned().collect()
    }

    pub async fn producer(&self, id: &str) -> Option<Arc<Producer>> {
        self.internal.producers.lock().await.get(id).cloned()
    }

    pub async fn consumers(&self) -> Vec<Arc<Consumer>> {
        self.internal.consumers.lock().await.values().cloned().collect()
    }

    pub async fn consumer(&self, id: &str) -> Option<Arc<Consumer>> {
        self.internal.consumers.lock().await.get(id).cloned()
    }

    /// on_connect sets the listener that signals the local DTLS parameters
    /// to the server. It must resolve once the server acknowledged them.
    pub fn on_connect(&self, f: OnConnectHdlrFn) {
        self.internal
            .on_connect_handler
            .store(Some(Arc::new(Mutex::new(f))));
    }

    /// on_produce sets the listener that announces a new Producer to the
    /// server. It resolves to the server side Producer id.
    pub fn on_produce(&self, f: OnProduceHdlrFn) {
        self.internal
            .on_produce_handler
            .store(Some(Arc::new(Mutex::new(f))));
    }

    /// produce starts sending a track.
    pub async fn produce(&self, options: ProducerOptions) -> Result<Arc<Producer>> {
        log::debug!(
            "produce() [track.id:{:?}]",
            options.track.as_ref().map(|t| t.id())
        );

        let Some(track) = options.track.clone() else {
            return Err(Error::ErrParameter("missing track".to_owned()));
        };
        let kind = track.kind();
        if self.internal.direction != TransportDirection::Send {
            return Err(Error::ErrUnsupported("not a sending Transport".to_owned()));
        }
        if !self.internal.can_produce(kind) {
            return Err(Error::ErrUnsupported(format!("cannot produce {kind}")));
        }
        if track.is_ended() {
            return Err(Error::ErrInvalidState("track ended".to_owned()));
        }
        if self.internal.on_produce_handler.load().is_none() {
            return Err(Error::ErrParameter(
                "no \"produce\" listener set into this transport".to_owned(),
            ));
        }
        if let Some(track_low) = &options.track_low {
            if track_low.kind() != kind {
                return Err(Error::ErrParameter(
                    "trackLow kind does not match track kind".to_owned(),
                ));
            }
        }
        let app_data = options
            .app_data
            .clone()
            .unwrap_or_else(|| AppData::default_for(kind));
        app_data.validate_local(kind)?;

        let stop_tracks = options
            .stop_tracks
            .unwrap_or(self.internal.setting_engine.stop_tracks);
        let track_low = options.track_low.clone();

        let internal = Arc::clone(&self.internal);
        let queued_track = Arc::clone(&track);
        let result = self
            .internal
            .ops
            .push("produce", move || async move {
                internal
                    .produce(queued_track, options, Arc::new(app_data))
                    .await
            })
            .await;

        if let Err(err) = &result {
            log::debug!("produce() | failed: {}", err);
            if stop_tracks {
                track.stop();
                if let Some(track_low) = track_low {
                    track_low.stop();
                }
            }
        }

        result
    }

    /// consume starts receiving a remote stream.
    pub async fn consume(&self, options: ConsumerOptions) -> Result<Arc<Consumer>> {
        log::debug!("consume() [id:{}]", options.id);

        if self.closed() {
            return Err(Error::closed());
        }
        if self.internal.direction != TransportDirection::Recv {
            return Err(Error::ErrUnsupported("not a receiving Transport".to_owned()));
        }
        if options.id.is_empty() {
            return Err(Error::ErrParameter("missing id".to_owned()));
        }
        if options.producer_id.is_empty() {
            return Err(Error::ErrParameter("missing producerId".to_owned()));
        }
        if !options.kind.is_media() {
            return Err(Error::ErrParameter(format!("invalid kind {}", options.kind)));
        }
        let app_data = match options.app_data.clone() {
            Some(app_data) => {
                app_data.validate_remote(options.kind)?;
                app_data
            }
            None => AppData::default_remote(options.kind),
        };

        let internal = Arc::clone(&self.internal);
        self.internal
            .ops
            .push("consume", move || async move {
                internal.consume(options, Arc::new(app_data)).await
            })
            .await
    }

    /// prepare_local_sdp adds a receiving section for a stream of
    /// `remote_uid` and returns the resulting local offer.
    pub async fn prepare_local_sdp(
        &self,
        kind: MediaKind,
        remote_uid: &str,
    ) -> Result<PrepareLocalSdpResult> {
        log::debug!("prepare_local_sdp() [kind:{}, remote_uid:{}]", kind, remote_uid);
        if self.closed() {
            return Err(Error::closed());
        }

        let internal = Arc::clone(&self.internal);
        let remote_uid = remote_uid.to_owned();
        self.internal
            .ops
            .push("prepare_local_sdp", move || async move {
                internal.prepare_local_sdp(kind, &remote_uid).await
            })
            .await
    }

    /// recover_local_sdp frees the receiving section prepared for
    /// `remote_uid` so a later prepare_local_sdp can take it.
    pub async fn recover_local_sdp(
        &self,
        remote_uid: &str,
        mid: Option<&str>,
        kind: MediaKind,
    ) -> Result<()> {
        log::debug!("recover_local_sdp() [remote_uid:{}, mid:{:?}]", remote_uid, mid);
        if self.closed() {
            return Err(Error::closed());
        }

        let handler = Arc::clone(&self.internal.handler);
        let remote_uid = remote_uid.to_owned();
        let mid = mid.map(str::to_owned);
        self.internal
            .ops
            .push("recover_local_sdp", move || async move {
                handler
                    .recover_transceiver(&remote_uid, mid.as_deref(), kind)
                    .await
            })
            .await
    }

    /// fill_remote_recv_sdp applies the server answer to a locally sent
    /// offer.
    pub async fn fill_remote_recv_sdp(&self, options: RemoteRecvSdpOptions) -> Result<()> {
        log::debug!("fill_remote_recv_sdp() [kind:{}]", options.kind);
        if self.closed() {
            return Err(Error::closed());
        }
        options.ice_parameters.validate()?;
        options.dtls_parameters.validate()?;

        let app_data = match options.app_data {
            Some(app_data) => {
                app_data.validate_local(options.kind)?;
                app_data
            }
            None => AppData::default_for(options.kind),
        };
        let handler = Arc::clone(&self.internal.handler);
        let fill_options = FillRemoteRecvSdpOptions {
            kind: options.kind,
            app_data,
            ice_parameters: options.ice_parameters,
            ice_candidates: options.ice_candidates,
            dtls_parameters: options.dtls_parameters,
            sctp_parameters: options.sctp_parameters,
            sending_rtp_parameters: options.sending_rtp_parameters,
            codec_options: options.codec_options,
            offer: options.offer,
            codec: options.codec,
            audio_profile: options.audio_profile,
        };
        self.internal
            .ops
            .push("fill_remote_recv_sdp", move || async move {
                handler.fill_remote_recv_sdp(fill_options).await
            })
            .await
    }

    /// restart_ice applies new remote ICE credentials.
    pub async fn restart_ice(&self, ice_parameters: IceParameters) -> Result<()> {
        log::debug!("restart_ice()");
        if self.closed() {
            return Err(Error::closed());
        }
        ice_parameters.validate()?;

        let handler = Arc::clone(&self.internal.handler);
        self.internal
            .ops
            .push("restart_ice", move || async move {
                handler.restart_ice(ice_parameters).await
            })
            .await
    }

    pub async fn update_ice_servers(&self, ice_servers: Vec<IceServer>) -> Result<()> {
        log::debug!("update_ice_servers()");
        if self.closed() {
            return Err(Error::closed());
        }
        for ice_server in &ice_servers {
            ice_server.validate()?;
        }

        let handler = Arc::clone(&self.internal.handler);
        self.internal
            .ops
            .push("update_ice_servers", move || async move {
                handler.update_ice_servers(ice_servers).await
            })
            .await
    }

    /// get_stats reads the transport statistics without waiting for queued
    /// operations.
    pub async fn get_stats(&self) -> Result<StatsReport> {
        if self.closed() {
            return Err(Error::closed());
        }
        self.internal.handler.get_transport_stats().await
    }

    /// flush waits until every operation queued so far has finished.
    pub async fn flush(&self) {
        self.internal.ops.done().await;
    }

    /// close tears the transport down. Operations still waiting in the queue
    /// fail with `ErrInvalidState("closed")`; one already running finishes.
    pub async fn close(&self) {
        if self.internal.is_closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("close() [id:{}]", self.internal.id);

        self.internal.ops.close();
        self.internal.handler.close().await;
        self.internal
            .connection_state
            .store(ConnectionState::Closed.into(), Ordering::SeqCst);

        let producers: Vec<Arc<Producer>> = self
            .internal
            .producers
            .lock()
            .await
            .drain()
            .map(|(_, producer)| producer)
            .collect();
        for producer in producers {
            producer.transport_closed().await;
        }

        let consumers: Vec<Arc<Consumer>> = self
            .internal
            .consumers
            .lock()
            .await
            .drain()
            .map(|(_, consumer)| consumer)
            .collect();
        for consumer in consumers {
            consumer.transport_closed().await;
        }

        self.internal.observer.safe_emit(TransportEvent::Close);
    }
}
