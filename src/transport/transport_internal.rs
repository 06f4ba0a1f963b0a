use std::collections::HashMap;
use std::sync::Weak;

use super::*;
use crate::consumer::{ConsumerChannel, ConsumerParams};
use crate::handler::{HandlerReceiveOptions, HandlerSendOptions};
use crate::producer::{ProducerChannel, ProducerParams};

pub(crate) struct TransportInternal {
    pub(super) id: String,
    pub(super) direction: TransportDirection,
    pub(super) handler: Arc<dyn Handler>,
    pub(super) extended_rtp_capabilities: ExtendedRtpCapabilities,
    pub(super) recv_rtp_capabilities: RtpCapabilities,
    pub(super) can_produce_by_kind: CanProduceByKind,
    pub(super) max_sctp_message_size: Option<u32>,
    pub(super) app_data: Option<serde_json::Value>,
    pub(super) setting_engine: Arc<SettingEngine>,

    pub(super) is_closed: AtomicBool,
    pub(super) connection_state: AtomicU8,

    /// ops is an operations queue which will ensure the enqueued actions are
    /// executed in order. Every native negotiation goes through it.
    pub(super) ops: Operations,

    pub(super) producers: Mutex<HashMap<String, Arc<Producer>>>,
    pub(super) consumers: Mutex<HashMap<String, Arc<Consumer>>>,

    pub(super) on_connect_handler: ArcSwapOption<Mutex<OnConnectHdlrFn>>,
    pub(super) on_produce_handler: ArcSwapOption<Mutex<OnProduceHdlrFn>>,
    pub(super) observer: Observer<TransportEvent>,
}

impl TransportInternal {
    pub(super) fn closed(&self) -> bool {
        self.is_closed.load(Ordering::SeqCst)
    }

    pub(super) fn connection_state(&self) -> ConnectionState {
        self.connection_state.load(Ordering::SeqCst).into()
    }

    /// handle_connect answers the handler's request to signal the local DTLS
    /// parameters.
    pub(super) async fn handle_connect(&self, dtls_parameters: DtlsParameters) -> Result<()> {
        if self.closed() {
            return Err(Error::closed());
        }
        log::debug!("handle_connect() [id:{}]", self.id);

        self.observer
            .safe_emit(TransportEvent::Connect(dtls_parameters.clone()));

        let Some(handler) = self.on_connect_handler.load_full() else {
            return Err(Error::ErrSignaling(
                "no \"connect\" listener set into this transport".to_owned(),
            ));
        };
        let mut f = handler.lock().await;
        f(dtls_parameters).await
    }

    pub(super) fn handle_connection_state_change(&self, state: ConnectionState) {
        if self.closed() {
            log::debug!(
                "handle_connection_state_change() | transport closed, dropping [state:{}]",
                state
            );
            return;
        }

        let previous: ConnectionState = self
            .connection_state
            .swap(state.into(), Ordering::SeqCst)
            .into();
        if previous == state {
            return;
        }

        log::debug!("connection state changed to {} [id:{}]", state, self.id);
        self.observer
            .safe_emit(TransportEvent::ConnectionStateChange(state));
    }

    pub(super) fn can_produce(&self, kind: MediaKind) -> bool {
        self.can_produce_by_kind.get(kind).unwrap_or(false)
    }

    pub(super) async fn produce(
        self: &Arc<Self>,
        track: Arc<MediaStreamTrack>,
        options: ProducerOptions,
        app_data: Arc<AppData>,
    ) -> Result<Arc<Producer>> {
        let media_type = app_data.media_type();
        let encodings: Vec<RtpEncodingParameters> =
            options.encodings.iter().map(normalize_encoding).collect();

        let send_result = self
            .handler
            .send(HandlerSendOptions {
                track: Arc::clone(&track),
                track_low: options.track_low.clone(),
                encodings,
                codec_options: options.codec_options.clone(),
                codec: options.codec.clone(),
                app_data: Arc::clone(&app_data),
            })
            .await?;
        let local_id = send_result.local_id.clone();

        match self
            .complete_produce(track, &options, send_result, Arc::clone(&app_data))
            .await
        {
            Ok(producer) => Ok(producer),
            Err(err) => {
                if let Err(stop_err) = self.handler.stop_sending(&local_id, media_type).await {
                    log::warn!("produce() | stop_sending failed: {}", stop_err);
                }
                Err(err)
            }
        }
    }

    async fn complete_produce(
        self: &Arc<Self>,
        track: Arc<MediaStreamTrack>,
        options: &ProducerOptions,
        send_result: HandlerSendResult,
        app_data: Arc<AppData>,
    ) -> Result<Arc<Producer>> {
        let mut rtp_parameters = send_result.rtp_parameters;
        ortc::validate_rtp_parameters(&mut rtp_parameters)?;

        let request = ProduceRequest {
            kind: track.kind(),
            rtp_parameters: rtp_parameters.clone(),
            app_data: Arc::clone(&app_data),
            local_dtls_parameters: send_result.dtls_parameters,
            offer: send_result.offer,
        };
        self.observer
            .safe_emit(TransportEvent::Produce(request.clone()));

        let id = self.signal_produce(request).await?;
        if self.closed() {
            return Err(Error::closed());
        }

        let weak = Arc::downgrade(self);
        let channel: Weak<dyn ProducerChannel> = weak;
        let producer = Producer::new(ProducerParams {
            id: id.clone(),
            local_id: send_result.local_id,
            local_id_low: send_result.local_id_low,
            rtp_sender: send_result.rtp_sender,
            track,
            track_low: options.track_low.clone(),
            rtp_parameters,
            stop_tracks: options
                .stop_tracks
                .unwrap_or(self.setting_engine.stop_tracks),
            disable_track_on_pause: options
                .disable_track_on_pause
                .unwrap_or(self.setting_engine.disable_track_on_pause),
            zero_rtp_on_pause: options
                .zero_rtp_on_pause
                .unwrap_or(self.setting_engine.zero_rtp_on_pause),
            app_data,
            channel,
        });

        {
            // close() marks the transport closed before draining the registry.
            let mut producers = self.producers.lock().await;
            if self.closed() {
                return Err(Error::closed());
            }
            producers.insert(id, Arc::clone(&producer));
        }
        self.observer
            .safe_emit(TransportEvent::NewProducer(Arc::clone(&producer)));

        Ok(producer)
    }

    async fn signal_produce(&self, request: ProduceRequest) -> Result<String> {
        let Some(handler) = self.on_produce_handler.load_full() else {
            return Err(Error::ErrParameter(
                "no \"produce\" listener set into this transport".to_owned(),
            ));
        };

        let id = {
            let mut f = handler.lock().await;
            f(request).await?
        };
        if id.is_empty() {
            return Err(Error::ErrSignaling("empty producer id".to_owned()));
        }

        Ok(id)
    }

    pub(super) async fn consume(
        self: &Arc<Self>,
        options: ConsumerOptions,
        app_data: Arc<AppData>,
    ) -> Result<Arc<Consumer>> {
        match ortc::can_receive(&options.rtp_parameters, &self.extended_rtp_capabilities) {
            Ok(true) => {}
            Ok(false) => log::warn!(
                "consume() | cannot consume this Producer, trying anyway [producer_id:{}]",
                options.producer_id
            ),
            Err(err) => log::warn!(
                "consume() | capability check failed, trying anyway [producer_id:{}]: {}",
                options.producer_id,
                err
            ),
        }

        let receive_result = self
            .handler
            .receive(HandlerReceiveOptions {
                track_id: options.id.clone(),
                kind: options.kind,
                rtp_parameters: options.rtp_parameters.clone(),
                offer: options.offer,
                remote_uid: app_data.remote_uid().map(str::to_owned),
                probe_ssrc: options.probe_ssrc,
                ice_parameters: options.ice_parameters,
                ice_candidates: options.ice_candidates,
                dtls_parameters: options.dtls_parameters,
                sctp_parameters: options.sctp_parameters,
            })
            .await?;
        if self.closed() {
            return Err(Error::closed());
        }

        let weak = Arc::downgrade(self);
        let channel: Weak<dyn ConsumerChannel> = weak;
        let consumer = Consumer::new(ConsumerParams {
            id: options.id.clone(),
            local_id: receive_result.local_id,
            producer_id: options.producer_id,
            rtp_receiver: receive_result.rtp_receiver,
            track: receive_result.track,
            rtp_parameters: options.rtp_parameters,
            disable_track_on_pause: self.setting_engine.disable_track_on_pause,
            app_data,
            channel,
        });

        {
            let mut consumers = self.consumers.lock().await;
            if self.closed() {
                return Err(Error::closed());
            }
            consumers.insert(options.id, Arc::clone(&consumer));
        }
        self.observer
            .safe_emit(TransportEvent::NewConsumer(Arc::clone(&consumer)));

        Ok(consumer)
    }

    pub(super) async fn prepare_local_sdp(
        &self,
        kind: MediaKind,
        remote_uid: &str,
    ) -> Result<PrepareLocalSdpResult> {
        let mut result = self.handler.prepare_local_sdp(kind, remote_uid).await?;

        if let Some(native_rtp_capabilities) = result.rtp_capabilities.take() {
            let extended = ortc::get_extended_rtp_capabilities(
                &native_rtp_capabilities,
                &self.recv_rtp_capabilities,
            );
            result.rtp_capabilities = Some(ortc::get_recv_rtp_capabilities(&extended));
        }

        Ok(result)
    }

    /// enqueue_detached queues `task` without waiting for it. Failures are
    /// only logged.
    fn enqueue_detached<F, Fut>(&self, description: &'static str, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        match self.ops.push_deferred(description, task) {
            Ok(result_rx) => {
                tokio::spawn(async move {
                    match result_rx.await {
                        Ok(Err(err)) => log::warn!("{} failed: {}", description, err),
                        Err(_) => log::debug!("{} dropped, transport closed", description),
                        Ok(Ok(())) => {}
                    }
                });
            }
            Err(err) => log::debug!("{} not queued: {}", description, err),
        }
    }
}

#[async_trait]
impl ProducerChannel for TransportInternal {
    async fn producer_closed(&self, producer_id: &str, local_id: &str, media_type: MediaType) {
        self.producers.lock().await.remove(producer_id);
        if self.closed() {
            return;
        }

        let handler = Arc::clone(&self.handler);
        let local_id = local_id.to_owned();
        self.enqueue_detached("producer close", move || async move {
            handler.stop_sending(&local_id, media_type).await
        });
    }

    async fn replace_track(
        &self,
        local_id: &str,
        track: Option<Arc<MediaStreamTrack>>,
    ) -> Result<()> {
        let handler = Arc::clone(&self.handler);
        let local_id = local_id.to_owned();
        self.ops
            .push("producer replace_track", move || async move {
                handler.replace_track(&local_id, track).await
            })
            .await
    }

    async fn set_max_spatial_layer(&self, local_id: &str, spatial_layer: u8) -> Result<()> {
        let handler = Arc::clone(&self.handler);
        let local_id = local_id.to_owned();
        self.ops
            .push("producer set_max_spatial_layer", move || async move {
                handler.set_max_spatial_layer(&local_id, spatial_layer).await
            })
            .await
    }

    async fn set_rtp_encoding_parameters(
        &self,
        local_id: &str,
        params: RtpEncodingParameters,
    ) -> Result<()> {
        let handler = Arc::clone(&self.handler);
        let local_id = local_id.to_owned();
        self.ops
            .push("producer set_rtp_encoding_parameters", move || async move {
                handler.set_rtp_encoding_parameters(&local_id, params).await
            })
            .await
    }

    async fn get_sender_stats(&self, local_id: &str) -> Result<StatsReport> {
        if self.closed() {
            return Err(Error::closed());
        }
        self.handler.get_sender_stats(local_id).await
    }
}

#[async_trait]
impl ConsumerChannel for TransportInternal {
    async fn consumer_closed(&self, consumer_id: &str, local_id: &str) {
        self.consumers.lock().await.remove(consumer_id);
        if self.closed() {
            return;
        }

        let handler = Arc::clone(&self.handler);
        let local_id = local_id.to_owned();
        self.enqueue_detached("consumer close", move || async move {
            handler.stop_receiving(&local_id).await
        });
    }

    async fn get_receiver_stats(&self, local_id: &str) -> Result<StatsReport> {
        if self.closed() {
            return Err(Error::closed());
        }
        self.handler.get_receiver_stats(local_id).await
    }
}

/// normalize_encoding keeps the fields a caller may set and turns an unset
/// `active` into `true`.
pub(super) fn normalize_encoding(encoding: &RtpEncodingParameters) -> RtpEncodingParameters {
    RtpEncodingParameters {
        active: Some(encoding.active.unwrap_or(true)),
        dtx: encoding.dtx,
        scalability_mode: encoding.scalability_mode.clone(),
        scale_resolution_down_by: encoding.scale_resolution_down_by,
        max_bitrate: encoding.max_bitrate,
        max_framerate: encoding.max_framerate,
        adaptive_ptime: encoding.adaptive_ptime,
        priority: encoding.priority,
        network_priority: encoding.network_priority,
        ..Default::default()
    }
}
