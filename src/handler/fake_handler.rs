//! FakeHandler is an in-process Handler. It keeps a model of the native
//! peer connection (one transceiver per media section), renders the local
//! offer from it and drives a real RemoteSdp for the answers, so every
//! request the negotiation engine makes can be observed and checked.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use portable_atomic::AtomicBool;
use sdp::description::common::Attribute;
use sdp::description::media::MediaDescription;
use sdp::description::session::{
    Origin, TimeDescription, Timing, ATTR_KEY_GROUP, ATTR_KEY_INACTIVE, ATTR_KEY_RECV_ONLY,
    ATTR_KEY_SEND_ONLY, ATTR_KEY_SEND_RECV,
};
use sdp::SessionDescription;
use serde_json::json;
use tokio::sync::Mutex;

use super::fake_parameters::*;
use super::*;
use crate::dtls_transport::DtlsRole;
use crate::error::Error;
use crate::ortc;
use crate::remote_sdp::{ReceiveParams, RemoteSdp, RemoteSdpOptions, SendParams};
use crate::rtp_parameters::{RtpCodecParameters, RtxParameters};

const FAKE_HANDLER_NAME: &str = "FakeHandler";

/// HandlerRequest is one native request FakeHandler received.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerRequest {
    Send {
        local_id: String,
        kind: MediaKind,
    },
    StopSending {
        local_id: String,
        media_type: MediaType,
    },
    ReplaceTrack {
        local_id: String,
        track_id: Option<String>,
    },
    SetMaxSpatialLayer {
        local_id: String,
        spatial_layer: u8,
    },
    SetRtpEncodingParameters {
        local_id: String,
    },
    Receive {
        local_id: String,
        track_id: String,
    },
    StopReceiving {
        local_id: String,
    },
    PrepareLocalSdp {
        mid: String,
        reused: bool,
    },
    RecoverTransceiver {
        mid: Option<String>,
    },
    FillRemoteRecvSdp {
        mid: String,
    },
    RestartIce,
    UpdateIceServers {
        count: usize,
    },
    Close,
}

/// Native receiver handed out by FakeHandler::receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRtpReceiver {
    pub mid: String,
    pub track_id: String,
}

#[derive(Debug)]
struct FakeTransceiver {
    mid: String,
    kind: MediaKind,
    sending: bool,
    stopped: bool,
    /// Free for the next prepare_local_sdp of the same kind.
    useless: bool,
    track: Option<Arc<MediaStreamTrack>>,
    rtp_parameters: RtpParameters,
    remote_uid: Option<String>,
}

impl FakeTransceiver {
    fn local_media(&self, native_rtp_capabilities: &RtpCapabilities) -> MediaDescription {
        let media = if self.sending {
            let track_id = self.track.as_ref().map(|t| t.id()).unwrap_or("-");
            generate_local_offer_media(&self.mid, self.kind, &self.rtp_parameters, track_id)
        } else {
            generate_local_recv_media(&self.mid, self.kind, native_rtp_capabilities)
        };

        if self.stopped {
            with_direction(media, ATTR_KEY_INACTIVE)
        } else {
            media
        }
    }
}

#[derive(Default)]
struct FakeHandlerState {
    direction: Option<TransportDirection>,
    ice_parameters: Option<IceParameters>,
    ice_candidates: Vec<IceCandidate>,
    dtls_parameters: Option<DtlsParameters>,
    sctp_parameters: Option<SctpParameters>,
    ice_servers: Vec<IceServer>,
    reuse_media_sections: bool,
    extended_rtp_capabilities: ExtendedRtpCapabilities,
    sending_rtp_parameters_by_kind: HashMap<MediaKind, RtpParameters>,
    sending_remote_rtp_parameters_by_kind: HashMap<MediaKind, RtpParameters>,
    remote_sdp: Option<RemoteSdp>,
    transport_ready: bool,
    transceivers: Vec<FakeTransceiver>,
    map_mid_transceiver: HashMap<String, usize>,
    next_mid: u32,
    cname: String,
    local_version: u64,
    local_description: Option<String>,
    remote_description: Option<String>,
}

impl FakeHandlerState {
    fn assert_direction(&self, direction: TransportDirection) -> Result<()> {
        if self.direction != Some(direction) {
            return Err(Error::ErrUnsupported(format!(
                "method can just be called for handlers with \"{direction}\" direction"
            )));
        }
        Ok(())
    }

    fn add_transceiver(&mut self, kind: MediaKind, sending: bool) -> usize {
        let mid = self.next_mid.to_string();
        self.next_mid += 1;

        let idx = self.transceivers.len();
        self.transceivers.push(FakeTransceiver {
            mid: mid.clone(),
            kind,
            sending,
            stopped: false,
            useless: false,
            track: None,
            rtp_parameters: RtpParameters::default(),
            remote_uid: None,
        });
        self.map_mid_transceiver.insert(mid, idx);
        idx
    }

    fn transceiver_mut(&mut self, local_id: &str) -> Result<&mut FakeTransceiver> {
        let idx = self
            .map_mid_transceiver
            .get(local_id)
            .copied()
            .ok_or_else(|| {
                Error::ErrNotFound(format!("associated transceiver not found [mid:{local_id}]"))
            })?;
        Ok(&mut self.transceivers[idx])
    }

    fn ensure_remote_sdp(
        &mut self,
        ice_parameters: Option<&IceParameters>,
        ice_candidates: &[IceCandidate],
        dtls_parameters: Option<&DtlsParameters>,
        sctp_parameters: Option<&SctpParameters>,
    ) -> Result<&mut RemoteSdp> {
        if self.remote_sdp.is_none() {
            let ice_parameters = ice_parameters.or(self.ice_parameters.as_ref()).cloned();
            let dtls_parameters = dtls_parameters.or(self.dtls_parameters.as_ref()).cloned();
            if ice_parameters.is_none() || dtls_parameters.is_none() {
                return Err(Error::ErrInvalidState(
                    "missing remote transport parameters".to_owned(),
                ));
            }
            let ice_candidates = if ice_candidates.is_empty() {
                self.ice_candidates.clone()
            } else {
                ice_candidates.to_vec()
            };

            let mut remote_sdp = RemoteSdp::new(RemoteSdpOptions {
                ice_parameters,
                ice_candidates,
                dtls_parameters,
                sctp_parameters: sctp_parameters.or(self.sctp_parameters.as_ref()).copied(),
                plan_b: false,
                reuse_media_sections: self.reuse_media_sections,
            });
            remote_sdp.update_dtls_role(DtlsRole::Client);
            self.remote_sdp = Some(remote_sdp);
        }

        self.remote_sdp
            .as_mut()
            .ok_or_else(|| Error::ErrInvalidState("remote description unavailable".to_owned()))
    }

    fn render_local_description(&mut self, native_rtp_capabilities: &RtpCapabilities) -> String {
        self.local_version += 1;

        let mut bundle = "BUNDLE".to_owned();
        for transceiver in &self.transceivers {
            bundle.push(' ');
            bundle.push_str(&transceiver.mid);
        }

        let session = SessionDescription {
            version: 0,
            origin: Origin {
                username: "-".to_owned(),
                session_id: 4_611_731_400_430_051_336,
                session_version: self.local_version,
                network_type: "IN".to_owned(),
                address_type: "IP4".to_owned(),
                unicast_address: "127.0.0.1".to_owned(),
            },
            session_name: "-".to_owned(),
            time_descriptions: vec![TimeDescription {
                timing: Timing {
                    start_time: 0,
                    stop_time: 0,
                },
                repeat_times: vec![],
            }],
            attributes: vec![Attribute::new(ATTR_KEY_GROUP.to_owned(), Some(bundle))],
            media_descriptions: self
                .transceivers
                .iter()
                .map(|t| t.local_media(native_rtp_capabilities))
                .collect(),
            ..Default::default()
        };

        let offer = session.marshal();
        self.local_description = Some(offer.clone());
        offer
    }

    fn apply_remote_description(&mut self) {
        if let Some(remote_sdp) = &mut self.remote_sdp {
            self.remote_description = Some(remote_sdp.get_sdp());
        }
    }
}

/// FakeHandler implements Handler without a native engine.
pub struct FakeHandler {
    native_rtp_capabilities: RtpCapabilities,
    native_sctp_capabilities: SctpCapabilities,
    local_dtls_parameters: DtlsParameters,
    closed: AtomicBool,
    state: Mutex<FakeHandlerState>,
    requests: Mutex<Vec<HandlerRequest>>,
    on_connect_handler: ArcSwapOption<Mutex<OnConnectHdlrFn>>,
    on_connection_state_change_handler: ArcSwapOption<Mutex<OnConnectionStateChangeHdlrFn>>,
}

impl Default for FakeHandler {
    fn default() -> Self {
        Self::new(generate_native_rtp_capabilities())
    }
}

impl FakeHandler {
    pub fn new(native_rtp_capabilities: RtpCapabilities) -> Self {
        FakeHandler {
            native_rtp_capabilities,
            native_sctp_capabilities: generate_native_sctp_capabilities(),
            local_dtls_parameters: generate_local_dtls_parameters(),
            closed: AtomicBool::new(false),
            state: Mutex::new(FakeHandlerState {
                cname: format!("{:016x}", rand::random::<u64>()),
                ..Default::default()
            }),
            requests: Mutex::new(vec![]),
            on_connect_handler: ArcSwapOption::empty(),
            on_connection_state_change_handler: ArcSwapOption::empty(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// requests lists every native request received so far, oldest first.
    pub async fn requests(&self) -> Vec<HandlerRequest> {
        self.requests.lock().await.clone()
    }

    /// set_connection_state plays a native connection state notification.
    pub async fn set_connection_state(&self, state: ConnectionState) {
        if let Some(handler) = self.on_connection_state_change_handler.load_full() {
            let mut f = handler.lock().await;
            f(state).await;
        }
    }

    pub async fn local_description(&self) -> Option<String> {
        self.state.lock().await.local_description.clone()
    }

    /// remote_description is the last answer applied to the native peer.
    pub async fn remote_description(&self) -> Option<String> {
        self.state.lock().await.remote_description.clone()
    }

    pub async fn remote_mids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .remote_sdp
            .as_ref()
            .map(|remote_sdp| remote_sdp.mids())
            .unwrap_or_default()
    }

    pub async fn transceiver_count(&self) -> usize {
        self.state.lock().await.transceivers.len()
    }

    async fn record(&self, request: HandlerRequest) {
        log::trace!("record() [request:{:?}]", request);
        self.requests.lock().await.push(request);
    }

    fn assert_not_closed(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::closed())
        } else {
            Ok(())
        }
    }

    async fn setup_transport(
        &self,
        state: &mut FakeHandlerState,
        local_dtls_role: DtlsRole,
    ) -> Result<DtlsParameters> {
        let mut dtls_parameters = self.local_dtls_parameters.clone();
        dtls_parameters.role = local_dtls_role;

        match self.on_connect_handler.load_full() {
            Some(handler) => {
                let mut f = handler.lock().await;
                f(dtls_parameters.clone()).await?;
            }
            None => {
                return Err(Error::ErrHandler(
                    "no connect handler registered".to_owned(),
                ))
            }
        }

        state.transport_ready = true;
        Ok(dtls_parameters)
    }
}

#[async_trait]
impl Handler for FakeHandler {
    fn name(&self) -> &str {
        FAKE_HANDLER_NAME
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("close()");
        self.record(HandlerRequest::Close).await;
    }

    async fn get_native_rtp_capabilities(&self) -> Result<RtpCapabilities> {
        log::debug!("get_native_rtp_capabilities()");
        Ok(self.native_rtp_capabilities.clone())
    }

    async fn get_native_sctp_capabilities(&self) -> Result<SctpCapabilities> {
        log::debug!("get_native_sctp_capabilities()");
        Ok(self.native_sctp_capabilities)
    }

    async fn run(&self, options: HandlerRunOptions) -> Result<()> {
        log::debug!("run() [direction:{}]", options.direction);
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.direction = Some(options.direction);
        state.ice_parameters = options.ice_parameters;
        state.ice_candidates = options.ice_candidates;
        state.dtls_parameters = options.dtls_parameters;
        state.sctp_parameters = options.sctp_parameters;
        state.ice_servers = options.ice_servers;
        state.reuse_media_sections = options.reuse_media_sections;

        for kind in [MediaKind::Audio, MediaKind::Video] {
            state.sending_rtp_parameters_by_kind.insert(
                kind,
                ortc::get_sending_rtp_parameters(kind, &options.extended_rtp_capabilities),
            );
            state.sending_remote_rtp_parameters_by_kind.insert(
                kind,
                ortc::get_sending_remote_rtp_parameters(kind, &options.extended_rtp_capabilities),
            );
        }
        state.extended_rtp_capabilities = options.extended_rtp_capabilities;

        Ok(())
    }

    async fn update_ice_servers(&self, ice_servers: Vec<IceServer>) -> Result<()> {
        log::debug!("update_ice_servers()");
        self.assert_not_closed()?;

        let count = ice_servers.len();
        self.state.lock().await.ice_servers = ice_servers;
        self.record(HandlerRequest::UpdateIceServers { count }).await;
        Ok(())
    }

    async fn restart_ice(&self, ice_parameters: IceParameters) -> Result<()> {
        log::debug!("restart_ice()");
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        if let Some(remote_sdp) = &mut state.remote_sdp {
            remote_sdp.update_ice_parameters(ice_parameters.clone());
        }
        state.ice_parameters = Some(ice_parameters);
        if state.transport_ready {
            state.apply_remote_description();
        }
        drop(state);

        self.record(HandlerRequest::RestartIce).await;
        Ok(())
    }

    async fn get_transport_stats(&self) -> Result<StatsReport> {
        self.assert_not_closed()?;

        let state = self.state.lock().await;
        let mut report = StatsReport::new();
        report.insert(
            "transport".to_owned(),
            json!({
                "type": "transport",
                "dtlsState": if state.transport_ready { "connected" } else { "new" },
                "transceivers": state.transceivers.len(),
            }),
        );
        Ok(report)
    }

    async fn send(&self, options: HandlerSendOptions) -> Result<HandlerSendResult> {
        self.assert_not_closed()?;
        let kind = options.track.kind();
        log::debug!("send() [kind:{}, track.id:{}]", kind, options.track.id());

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Send)?;

        let mut encodings = options.encodings;
        if encodings.len() > 1 {
            for (idx, encoding) in encodings.iter_mut().enumerate() {
                encoding.rid = Some(format!("r{idx}"));
            }
        }

        let mut sending_rtp_parameters = state
            .sending_rtp_parameters_by_kind
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::ErrUnsupported(format!("cannot send {kind}")))?;
        sending_rtp_parameters.codecs =
            ortc::reduce_codecs(&sending_rtp_parameters.codecs, options.codec.as_ref())?;
        let has_rtx = sending_rtp_parameters.codecs.iter().any(|c| c.is_rtx());

        let offer_encoding = random_encoding(has_rtx);
        sending_rtp_parameters.rtcp.cname = Some(state.cname.clone());
        sending_rtp_parameters.encodings = match encodings.len() {
            0 => vec![offer_encoding],
            1 => {
                let mut encoding = encodings.remove(0);
                encoding.ssrc = offer_encoding.ssrc;
                encoding.rtx = offer_encoding.rtx;
                vec![encoding]
            }
            _ => encodings,
        };
        if sending_rtp_parameters.encodings.len() > 1 {
            let first = sending_rtp_parameters
                .codecs
                .first()
                .map(|c| c.mime_type.to_lowercase())
                .unwrap_or_default();
            if first == "video/vp8" || first == "video/h264" {
                for encoding in &mut sending_rtp_parameters.encodings {
                    encoding.scalability_mode = Some("S1T3".to_owned());
                }
            }
        }

        let idx = state.add_transceiver(kind, true);
        let local_id = state.transceivers[idx].mid.clone();
        sending_rtp_parameters.mid = Some(local_id.clone());
        state.transceivers[idx].track = Some(Arc::clone(&options.track));
        state.transceivers[idx].rtp_parameters = sending_rtp_parameters.clone();

        let local_id_low = if let Some(track_low) = &options.track_low {
            let idx = state.add_transceiver(kind, true);
            let mid = state.transceivers[idx].mid.clone();
            let mut low = sending_rtp_parameters.clone();
            low.mid = Some(mid.clone());
            low.encodings = vec![random_encoding(has_rtx)];
            state.transceivers[idx].track = Some(Arc::clone(track_low));
            state.transceivers[idx].rtp_parameters = low;
            Some(mid)
        } else {
            None
        };

        let native_rtp_capabilities = &self.native_rtp_capabilities;
        let offer = state.render_local_description(native_rtp_capabilities);

        let dtls_parameters = if state.transport_ready {
            None
        } else {
            Some(self.setup_transport(&mut state, DtlsRole::Server).await?)
        };
        drop(state);

        self.record(HandlerRequest::Send {
            local_id: local_id.clone(),
            kind,
        })
        .await;

        Ok(HandlerSendResult {
            local_id,
            local_id_low,
            rtp_parameters: sending_rtp_parameters,
            rtp_sender: None,
            dtls_parameters,
            offer,
        })
    }

    async fn stop_sending(&self, local_id: &str, media_type: MediaType) -> Result<()> {
        log::debug!("stop_sending() [local_id:{}, media_type:{}]", local_id, media_type);
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Send)?;

        let transceiver = state.transceiver_mut(local_id)?;
        transceiver.track = None;
        transceiver.stopped = true;

        if let Some(remote_sdp) = &mut state.remote_sdp {
            if remote_sdp.media_section(local_id).is_some() {
                remote_sdp.close_media_section(local_id)?;
            }
        }
        let native_rtp_capabilities = &self.native_rtp_capabilities;
        state.render_local_description(native_rtp_capabilities);
        state.apply_remote_description();
        drop(state);

        self.record(HandlerRequest::StopSending {
            local_id: local_id.to_owned(),
            media_type,
        })
        .await;
        Ok(())
    }

    async fn replace_track(
        &self,
        local_id: &str,
        track: Option<Arc<MediaStreamTrack>>,
    ) -> Result<()> {
        log::debug!(
            "replace_track() [local_id:{}, track.id:{:?}]",
            local_id,
            track.as_ref().map(|t| t.id())
        );
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Send)?;
        let track_id = track.as_ref().map(|t| t.id().to_owned());
        state.transceiver_mut(local_id)?.track = track;
        drop(state);

        self.record(HandlerRequest::ReplaceTrack {
            local_id: local_id.to_owned(),
            track_id,
        })
        .await;
        Ok(())
    }

    async fn set_max_spatial_layer(&self, local_id: &str, spatial_layer: u8) -> Result<()> {
        log::debug!(
            "set_max_spatial_layer() [local_id:{}, spatial_layer:{}]",
            local_id,
            spatial_layer
        );
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Send)?;
        let transceiver = state.transceiver_mut(local_id)?;
        for (idx, encoding) in transceiver.rtp_parameters.encodings.iter_mut().enumerate() {
            encoding.active = Some(idx <= spatial_layer as usize);
        }
        drop(state);

        self.record(HandlerRequest::SetMaxSpatialLayer {
            local_id: local_id.to_owned(),
            spatial_layer,
        })
        .await;
        Ok(())
    }

    async fn set_rtp_encoding_parameters(
        &self,
        local_id: &str,
        params: RtpEncodingParameters,
    ) -> Result<()> {
        log::debug!(
            "set_rtp_encoding_parameters() [local_id:{}, params:{:?}]",
            local_id,
            params
        );
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Send)?;
        let transceiver = state.transceiver_mut(local_id)?;
        for encoding in &mut transceiver.rtp_parameters.encodings {
            merge_encoding(encoding, &params);
        }
        drop(state);

        self.record(HandlerRequest::SetRtpEncodingParameters {
            local_id: local_id.to_owned(),
        })
        .await;
        Ok(())
    }

    async fn get_sender_stats(&self, local_id: &str) -> Result<StatsReport> {
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Send)?;
        let transceiver = state.transceiver_mut(local_id)?;

        let mut report = StatsReport::new();
        for encoding in &transceiver.rtp_parameters.encodings {
            let ssrc = encoding.ssrc.unwrap_or_default();
            report.insert(
                format!("outbound-rtp-{ssrc}"),
                json!({
                    "type": "outbound-rtp",
                    "mid": transceiver.mid,
                    "kind": transceiver.kind.to_string(),
                    "ssrc": ssrc,
                    "active": encoding.active.unwrap_or(true),
                }),
            );
        }
        Ok(report)
    }

    async fn receive(&self, options: HandlerReceiveOptions) -> Result<HandlerReceiveResult> {
        log::debug!(
            "receive() [track_id:{}, kind:{}]",
            options.track_id,
            options.kind
        );
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Recv)?;
        state.ensure_remote_sdp(
            options.ice_parameters.as_ref(),
            &options.ice_candidates,
            options.dtls_parameters.as_ref(),
            options.sctp_parameters.as_ref(),
        )?;

        let prepared = options
            .rtp_parameters
            .mid
            .as_ref()
            .and_then(|mid| state.map_mid_transceiver.get(mid).copied())
            .filter(|&idx| {
                let t = &state.transceivers[idx];
                !t.sending && t.kind == options.kind
            });
        let idx = match prepared {
            Some(idx) => idx,
            None => state.add_transceiver(options.kind, false),
        };
        let local_id = state.transceivers[idx].mid.clone();
        state.transceivers[idx].stopped = false;
        state.transceivers[idx].useless = false;
        state.transceivers[idx].remote_uid = options.remote_uid.clone();

        if !state.transport_ready {
            self.setup_transport(&mut state, DtlsRole::Server).await?;
        }

        let stream_id = options
            .remote_uid
            .as_deref()
            .or(options.rtp_parameters.rtcp.cname.as_deref())
            .unwrap_or("-")
            .to_owned();
        let local_sections: Vec<(String, MediaKind)> = state
            .transceivers
            .iter()
            .map(|t| (t.mid.clone(), t.kind))
            .collect();
        let filler = filler_codecs(&state.extended_rtp_capabilities);

        let remote_sdp = state.ensure_remote_sdp(None, &[], None, None)?;
        remote_sdp.receive(ReceiveParams {
            mid: &local_id,
            kind: options.kind,
            offer_rtp_parameters: &options.rtp_parameters,
            stream_id: &stream_id,
            track_id: &options.track_id,
            reuse_mid: None,
        })?;
        let filled = remote_sdp.reconcile_media_sections(&local_sections, None, &filler)?;
        if !filled.is_empty() {
            log::debug!("receive() | filled missing media sections [mids:{:?}]", filled);
        }

        let native_rtp_capabilities = &self.native_rtp_capabilities;
        state.render_local_description(native_rtp_capabilities);
        state.apply_remote_description();

        let track =
            MediaStreamTrack::with_id(options.track_id.clone(), options.kind, "remote");
        state.transceivers[idx].track = Some(Arc::clone(&track));
        drop(state);

        self.record(HandlerRequest::Receive {
            local_id: local_id.clone(),
            track_id: options.track_id.clone(),
        })
        .await;

        Ok(HandlerReceiveResult {
            local_id: local_id.clone(),
            track,
            rtp_receiver: Some(Arc::new(FakeRtpReceiver {
                mid: local_id,
                track_id: options.track_id,
            })),
        })
    }

    async fn stop_receiving(&self, local_id: &str) -> Result<()> {
        log::debug!("stop_receiving() [local_id:{}]", local_id);
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Recv)?;

        let transceiver = state.transceiver_mut(local_id)?;
        transceiver.stopped = true;
        transceiver.remote_uid = None;
        if let Some(track) = transceiver.track.take() {
            track.stop();
        }

        if let Some(remote_sdp) = &mut state.remote_sdp {
            if remote_sdp.media_section(local_id).is_some() {
                remote_sdp.close_media_section(local_id)?;
            }
        }
        let native_rtp_capabilities = &self.native_rtp_capabilities;
        state.render_local_description(native_rtp_capabilities);
        state.apply_remote_description();
        drop(state);

        self.record(HandlerRequest::StopReceiving {
            local_id: local_id.to_owned(),
        })
        .await;
        Ok(())
    }

    async fn get_receiver_stats(&self, local_id: &str) -> Result<StatsReport> {
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Recv)?;
        let transceiver = state.transceiver_mut(local_id)?;

        let mut report = StatsReport::new();
        report.insert(
            format!("inbound-rtp-{}", transceiver.mid),
            json!({
                "type": "inbound-rtp",
                "mid": transceiver.mid,
                "kind": transceiver.kind.to_string(),
                "remoteUid": transceiver.remote_uid,
            }),
        );
        Ok(report)
    }

    async fn prepare_local_sdp(
        &self,
        kind: MediaKind,
        remote_uid: &str,
    ) -> Result<PrepareLocalSdpResult> {
        log::debug!("prepare_local_sdp() [kind:{}, remote_uid:{}]", kind, remote_uid);
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Recv)?;

        let reusable = state
            .transceivers
            .iter()
            .position(|t| t.useless && !t.sending && t.kind == kind);
        let reused = reusable.is_some();
        let idx = match reusable {
            Some(idx) => idx,
            None => state.add_transceiver(kind, false),
        };
        let transceiver = &mut state.transceivers[idx];
        transceiver.useless = false;
        transceiver.stopped = false;
        transceiver.remote_uid = Some(remote_uid.to_owned());
        let mid = transceiver.mid.clone();

        let native_rtp_capabilities = &self.native_rtp_capabilities;
        let offer = state.render_local_description(native_rtp_capabilities);

        let dtls_parameters = if state.transport_ready {
            None
        } else {
            let mut dtls_parameters = self.local_dtls_parameters.clone();
            dtls_parameters.role = DtlsRole::Server;
            Some(dtls_parameters)
        };
        drop(state);

        self.record(HandlerRequest::PrepareLocalSdp {
            mid: mid.clone(),
            reused,
        })
        .await;

        Ok(PrepareLocalSdpResult {
            dtls_parameters,
            rtp_capabilities: Some(self.native_rtp_capabilities.clone()),
            offer,
            mid: Some(mid),
        })
    }

    async fn recover_transceiver(
        &self,
        remote_uid: &str,
        mid: Option<&str>,
        kind: MediaKind,
    ) -> Result<()> {
        log::debug!(
            "recover_transceiver() [kind:{}, remote_uid:{}, mid:{:?}]",
            kind,
            remote_uid,
            mid
        );
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        let idx = mid.and_then(|mid| state.map_mid_transceiver.get(mid).copied());
        match idx {
            Some(idx) => state.transceivers[idx].useless = true,
            None => log::debug!("recover_transceiver() | transceiver not found"),
        }
        drop(state);

        self.record(HandlerRequest::RecoverTransceiver {
            mid: mid.map(str::to_owned),
        })
        .await;
        Ok(())
    }

    async fn fill_remote_recv_sdp(&self, options: FillRemoteRecvSdpOptions) -> Result<()> {
        log::debug!("fill_remote_recv_sdp() [kind:{}]", options.kind);
        self.assert_not_closed()?;

        let mut state = self.state.lock().await;
        state.assert_direction(TransportDirection::Send)?;
        state.local_description = Some(options.offer.clone());

        let mut answer_rtp_parameters = state
            .sending_remote_rtp_parameters_by_kind
            .get(&options.kind)
            .cloned()
            .ok_or_else(|| Error::ErrUnsupported(format!("cannot send {}", options.kind)))?;
        answer_rtp_parameters.codecs =
            ortc::reduce_codecs(&answer_rtp_parameters.codecs, options.codec.as_ref())?;

        let mut codec_options = options.codec_options.clone().unwrap_or_default();
        if let Some(audio_profile) = options.audio_profile {
            if options.kind == MediaKind::Audio {
                log::debug!("fill_remote_recv_sdp() | audio profile [{}]", audio_profile);
                audio_profile.apply(&mut codec_options);
            }
        }

        let next_idx = state
            .ensure_remote_sdp(
                Some(&options.ice_parameters),
                &options.ice_candidates,
                Some(&options.dtls_parameters),
                options.sctp_parameters.as_ref(),
            )?
            .get_next_media_section_idx();

        let offer_idx = match options.sending_rtp_parameters.mid.as_ref() {
            Some(mid) => state.map_mid_transceiver.get(mid).copied(),
            None => Some(next_idx.idx).filter(|&idx| idx < state.transceivers.len()),
        }
        .ok_or_else(|| Error::ErrNotFound("no local media section to answer".to_owned()))?;
        let offer_media =
            state.transceivers[offer_idx].local_media(&self.native_rtp_capabilities);
        let mid = state.transceivers[offer_idx].mid.clone();

        let remote_sdp = state.ensure_remote_sdp(None, &[], None, None)?;
        let reuse_mid = if remote_sdp.media_section(&mid).is_some() {
            None
        } else {
            next_idx.reuse_mid
        };
        remote_sdp.send(SendParams {
            offer_media: &[offer_media],
            reuse_mid: reuse_mid.as_deref(),
            offer_rtp_parameters: &options.sending_rtp_parameters,
            answer_rtp_parameters: &answer_rtp_parameters,
            codec_options: Some(&codec_options),
            extmap_allow_mixed: true,
        })?;
        state.apply_remote_description();
        drop(state);

        self.record(HandlerRequest::FillRemoteRecvSdp { mid }).await;
        Ok(())
    }

    fn on_connect(&self, f: OnConnectHdlrFn) {
        self.on_connect_handler.store(Some(Arc::new(Mutex::new(f))));
    }

    fn on_connection_state_change(&self, f: OnConnectionStateChangeHdlrFn) {
        self.on_connection_state_change_handler
            .store(Some(Arc::new(Mutex::new(f))));
    }
}

/// FakeHandlerFactory builds FakeHandlers and keeps every one of them
/// reachable for inspection.
#[derive(Default, Clone)]
pub struct FakeHandlerFactory {
    native_rtp_capabilities: Option<RtpCapabilities>,
    created: Arc<std::sync::Mutex<Vec<Arc<FakeHandler>>>>,
}

impl FakeHandlerFactory {
    pub fn new() -> Self {
        FakeHandlerFactory::default()
    }

    /// with_native_rtp_capabilities overrides what the built handlers
    /// report as native capabilities.
    pub fn with_native_rtp_capabilities(mut self, caps: RtpCapabilities) -> Self {
        self.native_rtp_capabilities = Some(caps);
        self
    }

    pub fn handler_factory(&self) -> HandlerFactory {
        let factory = self.clone();
        Arc::new(move || {
            let handler = Arc::new(match &factory.native_rtp_capabilities {
                Some(caps) => FakeHandler::new(caps.clone()),
                None => FakeHandler::default(),
            });
            factory.created().push(Arc::clone(&handler));
            handler as Arc<dyn Handler>
        })
    }

    /// handlers lists the handlers built so far, oldest first.
    pub fn handlers(&self) -> Vec<Arc<FakeHandler>> {
        self.created().clone()
    }

    pub fn last(&self) -> Option<Arc<FakeHandler>> {
        self.created().last().cloned()
    }

    fn created(&self) -> std::sync::MutexGuard<'_, Vec<Arc<FakeHandler>>> {
        self.created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn random_encoding(with_rtx: bool) -> RtpEncodingParameters {
    let ssrc = rand::random::<u32>() % 900_000_000 + 100_000_000;
    RtpEncodingParameters {
        ssrc: Some(ssrc),
        rtx: with_rtx.then_some(RtxParameters { ssrc: ssrc + 1 }),
        ..Default::default()
    }
}

fn merge_encoding(encoding: &mut RtpEncodingParameters, params: &RtpEncodingParameters) {
    if params.active.is_some() {
        encoding.active = params.active;
    }
    if params.max_bitrate.is_some() {
        encoding.max_bitrate = params.max_bitrate;
    }
    if params.max_framerate.is_some() {
        encoding.max_framerate = params.max_framerate;
    }
    if params.scale_resolution_down_by.is_some() {
        encoding.scale_resolution_down_by = params.scale_resolution_down_by;
    }
    if params.priority.is_some() {
        encoding.priority = params.priority;
    }
    if params.network_priority.is_some() {
        encoding.network_priority = params.network_priority;
    }
}

/// filler_codecs lists every negotiated codec with the router's payload
/// types, as a filler section offers them.
fn filler_codecs(extended: &ExtendedRtpCapabilities) -> Vec<RtpCodecParameters> {
    extended
        .codecs
        .iter()
        .filter_map(|codec| {
            Some(RtpCodecParameters {
                mime_type: codec.mime_type.clone(),
                payload_type: codec.remote_payload_type?,
                clock_rate: codec.clock_rate,
                channels: codec.channels,
                parameters: codec.remote_parameters.clone(),
                rtcp_feedback: codec.rtcp_feedback.clone(),
            })
        })
        .collect()
}

fn with_direction(mut media: MediaDescription, direction: &str) -> MediaDescription {
    media.attributes.retain(|a| {
        !matches!(
            a.key.as_str(),
            ATTR_KEY_SEND_RECV | ATTR_KEY_SEND_ONLY | ATTR_KEY_RECV_ONLY | ATTR_KEY_INACTIVE
        )
    });
    media.with_property_attribute(direction.to_owned())
}
