
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use portable_atomic::AtomicBool;
use tokio::sync::Mutex;

use crate::app_data::{AppData, MediaType};
use crate::error::{Error, Result};
use crate::handler::{NativeHandle, StatsReport};
use crate::observer::{Event, ListenerId, Observer};
use crate::rtp_parameters::{MediaKind, RtpEncodingParameters, RtpParameters};
use crate::track::{MediaStreamTrack, TrackEvent};

/// ProducerEvent is emitted by a Producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerEvent {
    Close,
    Pause,
    Resume,
    TrackEnded,
    TransportClose,
}

impl Event for ProducerEvent {
    fn name(&self) -> &'static str {
        match self {
            ProducerEvent::Close => "close",
            ProducerEvent::Pause => "pause",
            ProducerEvent::Resume => "resume",
            ProducerEvent::TrackEnded => "trackended",
            ProducerEvent::TransportClose => "transportclose",
        }
    }
}

/// ProducerChannel is how a Producer reaches the native sender owned by its
/// Transport. Every call is serialized on the transport's operation queue.
#[async_trait]
pub(crate) trait ProducerChannel: Send + Sync {
    async fn producer_closed(&self, producer_id: &str, local_id: &str, media_type: MediaType);

    async fn replace_track(
        &self,
        local_id: &str,
        track: Option<Arc<MediaStreamTrack>>,
    ) -> Result<()>;

    async fn set_max_spatial_layer(&self, local_id: &str, spatial_layer: u8) -> Result<()>;

    async fn set_rtp_encoding_parameters(
        &self,
        local_id: &str,
        params: RtpEncodingParameters,
    ) -> Result<()>;

    async fn get_sender_stats(&self, local_id: &str) -> Result<StatsReport>;
}

pub(crate) struct ProducerParams {
    pub(crate) id: String,
    pub(crate) local_id: String,
    pub(crate) local_id_low: Option<String>,
    pub(crate) rtp_sender: Option<NativeHandle>,
    pub(crate) track: Arc<MediaStreamTrack>,
    pub(crate) track_low: Option<Arc<MediaStreamTrack>>,
    pub(crate) rtp_parameters: RtpParameters,
    pub(crate) stop_tracks: bool,
    pub(crate) disable_track_on_pause: bool,
    pub(crate) zero_rtp_on_pause: bool,
    pub(crate) app_data: Arc<AppData>,
    pub(crate) channel: Weak<dyn ProducerChannel>,
}

/// Producer sends one local track (optionally with a low resolution copy)
/// to the server.
pub struct Producer {
    id: String,
    local_id: String,
    local_id_low: Option<String>,
    kind: MediaKind,
    rtp_sender: Option<NativeHandle>,
    track: ArcSwapOption<MediaStreamTrack>,
    track_low: Option<Arc<MediaStreamTrack>>,
    rtp_parameters: RtpParameters,
    paused: AtomicBool,
    closed: AtomicBool,
    max_spatial_layer: Mutex<Option<u8>>,
    stop_tracks: bool,
    disable_track_on_pause: bool,
    zero_rtp_on_pause: bool,
    app_data: Arc<AppData>,
    channel: Weak<dyn ProducerChannel>,
    track_listener: Mutex<Option<(Arc<MediaStreamTrack>, ListenerId)>>,
    observer: Observer<ProducerEvent>,
    weak_self: Weak<Producer>,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("id", &self.id)
            .field("local_id", &self.local_id)
            .field("kind", &self.kind)
            .field("paused", &self.paused())
            .field("closed", &self.closed())
            .finish()
    }
}

impl Producer {
    pub(crate) fn new(params: ProducerParams) -> Arc<Self> {
        log::debug!("new() [id:{}, local_id:{}]", params.id, params.local_id);

        let paused = if params.disable_track_on_pause {
            !params.track.enabled()
        } else {
            false
        };

        Arc::new_cyclic(|weak: &Weak<Producer>| {
            let listener_id = subscribe_track_ended(weak.clone(), &params.track);

            Producer {
                id: params.id,
                local_id: params.local_id,
                local_id_low: params.local_id_low,
                kind: params.track.kind(),
                rtp_sender: params.rtp_sender,
                track: ArcSwapOption::from(Some(Arc::clone(&params.track))),
                track_low: params.track_low,
                rtp_parameters: params.rtp_parameters,
                paused: AtomicBool::new(paused),
                closed: AtomicBool::new(false),
                max_spatial_layer: Mutex::new(None),
                stop_tracks: params.stop_tracks,
                disable_track_on_pause: params.disable_track_on_pause,
                zero_rtp_on_pause: params.zero_rtp_on_pause,
                app_data: params.app_data,
                channel: params.channel,
                track_listener: Mutex::new(Some((params.track, listener_id))),
                observer: Observer::new(),
                weak_self: weak.clone(),
            }
        })
    }

    /// id is the server side id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// local_id is the mid of the sender in the local description.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn local_id_low(&self) -> Option<&str> {
        self.local_id_low.as_deref()
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn rtp_sender(&self) -> Option<NativeHandle> {
        self.rtp_sender.clone()
    }

    /// track is `None` after `replace_track(None)`.
    pub fn track(&self) -> Option<Arc<MediaStreamTrack>> {
        self.track.load_full()
    }

    pub fn track_low(&self) -> Option<Arc<MediaStreamTrack>> {
        self.track_low.clone()
    }

    pub fn rtp_parameters(&self) -> &RtpParameters {
        &self.rtp_parameters
    }

    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn max_spatial_layer(&self) -> Option<u8> {
        *self.max_spatial_layer.lock().await
    }

    pub fn stop_tracks(&self) -> bool {
        self.stop_tracks
    }

    pub fn disable_track_on_pause(&self) -> bool {
        self.disable_track_on_pause
    }

    pub fn zero_rtp_on_pause(&self) -> bool {
        self.zero_rtp_on_pause
    }

    pub fn app_data(&self) -> Arc<AppData> {
        Arc::clone(&self.app_data)
    }

    /// App data is fixed at construction.
    pub fn set_app_data(&self, _app_data: AppData) -> Result<()> {
        Err(Error::ErrInvalidState(
            "cannot override appData object".to_owned(),
        ))
    }

    pub fn observer(&self) -> &Observer<ProducerEvent> {
        &self.observer
    }

    fn channel(&self) -> Result<Arc<dyn ProducerChannel>> {
        self.channel.upgrade().ok_or_else(Error::closed)
    }

    /// close stops sending. Closing twice is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("close() [id:{}]", self.id);

        self.destroy_track().await;

        if let Some(channel) = self.channel.upgrade() {
            channel
                .producer_closed(&self.id, &self.local_id, self.app_data.media_type())
                .await;
        }

        self.observer.safe_emit(ProducerEvent::Close);
    }

    /// transport_closed is called by the owning Transport when it closes.
    /// The native sender goes away with the transport, so nothing is
    /// requested from it.
    pub async fn transport_closed(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("transport_closed() [id:{}]", self.id);

        self.destroy_track().await;

        self.observer.safe_emit(ProducerEvent::TransportClose);
        self.observer.safe_emit(ProducerEvent::Close);
    }

    pub async fn get_stats(&self) -> Result<StatsReport> {
        if self.closed() {
            return Err(Error::closed());
        }
        self.channel()?.get_sender_stats(&self.local_id).await
    }

    pub async fn pause(&self) {
        log::debug!("pause() [id:{}]", self.id);
        if self.closed() {
            log::warn!("pause() | producer closed");
            return;
        }

        self.paused.store(true, Ordering::SeqCst);
        if self.disable_track_on_pause {
            self.set_tracks_enabled(false);
        }
        if self.zero_rtp_on_pause {
            if let Err(err) = self.request_replace_track(None).await {
                log::warn!("pause() | replacing track with none failed: {}", err);
            }
        }

        self.observer.safe_emit(ProducerEvent::Pause);
    }

    pub async fn resume(&self) {
        log::debug!("resume() [id:{}]", self.id);
        if self.closed() {
            log::warn!("resume() | producer closed");
            return;
        }

        self.paused.store(false, Ordering::SeqCst);
        if self.disable_track_on_pause {
            self.set_tracks_enabled(true);
        }
        if self.zero_rtp_on_pause {
            if let Err(err) = self.request_replace_track(self.track()).await {
                log::warn!("resume() | restoring track failed: {}", err);
            }
        }

        self.observer.safe_emit(ProducerEvent::Resume);
    }

    /// replace_track swaps the source. `None` keeps the sender alive
    /// without media.
    pub async fn replace_track(&self, track: Option<Arc<MediaStreamTrack>>) -> Result<()> {
        log::debug!(
            "replace_track() [id:{}, track.id:{:?}]",
            self.id,
            track.as_ref().map(|t| t.id())
        );

        if self.closed() {
            if let Some(track) = &track {
                if self.stop_tracks {
                    track.stop();
                }
            }
            return Err(Error::closed());
        }
        if let Some(track) = &track {
            if track.is_ended() {
                return Err(Error::ErrInvalidState("track ended".to_owned()));
            }
        }

        let current = self.track();
        let same = match (&current, &track) {
            (Some(current), Some(track)) => Arc::ptr_eq(current, track),
            (None, None) => true,
            _ => false,
        };
        if same {
            log::debug!("replace_track() | same track, ignored");
            return Ok(());
        }

        if !(self.zero_rtp_on_pause && self.paused()) {
            self.request_replace_track(track.clone()).await?;
        }

        self.destroy_track().await;
        self.track.store(track.clone());

        if let Some(track) = &track {
            if self.disable_track_on_pause {
                track.set_enabled(!self.paused());
            }
            let listener_id = subscribe_track_ended(self.weak_self.clone(), track);
            *self.track_listener.lock().await = Some((Arc::clone(track), listener_id));
        }

        Ok(())
    }

    pub async fn set_max_spatial_layer(&self, spatial_layer: u8) -> Result<()> {
        if self.closed() {
            return Err(Error::closed());
        }
        if self.kind != MediaKind::Video {
            return Err(Error::ErrUnsupported("not a video Producer".to_owned()));
        }

        let mut max_spatial_layer = self.max_spatial_layer.lock().await;
        if *max_spatial_layer == Some(spatial_layer) {
            return Ok(());
        }
        self.channel()?
            .set_max_spatial_layer(&self.local_id, spatial_layer)
            .await?;
        *max_spatial_layer = Some(spatial_layer);

        Ok(())
    }

    pub async fn set_rtp_encoding_parameters(&self, params: RtpEncodingParameters) -> Result<()> {
        if self.closed() {
            return Err(Error::closed());
        }
        self.channel()?
            .set_rtp_encoding_parameters(&self.local_id, params)
            .await
    }

    async fn request_replace_track(&self, track: Option<Arc<MediaStreamTrack>>) -> Result<()> {
        self.channel()?.replace_track(&self.local_id, track).await
    }

    fn set_tracks_enabled(&self, enabled: bool) {
        if let Some(track) = self.track() {
            track.set_enabled(enabled);
        }
        if let Some(track_low) = &self.track_low {
            track_low.set_enabled(enabled);
        }
    }

    /// destroy_track drops the ended listener and, when the producer owns its
    /// tracks, stops them.
    async fn destroy_track(&self) {
        if let Some((track, listener_id)) = self.track_listener.lock().await.take() {
            track.observer().unsubscribe(listener_id);
        }

        if self.stop_tracks {
            if let Some(track) = self.track() {
                track.stop();
            }
            if self.closed() {
                if let Some(track_low) = &self.track_low {
                    track_low.stop();
                }
            }
        }
    }
}

fn subscribe_track_ended(producer: Weak<Producer>, track: &Arc<MediaStreamTrack>) -> ListenerId {
    track.observer().subscribe(move |event| {
        match event {
            TrackEvent::Ended => {
                if let Some(producer) = producer.upgrade() {
                    log::debug!("track \"ended\" event [producer:{}]", producer.id);
                    producer.observer.safe_emit(ProducerEvent::TrackEnded);
                }
            }
        }
        Ok(())
    })
}
