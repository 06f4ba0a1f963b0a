
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use portable_atomic::AtomicBool;
use tokio::sync::Mutex;

use crate::app_data::AppData;
use crate::error::{Error, Result};
use crate::handler::{NativeHandle, StatsReport};
use crate::observer::{Event, ListenerId, Observer};
use crate::rtp_parameters::{MediaKind, RtpParameters};
use crate::track::{MediaStreamTrack, TrackEvent};

/// ConsumerEvent is emitted by a Consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    Close,
    Pause,
    Resume,
    TrackEnded,
    TransportClose,
}

impl Event for ConsumerEvent {
    fn name(&self) -> &'static str {
        match self {
            ConsumerEvent::Close => "close",
            ConsumerEvent::Pause => "pause",
            ConsumerEvent::Resume => "resume",
            ConsumerEvent::TrackEnded => "trackended",
            ConsumerEvent::TransportClose => "transportclose",
        }
    }
}

#[async_trait]
pub(crate) trait ConsumerChannel: Send + Sync {
    async fn consumer_closed(&self, consumer_id: &str, local_id: &str);

    async fn get_receiver_stats(&self, local_id: &str) -> Result<StatsReport>;
}

pub(crate) struct ConsumerParams {
    pub(crate) id: String,
    pub(crate) local_id: String,
    pub(crate) producer_id: String,
    pub(crate) rtp_receiver: Option<NativeHandle>,
    pub(crate) track: Arc<MediaStreamTrack>,
    pub(crate) rtp_parameters: RtpParameters,
    pub(crate) disable_track_on_pause: bool,
    pub(crate) app_data: Arc<AppData>,
    pub(crate) channel: Weak<dyn ConsumerChannel>,
}

/// Consumer receives one remote stream.
pub struct Consumer {
    id: String,
    local_id: String,
    producer_id: String,
    kind: MediaKind,
    rtp_receiver: Option<NativeHandle>,
    track: Arc<MediaStreamTrack>,
    rtp_parameters: RtpParameters,
    paused: AtomicBool,
    closed: AtomicBool,
    disable_track_on_pause: bool,
    app_data: Arc<AppData>,
    channel: Weak<dyn ConsumerChannel>,
    track_listener: Mutex<Option<ListenerId>>,
    observer: Observer<ConsumerEvent>,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.id)
            .field("local_id", &self.local_id)
            .field("producer_id", &self.producer_id)
            .field("kind", &self.kind)
            .field("paused", &self.paused())
            .field("closed", &self.closed())
            .finish()
    }
}

impl Consumer {
    pub(crate) fn new(params: ConsumerParams) -> Arc<Self> {
        log::debug!("new() [id:{}, local_id:{}]", params.id, params.local_id);

        let paused = !params.track.enabled();

        Arc::new_cyclic(|weak: &Weak<Consumer>| {
            let consumer = weak.clone();
            let listener_id = params.track.observer().subscribe(move |event| {
                match event {
                    TrackEvent::Ended => {
                        if let Some(consumer) = consumer.upgrade() {
                            log::debug!("track \"ended\" event [consumer:{}]", consumer.id);
                            consumer.observer.safe_emit(ConsumerEvent::TrackEnded);
                        }
                    }
                }
                Ok(())
            });

            Consumer {
                id: params.id,
                local_id: params.local_id,
                producer_id: params.producer_id,
                kind: params.track.kind(),
                rtp_receiver: params.rtp_receiver,
                track: params.track,
                rtp_parameters: params.rtp_parameters,
                paused: AtomicBool::new(paused),
                closed: AtomicBool::new(false),
                disable_track_on_pause: params.disable_track_on_pause,
                app_data: params.app_data,
                channel: params.channel,
                track_listener: Mutex::new(Some(listener_id)),
                observer: Observer::new(),
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn rtp_receiver(&self) -> Option<NativeHandle> {
        self.rtp_receiver.clone()
    }

    pub fn track(&self) -> Arc<MediaStreamTrack> {
        Arc::clone(&self.track)
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

    pub fn app_data(&self) -> Arc<AppData> {
        Arc::clone(&self.app_data)
    }

    pub fn set_app_data(&self, _app_data: AppData) -> Result<()> {
        Err(Error::ErrInvalidState(
            "cannot override appData object".to_owned(),
        ))
    }

    pub fn observer(&self) -> &Observer<ConsumerEvent> {
        &self.observer
    }

    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("close() [id:{}]", self.id);

        self.destroy_track().await;

        if let Some(channel) = self.channel.upgrade() {
            channel.consumer_closed(&self.id, &self.local_id).await;
        }

        self.observer.safe_emit(ConsumerEvent::Close);
    }

    pub async fn transport_closed(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("transport_closed() [id:{}]", self.id);

        self.destroy_track().await;

        self.observer.safe_emit(ConsumerEvent::TransportClose);
        self.observer.safe_emit(ConsumerEvent::Close);
    }

    pub async fn get_stats(&self) -> Result<StatsReport> {
        if self.closed() {
            return Err(Error::closed());
        }
        let channel = self.channel.upgrade().ok_or_else(Error::closed)?;
        channel.get_receiver_stats(&self.local_id).await
    }

    pub fn pause(&self) {
        log::debug!("pause() [id:{}]", self.id);
        if self.closed() {
            log::warn!("pause() | consumer closed");
            return;
        }

        self.paused.store(true, Ordering::SeqCst);
        if self.disable_track_on_pause {
            self.track.set_enabled(false);
        }

        self.observer.safe_emit(ConsumerEvent::Pause);
    }

    pub fn resume(&self) {
        log::debug!("resume() [id:{}]", self.id);
        if self.closed() {
            log::warn!("resume() | consumer closed");
            return;
        }

        self.paused.store(false, Ordering::SeqCst);
        if self.disable_track_on_pause {
            self.track.set_enabled(true);
        }

        self.observer.safe_emit(ConsumerEvent::Resume);
    }

    async fn destroy_track(&self) {
        if let Some(listener_id) = self.track_listener.lock().await.take() {
            self.track.observer().unsubscribe(listener_id);
        }
        self.track.stop();
    }
}
