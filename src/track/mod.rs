
pub mod track_state;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use portable_atomic::{AtomicBool, AtomicU8};
pub use track_state::TrackState;

use crate::observer::{Event, Observer};
use crate::rtp_parameters::MediaKind;

/// TrackEvent is emitted by a MediaStreamTrack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEvent {
    /// The source ended on its own (device unplugged, remote stream gone).
    Ended,
}

impl Event for TrackEvent {
    fn name(&self) -> &'static str {
        match self {
            TrackEvent::Ended => "ended",
        }
    }
}

/// MediaStreamTrack is the handle of a native media source shared between
/// the caller, the handler and the Producer or Consumer that owns it.
/// Identity is the `Arc`: two tracks are the same track only if
/// `Arc::ptr_eq` says so.
pub struct MediaStreamTrack {
    id: String,
    kind: MediaKind,
    label: String,
    enabled: AtomicBool,
    ready_state: AtomicU8,
    observer: Observer<TrackEvent>,
}

impl std::fmt::Debug for MediaStreamTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStreamTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("enabled", &self.enabled())
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

impl MediaStreamTrack {
    /// new creates a live, enabled track with a random id.
    pub fn new(kind: MediaKind, label: &str) -> Arc<Self> {
        Self::with_id(format!("{:016x}", rand::random::<u64>()), kind, label)
    }

    pub fn with_id(id: String, kind: MediaKind, label: &str) -> Arc<Self> {
        Arc::new(MediaStreamTrack {
            id,
            kind,
            label: label.to_owned(),
            enabled: AtomicBool::new(true),
            ready_state: AtomicU8::new(TrackState::Live as u8),
            observer: Observer::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn ready_state(&self) -> TrackState {
        self.ready_state.load(Ordering::SeqCst).into()
    }

    pub fn is_ended(&self) -> bool {
        self.ready_state() == TrackState::Ended
    }

    /// stop ends the track on request. Like a browser track, stopping does
    /// not emit `ended`.
    pub fn stop(&self) {
        self.ready_state
            .store(TrackState::Ended as u8, Ordering::SeqCst);
    }

    /// end marks the source as gone and notifies the observers once.
    pub fn end(&self) {
        let previous = self
            .ready_state
            .swap(TrackState::Ended as u8, Ordering::SeqCst);
        if TrackState::from(previous) != TrackState::Ended {
            self.observer.safe_emit(TrackEvent::Ended);
        }
    }

    pub fn observer(&self) -> &Observer<TrackEvent> {
        &self.observer
    }
}
