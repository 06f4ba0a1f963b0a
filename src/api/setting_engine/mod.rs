#[cfg(test)]
mod setting_engine_test;

/// SettingEngine holds the defaults a Device hands to every Transport,
/// Producer and Consumer it creates. It is owned by the Device; nothing in
/// the crate reads settings from a global.
#[derive(Debug, Clone)]
pub struct SettingEngine {
    pub(crate) reuse_media_sections: bool,
    pub(crate) disable_track_on_pause: bool,
    pub(crate) zero_rtp_on_pause: bool,
    pub(crate) stop_tracks: bool,
}

impl Default for SettingEngine {
    fn default() -> Self {
        SettingEngine {
            reuse_media_sections: false,
            disable_track_on_pause: true,
            zero_rtp_on_pause: false,
            stop_tracks: true,
        }
    }
}

impl SettingEngine {
    /// set_reuse_media_sections lets closed media sections of the remote
    /// description be handed out again instead of appending new ones.
    /// A transport may still override this through its options.
    pub fn set_reuse_media_sections(&mut self, reuse: bool) {
        self.reuse_media_sections = reuse;
    }

    /// set_disable_track_on_pause toggles `enabled` of the owned tracks on
    /// pause and resume.
    pub fn set_disable_track_on_pause(&mut self, disable: bool) {
        self.disable_track_on_pause = disable;
    }

    /// set_zero_rtp_on_pause detaches the track from the sender while
    /// paused, so no RTP is sent at all.
    pub fn set_zero_rtp_on_pause(&mut self, zero_rtp: bool) {
        self.zero_rtp_on_pause = zero_rtp;
    }

    /// set_stop_tracks makes Producers stop their tracks when closed or
    /// when the track is replaced.
    pub fn set_stop_tracks(&mut self, stop_tracks: bool) {
        self.stop_tracks = stop_tracks;
    }

    pub fn reuse_media_sections(&self) -> bool {
        self.reuse_media_sections
    }

    pub fn disable_track_on_pause(&self) -> bool {
        self.disable_track_on_pause
    }

    pub fn zero_rtp_on_pause(&self) -> bool {
        self.zero_rtp_on_pause
    }

    pub fn stop_tracks(&self) -> bool {
        self.stop_tracks
    }
}
