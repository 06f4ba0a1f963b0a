use super::*;

#[test]
fn test_setting_engine_defaults() {
    let s = SettingEngine::default();

    assert!(!s.reuse_media_sections, "reuse is opt-in");
    assert!(s.disable_track_on_pause);
    assert!(!s.zero_rtp_on_pause);
    assert!(s.stop_tracks);
}

#[test]
fn test_setting_engine_setters() {
    let mut s = SettingEngine::default();

    s.set_reuse_media_sections(true);
    s.set_disable_track_on_pause(false);
    s.set_zero_rtp_on_pause(true);
    s.set_stop_tracks(false);

    assert!(s.reuse_media_sections());
    assert!(!s.disable_track_on_pause());
    assert!(s.zero_rtp_on_pause());
    assert!(!s.stop_tracks());
}
