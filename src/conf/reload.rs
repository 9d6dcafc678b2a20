//! Hot-reload eligibility
//!
//! A live path can absorb a new configuration only when every difference is
//! in a field it re-reads while running. Everything else (source URL,
//! transport, on-demand settings, hooks...) requires destroying the path and
//! creating it again.

use super::path::PathConf;

/// Copy the fields that a running path can pick up without restarting
fn copy_hot_reloadable(dst: &mut PathConf, src: &PathConf) {
    dst.name = src.name.clone();
    dst.regexp = src.regexp.clone();

    dst.record = src.record;
    dst.record_path = src.record_path.clone();
    dst.record_format = src.record_format;
    dst.record_part_duration = src.record_part_duration;
    dst.record_max_part_size = src.record_max_part_size;
    dst.record_segment_duration = src.record_segment_duration;
    dst.record_delete_after = src.record_delete_after;

    dst.camera.tuning = src.camera.tuning.clone();
}

/// Whether `new` can be applied to a path running with `old`
pub fn can_hot_reload(old: &PathConf, new: &PathConf) -> bool {
    let mut patched = old.clone();
    copy_hot_reloadable(&mut patched, new);
    patched == *new
}

/// Whether recording has to be restarted when moving from `old` to `new`
pub fn record_changed(old: &PathConf, new: &PathConf) -> bool {
    old.record != new.record
        || old.record_path != new.record_path
        || old.record_format != new.record_format
        || old.record_part_duration != new.record_part_duration
        || old.record_max_part_size != new.record_max_part_size
        || old.record_segment_duration != new.record_segment_duration
        || old.record_delete_after != new.record_delete_after
}
