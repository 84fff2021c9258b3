//! Cape manager overlays.
//!
//! Device tree overlays are loaded by writing their name to
//! `<devices>/bone_capemgr.*/slots` and unloaded by writing `-<slot>`.
//! Loaded overlays are listed one per line as `<slot>: <flags> <...>,<name>`.

use std::io;
use std::path::Path;

use embr_common::error::{HalError, HalResult};
use tracing::info;

use crate::hosts::generic::sysfs;

/// Default root of the platform device tree.
pub const DEVICES_ROOT: &str = "/sys/devices";

fn read_slots(devices_root: &Path) -> HalResult<(std::path::PathBuf, String)> {
    let slots = sysfs::find_first_matching(devices_root, &["bone_capemgr."], "slots")?;
    let file = sysfs::open_ro(&slots)?;
    let text = sysfs::read_all(&file, &slots)?;
    Ok((slots, text))
}

/// Slot number of the line listing `feature`.
fn slot_of(slots: &str, feature: &str) -> Option<u32> {
    slots
        .lines()
        .find(|line| line.contains(feature))
        .and_then(|line| line.split(':').next())
        .and_then(|slot| slot.trim().parse().ok())
}

/// Load `feature` unless it is already listed.
pub fn ensure_feature_enabled(devices_root: &Path, feature: &str) -> HalResult<()> {
    let (slots, text) = read_slots(devices_root)?;
    if text.contains(feature) {
        return Ok(());
    }
    info!("Enabling cape feature {feature}");
    sysfs::write_attr(&slots, feature)
}

/// Unload `feature` if it is listed.
pub fn ensure_feature_disabled(devices_root: &Path, feature: &str) -> HalResult<()> {
    let (slots, text) = read_slots(devices_root)?;
    if !text.contains(feature) {
        return Ok(());
    }
    let slot = slot_of(&text, feature).ok_or_else(|| {
        HalError::sysfs(&slots, io::Error::new(io::ErrorKind::InvalidData, "unparsable slot line"))
    })?;
    info!("Disabling cape feature {feature} (slot {slot})");
    sysfs::write_attr(&slots, &format!("-{slot}"))
}
