//! `-r` shorthand presets, expanding to the PID/stream-type sets a caller
//! would otherwise have to spell out with `-p`/`-t`.
//!
//! The source distribution's CLI carries equivalent shorthands but never
//! pins down the exact PID/stream-type numbers in a place this port could
//! crib from, so the two sets below are a documented judgment call: ARIB
//! STD-B10/B24 conventions fixed the EIT/EIT[schedule] PIDs as part of the
//! base PSI/SI PID allocation, while ARIB data broadcasting's BML carousel
//! is carried as `stream_type 0x0D` on whatever PID the PMT assigns it.

use crate::cli::Preset;

pub struct PresetExpansion {
    pub pids: Vec<u16>,
    pub stream_types: Vec<u8>,
}

pub fn expand(preset: Preset) -> PresetExpansion {
    match preset {
        // ARIB object/data carousel: identified purely by stream_type on
        // whatever PID the PMT assigns it, so no fixed PID list applies.
        Preset::AribData => PresetExpansion {
            pids: Vec::new(),
            stream_types: vec![0x0D],
        },
        // EIT (present/following + schedule) rides PID 0x0012 in every ARIB
        // transport stream; it is table-based, not stream-type based.
        Preset::AribEpg => PresetExpansion {
            pids: vec![0x0012],
            stream_types: Vec::new(),
        },
    }
}
