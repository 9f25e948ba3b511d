//! Dictionary-coded PSI/SI archive format (PSSC): deduplicates sections
//! across a sliding two-chunk window and writes a compact binary archive
//! carrying a PCR-derived time track alongside the coded sections.

pub mod archiver;
pub mod dictionary;
pub mod error;
pub mod time_track;

pub use archiver::{Archiver, MAGIC};
pub use dictionary::{fingerprint, DictEntry, DictPage, CODE_NUMBER_BEGIN};
pub use error::{PsscError, Result};
pub use time_track::{TimeTrack, UNKNOWN_TIME};
