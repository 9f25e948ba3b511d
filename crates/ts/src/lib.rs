//! MPEG-2 Transport Stream PSI/SI parsing, PAT/PMT synthesis, and per-PID
//! section reassembly.
//!
//! This crate provides the packet- and section-level building blocks used to
//! track a single program's PAT/PMT pair across a TS stream and rewrite them
//! down to a minimal replacement carrying only the elementary streams the
//! caller cares about.

pub mod adaptation_field;
pub mod crc32;
pub mod error;
pub mod extractor;
pub mod packet;
pub mod pat;
pub mod pmt;
pub mod section;
pub mod target;

pub use adaptation_field::{AdaptationField, Pcr};
pub use crc32::{mpeg2_crc32, validate_section_crc32};
pub use error::TsError;
pub use extractor::{PsiExtractor, SectionSink};
pub use packet::{PID_PAT, TsPacket};
pub use pat::{Pat, PatProgram, PatSynthesizer, ProgramSelector};
pub use pmt::{PmtSynthesizer, StreamType};
pub use section::{SectionBuffer, SECTION_BUFFER_CAP};
pub use target::{PsiState, TargetSet};

/// Result type for TS parsing operations.
pub type Result<T> = std::result::Result<T, TsError>;
