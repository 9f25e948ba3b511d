use thiserror::Error;

/// Errors that can occur while parsing Transport Stream data or synthesizing
/// replacement PSI sections.
#[derive(Error, Debug)]
pub enum TsError {
    #[error("invalid packet size: expected 188 bytes, got {0}")]
    InvalidPacketSize(usize),

    #[error("invalid sync byte: expected 0x47, got 0x{0:02x}")]
    InvalidSyncByte(u8),

    #[error("insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("invalid table id: expected {expected}, got {actual}")]
    InvalidTableId { expected: u8, actual: u8 },

    #[error("invalid section length: {0}")]
    InvalidSectionLength(u16),
}
