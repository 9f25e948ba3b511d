use thiserror::Error;

#[derive(Error, Debug)]
pub enum PsscError {
    #[error("chunk write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("dictionary_max_buf_size must be between 8 KiB and 1 GiB")]
    InvalidDictionaryBufSize,
}

pub type Result<T> = std::result::Result<T, PsscError>;
