use thiserror::Error;

#[derive(Error, Debug)]
pub enum IsamError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Block index {index} out of range (store holds {count} blocks)")]
    BlockOutOfRange { index: u64, count: u64 },

    #[error("Short read on block {index}: expected {expected} bytes, got {actual}")]
    ShortRead {
        index: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Corrupt header: {0}")]
    CorruptHeader(String),

    #[error("Corrupt block {index}: {reason}")]
    CorruptBlock { index: u64, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Configuration parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Key too long: {len} bytes (max: {max})")]
    KeyTooLong { len: usize, max: usize },

    #[error("Payload too long: {len} bytes (max: {max})")]
    PayloadTooLong { len: usize, max: usize },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Input not strictly ascending: {next} follows {previous}")]
    UnsortedInput { previous: String, next: String },
}

impl IsamError {
    /// True for failures of the underlying block device or file format
    ///
    /// These are the errors a caller cannot fix by changing arguments.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            IsamError::Io(_)
                | IsamError::BlockOutOfRange { .. }
                | IsamError::ShortRead { .. }
                | IsamError::CorruptHeader(_)
                | IsamError::CorruptBlock { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IsamError>;
