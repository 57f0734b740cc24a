use thiserror::Error;

/// Errors surfaced by the fixed-point [`crate::amount::Amount`] arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount overflow")]
    Overflow,

    #[error("insufficient balance: need {need}, have {have}")]
    Insufficient { need: u64, have: u64 },
}

/// Errors from the binary `Serializer` round-trip (§3 wire format).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SerializerError {
    #[error("unexpected end of buffer")]
    OutOfBounds,

    #[error("invalid value encountered at offset {0}")]
    InvalidValue(usize),

    #[error("trailing bytes left after deserialization")]
    TrailingBytes,
}

/// Errors abstract [`crate::database::Database`] backends surface (§6, §7 Transient kind).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key not found")]
    NotFound,

    #[error("data corruption detected: {0}")]
    Corruption(String),

    #[error("operation not supported by this backend")]
    NotSupported,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("database is not open")]
    NotOpen,

    #[error("unknown storage error: {0}")]
    Unknown(String),
}
