//! Error types for octbin
//!
//! Provides a unified error type for all operations, with one nested enum
//! per failure family (open, format, codec, mode).

use std::path::PathBuf;

use thiserror::Error;

use crate::format::FloatFormat;
use crate::session::SessionState;

/// Result type alias using OctbinError
pub type Result<T> = std::result::Result<T, OctbinError>;

/// Unified error type for octbin operations
#[derive(Debug, Error)]
pub enum OctbinError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Open failed: {0}")]
    Open(#[from] OpenError),

    #[error("Mode error: {0}")]
    Mode(#[from] ModeError),

    // -------------------------------------------------------------------------
    // Format / Codec Errors
    // -------------------------------------------------------------------------
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    // -------------------------------------------------------------------------
    // Compression Errors
    // -------------------------------------------------------------------------
    /// Finalizing (or inflating) a compressed artifact failed. The raw file
    /// is left untouched.
    #[error("Compression of {path} failed: {source}")]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures while opening a file
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid header in {path}: {source}")]
    HeaderError {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A compressed session would replace a gzip file it did not read
    #[error("compressed copy {0} already exists")]
    CompressedCopyExists(PathBuf),
}

/// Failures in the file header or numeric representation
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("bad magic bytes {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown float format tag 0x{0:02x}")]
    UnknownFloatFormat(u8),

    #[error("unknown byte order tag 0x{0:02x}")]
    UnknownByteOrder(u8),

    #[error("conversion from {0:?} floats is not supported")]
    UnsupportedConversion(FloatFormat),

    #[error("header truncated")]
    Truncated,
}

/// Failures while encoding or decoding a value
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("shape holds {expected} elements but data has {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("unsupported type tag 0x{0:02x}")]
    UnsupportedType(u8),

    #[error("variable '{0}' not found")]
    NameNotFound(String),

    #[error("duplicate name '{0}' in map")]
    DuplicateName(String),

    #[error("variable names must be non-empty")]
    InvalidName,

    #[error("maps nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("record contains invalid UTF-8")]
    InvalidUtf8,

    #[error("record field of {0} bytes exceeds the configured limit")]
    RecordTooLarge(u64),
}

/// Operation not allowed in the session's current state
#[derive(Debug, Error)]
pub enum ModeError {
    #[error("cannot load while in state {0:?}")]
    InvalidModeForRead(SessionState),

    #[error("cannot save while in state {0:?}")]
    InvalidModeForWrite(SessionState),
}

impl OctbinError {
    /// True if this is a `NameNotFound` codec error
    pub fn is_name_not_found(&self) -> bool {
        matches!(self, OctbinError::Codec(CodecError::NameNotFound(_)))
    }
}
