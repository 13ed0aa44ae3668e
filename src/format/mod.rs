//! Format Module
//!
//! Binary layout of an octbin container.
//!
//! ## File Format
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Header (7 bytes)                                          │
//! │   Magic: "OCTB" (4) | Version (1) | FloatFmt (1) | BO (1) │
//! ├───────────────────────────────────────────────────────────┤
//! │ Record (repeated, zero or more)                           │
//! │   NameLen: u32 | Name (UTF-8) | Tag: u8                   │
//! │   [Rank: u32 | Shape: Rank x u64]      (arrays only)      │
//! │   Payload                                                 │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Payload by Tag
//! - 0x00 Scalar:    f64
//! - 0x01 IntArray:  product(shape) x i64
//! - 0x02 RealArray: product(shape) x f64
//! - 0x03 Text:      ByteLen: u64 | UTF-8 bytes
//! - 0x04 Map:       Count: u32 | Count nested records
//!
//! Integers and lengths use the header's byte order, reals its float format.
//! A gzip-compressed container is the gzip framing of this whole stream.

mod header;
mod numeric;
mod record;

pub use header::{read_header, write_header, ByteOrder, FloatFormat, FormatHeader};
pub use numeric::Encoding;
pub use record::{read_variable, write_variable, RecordCodec, TypeTag};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying an octbin container
pub const MAGIC: &[u8; 4] = b"OCTB";

/// Format version written by this crate
pub const VERSION: u8 = 1;

/// Oldest and newest versions this crate can read
pub const MIN_VERSION: u8 = 1;
pub const MAX_VERSION: u8 = 1;

/// Header size: Magic (4) + Version (1) + FloatFormat (1) + ByteOrder (1)
pub const HEADER_SIZE: usize = 7;

/// Deepest map nesting accepted on write or read
pub const MAX_NESTING_DEPTH: usize = 32;
