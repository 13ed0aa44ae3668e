//! # octbin
//!
//! A self-describing binary container for named numeric variables with:
//! - Scalars, dense integer/real arrays, text and nested maps
//! - A fixed header recording float format and byte order
//! - Transparent gzip compression, detected by magic bytes
//! - Explicit, caller-owned file handles
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        FileHandle                           │
//! │         open / save / load / close (session state)          │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!                 │                             │
//!                 ▼                             ▼
//!         ┌──────────────┐              ┌──────────────┐
//!         │    format    │              │   compress   │
//!         │ header+record│              │ gzip detect, │
//!         │    codec     │              │ wrap, finalize│
//!         └──────┬───────┘              └──────────────┘
//!                │
//!                ▼
//!         ┌──────────────┐
//!         │    value     │
//!         │  Value model │
//!         └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use octbin::{FileHandle, OpenMode, Value};
//!
//! # fn main() -> octbin::Result<()> {
//! let mut out = FileHandle::open("run.octbin", OpenMode::WriteCompressed)?;
//! out.save("x", &Value::real_column(vec![0.0, 0.5, 1.0]))?;
//! let gz = out.close()?; // Some("run.octbin.gz")
//!
//! let mut input = FileHandle::open(gz.unwrap(), OpenMode::Read)?;
//! let x = input.load("x")?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod value;
pub mod format;
pub mod compress;
pub mod session;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{OctbinError, Result};
pub use config::{Config, LoadStrategy};
pub use format::{ByteOrder, FloatFormat, FormatHeader};
pub use session::{FileHandle, OpenMode, SessionState};
pub use value::Value;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of octbin
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
