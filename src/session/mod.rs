//! Session Module
//!
//! Stateful controller for one open octbin file.
//!
//! ## Responsibilities
//! - Choose raw vs. gzip backing from the file's contents on open
//! - Turn a write request on an existing file into an append
//! - Save/load named variables through the record codec
//! - Compress write sessions on close
//!
//! ## Concurrency Model
//! Every `FileHandle` owns its stream and shares nothing with other handles,
//! so handles may live on different threads. Several readers may open the
//! same path, each with its own position. Two writers on the same path are
//! not detected and leave the file in an unspecified state.

mod handle;
mod mode;

pub use handle::FileHandle;
pub use mode::{OpenMode, SessionState};
