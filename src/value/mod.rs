//! Value Module
//!
//! In-memory representation of a storable variable.
//!
//! ## Responsibilities
//! - Tagged union of scalars, dense numeric arrays, text and named maps
//! - Shape/data consistency checks at construction time
//! - Structural (deep) equality
//!
//! No I/O happens here; encoding lives in `format`.

mod shape;
mod variant;

pub use shape::element_count;
pub use variant::Value;

/// Discriminant of a `Value`, independent of its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    IntArray,
    RealArray,
    Text,
    Map,
}
