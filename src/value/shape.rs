//! Shape helpers

use crate::error::CodecError;

/// Number of elements described by `shape`.
///
/// Fails with `ShapeMismatch` for a rank-0 shape or when the product
/// overflows `usize`. A zero extent anywhere yields 0.
pub fn element_count(shape: &[usize]) -> std::result::Result<usize, CodecError> {
    if shape.is_empty() {
        return Err(CodecError::ShapeMismatch {
            expected: 1,
            actual: 0,
        });
    }

    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or(CodecError::ShapeMismatch {
            expected: usize::MAX,
            actual: 0,
        })
}
