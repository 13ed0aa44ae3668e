//! The `Value` tagged union

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

use super::{element_count, ValueKind};

/// A named variable's contents
///
/// Arrays are dense and stored in the order given; `shape` has rank >= 1 and
/// its product equals `data.len()`. A `Map` holds uniquely named entries in
/// insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A single double
    Scalar(f64),

    /// Dense integer array
    IntArray { shape: Vec<usize>, data: Vec<i64> },

    /// Dense real array
    RealArray { shape: Vec<usize>, data: Vec<f64> },

    /// UTF-8 string
    Text(String),

    /// Ordered named entries, names unique
    Map(Vec<(String, Value)>),
}

impl Value {
    // =========================================================================
    // Construction
    // =========================================================================

    pub fn scalar(x: f64) -> Self {
        Value::Scalar(x)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Integer array; fails with `ShapeMismatch` if `data` doesn't fill `shape`
    pub fn int_array(shape: Vec<usize>, data: Vec<i64>) -> Result<Self> {
        check_len(&shape, data.len())?;
        Ok(Value::IntArray { shape, data })
    }

    /// Integer array from 32-bit input, widened to i64
    pub fn int_array_i32(shape: Vec<usize>, data: &[i32]) -> Result<Self> {
        Self::int_array(shape, data.iter().map(|&v| i64::from(v)).collect())
    }

    /// Real array; fails with `ShapeMismatch` if `data` doesn't fill `shape`
    pub fn real_array(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        check_len(&shape, data.len())?;
        Ok(Value::RealArray { shape, data })
    }

    /// An n x 1 integer column
    pub fn int_column(data: Vec<i64>) -> Self {
        Value::IntArray {
            shape: vec![data.len(), 1],
            data,
        }
    }

    /// An n x 1 real column
    pub fn real_column(data: Vec<f64>) -> Self {
        Value::RealArray {
            shape: vec![data.len(), 1],
            data,
        }
    }

    /// Map from named entries; fails on an empty or repeated name
    pub fn map<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let entries: Vec<(String, Value)> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        check_names(&entries)?;
        Ok(Value::Map(entries))
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(_) => ValueKind::Scalar,
            Value::IntArray { .. } => ValueKind::IntArray,
            Value::RealArray { .. } => ValueKind::RealArray,
            Value::Text(_) => ValueKind::Text,
            Value::Map(_) => ValueKind::Map,
        }
    }

    /// Shape of an array value
    pub fn shape(&self) -> Option<&[usize]> {
        match self {
            Value::IntArray { shape, .. } | Value::RealArray { shape, .. } => Some(shape),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Value::IntArray { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn as_reals(&self) -> Option<&[f64]> {
        match self {
            Value::RealArray { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a field of a map value
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Field names of a map value, in stored order
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            Value::Map(entries) => entries.iter().map(|(k, _)| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Recheck the invariants of a value built through the public variants
    pub fn validate(&self) -> Result<()> {
        match self {
            Value::IntArray { shape, data } => check_len(shape, data.len()),
            Value::RealArray { shape, data } => check_len(shape, data.len()),
            Value::Map(entries) => {
                check_names(entries)?;
                entries.iter().try_for_each(|(_, v)| v.validate())
            }
            Value::Scalar(_) | Value::Text(_) => Ok(()),
        }
    }
}

fn check_len(shape: &[usize], actual: usize) -> Result<()> {
    let expected = element_count(shape)?;
    if expected != actual {
        return Err(CodecError::ShapeMismatch { expected, actual }.into());
    }
    Ok(())
}

fn check_names(entries: &[(String, Value)]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for (name, _) in entries {
        if name.is_empty() {
            return Err(CodecError::InvalidName.into());
        }
        if !seen.insert(name.as_str()) {
            return Err(CodecError::DuplicateName(name.clone()).into());
        }
    }
    Ok(())
}
