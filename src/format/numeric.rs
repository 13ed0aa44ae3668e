//! Numeric field encoding
//!
//! Integers and length fields follow the header's byte order; reals follow
//! its float format. Only the IEEE formats convert to host doubles.

use bytes::{Buf, BufMut};

use crate::error::{FormatError, Result};

use super::{ByteOrder, FloatFormat, FormatHeader};

/// Per-file numeric encoding derived from a `FormatHeader`
#[derive(Debug, Clone, Copy)]
pub struct Encoding {
    byte_order: ByteOrder,
    float_format: FloatFormat,
}

impl Encoding {
    pub fn new(header: &FormatHeader) -> Self {
        Self {
            byte_order: header.byte_order,
            float_format: header.float_format,
        }
    }

    /// Fail unless reals in this encoding can be converted to/from f64
    pub fn check_reals(&self) -> Result<()> {
        if self.float_format.is_ieee() {
            Ok(())
        } else {
            Err(FormatError::UnsupportedConversion(self.float_format).into())
        }
    }

    // -------------------------------------------------------------------------
    // Encoding
    // -------------------------------------------------------------------------

    pub fn put_u32<B: BufMut>(&self, buf: &mut B, v: u32) {
        match self.byte_order {
            ByteOrder::Little => buf.put_u32_le(v),
            ByteOrder::Big => buf.put_u32(v),
        }
    }

    pub fn put_u64<B: BufMut>(&self, buf: &mut B, v: u64) {
        match self.byte_order {
            ByteOrder::Little => buf.put_u64_le(v),
            ByteOrder::Big => buf.put_u64(v),
        }
    }

    pub fn put_i64<B: BufMut>(&self, buf: &mut B, v: i64) {
        match self.byte_order {
            ByteOrder::Little => buf.put_i64_le(v),
            ByteOrder::Big => buf.put_i64(v),
        }
    }

    /// Caller must have passed `check_reals`
    pub fn put_f64<B: BufMut>(&self, buf: &mut B, v: f64) {
        match self.float_format {
            FloatFormat::IeeeBig => buf.put_f64(v),
            _ => buf.put_f64_le(v),
        }
    }

    // -------------------------------------------------------------------------
    // Decoding (caller guarantees `buf` holds enough bytes)
    // -------------------------------------------------------------------------

    pub fn get_u32<B: Buf>(&self, buf: &mut B) -> u32 {
        match self.byte_order {
            ByteOrder::Little => buf.get_u32_le(),
            ByteOrder::Big => buf.get_u32(),
        }
    }

    pub fn get_u64<B: Buf>(&self, buf: &mut B) -> u64 {
        match self.byte_order {
            ByteOrder::Little => buf.get_u64_le(),
            ByteOrder::Big => buf.get_u64(),
        }
    }

    pub fn get_i64<B: Buf>(&self, buf: &mut B) -> i64 {
        match self.byte_order {
            ByteOrder::Little => buf.get_i64_le(),
            ByteOrder::Big => buf.get_i64(),
        }
    }

    /// Caller must have passed `check_reals`
    pub fn get_f64<B: Buf>(&self, buf: &mut B) -> f64 {
        match self.float_format {
            FloatFormat::IeeeBig => buf.get_f64(),
            _ => buf.get_f64_le(),
        }
    }
}
