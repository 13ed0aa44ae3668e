//! Variable records
//!
//! Encodes one named `Value` per record and decodes records back, either the
//! next one in the stream or the first one matching a name.

use std::collections::HashSet;
use std::io::{self, ErrorKind, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::value::{element_count, Value};

use super::{Encoding, FormatHeader, MAX_NESTING_DEPTH};

/// Default per-field allocation limit while decoding (1 GiB)
const DEFAULT_MAX_RECORD_BYTES: u64 = 1024 * 1024 * 1024;

/// On-disk type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeTag {
    Scalar = 0,
    IntArray = 1,
    RealArray = 2,
    Text = 3,
    Map = 4,
}

impl TypeTag {
    pub fn from_u8(tag: u8) -> std::result::Result<Self, CodecError> {
        match tag {
            0 => Ok(TypeTag::Scalar),
            1 => Ok(TypeTag::IntArray),
            2 => Ok(TypeTag::RealArray),
            3 => Ok(TypeTag::Text),
            4 => Ok(TypeTag::Map),
            _ => Err(CodecError::UnsupportedType(tag)),
        }
    }

    pub fn of(value: &Value) -> Self {
        match value {
            Value::Scalar(_) => TypeTag::Scalar,
            Value::IntArray { .. } => TypeTag::IntArray,
            Value::RealArray { .. } => TypeTag::RealArray,
            Value::Text(_) => TypeTag::Text,
            Value::Map(_) => TypeTag::Map,
        }
    }

    fn is_array(self) -> bool {
        matches!(self, TypeTag::IntArray | TypeTag::RealArray)
    }
}

/// Name, tag and shape of a record, read before its payload
struct RecordHead {
    name: String,
    tag: TypeTag,
    shape: Vec<usize>,
}

/// Record encoder/decoder bound to one file's header
#[derive(Debug, Clone, Copy)]
pub struct RecordCodec {
    encoding: Encoding,
    max_record_bytes: u64,
}

impl RecordCodec {
    pub fn new(header: &FormatHeader) -> Self {
        Self {
            encoding: Encoding::new(header),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    /// Cap any single name, shape, string or array allocation while decoding
    pub fn with_max_record_bytes(mut self, limit: u64) -> Self {
        self.max_record_bytes = limit;
        self
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Encode one named record into a buffer
    pub fn encode(&self, name: &str, value: &Value) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_record(&mut buf, name, value, 0)?;
        Ok(buf.freeze())
    }

    /// Append one named record to `writer`
    pub fn write_variable<W: Write>(&self, writer: &mut W, name: &str, value: &Value) -> Result<()> {
        let bytes = self.encode(name, value)?;
        writer.write_all(&bytes)?;
        tracing::trace!("Wrote record '{}' ({} bytes)", name, bytes.len());
        Ok(())
    }

    fn encode_record(&self, buf: &mut BytesMut, name: &str, value: &Value, depth: usize) -> Result<()> {
        if depth > MAX_NESTING_DEPTH {
            return Err(CodecError::NestingTooDeep(MAX_NESTING_DEPTH).into());
        }
        if name.is_empty() {
            return Err(CodecError::InvalidName.into());
        }
        let name_len =
            u32::try_from(name.len()).map_err(|_| CodecError::RecordTooLarge(name.len() as u64))?;

        self.encoding.put_u32(buf, name_len);
        buf.put_slice(name.as_bytes());
        buf.put_u8(TypeTag::of(value) as u8);

        match value {
            Value::Scalar(x) => {
                self.encoding.check_reals()?;
                self.encoding.put_f64(buf, *x);
            }
            Value::IntArray { shape, data } => {
                self.put_shape(buf, shape, data.len())?;
                buf.reserve(data.len() * 8);
                for &v in data {
                    self.encoding.put_i64(buf, v);
                }
            }
            Value::RealArray { shape, data } => {
                self.encoding.check_reals()?;
                self.put_shape(buf, shape, data.len())?;
                buf.reserve(data.len() * 8);
                for &v in data {
                    self.encoding.put_f64(buf, v);
                }
            }
            Value::Text(s) => {
                self.encoding.put_u64(buf, s.len() as u64);
                buf.put_slice(s.as_bytes());
            }
            Value::Map(entries) => {
                let count = u32::try_from(entries.len())
                    .map_err(|_| CodecError::RecordTooLarge(entries.len() as u64))?;
                self.encoding.put_u32(buf, count);
                let mut seen = HashSet::with_capacity(entries.len());
                for (field, inner) in entries {
                    if !seen.insert(field.as_str()) {
                        return Err(CodecError::DuplicateName(field.clone()).into());
                    }
                    self.encode_record(buf, field, inner, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn put_shape(&self, buf: &mut BytesMut, shape: &[usize], len: usize) -> Result<()> {
        let expected = element_count(shape)?;
        if expected != len {
            return Err(CodecError::ShapeMismatch {
                expected,
                actual: len,
            }
            .into());
        }
        self.encoding.put_u32(buf, shape.len() as u32);
        for &dim in shape {
            self.encoding.put_u64(buf, dim as u64);
        }
        Ok(())
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Decode the next record, which must be named `expected`.
    ///
    /// On a name mismatch the record is skipped, so the stream stays on a
    /// record boundary, and `NameNotFound` is returned.
    pub fn read_variable<R: Read>(&self, reader: &mut R, expected: &str) -> Result<Value> {
        let head = match self.read_head(reader)? {
            Some(head) => head,
            None => return Err(CodecError::NameNotFound(expected.to_string()).into()),
        };

        if head.name != expected {
            self.skip_payload(reader, head.tag, &head.shape, 0)?;
            return Err(CodecError::NameNotFound(expected.to_string()).into());
        }

        self.read_payload(reader, head.tag, head.shape, 0)
    }

    /// Decode the next record, or `None` at a clean end of stream
    pub fn next_record<R: Read>(&self, reader: &mut R) -> Result<Option<(String, Value)>> {
        match self.read_head(reader)? {
            Some(head) => {
                let value = self.read_payload(reader, head.tag, head.shape, 0)?;
                Ok(Some((head.name, value)))
            }
            None => Ok(None),
        }
    }

    /// Scan forward to the first record named `name`, skipping payloads of
    /// the others
    pub fn find_variable<R: Read>(&self, reader: &mut R, name: &str) -> Result<Value> {
        while let Some(head) = self.read_head(reader)? {
            if head.name == name {
                return self.read_payload(reader, head.tag, head.shape, 0);
            }
            self.skip_payload(reader, head.tag, &head.shape, 0)?;
        }
        Err(CodecError::NameNotFound(name.to_string()).into())
    }

    /// Names of all remaining records, without decoding payloads
    pub fn record_names<R: Read>(&self, reader: &mut R) -> Result<Vec<String>> {
        let mut names = Vec::new();
        while let Some(head) = self.read_head(reader)? {
            self.skip_payload(reader, head.tag, &head.shape, 0)?;
            names.push(head.name);
        }
        Ok(names)
    }

    fn read_head<R: Read>(&self, reader: &mut R) -> Result<Option<RecordHead>> {
        let mut len_buf = [0u8; 4];
        if !read_exact_or_eof(reader, &mut len_buf)? {
            return Ok(None);
        }
        let name_len = self.encoding.get_u32(&mut &len_buf[..]);

        let name = String::from_utf8(self.read_bytes(reader, u64::from(name_len))?)
            .map_err(|_| CodecError::InvalidUtf8)?;
        if name.is_empty() {
            return Err(CodecError::InvalidName.into());
        }

        let mut tag = [0u8; 1];
        reader.read_exact(&mut tag)?;
        let tag = TypeTag::from_u8(tag[0])?;

        let shape = if tag.is_array() {
            self.read_shape(reader)?
        } else {
            Vec::new()
        };

        tracing::trace!("Record head '{}' {:?} {:?}", name, tag, shape);
        Ok(Some(RecordHead { name, tag, shape }))
    }

    fn read_shape<R: Read>(&self, reader: &mut R) -> Result<Vec<usize>> {
        let mut rank_buf = [0u8; 4];
        reader.read_exact(&mut rank_buf)?;
        let rank = self.encoding.get_u32(&mut &rank_buf[..]);
        if rank == 0 {
            return Err(CodecError::ShapeMismatch {
                expected: 1,
                actual: 0,
            }
            .into());
        }

        let mut raw = Bytes::from(self.read_bytes(reader, u64::from(rank) * 8)?);
        let mut shape = Vec::with_capacity(rank as usize);
        for _ in 0..rank {
            let dim = self.encoding.get_u64(&mut raw);
            shape.push(usize::try_from(dim).map_err(|_| CodecError::RecordTooLarge(dim))?);
        }
        Ok(shape)
    }

    fn read_payload<R: Read>(
        &self,
        reader: &mut R,
        tag: TypeTag,
        shape: Vec<usize>,
        depth: usize,
    ) -> Result<Value> {
        match tag {
            TypeTag::Scalar => {
                self.encoding.check_reals()?;
                let mut raw = Bytes::from(self.read_bytes(reader, 8)?);
                Ok(Value::Scalar(self.encoding.get_f64(&mut raw)))
            }
            TypeTag::IntArray => {
                let count = element_count(&shape)?;
                let mut raw = Bytes::from(self.read_bytes(reader, array_bytes(count)?)?);
                let data = (0..count).map(|_| self.encoding.get_i64(&mut raw)).collect();
                Ok(Value::IntArray { shape, data })
            }
            TypeTag::RealArray => {
                self.encoding.check_reals()?;
                let count = element_count(&shape)?;
                let mut raw = Bytes::from(self.read_bytes(reader, array_bytes(count)?)?);
                let data = (0..count).map(|_| self.encoding.get_f64(&mut raw)).collect();
                Ok(Value::RealArray { shape, data })
            }
            TypeTag::Text => {
                let len = self.read_u64(reader)?;
                let text = String::from_utf8(self.read_bytes(reader, len)?)
                    .map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text))
            }
            TypeTag::Map => {
                if depth > MAX_NESTING_DEPTH {
                    return Err(CodecError::NestingTooDeep(MAX_NESTING_DEPTH).into());
                }
                let count = self.read_u32(reader)?;
                let mut entries = Vec::with_capacity((count as usize).min(1024));
                for _ in 0..count {
                    let head = self.read_head(reader)?.ok_or_else(truncated_map)?;
                    let inner = self.read_payload(reader, head.tag, head.shape, depth + 1)?;
                    entries.push((head.name, inner));
                }
                Value::map(entries)
            }
        }
    }

    fn skip_payload<R: Read>(
        &self,
        reader: &mut R,
        tag: TypeTag,
        shape: &[usize],
        depth: usize,
    ) -> Result<()> {
        match tag {
            TypeTag::Scalar => skip(reader, 8),
            TypeTag::IntArray | TypeTag::RealArray => {
                let count = element_count(shape)?;
                skip(reader, array_bytes(count)?)
            }
            TypeTag::Text => {
                let len = self.read_u64(reader)?;
                skip(reader, len)
            }
            TypeTag::Map => {
                if depth > MAX_NESTING_DEPTH {
                    return Err(CodecError::NestingTooDeep(MAX_NESTING_DEPTH).into());
                }
                let count = self.read_u32(reader)?;
                for _ in 0..count {
                    let head = self.read_head(reader)?.ok_or_else(truncated_map)?;
                    self.skip_payload(reader, head.tag, &head.shape, depth + 1)?;
                }
                Ok(())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Primitive reads
    // -------------------------------------------------------------------------

    fn read_u32<R: Read>(&self, reader: &mut R) -> Result<u32> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(self.encoding.get_u32(&mut &buf[..]))
    }

    fn read_u64<R: Read>(&self, reader: &mut R) -> Result<u64> {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf)?;
        Ok(self.encoding.get_u64(&mut &buf[..]))
    }

    fn read_bytes<R: Read>(&self, reader: &mut R, len: u64) -> Result<Vec<u8>> {
        if len > self.max_record_bytes {
            return Err(CodecError::RecordTooLarge(len).into());
        }
        let mut bytes = vec![0u8; len as usize];
        reader.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

// =============================================================================
// Free-function API
// =============================================================================

/// Append one named record encoded per `header`
pub fn write_variable<W: Write>(
    writer: &mut W,
    header: &FormatHeader,
    name: &str,
    value: &Value,
) -> Result<()> {
    RecordCodec::new(header).write_variable(writer, name, value)
}

/// Decode the next record, which must be named `expected`
pub fn read_variable<R: Read>(reader: &mut R, header: &FormatHeader, expected: &str) -> Result<Value> {
    RecordCodec::new(header).read_variable(reader, expected)
}

// =============================================================================
// Helpers
// =============================================================================

fn array_bytes(count: usize) -> Result<u64> {
    (count as u64)
        .checked_mul(8)
        .ok_or_else(|| CodecError::RecordTooLarge(u64::MAX).into())
}

fn truncated_map() -> io::Error {
    io::Error::new(ErrorKind::UnexpectedEof, "map ended before all entries were read")
}

/// Fill `buf` completely; `Ok(false)` if the stream was already at EOF
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(ErrorKind::UnexpectedEof, "record truncated").into())
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn skip<R: Read>(reader: &mut R, len: u64) -> Result<()> {
    let copied = io::copy(&mut (&mut *reader).take(len), &mut io::sink())?;
    if copied < len {
        return Err(io::Error::new(ErrorKind::UnexpectedEof, "record truncated").into());
    }
    Ok(())
}
