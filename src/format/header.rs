//! File header
//!
//! Fixed 7-byte preamble recording the float format and byte order that every
//! record in the file is encoded with.

use std::io::{ErrorKind, Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, Result};

use super::{HEADER_SIZE, MAGIC, MAX_VERSION, MIN_VERSION, VERSION};

/// Floating point representation of stored reals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FloatFormat {
    IeeeLittle = 0,
    IeeeBig = 1,
    VaxD = 2,
    VaxG = 3,
    Cray = 4,
}

impl FloatFormat {
    pub fn from_u8(tag: u8) -> std::result::Result<Self, FormatError> {
        match tag {
            0 => Ok(FloatFormat::IeeeLittle),
            1 => Ok(FloatFormat::IeeeBig),
            2 => Ok(FloatFormat::VaxD),
            3 => Ok(FloatFormat::VaxG),
            4 => Ok(FloatFormat::Cray),
            _ => Err(FormatError::UnknownFloatFormat(tag)),
        }
    }

    pub fn is_ieee(self) -> bool {
        matches!(self, FloatFormat::IeeeLittle | FloatFormat::IeeeBig)
    }

    /// IEEE format of the running machine
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            FloatFormat::IeeeBig
        } else {
            FloatFormat::IeeeLittle
        }
    }
}

/// Byte order of stored integers and length fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ByteOrder {
    Little = 0,
    Big = 1,
}

impl ByteOrder {
    pub fn from_u8(tag: u8) -> std::result::Result<Self, FormatError> {
        match tag {
            0 => Ok(ByteOrder::Little),
            1 => Ok(ByteOrder::Big),
            _ => Err(FormatError::UnknownByteOrder(tag)),
        }
    }

    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

/// Decoded file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatHeader {
    pub version: u8,
    pub float_format: FloatFormat,
    pub byte_order: ByteOrder,
}

impl FormatHeader {
    /// Header written by default: IEEE little-endian, current version
    pub fn canonical() -> Self {
        Self::new(FloatFormat::IeeeLittle, ByteOrder::Little)
    }

    pub fn new(float_format: FloatFormat, byte_order: ByteOrder) -> Self {
        Self {
            version: VERSION,
            float_format,
            byte_order,
        }
    }

    /// True when integers must be byte-swapped to reach host order
    pub fn needs_swap(&self) -> bool {
        self.byte_order != ByteOrder::native()
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(MAGIC);
        out[4] = self.version;
        out[5] = self.float_format as u8;
        out[6] = self.byte_order as u8;
        out
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> std::result::Result<Self, FormatError> {
        if &bytes[0..4] != MAGIC {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(&bytes[0..4]);
            return Err(FormatError::BadMagic(magic));
        }

        let version = bytes[4];
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(FormatError::UnsupportedVersion(version));
        }

        Ok(Self {
            version,
            float_format: FloatFormat::from_u8(bytes[5])?,
            byte_order: ByteOrder::from_u8(bytes[6])?,
        })
    }
}

impl Default for FormatHeader {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Write the header; must precede every record in a new file
pub fn write_header<W: Write>(writer: &mut W, header: &FormatHeader) -> Result<()> {
    writer.write_all(&header.to_bytes())?;
    Ok(())
}

/// Read and validate the header at the current stream position
pub fn read_header<R: Read>(reader: &mut R) -> Result<FormatHeader> {
    let mut bytes = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(FormatError::Truncated.into()),
        Err(e) => return Err(e.into()),
    }
    Ok(FormatHeader::from_bytes(&bytes)?)
}
