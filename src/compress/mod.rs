//! Compression Module
//!
//! Gzip framing for octbin containers.
//!
//! ## Responsibilities
//! - Detect gzip files by magic bytes, independent of extension
//! - Wrap streams for transparent deflate on write / inflate on read
//! - Compress a finished raw file into its `.gz` sibling atomically
//!
//! ## Two-Phase Writes
//! Sessions write plain records and compress once on close instead of keeping
//! deflate state open across appends. The whole raw file is buffered, bounded
//! by `Config::max_compress_buffer`.
//!
//! Every artifact is written to a temp file in the target directory and
//! renamed into place, so a failure leaves neither a partial `.gz` nor a
//! damaged raw file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use crate::config::Config;
use crate::error::{OctbinError, Result};

/// First two bytes of every gzip member
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Suffix appended to a raw path to name its compressed artifact
pub const GZ_SUFFIX: &str = ".gz";

/// True iff the file at `path` starts with the gzip magic.
///
/// Unreadable or shorter-than-two-byte files are reported as not compressed.
pub fn detect(path: &Path) -> bool {
    let mut magic = [0u8; 2];
    match File::open(path).and_then(|mut f| f.read_exact(&mut magic)) {
        Ok(()) => magic == GZIP_MAGIC,
        Err(_) => false,
    }
}

/// Wrap a writer so everything written to it is gzip-compressed
pub fn wrap_for_write<W: Write>(raw: W, level: u32) -> GzEncoder<W> {
    GzEncoder::new(raw, Compression::new(level.min(9)))
}

/// Wrap a reader so gzip data read through it is inflated.
///
/// Concatenated gzip members are read as one stream.
pub fn wrap_for_read<R: Read>(raw: R) -> MultiGzDecoder<R> {
    MultiGzDecoder::new(raw)
}

/// `<raw_path>.gz`
pub fn gz_path(raw_path: &Path) -> PathBuf {
    let mut name = OsString::from(raw_path.as_os_str());
    name.push(GZ_SUFFIX);
    PathBuf::from(name)
}

/// Compress `raw_path` into `<raw_path>.gz` and remove the raw file.
///
/// Returns the compressed path. On failure the raw file is left intact and
/// no `.gz` is created.
pub fn finalize_compress(raw_path: &Path, config: &Config) -> Result<PathBuf> {
    let target = gz_path(raw_path);
    compress_and_remove(raw_path, &target, config)?;
    Ok(target)
}

/// Compress `raw_path` into `target` (replacing it atomically), then remove
/// `raw_path`
pub fn compress_and_remove(raw_path: &Path, target: &Path, config: &Config) -> Result<()> {
    compress_to(raw_path, target, config)?;
    fs::remove_file(raw_path).map_err(|source| OctbinError::Compression {
        path: raw_path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Compressed {} -> {}", raw_path.display(), target.display());
    Ok(())
}

/// Gzip the whole of `raw_path` into `target`, leaving `raw_path` in place
pub fn compress_to(raw_path: &Path, target: &Path, config: &Config) -> Result<()> {
    let wrap = |source: io::Error| OctbinError::Compression {
        path: raw_path.to_path_buf(),
        source,
    };

    let size = fs::metadata(raw_path).map_err(wrap)?.len();
    if size > config.max_compress_buffer {
        return Err(wrap(io::Error::new(
            io::ErrorKind::Other,
            format!(
                "raw file is {} bytes, limit is {}",
                size, config.max_compress_buffer
            ),
        )));
    }

    let data = fs::read(raw_path).map_err(wrap)?;

    let tmp = NamedTempFile::new_in(parent_dir(target)).map_err(wrap)?;
    let mut encoder = wrap_for_write(tmp, config.compression_level);
    encoder.write_all(&data).map_err(wrap)?;
    let tmp = encoder.finish().map_err(wrap)?;
    tmp.as_file().sync_all().map_err(wrap)?;
    tmp.persist(target).map_err(|e| wrap(e.error))?;
    Ok(())
}

/// Inflate the gzip file `gz_path` into `target` (replacing it atomically)
pub fn inflate_to(gz_path: &Path, target: &Path) -> Result<()> {
    let wrap = |source: io::Error| OctbinError::Compression {
        path: gz_path.to_path_buf(),
        source,
    };

    let input = File::open(gz_path).map_err(wrap)?;
    let mut decoder = wrap_for_read(BufReader::new(input));

    let mut tmp = NamedTempFile::new_in(parent_dir(target)).map_err(wrap)?;
    io::copy(&mut decoder, &mut tmp).map_err(wrap)?;
    tmp.as_file().sync_all().map_err(wrap)?;
    tmp.persist(target).map_err(|e| wrap(e.error))?;
    tracing::debug!("Inflated {} -> {}", gz_path.display(), target.display());
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}
