//! FileHandle implementation
//!
//! Owns the backing stream of one open file and drives the
//! open → save/load → close lifecycle.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::compress;
use crate::config::{Config, LoadStrategy};
use crate::error::{CodecError, ModeError, OctbinError, OpenError, Result};
use crate::format::{read_header, write_header, FormatHeader, RecordCodec, HEADER_SIZE};
use crate::value::Value;

use super::{OpenMode, SessionState};

/// Suffix of the raw working copy used while appending to a gzip file
const APPEND_WORK_SUFFIX: &str = ".part";

/// Stream currently owned by the handle
enum Backing {
    Detached,
    Raw(BufReader<File>),
    Gzip(MultiGzDecoder<BufReader<File>>),
    Writer(BufWriter<File>),
}

/// One open octbin file
///
/// Created by [`FileHandle::open`]; the effective mode chosen from the
/// request and the file's contents is available from [`FileHandle::state`].
///
/// ## Paths
/// - `path`: what the caller opened
/// - `work_path`: the raw file actually read or written
/// - `compress_target`: where the gzip artifact lands on close, if any
pub struct FileHandle {
    path: PathBuf,
    work_path: PathBuf,
    compress_target: Option<PathBuf>,
    state: SessionState,
    header: FormatHeader,
    codec: RecordCodec,
    config: Config,
    backing: Backing,
    /// Top-level names already in the file (write states)
    names: Vec<String>,
    /// Decoded records (read states, `LoadStrategy::Cache`)
    cache: Option<Vec<(String, Value)>>,
}

impl FileHandle {
    // =========================================================================
    // Open
    // =========================================================================

    /// Open `path` with the default config
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::open_with_config(path, mode, Config::default())
    }

    /// Open `path`.
    ///
    /// - Read requests fail with `FileNotFound` if the file is missing and
    ///   become `ReadCompressed` whenever the file starts with the gzip magic.
    /// - Write requests on a non-empty existing file become appends and keep
    ///   its header and records. A gzip file is appended to through a raw
    ///   working copy and recompressed in place on close.
    /// - Write requests on a missing or empty file create it and write
    ///   `config.write_format` as its header.
    /// - If `path` is missing but `<path>.gz` exists, the session opens the
    ///   `.gz` instead, so a file closed compressed can be reopened by the
    ///   name it was written under.
    /// - A compressed write never replaces a `.gz` it did not read; that
    ///   fails with `CompressedCopyExists`.
    pub fn open_with_config(path: impl AsRef<Path>, mode: OpenMode, config: Config) -> Result<Self> {
        let (path, existing) = resolve_existing(path.as_ref().to_path_buf())?;

        let handle = if mode.is_read() {
            Self::open_read(path, existing, config)?
        } else {
            Self::open_write(path, mode, existing, config)?
        };

        tracing::debug!(
            "Opened {} as {:?} (requested {:?})",
            handle.path.display(),
            handle.state,
            mode
        );
        Ok(handle)
    }

    fn open_read(path: PathBuf, existing: Option<u64>, config: Config) -> Result<Self> {
        if existing.is_none() {
            return Err(OpenError::FileNotFound(path).into());
        }

        let (state, backing, header) = if compress::detect(&path) {
            let (reader, header) = open_gzip_reader(&path)?;
            (SessionState::ReadCompressed, Backing::Gzip(reader), header)
        } else {
            let (reader, header) = open_raw_reader(&path)?;
            (SessionState::ReadRaw, Backing::Raw(reader), header)
        };

        Ok(Self {
            work_path: path.clone(),
            path,
            compress_target: None,
            state,
            header,
            codec: RecordCodec::new(&header).with_max_record_bytes(config.max_record_bytes),
            config,
            backing,
            names: Vec::new(),
            cache: None,
        })
    }

    fn open_write(
        path: PathBuf,
        mode: OpenMode,
        existing: Option<u64>,
        config: Config,
    ) -> Result<Self> {
        if !config.write_format.float_format.is_ieee() {
            return Err(OctbinError::Config(format!(
                "cannot write {:?} floats",
                config.write_format.float_format
            )));
        }

        let compress = mode.wants_compression() || config.compress_on_close;
        match existing {
            Some(len) if len > 0 => Self::open_append(path, compress, config),
            _ => {
                if compress {
                    check_compress_target(&compress::gz_path(&path))?;
                }
                Self::create(path, compress, config)
            }
        }
    }

    fn create(path: PathBuf, compress: bool, config: Config) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| open_error(&path, e))?;

        let header = config.write_format;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, &header)?;

        let (state, compress_target) = if compress {
            (SessionState::WriteCompressed, Some(compress::gz_path(&path)))
        } else {
            (SessionState::WriteRaw, None)
        };

        Ok(Self {
            work_path: path.clone(),
            path,
            compress_target,
            state,
            header,
            codec: RecordCodec::new(&header).with_max_record_bytes(config.max_record_bytes),
            config,
            backing: Backing::Writer(writer),
            names: Vec::new(),
            cache: None,
        })
    }

    fn open_append(path: PathBuf, compress: bool, config: Config) -> Result<Self> {
        let inflated = compress::detect(&path);
        let (state, work_path, compress_target) = if inflated {
            let work = append_work_path(&path);
            compress::inflate_to(&path, &work)?;
            (SessionState::AppendCompressed, work, Some(path.clone()))
        } else if compress {
            let target = compress::gz_path(&path);
            check_compress_target(&target)?;
            (SessionState::AppendCompressed, path.clone(), Some(target))
        } else {
            (SessionState::AppendRaw, path.clone(), None)
        };

        let prepared = Self::scan_for_append(&work_path, &config).and_then(|(header, names)| {
            let file = OpenOptions::new()
                .append(true)
                .open(&work_path)
                .map_err(|e| open_error(&work_path, e))?;
            Ok((header, names, file))
        });

        let (header, names, file) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                if inflated {
                    if let Err(cleanup) = fs::remove_file(&work_path) {
                        tracing::warn!(
                            "Failed to remove working copy {}: {}",
                            work_path.display(),
                            cleanup
                        );
                    }
                }
                return Err(e);
            }
        };

        Ok(Self {
            path,
            work_path,
            compress_target,
            state,
            header,
            codec: RecordCodec::new(&header).with_max_record_bytes(config.max_record_bytes),
            config,
            backing: Backing::Writer(BufWriter::new(file)),
            names,
            cache: None,
        })
    }

    /// Read the existing header and record names of a raw file about to be
    /// appended to
    fn scan_for_append(work_path: &Path, config: &Config) -> Result<(FormatHeader, Vec<String>)> {
        let (mut reader, header) = open_raw_reader(work_path)?;
        let codec = RecordCodec::new(&header).with_max_record_bytes(config.max_record_bytes);
        let names = codec.record_names(&mut reader)?;
        Ok((header, names))
    }

    // =========================================================================
    // Save / Load
    // =========================================================================

    /// Append `value` as a top-level record named `name`.
    ///
    /// Fails with `InvalidModeForWrite` outside write/append states and with
    /// `DuplicateName` if the file already holds `name`. Nothing is written
    /// when encoding fails.
    pub fn save(&mut self, name: &str, value: &Value) -> Result<()> {
        let writer = match (&mut self.backing, self.state.is_write()) {
            (Backing::Writer(writer), true) => writer,
            _ => return Err(ModeError::InvalidModeForWrite(self.state).into()),
        };

        if self.names.iter().any(|n| n == name) {
            return Err(CodecError::DuplicateName(name.to_string()).into());
        }

        self.codec.write_variable(writer, name, value)?;
        self.names.push(name.to_string());
        Ok(())
    }

    /// Load the top-level record named `name`.
    ///
    /// Every scan starts again from the first record, so a failed load never
    /// affects the next one.
    pub fn load(&mut self, name: &str) -> Result<Value> {
        if !self.state.is_read() {
            return Err(ModeError::InvalidModeForRead(self.state).into());
        }

        match self.config.load_strategy {
            LoadStrategy::Scan => {
                self.rewind()?;
                let codec = self.codec;
                let mut reader = self.reader()?;
                codec.find_variable(&mut reader, name)
            }
            LoadStrategy::Cache => {
                if self.cache.is_none() {
                    self.cache = Some(self.read_all()?);
                }
                self.cache
                    .as_ref()
                    .and_then(|records| records.iter().find(|(n, _)| n == name))
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| CodecError::NameNotFound(name.to_string()).into())
            }
        }
    }

    /// Names of all top-level records, in file order
    pub fn names(&mut self) -> Result<Vec<String>> {
        if self.state.is_write() {
            return Ok(self.names.clone());
        }
        if !self.state.is_read() {
            return Err(ModeError::InvalidModeForRead(self.state).into());
        }

        self.rewind()?;
        let codec = self.codec;
        let mut reader = self.reader()?;
        codec.record_names(&mut reader)
    }

    /// Drop any staged state (the load cache). Kept for callers of the
    /// old buffer-based API; it never touches the file.
    pub fn clear(&mut self) {
        self.cache = None;
    }

    // =========================================================================
    // Close
    // =========================================================================

    /// Flush and release the stream, then compress if the session was a
    /// compressed write.
    ///
    /// Returns the compressed artifact's path when one was produced. A stream
    /// failure is reported as `Io`; a compression failure as `Compression`,
    /// with the raw file left in place. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<Option<PathBuf>> {
        let state = std::mem::replace(&mut self.state, SessionState::Closed);
        let backing = std::mem::replace(&mut self.backing, Backing::Detached);
        self.cache = None;
        self.names.clear();

        if state == SessionState::Closed {
            return Ok(None);
        }

        if let Backing::Writer(writer) = backing {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        tracing::debug!("Closed {} ({:?})", self.path.display(), state);

        match self.compress_target.take() {
            Some(target) if state.is_write() => {
                compress::compress_and_remove(&self.work_path, &target, &self.config)?;
                Ok(Some(target))
            }
            _ => Ok(None),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Effective mode of this handle
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Header of the file: read from it, or written by this handle
    pub fn header(&self) -> &FormatHeader {
        &self.header
    }

    /// Path of the opened file: the one given to `open`, or its `.gz`
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where `close` will put the gzip artifact, if anywhere
    pub fn compressed_path(&self) -> Option<&Path> {
        self.compress_target.as_deref()
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn reader(&mut self) -> Result<&mut dyn Read> {
        match &mut self.backing {
            Backing::Raw(reader) => Ok(reader),
            Backing::Gzip(reader) => Ok(reader),
            _ => Err(ModeError::InvalidModeForRead(self.state).into()),
        }
    }

    /// Position the read stream on the first record
    fn rewind(&mut self) -> Result<()> {
        if let Backing::Raw(reader) = &mut self.backing {
            reader.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
            return Ok(());
        }

        if matches!(self.backing, Backing::Gzip(_)) {
            // gzip streams can't seek; start a fresh decoder past the header
            let (reader, header) = open_gzip_reader(&self.work_path)?;
            if header != self.header {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "file header changed while open",
                )
                .into());
            }
            self.backing = Backing::Gzip(reader);
            return Ok(());
        }

        Err(ModeError::InvalidModeForRead(self.state).into())
    }

    fn read_all(&mut self) -> Result<Vec<(String, Value)>> {
        self.rewind()?;
        let codec = self.codec;
        let mut reader = self.reader()?;
        let mut records = Vec::new();
        while let Some(record) = codec.next_record(&mut reader)? {
            records.push(record);
        }
        tracing::debug!("Cached {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if !self.state.is_open() {
            return;
        }
        if self.state.is_write() && self.work_path != self.path {
            // records appended to a gzip file only live in the working copy
            self.backing = Backing::Detached;
            match fs::remove_file(&self.work_path) {
                Ok(()) => tracing::warn!(
                    "{} dropped without close; discarded working copy {}",
                    self.path.display(),
                    self.work_path.display()
                ),
                Err(e) => tracing::warn!(
                    "{} dropped without close; failed to remove working copy {}: {}",
                    self.path.display(),
                    self.work_path.display(),
                    e
                ),
            }
            return;
        }
        if let Backing::Writer(writer) = &mut self.backing {
            if let Err(e) = writer.flush() {
                tracing::warn!("Failed to flush {} on drop: {}", self.work_path.display(), e);
            }
        }
        if let Some(target) = &self.compress_target {
            tracing::warn!(
                "{} dropped without close; {} was not produced",
                self.path.display(),
                target.display()
            );
        }
    }
}

// =============================================================================
// Free helpers
// =============================================================================

fn existing_len(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(open_error(path, e)),
    }
}

/// Size of `path`, falling back to a non-empty `<path>.gz` when `path` is
/// missing
fn resolve_existing(path: PathBuf) -> Result<(PathBuf, Option<u64>)> {
    if let Some(len) = existing_len(&path)? {
        return Ok((path, Some(len)));
    }

    let gz = compress::gz_path(&path);
    match existing_len(&gz)? {
        Some(len) if len > 0 => {
            tracing::debug!("{} is missing; using {}", path.display(), gz.display());
            Ok((gz, Some(len)))
        }
        _ => Ok((path, None)),
    }
}

fn check_compress_target(target: &Path) -> Result<()> {
    if target.exists() {
        return Err(OpenError::CompressedCopyExists(target.to_path_buf()).into());
    }
    Ok(())
}

fn open_error(path: &Path, e: io::Error) -> OctbinError {
    match e.kind() {
        io::ErrorKind::NotFound => OpenError::FileNotFound(path.to_path_buf()).into(),
        io::ErrorKind::PermissionDenied => OpenError::PermissionDenied(path.to_path_buf()).into(),
        _ => e.into(),
    }
}

fn header_error(path: &Path, e: OctbinError) -> OctbinError {
    match e {
        OctbinError::Format(source) => OpenError::HeaderError {
            path: path.to_path_buf(),
            source,
        }
        .into(),
        other => other,
    }
}

fn open_raw_reader(path: &Path) -> Result<(BufReader<File>, FormatHeader)> {
    let file = File::open(path).map_err(|e| open_error(path, e))?;
    let mut reader = BufReader::new(file);
    let header = read_header(&mut reader).map_err(|e| header_error(path, e))?;
    Ok((reader, header))
}

fn open_gzip_reader(path: &Path) -> Result<(MultiGzDecoder<BufReader<File>>, FormatHeader)> {
    let file = File::open(path).map_err(|e| open_error(path, e))?;
    let mut reader = compress::wrap_for_read(BufReader::new(file));
    let header = read_header(&mut reader).map_err(|e| header_error(path, e))?;
    Ok((reader, header))
}

fn append_work_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(APPEND_WORK_SUFFIX);
    PathBuf::from(name)
}
