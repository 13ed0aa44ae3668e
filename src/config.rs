//! Configuration for octbin sessions
//!
//! Centralized configuration with sensible defaults.

use crate::format::FormatHeader;

/// Main configuration for a `FileHandle`
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Write Configuration
    // -------------------------------------------------------------------------
    /// Header written when a new file is created.
    /// Appends always reuse the header already present in the file.
    pub write_format: FormatHeader,

    /// Treat plain `Write`/`Append` requests as their compressed variants
    pub compress_on_close: bool,

    // -------------------------------------------------------------------------
    // Read Configuration
    // -------------------------------------------------------------------------
    /// How `load` locates a named variable
    pub load_strategy: LoadStrategy,

    /// Largest single name/shape/payload allocation accepted while decoding (bytes)
    pub max_record_bytes: u64,

    // -------------------------------------------------------------------------
    // Compression Configuration
    // -------------------------------------------------------------------------
    /// Largest raw file `finalize_compress` will buffer (bytes)
    pub max_compress_buffer: u64,

    /// Gzip level, 0 (store) to 9 (best)
    pub compression_level: u32,
}

/// Strategy used by `load` to find a variable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Rewind to the first record and scan until the name matches
    Scan,

    /// Decode every record once, then answer loads from the in-memory table
    Cache,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_format: FormatHeader::canonical(),
            compress_on_close: false,
            load_strategy: LoadStrategy::Scan,
            max_record_bytes: 1024 * 1024 * 1024,    // 1 GiB
            max_compress_buffer: 1024 * 1024 * 1024, // 1 GiB
            compression_level: 6,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the header used for newly created files
    pub fn write_format(mut self, header: FormatHeader) -> Self {
        self.config.write_format = header;
        self
    }

    /// Compress every written file on close
    pub fn compress_on_close(mut self, enabled: bool) -> Self {
        self.config.compress_on_close = enabled;
        self
    }

    /// Set the load strategy
    pub fn load_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.config.load_strategy = strategy;
        self
    }

    /// Set the per-field decode limit (in bytes)
    pub fn max_record_bytes(mut self, bytes: u64) -> Self {
        self.config.max_record_bytes = bytes;
        self
    }

    /// Set the largest raw file that will be compressed on close (in bytes)
    pub fn max_compress_buffer(mut self, bytes: u64) -> Self {
        self.config.max_compress_buffer = bytes;
        self
    }

    /// Set the gzip compression level (clamped to 9)
    pub fn compression_level(mut self, level: u32) -> Self {
        self.config.compression_level = level.min(9);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
