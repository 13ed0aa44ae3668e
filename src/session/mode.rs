//! Requested and effective session modes

/// Mode requested by the caller of `FileHandle::open`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    ReadCompressed,
    Write,
    WriteCompressed,
    Append,
    AppendCompressed,
}

impl OpenMode {
    pub fn is_read(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadCompressed)
    }

    /// Caller asked for a gzip artifact on close
    pub fn wants_compression(self) -> bool {
        matches!(self, OpenMode::WriteCompressed | OpenMode::AppendCompressed)
    }
}

/// Effective state of a `FileHandle`
///
/// ```text
///            open                         close
/// Closed ───────────▶ Read*/Write*/Append* ───────▶ Closed
/// ```
///
/// Compressed read states inflate on the fly; compressed write/append
/// states write plain records and gzip the file on close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    ReadRaw,
    ReadCompressed,
    WriteRaw,
    WriteCompressed,
    AppendRaw,
    AppendCompressed,
}

impl SessionState {
    pub fn is_read(self) -> bool {
        matches!(self, SessionState::ReadRaw | SessionState::ReadCompressed)
    }

    pub fn is_write(self) -> bool {
        matches!(
            self,
            SessionState::WriteRaw
                | SessionState::WriteCompressed
                | SessionState::AppendRaw
                | SessionState::AppendCompressed
        )
    }

    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            SessionState::ReadCompressed
                | SessionState::WriteCompressed
                | SessionState::AppendCompressed
        )
    }

    pub fn is_open(self) -> bool {
        self != SessionState::Closed
    }
}
