//! Seek context: file-like seek/read/tell over the uncompressed stream
//!
//! The context keeps one decoded frame in memory. Reads are served from it
//! while the cursor stays inside; leaving it means decoding another frame,
//! located through the jump table when the table already covers the target
//! and by decoding forward from the table's frontier when it does not.
//!
//! Seeking never decodes by itself. Only positions past the frontier force
//! the table to grow (far enough to prove the target exists), and
//! `SeekFrom::End` forces it to completion.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::io::{OwnedFd, RawFd};

use tracing::{debug, trace};
use zseek_core::config::{ZseekConfig, DEFAULT_MAX_FRAME_SIZE};
use zseek_core::{IndexMode, ZseekError, ZseekResult};

use crate::decoder::{is_frame_magic, DecoderStats, FrameDecoder};
use crate::jump_table::{JumpTable, JumpTableRecord};
use crate::source::ByteSource;

/// Options applied when a context is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekOptions {
    /// Eager or lazy jump table
    pub index: IndexMode,
    /// Bytes read from the source per refill (0 = zstd's recommended size)
    pub input_buffer_size: usize,
    /// Largest decoded frame accepted
    pub max_frame_size: u64,
}

impl Default for SeekOptions {
    fn default() -> Self {
        Self {
            index: IndexMode::Eager,
            input_buffer_size: 0,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl SeekOptions {
    pub fn with_mode(index: IndexMode) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }
}

impl From<&ZseekConfig> for SeekOptions {
    fn from(config: &ZseekConfig) -> Self {
        Self {
            index: config.index.mode,
            input_buffer_size: config.decoder.input_buffer_size,
            max_frame_size: config.decoder.max_frame_size,
        }
    }
}

/// The frame currently held in memory
struct BufferedFrame {
    index: usize,
    /// Uncompressed offset of `data[0]`
    start: u64,
    /// Compressed offset just past the frame
    compressed_end: u64,
    data: Vec<u8>,
}

impl BufferedFrame {
    fn contains(&self, pos: u64) -> bool {
        pos >= self.start && pos - self.start < self.data.len() as u64
    }
}

/// Random-access reader over a multi-frame zstd stream
pub struct SeekContext {
    source: Box<dyn ByteSource>,
    decoder: FrameDecoder,
    table: JumpTable,
    position: u64,
    frame: Option<BufferedFrame>,
    /// Reused allocation for the next decoded frame
    spare: Vec<u8>,
    compressed_cursor: u64,
}

impl std::fmt::Debug for SeekContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeekContext")
            .field("position", &self.position)
            .field("compressed_cursor", &self.compressed_cursor)
            .field("records", &self.table.len())
            .field("complete", &self.table.is_complete())
            .field("frame", &self.frame.as_ref().map(|f| f.index))
            .finish()
    }
}

impl SeekContext {
    /// Validate `source` and build a context over it.
    ///
    /// The source must start with a zstd (or skippable) frame whose content
    /// decodes completely. With [`IndexMode::Eager`] the whole stream is
    /// scanned before returning.
    pub fn open<S: ByteSource + 'static>(source: S, options: &SeekOptions) -> ZseekResult<Self> {
        let mut ctx = SeekContext {
            source: Box::new(source),
            decoder: FrameDecoder::new(options.input_buffer_size, options.max_frame_size),
            table: JumpTable::new(),
            position: 0,
            frame: None,
            spare: Vec::new(),
            compressed_cursor: 0,
        };
        ctx.validate()?;
        if options.index == IndexMode::Eager {
            ctx.initialize_jump_table()?;
        }
        debug!(
            mode = %options.index,
            records = ctx.table.len(),
            complete = ctx.table.is_complete(),
            "seek context ready"
        );
        Ok(ctx)
    }

    /// Context over an in-memory buffer.
    pub fn from_bytes<B>(bytes: B, mode: IndexMode) -> ZseekResult<Self>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        Self::open(Cursor::new(bytes), &SeekOptions::with_mode(mode))
    }

    /// Context over the file at `path`.
    pub fn from_path(path: impl AsRef<Path>, mode: IndexMode) -> ZseekResult<Self> {
        Self::from_path_with(path, &SeekOptions::with_mode(mode))
    }

    pub fn from_path_with(path: impl AsRef<Path>, options: &SeekOptions) -> ZseekResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ZseekError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty path",
            )));
        }
        let file = File::open(path)?;
        Self::open(file, options)
    }

    /// Context over an open descriptor, which the context owns from now on.
    ///
    /// The descriptor is closed when the context is dropped, or right away
    /// if creation fails.
    #[cfg(unix)]
    pub fn from_fd(fd: OwnedFd, mode: IndexMode) -> ZseekResult<Self> {
        Self::open(File::from(fd), &SeekOptions::with_mode(mode))
    }

    fn validate(&mut self) -> ZseekResult<()> {
        match self.decoder.probe(&mut *self.source, 0)? {
            None => return Err(ZseekError::EmptySource),
            Some(magic) if !is_frame_magic(magic) => return Err(ZseekError::BadMagic(magic)),
            Some(_) => {}
        }
        // The first frame must decode in full; its content is not kept so the
        // jump table stays untouched
        let mut first = std::mem::take(&mut self.spare);
        let result = self.decoder.decode_frame(&mut *self.source, 0, &mut first);
        first.clear();
        self.spare = first;
        result.map(|_| ())
    }

    // ── Cursor ────────────────────────────────────────────────────────────────

    /// Move the logical cursor and return the new position.
    ///
    /// Fails with [`ZseekError::NegativeSeek`] or [`ZseekError::BeyondEnd`]
    /// without moving the cursor. `SeekFrom::End` completes the jump table.
    pub fn seek(&mut self, pos: SeekFrom) -> ZseekResult<u64> {
        self.resolve_seek(pos)
    }

    /// Copy bytes from the cursor into `buf`, crossing frame boundaries.
    ///
    /// Returns the number of bytes copied: less than `buf.len()` only at the
    /// end of the stream, 0 once there. A decode failure after some bytes
    /// were copied ends the read early; the failure surfaces on the next call.
    pub fn read(&mut self, buf: &mut [u8]) -> ZseekResult<usize> {
        self.read_frames(buf)
    }

    /// Current uncompressed position.
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Compressed offset of the decode cursor.
    ///
    /// While the frame under the cursor is in memory this is the end of that
    /// frame; after a seek elsewhere it is the start of the frame the next
    /// read will decode.
    pub fn compressed_tell(&self) -> u64 {
        self.compressed_cursor
    }

    fn resolve_seek(&mut self, pos: SeekFrom) -> ZseekResult<u64> {
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(n) => i128::from(self.position) + i128::from(n),
            SeekFrom::End(n) => i128::from(self.uncompressed_file_size()?) + i128::from(n),
        };
        if target < 0 {
            trace!(?pos, target, "negative seek");
            return Err(ZseekError::NegativeSeek(target));
        }
        let target = u64::try_from(target).map_err(|_| ZseekError::BeyondEnd {
            target: u64::MAX,
            size: self.table.last_known_uncompressed_offset(),
        })?;
        self.ensure_reachable(target)?;

        self.position = target;
        self.sync_compressed_cursor();
        trace!(?pos, position = target, "seek");
        Ok(target)
    }

    /// Grow the table until `target` is proven to lie within the stream.
    fn ensure_reachable(&mut self, target: u64) -> ZseekResult<()> {
        while target > self.table.last_known_uncompressed_offset() {
            if !self.discover_next(false)? {
                return Err(ZseekError::BeyondEnd {
                    target,
                    size: self.table.last_known_uncompressed_offset(),
                });
            }
        }
        Ok(())
    }

    fn sync_compressed_cursor(&mut self) {
        if let Some(frame) = self.frame.as_ref().filter(|f| f.contains(self.position)) {
            self.compressed_cursor = frame.compressed_end;
        } else if let Some((_, record)) = self.table.find_floor(self.position) {
            self.compressed_cursor = record.compressed_pos;
        }
    }

    fn read_frames(&mut self, buf: &mut [u8]) -> ZseekResult<usize> {
        let mut copied = 0;
        while copied < buf.len() {
            match self.materialize(self.position) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if copied > 0 => {
                    debug!(position = self.position, "read cut short: {e}");
                    break;
                }
                Err(e) => return Err(e),
            }
            let Some(frame) = self.frame.as_ref() else {
                break;
            };
            let at = (self.position - frame.start) as usize;
            let n = (frame.data.len() - at).min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&frame.data[at..at + n]);
            copied += n;
            self.position += n as u64;
        }
        Ok(copied)
    }

    // ── Frame materialization ─────────────────────────────────────────────────

    /// Make sure the frame containing `pos` is in memory.
    ///
    /// Returns false when `pos` is at or past the end of the stream.
    fn materialize(&mut self, pos: u64) -> ZseekResult<bool> {
        if self.frame.as_ref().is_some_and(|f| f.contains(pos)) {
            return Ok(true);
        }
        let known = self
            .table
            .find_floor(pos)
            .and_then(|(index, _)| self.table.frame_span(index).map(|span| (index, span)));
        if let Some((index, (start, end))) = known {
            self.load_frame(index, start.compressed_pos, start.uncompressed_pos, end)?;
            return Ok(true);
        }
        while self.discover_next(true)? {
            if self.frame.as_ref().is_some_and(|f| f.contains(pos)) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Re-decode a frame the table already knows.
    fn load_frame(
        &mut self,
        index: usize,
        compressed_start: u64,
        uncompressed_start: u64,
        end: JumpTableRecord,
    ) -> ZseekResult<()> {
        let mut data = self.take_frame_buffer();
        let extent = self
            .decoder
            .decode_frame(&mut *self.source, compressed_start, &mut data)?;
        let expected = end.uncompressed_pos - uncompressed_start;
        let actual = extent.map_or(0, |e| e.decompressed_len);
        if actual != expected {
            return Err(ZseekError::FrameMismatch {
                index,
                expected,
                actual,
            });
        }
        debug!(
            frame = index,
            compressed = compressed_start,
            uncompressed = uncompressed_start,
            len = actual,
            "frame reloaded"
        );
        self.frame = Some(BufferedFrame {
            index,
            start: uncompressed_start,
            compressed_end: end.compressed_pos,
            data,
        });
        self.compressed_cursor = end.compressed_pos;
        Ok(())
    }

    /// Find the frame past the table's frontier and record its end.
    ///
    /// With `keep` the frame is decoded and buffered; otherwise it is only
    /// measured. Returns false (and marks the table complete) once the stream
    /// is exhausted.
    fn discover_next(&mut self, keep: bool) -> ZseekResult<bool> {
        if self.table.is_complete() {
            return Ok(false);
        }
        if self.table.is_empty() {
            self.table.append(0, 0)?;
        }
        let index = self.table.known_frames();
        let compressed_start = self.table.last_known_compressed_offset();
        let uncompressed_start = self.table.last_known_uncompressed_offset();

        let extent = if keep {
            let mut data = self.take_frame_buffer();
            match self
                .decoder
                .decode_frame(&mut *self.source, compressed_start, &mut data)?
            {
                Some(extent) => {
                    self.frame = Some(BufferedFrame {
                        index,
                        start: uncompressed_start,
                        compressed_end: compressed_start + extent.compressed_len,
                        data,
                    });
                    self.compressed_cursor = compressed_start + extent.compressed_len;
                    Some(extent)
                }
                None => {
                    self.spare = data;
                    None
                }
            }
        } else {
            self.decoder
                .skim_frame(&mut *self.source, compressed_start)?
        };

        let Some(extent) = extent else {
            self.table.mark_complete();
            debug!(
                frames = self.table.known_frames(),
                size = uncompressed_start,
                compressed = compressed_start,
                "jump table complete"
            );
            return Ok(false);
        };
        self.table.append(
            compressed_start + extent.compressed_len,
            uncompressed_start + extent.decompressed_len,
        )?;
        debug!(
            frame = index,
            compressed = compressed_start,
            uncompressed = uncompressed_start,
            len = extent.decompressed_len,
            declared = ?extent.declared_size,
            "frame discovered"
        );
        Ok(true)
    }

    fn take_frame_buffer(&mut self) -> Vec<u8> {
        match self.frame.take() {
            Some(frame) => frame.data,
            None => std::mem::take(&mut self.spare),
        }
    }

    // ── Diagnostics ───────────────────────────────────────────────────────────

    /// Scan to the end of the stream so the jump table is complete.
    pub fn initialize_jump_table(&mut self) -> ZseekResult<()> {
        while self.discover_next(false)? {}
        Ok(())
    }

    /// True once the table shows at least two frames.
    ///
    /// Scans at most until the second frame is discovered.
    pub fn is_multiframe(&mut self) -> ZseekResult<bool> {
        while self.table.len() < 3 {
            if !self.discover_next(false)? {
                break;
            }
        }
        Ok(self.table.len() >= 3)
    }

    /// Number of data-carrying frames. Completes the jump table.
    pub fn number_of_frames(&mut self) -> ZseekResult<u64> {
        self.initialize_jump_table()?;
        Ok(self.table.frame_count().unwrap_or(0))
    }

    /// Total uncompressed size. Completes the jump table.
    pub fn uncompressed_file_size(&mut self) -> ZseekResult<u64> {
        self.initialize_jump_table()?;
        Ok(self.table.last_known_uncompressed_offset())
    }

    /// Uncompressed size proven so far, without scanning.
    pub fn last_known_uncompressed_file_size(&self) -> u64 {
        self.table.last_known_uncompressed_offset()
    }

    pub fn jump_table_is_initialized(&self) -> bool {
        self.table.is_complete()
    }

    pub fn jump_table(&self) -> &JumpTable {
        &self.table
    }

    /// Mutable access for callers that supply boundaries they already know.
    ///
    /// Appended records must describe the stream truthfully; scans continue
    /// from the last record.
    pub fn jump_table_mut(&mut self) -> &mut JumpTable {
        &mut self.table
    }

    /// Descriptor of the underlying file, if the source has one.
    #[cfg(unix)]
    pub fn fileno(&self) -> Option<RawFd> {
        self.source.raw_fd()
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

impl Read for SeekContext {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_frames(buf).map_err(io::Error::from)
    }
}

impl Seek for SeekContext {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.resolve_seek(pos).map_err(io::Error::from)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}
