//! Whole-frame zstd decoding over a byte source
//!
//! The decoder only moves forward: given the compressed offset where a frame
//! starts, it decodes that frame in full and reports how many compressed and
//! uncompressed bytes it spans. Going back to an earlier frame means calling
//! it again with that frame's start offset.
//!
//! Frames that decode to nothing (skippable frames, empty frames) are folded
//! into the next frame that carries data, so every reported extent has a
//! non-zero uncompressed length.

use std::io::{self, SeekFrom};

use tracing::trace;
use zseek_core::{ZseekError, ZseekResult};
use zstd::zstd_safe::{self, DCtx, InBuffer, OutBuffer, ResetDirective};

use crate::source::ByteSource;

/// Magic number opening every zstd frame
pub const ZSTD_MAGIC: u32 = 0xFD2F_B528;

/// First of the sixteen skippable-frame magic numbers
pub const SKIPPABLE_MAGIC_START: u32 = 0x184D_2A50;

/// Largest possible zstd frame header
const FRAME_HEADER_MAX: usize = 18;

/// True for the zstd frame magic and the skippable-frame magics.
pub fn is_frame_magic(magic: u32) -> bool {
    magic == ZSTD_MAGIC || magic & 0xFFFF_FFF0 == SKIPPABLE_MAGIC_START
}

/// Compressed and uncompressed span of one data-carrying frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameExtent {
    /// Compressed bytes consumed, including any folded empty frames
    pub compressed_len: u64,
    /// Uncompressed bytes produced
    pub decompressed_len: u64,
    /// Content size declared in the frame header, if any
    pub declared_size: Option<u64>,
    /// zstd frames consumed (more than one when empty frames were folded in)
    pub frames: u32,
}

/// Counters for work done against the source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames run through the decompressor
    pub frames_decoded: u64,
    /// Frames measured from their header without decompressing
    pub frames_skipped: u64,
    /// Compressed bytes read from the source
    pub compressed_bytes_read: u64,
}

/// Read-ahead buffer over the source, tagged with its compressed offset.
///
/// Consecutive frames are usually contiguous, so the window lets the next
/// decode start from bytes already read. Repositioning outside the window
/// seeks the source and starts over.
struct InputWindow {
    buf: Vec<u8>,
    /// Compressed offset of `buf[0]`
    offset: u64,
    pos: usize,
    limit: usize,
    /// The source returned 0 right after `buf[limit - 1]`
    eof: bool,
    /// The source cursor is known to sit at `offset + limit`
    synced: bool,
    bytes_read: u64,
}

impl InputWindow {
    fn new(capacity: usize) -> Self {
        InputWindow {
            buf: vec![0; capacity.max(FRAME_HEADER_MAX)],
            offset: 0,
            pos: 0,
            limit: 0,
            eof: false,
            synced: false,
            bytes_read: 0,
        }
    }

    fn position(&self) -> u64 {
        self.offset + self.pos as u64
    }

    fn seek_to(&mut self, src: &mut dyn ByteSource, at: u64) -> io::Result<()> {
        let end = self.offset + self.limit as u64;
        if self.synced && (self.offset..=end).contains(&at) {
            self.pos = (at - self.offset) as usize;
            return Ok(());
        }
        src.seek(SeekFrom::Start(at))?;
        self.offset = at;
        self.pos = 0;
        self.limit = 0;
        self.eof = false;
        self.synced = true;
        Ok(())
    }

    /// Unconsumed bytes, topped up to at least `min` unless the source ends first.
    fn fill(&mut self, src: &mut dyn ByteSource, min: usize) -> io::Result<&[u8]> {
        let min = min.min(self.buf.len());
        if self.limit - self.pos < min && !self.eof {
            if self.pos > 0 {
                self.buf.copy_within(self.pos..self.limit, 0);
                self.offset += self.pos as u64;
                self.limit -= self.pos;
                self.pos = 0;
            }
            while self.limit < min {
                match src.read(&mut self.buf[self.limit..]) {
                    Ok(0) => {
                        self.eof = true;
                        break;
                    }
                    Ok(n) => {
                        self.limit += n;
                        self.bytes_read += n as u64;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(&self.buf[self.pos..self.limit])
    }

    fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.limit);
    }
}

/// One-shot, whole-frame zstd decoder
pub struct FrameDecoder {
    dctx: DCtx<'static>,
    window: InputWindow,
    scratch: Vec<u8>,
    max_frame_size: u64,
    frames_decoded: u64,
    frames_skipped: u64,
}

impl FrameDecoder {
    /// `input_buffer_size` of 0 picks zstd's recommended input size.
    pub fn new(input_buffer_size: usize, max_frame_size: u64) -> Self {
        let input = if input_buffer_size == 0 {
            DCtx::in_size()
        } else {
            input_buffer_size
        };
        FrameDecoder {
            dctx: DCtx::create(),
            window: InputWindow::new(input),
            scratch: vec![0; DCtx::out_size()],
            max_frame_size,
            frames_decoded: 0,
            frames_skipped: 0,
        }
    }

    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            frames_decoded: self.frames_decoded,
            frames_skipped: self.frames_skipped,
            compressed_bytes_read: self.window.bytes_read,
        }
    }

    /// Magic number at compressed offset `at`, or `None` if the source ends there.
    pub fn probe(&mut self, src: &mut dyn ByteSource, at: u64) -> ZseekResult<Option<u32>> {
        self.window.seek_to(src, at)?;
        let head = self.window.fill(src, 4)?;
        match head.len() {
            0 => Ok(None),
            1..=3 => Err(ZseekError::Truncated { offset: at }),
            _ => Ok(Some(u32::from_le_bytes([head[0], head[1], head[2], head[3]]))),
        }
    }

    /// Decode the frame starting at compressed offset `start` into `out`.
    ///
    /// `out` is cleared first. Returns `None` when no data-carrying frame
    /// starts at `start`, meaning the stream ends there.
    pub fn decode_frame(
        &mut self,
        src: &mut dyn ByteSource,
        start: u64,
        out: &mut Vec<u8>,
    ) -> ZseekResult<Option<FrameExtent>> {
        out.clear();
        self.walk(src, start, Some(out))
    }

    /// Measure the frame starting at `start` without keeping its content.
    ///
    /// Frames that declare their content size and fit in the input window are
    /// measured from their block headers alone; the rest are decoded and the
    /// output thrown away.
    pub fn skim_frame(
        &mut self,
        src: &mut dyn ByteSource,
        start: u64,
    ) -> ZseekResult<Option<FrameExtent>> {
        self.walk(src, start, None)
    }

    fn walk(
        &mut self,
        src: &mut dyn ByteSource,
        start: u64,
        mut out: Option<&mut Vec<u8>>,
    ) -> ZseekResult<Option<FrameExtent>> {
        self.window.seek_to(src, start)?;
        let mut extent = FrameExtent {
            compressed_len: 0,
            decompressed_len: 0,
            declared_size: None,
            frames: 0,
        };

        loop {
            let offset = self.window.position();
            let head = self.window.fill(src, FRAME_HEADER_MAX)?;
            if head.is_empty() {
                return Ok(None);
            }
            if head.len() < 4 {
                return Err(ZseekError::Truncated { offset });
            }
            let magic = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
            if !is_frame_magic(magic) {
                return Err(ZseekError::BadMagic(magic));
            }
            let declared = zstd_safe::get_frame_content_size(head).ok().flatten();
            if let Some(size) = declared {
                if size > self.max_frame_size {
                    return Err(ZseekError::FrameTooLarge {
                        offset,
                        limit: self.max_frame_size,
                    });
                }
            }

            let skipped = match (&out, declared) {
                (None, Some(size)) => self.skip_frame(src)?.map(|len| (len, size)),
                _ => None,
            };
            let (compressed, produced) = match skipped {
                Some(span) => {
                    self.frames_skipped += 1;
                    span
                }
                None => {
                    self.frames_decoded += 1;
                    self.decode_stream(src, offset, declared, out.as_deref_mut())?
                }
            };
            trace!(offset, compressed, produced, "frame walked");

            extent.compressed_len += compressed;
            extent.decompressed_len += produced;
            extent.declared_size = declared;
            extent.frames += 1;
            if extent.decompressed_len > 0 {
                return Ok(Some(extent));
            }
        }
    }

    /// Step over a complete frame held in the window, returning its compressed length.
    fn skip_frame(&mut self, src: &mut dyn ByteSource) -> ZseekResult<Option<u64>> {
        let mut found = frame_len_in(self.window.fill(src, FRAME_HEADER_MAX)?);
        if found.is_none() {
            // Top the window up in case the frame was cut by the buffer edge
            let capacity = self.window.buf.len();
            found = frame_len_in(self.window.fill(src, capacity)?);
        }
        Ok(found.map(|len| {
            self.window.consume(len);
            len as u64
        }))
    }

    fn decode_stream(
        &mut self,
        src: &mut dyn ByteSource,
        offset: u64,
        declared: Option<u64>,
        mut out: Option<&mut Vec<u8>>,
    ) -> ZseekResult<(u64, u64)> {
        self.dctx
            .reset(ResetDirective::SessionOnly)
            .map_err(|code| decode_error(offset, code))?;
        if let (Some(buf), Some(size)) = (out.as_deref_mut(), declared) {
            buf.reserve(usize::try_from(size).unwrap_or(0));
        }

        let (mut consumed, mut produced) = (0u64, 0u64);
        let mut out_full = false;
        loop {
            let input = self.window.fill(src, 1)?;
            // A full output buffer may still have bytes to flush with no new input
            if input.is_empty() && !out_full {
                return Err(ZseekError::Truncated { offset });
            }
            let mut in_buf = InBuffer::around(input);
            let mut out_buf = OutBuffer::around(&mut self.scratch[..]);
            let hint = self
                .dctx
                .decompress_stream(&mut out_buf, &mut in_buf)
                .map_err(|code| decode_error(offset, code))?;
            let used = in_buf.pos();
            let made = out_buf.pos();

            self.window.consume(used);
            consumed += used as u64;
            produced += made as u64;
            if produced > self.max_frame_size {
                return Err(ZseekError::FrameTooLarge {
                    offset,
                    limit: self.max_frame_size,
                });
            }
            if let Some(buf) = out.as_deref_mut() {
                buf.extend_from_slice(&self.scratch[..made]);
            }
            out_full = made == self.scratch.len();

            if hint == 0 {
                return Ok((consumed, produced));
            }
        }
    }
}

/// Compressed length of the complete frame at the start of `bytes`, if it is all there.
fn frame_len_in(bytes: &[u8]) -> Option<usize> {
    zstd_safe::find_frame_compressed_size(bytes)
        .ok()
        .filter(|&len| len > 0 && len <= bytes.len())
}

fn decode_error(offset: u64, code: zstd_safe::ErrorCode) -> ZseekError {
    ZseekError::Decode {
        offset,
        reason: zstd_safe::get_error_name(code).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frames(parts: &[&[u8]]) -> (Vec<u8>, Vec<usize>) {
        let mut stream = Vec::new();
        let mut ends = Vec::new();
        for part in parts {
            stream.extend(zstd::bulk::compress(part, 3).unwrap());
            ends.push(stream.len());
        }
        (stream, ends)
    }

    #[test]
    fn recognizes_frame_magics() {
        assert!(is_frame_magic(ZSTD_MAGIC));
        assert!(is_frame_magic(0x184D_2A50));
        assert!(is_frame_magic(0x184D_2A5F));
        assert!(!is_frame_magic(0x184D_2A60));
        assert!(!is_frame_magic(0));
    }

    #[test]
    fn decodes_consecutive_frames() {
        let (stream, ends) = frames(&[b"hello ".as_slice(), b"seekable ", b"world"]);
        let mut src = Cursor::new(stream);
        let mut dec = FrameDecoder::new(0, u64::MAX);
        let mut out = Vec::new();

        let first = dec.decode_frame(&mut src, 0, &mut out).unwrap().unwrap();
        assert_eq!(out, b"hello ");
        assert_eq!(first.compressed_len as usize, ends[0]);
        assert_eq!(first.declared_size, Some(6));

        let second = dec
            .decode_frame(&mut src, ends[0] as u64, &mut out)
            .unwrap()
            .unwrap();
        assert_eq!(out, b"seekable ");
        assert_eq!(second.compressed_len as usize, ends[1] - ends[0]);

        // Going back re-decodes from the recorded offset
        dec.decode_frame(&mut src, 0, &mut out).unwrap().unwrap();
        assert_eq!(out, b"hello ");

        assert!(dec
            .decode_frame(&mut src, ends[2] as u64, &mut out)
            .unwrap()
            .is_none());
    }

    #[test]
    fn skim_matches_decode() {
        let (stream, ends) = frames(&[b"abc".as_slice(), b"defgh"]);
        let mut src = Cursor::new(stream);
        let mut dec = FrameDecoder::new(0, u64::MAX);

        let skimmed = dec.skim_frame(&mut src, ends[0] as u64).unwrap().unwrap();
        assert_eq!(skimmed.compressed_len as usize, ends[1] - ends[0]);
        assert_eq!(skimmed.decompressed_len, 5);
        assert_eq!(dec.stats().frames_skipped, 1);
        assert_eq!(dec.stats().frames_decoded, 0);
    }

    #[test]
    fn folds_skippable_frames_into_the_next_frame() {
        let mut stream = vec![0x50, 0x2A, 0x4D, 0x18, 3, 0, 0, 0, 9, 9, 9];
        let skippable_len = stream.len();
        stream.extend(zstd::bulk::compress(b"payload", 1).unwrap());
        let total = stream.len();
        let mut src = Cursor::new(stream);
        let mut dec = FrameDecoder::new(0, u64::MAX);
        let mut out = Vec::new();

        let extent = dec.decode_frame(&mut src, 0, &mut out).unwrap().unwrap();
        assert_eq!(out, b"payload");
        assert_eq!(extent.frames, 2);
        assert_eq!(extent.compressed_len as usize, total);
        assert!(extent.compressed_len as usize > skippable_len);
    }

    #[test]
    fn truncated_frame_is_reported() {
        let (stream, _) = frames(&[&[7u8; 4096][..]]);
        let cut = stream.len() - 3;
        let mut src = Cursor::new(stream[..cut].to_vec());
        let mut dec = FrameDecoder::new(0, u64::MAX);
        let mut out = Vec::new();

        let err = dec.decode_frame(&mut src, 0, &mut out).unwrap_err();
        assert!(matches!(err, ZseekError::Truncated { offset: 0 }), "{err}");
        let err = dec.skim_frame(&mut src, 0).unwrap_err();
        assert!(matches!(err, ZseekError::Truncated { offset: 0 }), "{err}");
    }

    #[test]
    fn rejects_foreign_data() {
        let mut src = Cursor::new(b"plain text, not zstd".to_vec());
        let mut dec = FrameDecoder::new(0, u64::MAX);
        let mut out = Vec::new();
        assert!(matches!(
            dec.decode_frame(&mut src, 0, &mut out),
            Err(ZseekError::BadMagic(_))
        ));
        assert_eq!(dec.probe(&mut src, 0).unwrap(), Some(u32::from_le_bytes(*b"plai")));
    }

    #[test]
    fn enforces_frame_size_limit() {
        let (stream, _) = frames(&[&[1u8; 10_000][..]]);
        let mut src = Cursor::new(stream);
        let mut dec = FrameDecoder::new(0, 1000);
        let mut out = Vec::new();
        assert!(matches!(
            dec.decode_frame(&mut src, 0, &mut out),
            Err(ZseekError::FrameTooLarge { limit: 1000, .. })
        ));
    }

    #[test]
    fn small_input_window_still_decodes_large_frames() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let stream = zstd::stream::encode_all(&data[..], 1).unwrap();
        let mut src = Cursor::new(stream.clone());
        let mut dec = FrameDecoder::new(64, u64::MAX);
        let mut out = Vec::new();

        let extent = dec.decode_frame(&mut src, 0, &mut out).unwrap().unwrap();
        assert_eq!(out, data);
        assert_eq!(extent.compressed_len as usize, stream.len());

        let skimmed = dec.skim_frame(&mut src, 0).unwrap().unwrap();
        assert_eq!(skimmed.decompressed_len, data.len() as u64);
    }
}
