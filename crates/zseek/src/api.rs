//! Handle-style surface over [`SeekContext`]
//!
//! Every function accepts an absent handle (`None`) and answers with a fixed
//! sentinel instead of an error: `None`, 0, `false` or -1 depending on the
//! return type. `seek` reports failures as the codes in [`zseek_core::error`].

use std::io::SeekFrom;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::io::{FromRawFd, OwnedFd, RawFd};

use tracing::debug;
use zseek_core::{IndexMode, ERR_OTHER};

use crate::context::SeekContext;
use crate::jump_table::JumpTable;

pub use zseek_core::{ERR_BEYOND_END_SEEK, ERR_NEGATIVE_SEEK};

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

pub fn create<B>(bytes: B, mode: IndexMode) -> Option<SeekContext>
where
    B: AsRef<[u8]> + Send + 'static,
{
    SeekContext::from_bytes(bytes, mode)
        .map_err(|e| debug!("create from buffer failed: {e}"))
        .ok()
}

pub fn create_from_file(path: impl AsRef<Path>, mode: IndexMode) -> Option<SeekContext> {
    let path = path.as_ref();
    SeekContext::from_path(path, mode)
        .map_err(|e| debug!(path = %path.display(), "create from file failed: {e}"))
        .ok()
}

/// Take ownership of `fd` and build a context over it.
///
/// The descriptor is closed when the context is freed, or immediately when
/// creation fails. Negative descriptors yield `None` and are left alone.
///
/// # Safety
///
/// `fd` must be an open descriptor that nothing else will close or use.
#[cfg(unix)]
pub unsafe fn create_from_file_descriptor(fd: RawFd, mode: IndexMode) -> Option<SeekContext> {
    if fd < 0 {
        return None;
    }
    let owned = OwnedFd::from_raw_fd(fd);
    SeekContext::from_fd(owned, mode)
        .map_err(|e| debug!(fd, "create from descriptor failed: {e}"))
        .ok()
}

/// Move the cursor. Returns 0, `ERR_NEGATIVE_SEEK`, `ERR_BEYOND_END_SEEK`
/// or `ERR_OTHER` (absent context, unknown `whence`, I/O or decode failure).
pub fn seek(ctx: Option<&mut SeekContext>, offset: i64, whence: i32) -> i32 {
    let Some(ctx) = ctx else {
        return ERR_OTHER;
    };
    let pos = match whence {
        SEEK_SET => match u64::try_from(offset) {
            Ok(start) => SeekFrom::Start(start),
            Err(_) => return ERR_NEGATIVE_SEEK,
        },
        SEEK_CUR => SeekFrom::Current(offset),
        SEEK_END => SeekFrom::End(offset),
        _ => {
            debug!(whence, "unknown whence");
            return ERR_OTHER;
        }
    };
    match ctx.seek(pos) {
        Ok(_) => 0,
        Err(e) => {
            debug!(offset, whence, "seek failed: {e}");
            e.code()
        }
    }
}

/// Fill `buf` from the cursor; a failure shows up as a short (or empty) read.
pub fn read(buf: &mut [u8], ctx: Option<&mut SeekContext>) -> usize {
    let Some(ctx) = ctx else {
        return 0;
    };
    ctx.read(buf).unwrap_or_else(|e| {
        debug!(position = ctx.tell(), "read failed: {e}");
        0
    })
}

pub fn tell(ctx: Option<&SeekContext>) -> i64 {
    let Some(ctx) = ctx else {
        return -1;
    };
    i64::try_from(ctx.tell()).unwrap_or(-1)
}

pub fn compressed_tell(ctx: Option<&SeekContext>) -> i64 {
    let Some(ctx) = ctx else {
        return -1;
    };
    i64::try_from(ctx.compressed_tell()).unwrap_or(-1)
}

pub fn uncompressed_file_size(ctx: Option<&mut SeekContext>) -> u64 {
    let Some(ctx) = ctx else {
        return 0;
    };
    ctx.uncompressed_file_size().unwrap_or_else(|e| {
        debug!("scanning for size failed: {e}");
        0
    })
}

pub fn is_multiframe(ctx: Option<&mut SeekContext>) -> bool {
    let Some(ctx) = ctx else {
        return false;
    };
    ctx.is_multiframe().unwrap_or(false)
}

pub fn number_of_frames(ctx: Option<&mut SeekContext>) -> u64 {
    let Some(ctx) = ctx else {
        return 0;
    };
    ctx.number_of_frames().unwrap_or_else(|e| {
        debug!("counting frames failed: {e}");
        0
    })
}

pub fn jump_table_is_initialized(ctx: Option<&SeekContext>) -> bool {
    ctx.is_some_and(SeekContext::jump_table_is_initialized)
}

pub fn last_known_uncompressed_file_size(ctx: Option<&SeekContext>) -> u64 {
    ctx.map_or(0, SeekContext::last_known_uncompressed_file_size)
}

/// Descriptor owned by the context, or -1.
#[cfg(unix)]
pub fn fileno(ctx: Option<&SeekContext>) -> i32 {
    ctx.and_then(SeekContext::fileno).unwrap_or(-1)
}

pub fn get_jump_table_of_context(ctx: Option<&mut SeekContext>) -> Option<&mut JumpTable> {
    ctx.map(SeekContext::jump_table_mut)
}

pub fn free_jump_table(table: Option<JumpTable>) {
    drop(table);
}

/// Append a record; absent tables and out-of-order records are ignored.
pub fn add_jump_table_record(table: Option<&mut JumpTable>, compressed: u64, uncompressed: u64) {
    let Some(table) = table else {
        return;
    };
    if let Err(e) = table.append(compressed, uncompressed) {
        debug!(compressed, uncompressed, "record rejected: {e}");
    }
}

/// Scan the stream to completion. Returns 0 on success, `ERR_OTHER` otherwise.
pub fn initialize_jump_table(ctx: Option<&mut SeekContext>) -> i32 {
    let Some(ctx) = ctx else {
        return ERR_OTHER;
    };
    match ctx.initialize_jump_table() {
        Ok(()) => 0,
        Err(e) => {
            debug!("initializing jump table failed: {e}");
            e.code()
        }
    }
}

/// Release the context and its source. `None` is a no-op.
pub fn free(ctx: Option<SeekContext>) {
    drop(ctx);
}
