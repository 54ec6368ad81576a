//! Byte sources: where compressed bytes come from
//!
//! A seek context owns exactly one source and drops it (closing any file
//! descriptor) when the context is dropped.

use std::fs::File;
use std::io::{Cursor, Read, Seek};

#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

/// Random-access supplier of compressed bytes
pub trait ByteSource: Read + Seek + Send {
    /// Descriptor backing this source, if it has one.
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

impl ByteSource for File {
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        Some(self.as_raw_fd())
    }
}

impl<T: AsRef<[u8]> + Send> ByteSource for Cursor<T> {}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        (**self).raw_fd()
    }
}
