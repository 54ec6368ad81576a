use thiserror::Error;

pub type ZseekResult<T> = Result<T, ZseekError>;

/// Sentinel for failures that are not bounds violations.
pub const ERR_OTHER: i32 = -1;
/// Sentinel for a seek that resolves before the start of the stream.
pub const ERR_NEGATIVE_SEEK: i32 = -2;
/// Sentinel for a seek that resolves past the end of the stream.
pub const ERR_BEYOND_END_SEEK: i32 = -3;

#[derive(Debug, Error)]
pub enum ZseekError {
    #[error("source is empty")]
    EmptySource,

    #[error("not a zstd stream: unexpected magic number {0:#010x}")]
    BadMagic(u32),

    #[error("truncated frame at compressed offset {offset}")]
    Truncated { offset: u64 },

    #[error("zstd decode error at compressed offset {offset}: {reason}")]
    Decode { offset: u64, reason: String },

    #[error("frame at compressed offset {offset} exceeds the {limit} byte frame limit")]
    FrameTooLarge { offset: u64, limit: u64 },

    #[error("frame {index} decoded to {actual} bytes, jump table expects {expected}")]
    FrameMismatch {
        index: usize,
        expected: u64,
        actual: u64,
    },

    #[error("seek to negative position {0}")]
    NegativeSeek(i128),

    #[error("seek to {target} is beyond the end of the stream ({size} bytes)")]
    BeyondEnd { target: u64, size: u64 },

    #[error(
        "jump table record ({compressed}, {uncompressed}) does not follow ({prev_compressed}, {prev_uncompressed})"
    )]
    NonMonotonicRecord {
        compressed: u64,
        uncompressed: u64,
        prev_compressed: u64,
        prev_uncompressed: u64,
    },

    #[error("jump table is already complete")]
    TableComplete,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZseekError {
    /// Sentinel code used by the handle-style API.
    pub fn code(&self) -> i32 {
        match self {
            ZseekError::NegativeSeek(_) => ERR_NEGATIVE_SEEK,
            ZseekError::BeyondEnd { .. } => ERR_BEYOND_END_SEEK,
            _ => ERR_OTHER,
        }
    }

    /// True for failures caused by the requested position rather than the stream.
    pub fn is_bounds(&self) -> bool {
        matches!(self, ZseekError::NegativeSeek(_) | ZseekError::BeyondEnd { .. })
    }
}

impl From<ZseekError> for std::io::Error {
    fn from(err: ZseekError) -> Self {
        use std::io::ErrorKind;

        match err {
            ZseekError::Io(e) => e,
            e @ (ZseekError::NegativeSeek(_) | ZseekError::BeyondEnd { .. }) => {
                std::io::Error::new(ErrorKind::InvalidInput, e)
            }
            e @ ZseekError::Truncated { .. } => std::io::Error::new(ErrorKind::UnexpectedEof, e),
            e => std::io::Error::new(ErrorKind::InvalidData, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_errors_map_to_seek_codes() {
        assert_eq!(ZseekError::NegativeSeek(-1).code(), ERR_NEGATIVE_SEEK);
        assert_eq!(
            ZseekError::BeyondEnd { target: 27, size: 26 }.code(),
            ERR_BEYOND_END_SEEK
        );
        assert_eq!(ZseekError::EmptySource.code(), ERR_OTHER);
        assert_eq!(ZseekError::TableComplete.code(), ERR_OTHER);
    }

    #[test]
    fn io_conversion_keeps_original_error() {
        let err = ZseekError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let io: std::io::Error = err.into();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);

        let io: std::io::Error = ZseekError::NegativeSeek(-5).into();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidInput);
        assert!(io.to_string().contains("-5"));

        let io: std::io::Error = ZseekError::Truncated { offset: 9 }.into();
        assert_eq!(io.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn display_includes_context() {
        let msg = ZseekError::FrameMismatch {
            index: 2,
            expected: 4,
            actual: 3,
        }
        .to_string();
        assert_eq!(msg, "frame 2 decoded to 3 bytes, jump table expects 4");
        assert_eq!(
            ZseekError::BadMagic(0xdeadbeef).to_string(),
            "not a zstd stream: unexpected magic number 0xdeadbeef"
        );
    }
}
