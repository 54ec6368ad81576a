//! zseek: random-access seek/read over multi-frame zstd streams
//!
//! # Overview
//! - `jump_table`: append-only index of frame boundaries (compressed ↔ uncompressed)
//! - `source`: byte sources the compressed stream is read from
//! - `decoder`: forward-only, whole-frame zstd decoding
//! - `context`: `SeekContext`, file-like seek/read/tell over the uncompressed stream
//! - `api`: handle-style functions returning sentinel values instead of errors

pub mod api;
pub mod context;
pub mod decoder;
pub mod jump_table;
pub mod source;

// Convenience re-exports for the most common operations
pub use context::{SeekContext, SeekOptions};
pub use decoder::{DecoderStats, FrameDecoder, FrameExtent};
pub use jump_table::{JumpTable, JumpTableRecord};
pub use source::ByteSource;
pub use zseek_core::{IndexMode, ZseekError, ZseekResult};
