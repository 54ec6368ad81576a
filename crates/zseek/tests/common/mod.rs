//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use xxhash_rust::xxh64::xxh64;

/// Frame contents of the 4-frame alphabet stream
pub const SIMPLE_FRAMES: [&[u8]; 4] = [b"ABCD", b"EF", b"GHIJ", b"KLMNOPQRSTUVWXYZ"];
pub const SIMPLE_COMPRESSED: [u64; 5] = [0, 17, 32, 49, 78];
pub const SIMPLE_UNCOMPRESSED: [u64; 5] = [0, 4, 6, 10, 26];

pub const DIGITS_FRAMES: usize = 100;
pub const DIGITS_FRAME_LEN: usize = 1000;
pub const DIGITS_SIZE: usize = DIGITS_FRAMES * DIGITS_FRAME_LEN;

/// One zstd frame holding `content` as a single raw block, with checksum.
///
/// Layout: magic, descriptor (single segment, checksum), 1-byte content
/// size, 3-byte block header, content, low 4 bytes of XXH64.
pub fn raw_frame(content: &[u8]) -> Vec<u8> {
    assert!(content.len() < 256);
    let mut frame = Vec::with_capacity(content.len() + 13);
    frame.extend_from_slice(&0xFD2F_B528u32.to_le_bytes());
    frame.push(0x24);
    frame.push(content.len() as u8);
    let block_header = 1u32 | ((content.len() as u32) << 3);
    frame.extend_from_slice(&block_header.to_le_bytes()[..3]);
    frame.extend_from_slice(content);
    frame.extend_from_slice(&(xxh64(content, 0) as u32).to_le_bytes());
    frame
}

/// "ABCD" | "EF" | "GHIJ" | "KLMNOPQRSTUVWXYZ", 78 compressed bytes.
pub fn simple_stream() -> Vec<u8> {
    SIMPLE_FRAMES.iter().flat_map(|f| raw_frame(f)).collect()
}

/// Byte expected at uncompressed offset `pos` of the digits stream.
pub fn digit_at(pos: usize) -> u8 {
    b'0' + (pos % 10) as u8
}

fn digits_frame() -> Vec<u8> {
    (0..DIGITS_FRAME_LEN).map(digit_at).collect()
}

/// 100 frames of "0123456789" repeated, without declared content sizes.
pub fn digits_stream() -> Vec<u8> {
    let mut encoder = zstd::stream::Encoder::new(Vec::new(), 3).unwrap();
    encoder.include_contentsize(false).unwrap();
    encoder.write_all(&digits_frame()).unwrap();
    encoder.finish().unwrap().repeat(DIGITS_FRAMES)
}

/// Same content as [`digits_stream`], every frame declaring its size.
pub fn digits_stream_sized() -> Vec<u8> {
    let frame = zstd::bulk::compress(&digits_frame(), 3).unwrap();
    frame.repeat(DIGITS_FRAMES)
}

/// `frames` frames of varying length over a non-repeating pattern.
pub fn patterned_stream(frames: usize) -> (Vec<u8>, Vec<u8>) {
    let mut plain = Vec::new();
    let mut stream = Vec::new();
    for i in 0..frames {
        let len = 4096 + i * 1531;
        let start = plain.len();
        plain.extend((start..start + len).map(|j| (j.wrapping_mul(7) ^ (j >> 3)) as u8));
        stream.extend(zstd::bulk::compress(&plain[start..], 3).unwrap());
    }
    (plain, stream)
}

pub fn write_fixture(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}
