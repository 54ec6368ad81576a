//! Integration test: 100 frames of repeating digits (100 KB uncompressed)
//!
//! The byte at offset `pos` is always `b'0' + pos % 10`, so any range can be
//! checked without a reference copy. Each scenario runs against a stream
//! whose frames declare their content size and one whose frames do not.

mod common;

use std::io::SeekFrom;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zseek::api::{self, SEEK_CUR, SEEK_END};
use zseek::{IndexMode, SeekContext};

use common::{digit_at, digits_stream, digits_stream_sized, DIGITS_FRAMES, DIGITS_SIZE};

fn contexts(mode: IndexMode) -> Vec<(&'static str, SeekContext)> {
    vec![
        (
            "undeclared",
            SeekContext::from_bytes(digits_stream(), mode).expect("undeclared sizes"),
        ),
        (
            "declared",
            SeekContext::from_bytes(digits_stream_sized(), mode).expect("declared sizes"),
        ),
    ]
}

fn assert_digits(buf: &[u8], start: usize, label: &str) {
    for (w, &b) in buf.iter().enumerate() {
        assert_eq!(b, digit_at(start + w), "{label}: offset {}", start + w);
    }
}

#[test]
fn jump_table_spans_all_frames() {
    for (label, mut ctx) in contexts(IndexMode::Eager) {
        assert_eq!(ctx.jump_table().len(), DIGITS_FRAMES + 1, "{label}");
        assert_eq!(ctx.uncompressed_file_size().unwrap(), DIGITS_SIZE as u64);
        assert_eq!(ctx.number_of_frames().unwrap(), DIGITS_FRAMES as u64);
        for (i, rec) in ctx.jump_table().records().iter().enumerate() {
            assert_eq!(rec.uncompressed_pos, (i * 1000) as u64, "{label}");
        }
    }
}

#[test]
fn declared_sizes_are_skipped_without_decoding() {
    let ctx = SeekContext::from_bytes(digits_stream_sized(), IndexMode::Eager).unwrap();
    let stats = ctx.stats();
    assert_eq!(stats.frames_decoded, 1);
    assert_eq!(stats.frames_skipped, DIGITS_FRAMES as u64);

    let ctx = SeekContext::from_bytes(digits_stream(), IndexMode::Eager).unwrap();
    assert_eq!(ctx.stats().frames_decoded, 1 + DIGITS_FRAMES as u64);
    assert_eq!(ctx.stats().frames_skipped, 0);
}

#[test]
fn seek_end_tells_file_size() {
    for (label, mut ctx) in contexts(IndexMode::Lazy) {
        assert_eq!(ctx.tell(), 0);
        assert_eq!(api::seek(Some(&mut ctx), 0, SEEK_END), 0, "{label}");
        assert_eq!(ctx.tell(), DIGITS_SIZE as u64);
        assert_eq!(ctx.uncompressed_file_size().unwrap(), DIGITS_SIZE as u64);
        assert_eq!(ctx.compressed_tell(), ctx.jump_table().last_known_compressed_offset());
    }
}

#[test]
fn seek_set_fuzzy() {
    for (label, mut ctx) in contexts(IndexMode::Eager) {
        let mut rng = StdRng::seed_from_u64(0);
        let mut buf = vec![0u8; DIGITS_SIZE];
        for _ in 0..1000 {
            let start = rng.gen_range(0..DIGITS_SIZE);
            let len = rng.gen_range(1..=DIGITS_SIZE - start);

            assert_eq!(ctx.seek(SeekFrom::Start(start as u64)).unwrap(), start as u64);
            assert_eq!(ctx.read(&mut buf[..len]).unwrap(), len, "{label}");
            assert_digits(&buf[..len], start, label);
            assert_eq!(ctx.tell(), (start + len) as u64);
        }
    }
}

#[test]
fn seek_cur_fuzzy() {
    for (label, mut ctx) in contexts(IndexMode::Lazy) {
        let mut rng = StdRng::seed_from_u64(1);
        let mut buf = vec![0u8; DIGITS_SIZE];
        for _ in 0..1000 {
            let start = rng.gen_range(0..DIGITS_SIZE);
            let len = rng.gen_range(1..=DIGITS_SIZE - start);

            let delta = start as i64 - api::tell(Some(&ctx));
            assert_eq!(api::seek(Some(&mut ctx), delta, SEEK_CUR), 0, "{label}");
            assert_eq!(ctx.tell(), start as u64);
            assert_eq!(api::read(&mut buf[..len], Some(&mut ctx)), len);
            assert_digits(&buf[..len], start, label);
            assert_eq!(ctx.tell(), (start + len) as u64);
        }
    }
}

#[test]
fn seek_end_fuzzy() {
    for (label, mut ctx) in contexts(IndexMode::Lazy) {
        let mut rng = StdRng::seed_from_u64(2);
        let mut buf = vec![0u8; DIGITS_SIZE];
        for _ in 0..1000 {
            let start = rng.gen_range(0..DIGITS_SIZE);
            let len = rng.gen_range(1..=DIGITS_SIZE - start);

            let offset = start as i64 - DIGITS_SIZE as i64;
            assert_eq!(api::seek(Some(&mut ctx), offset, SEEK_END), 0, "{label}");
            assert_eq!(ctx.tell(), start as u64);
            assert_eq!(api::read(&mut buf[..len], Some(&mut ctx)), len);
            assert_digits(&buf[..len], start, label);
        }
    }
}

#[test]
fn read_too_much() {
    for (label, mut ctx) in contexts(IndexMode::Lazy) {
        let mut buf = vec![0u8; 2 * DIGITS_SIZE];
        assert_eq!(ctx.read(&mut buf).unwrap(), DIGITS_SIZE, "{label}");
        assert_digits(&buf[..DIGITS_SIZE], 0, label);
        assert_eq!(ctx.tell(), DIGITS_SIZE as u64);
        assert!(ctx.jump_table_is_initialized());

        assert_eq!(ctx.read(&mut buf).unwrap(), 0);
        assert_eq!(ctx.tell(), DIGITS_SIZE as u64);
    }
}

#[test]
fn seek_before_first_read_on_uneven_frames() {
    let (plain, stream) = common::patterned_stream(16);
    let mut ctx = SeekContext::from_bytes(stream, IndexMode::Eager).unwrap();
    let mut buf = vec![0u8; 100_000];

    assert_eq!(api::seek(Some(&mut ctx), 1, api::SEEK_SET), 0);
    assert_eq!(ctx.read(&mut buf).unwrap(), 100_000);
    assert_eq!(buf, plain[1..100_001]);
    assert!(ctx.is_multiframe().unwrap());
    assert_eq!(ctx.number_of_frames().unwrap(), 16);
    assert_eq!(ctx.uncompressed_file_size().unwrap(), plain.len() as u64);
}

#[test]
fn small_input_window_reads_the_same_bytes() {
    let options = zseek::SeekOptions {
        index: IndexMode::Lazy,
        input_buffer_size: 32,
        ..Default::default()
    };
    let mut ctx =
        SeekContext::open(std::io::Cursor::new(digits_stream_sized()), &options).unwrap();
    let mut buf = vec![0u8; 2500];
    ctx.seek(SeekFrom::Start(48_700)).unwrap();
    assert_eq!(ctx.read(&mut buf).unwrap(), 2500);
    assert_digits(&buf, 48_700, "small window");
    // Frames 0..=51 are known: 51 holds the last byte read
    assert_eq!(ctx.jump_table().len(), 53);
}
