//! Wire-level framing integration tests.
//!
//! These tests verify the frame decoder at the byte level: a frame is
//!
//! ```text
//! [begin_token: u32] [serial_no: u32] [chunk_count: u32]
//!     chunk_count × ( [chunk_len: u32] [chunk bytes] )
//! ```
//!
//! with all words big-endian and the chunk bytes concatenated into one body.
//!
//! # Running Tests
//!
//! ```sh
//! cargo test --test codec_tests
//! ```

use bytes::{BufMut, BytesMut};
use std::io;
use tidemq::codec::FrameDecoder;
use tidemq::constants::RPC_PROTOCOL_BEGIN_TOKEN;
use tidemq::error::Error;

// ============================================================================
// Test Helpers
// ============================================================================

/// Build a complete frame for the given serial number and body chunks.
fn frame(serial_no: u32, chunks: &[&[u8]]) -> BytesMut {
    frame_with_token(RPC_PROTOCOL_BEGIN_TOKEN, serial_no, chunks)
}

fn frame_with_token(token: u32, serial_no: u32, chunks: &[&[u8]]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_u32(token);
    buf.put_u32(serial_no);
    buf.put_u32(chunks.len() as u32);
    for chunk in chunks {
        buf.put_u32(chunk.len() as u32);
        buf.put_slice(chunk);
    }
    buf
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_decode_two_chunk_frame() {
    let bytes = frame(42, &[b"abc", b"de"]);
    let mut decoder = FrameDecoder::new(&bytes[..]);

    let response = decoder.decode().await.expect("well-formed frame");
    assert_eq!(response.serial_no(), 42);
    assert_eq!(response.body(), b"abcde");
}

#[tokio::test]
async fn test_decode_empty_chunk_list() {
    let bytes = frame(7, &[]);
    let mut decoder = FrameDecoder::new(&bytes[..]);

    let response = decoder.decode().await.expect("empty body frame");
    assert_eq!(response.serial_no(), 7);
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn test_decode_preserves_serial_number_extremes() {
    for serial_no in [0u32, 1, u32::MAX] {
        let bytes = frame(serial_no, &[b"x"]);
        let mut decoder = FrameDecoder::new(&bytes[..]);
        let response = decoder.decode().await.expect("frame");
        assert_eq!(response.serial_no(), serial_no);
    }
}

#[tokio::test]
async fn test_decode_back_to_back_frames_from_one_stream() {
    let mut bytes = frame(1, &[b"first"]);
    bytes.extend_from_slice(&frame(2, &[b"sec", b"ond"]));
    bytes.extend_from_slice(&frame(3, &[]));

    let mut decoder = FrameDecoder::new(&bytes[..]);
    let first = decoder.decode().await.expect("frame 1");
    let second = decoder.decode().await.expect("frame 2");
    let third = decoder.decode().await.expect("frame 3");

    assert_eq!((first.serial_no(), first.body()), (1, &b"first"[..]));
    assert_eq!((second.serial_no(), second.body()), (2, &b"second"[..]));
    assert_eq!((third.serial_no(), third.body()), (3, &b""[..]));
}

#[tokio::test]
async fn test_decode_body_larger_than_scratch_buffer() {
    // three chunks totalling well past the 4 KiB default scratch buffer
    let chunk = vec![0xC3u8; 3000];
    let bytes = frame(11, &[&chunk, &chunk, &chunk]);
    let mut decoder = FrameDecoder::new(&bytes[..]);

    let response = decoder.decode().await.expect("large frame");
    assert_eq!(response.body().len(), 9000);
    assert!(response.body().iter().all(|&b| b == 0xC3));
}

// ============================================================================
// Framing failures
// ============================================================================

#[tokio::test]
async fn test_decode_rejects_wrong_begin_token() {
    let bytes = frame_with_token(0xDEAD_BEEF, 42, &[b"abc"]);
    let mut decoder = FrameDecoder::new(&bytes[..]);

    let err = decoder.decode().await.expect_err("token mismatch");
    assert_eq!(
        err,
        Error::TokenMismatch {
            found: 0xDEAD_BEEF,
            expected: RPC_PROTOCOL_BEGIN_TOKEN,
        }
    );
}

#[tokio::test]
async fn test_decode_empty_stream_is_truncated_header() {
    let mut decoder = FrameDecoder::new(&b""[..]);
    let err = decoder.decode().await.expect_err("no bytes at all");
    assert_eq!(err, Error::TruncatedHeader);
}

#[tokio::test]
async fn test_decode_stream_cut_inside_header() {
    let bytes = frame(42, &[b"abc"]);
    let mut decoder = FrameDecoder::new(&bytes[..5]);
    let err = decoder.decode().await.expect_err("header cut short");
    assert_eq!(err, Error::TruncatedHeader);
}

#[tokio::test]
async fn test_decode_stream_cut_before_chunk_count() {
    let bytes = frame(42, &[b"abc"]);
    let mut decoder = FrameDecoder::new(&bytes[..8]);
    let err = decoder.decode().await.expect_err("no chunk count");
    assert_eq!(err, Error::TruncatedLength);
}

#[tokio::test]
async fn test_decode_stream_cut_inside_chunk_length() {
    let bytes = frame(42, &[b"abc"]);
    // header + count + half a chunk-length word
    let mut decoder = FrameDecoder::new(&bytes[..14]);
    let err = decoder.decode().await.expect_err("chunk length cut short");
    assert_eq!(err, Error::TruncatedLength);
}

#[tokio::test]
async fn test_decode_stream_cut_inside_chunk_body() {
    let bytes = frame(42, &[b"abcdef"]);
    let cut = bytes.len() - 2;
    let mut decoder = FrameDecoder::new(&bytes[..cut]);
    let err = decoder.decode().await.expect_err("body cut short");
    assert_eq!(err, Error::TruncatedBody);
}

#[tokio::test]
async fn test_decode_missing_trailing_chunk() {
    // frame claims two chunks but carries only one
    let mut bytes = BytesMut::new();
    bytes.put_u32(RPC_PROTOCOL_BEGIN_TOKEN);
    bytes.put_u32(9);
    bytes.put_u32(2);
    bytes.put_u32(3);
    bytes.put_slice(b"abc");
    let mut decoder = FrameDecoder::new(&bytes[..]);
    let err = decoder.decode().await.expect_err("second chunk absent");
    assert_eq!(err, Error::TruncatedLength);
}

#[tokio::test]
async fn test_decode_after_good_frame_reports_truncation_of_next() {
    let mut bytes = frame(1, &[b"ok"]);
    bytes.extend_from_slice(&frame(2, &[b"partial"])[..6]);

    let mut decoder = FrameDecoder::new(&bytes[..]);
    assert!(decoder.decode().await.is_ok());
    let err = decoder.decode().await.expect_err("second frame cut short");
    assert_eq!(err, Error::TruncatedHeader);
}

// ============================================================================
// Stream error passthrough
// ============================================================================

/// Reader that fails immediately with a non-EOF error kind.
struct BrokenReader;

impl tokio::io::AsyncRead for BrokenReader {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        _buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::task::Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset by peer",
        )))
    }
}

#[tokio::test]
async fn test_decode_preserves_io_error_kind() {
    let mut decoder = FrameDecoder::new(BrokenReader);
    let err = decoder.decode().await.expect_err("stream error");
    assert_eq!(err, Error::Io(io::ErrorKind::ConnectionReset));
}
