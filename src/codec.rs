//! Frame decoding for the binary RPC protocol.
//!
//! Every response from a master or broker connection arrives as one frame:
//!
//! ```text
//! [begin_token: u32] [serial_no: u32] [chunk_count: u32]
//!     chunk_count × ( [chunk_len: u32] [chunk bytes] )
//! ```
//!
//! All words are big-endian. The chunk bytes are concatenated, in order, into
//! a single response body. [`FrameDecoder`] decodes one frame per call,
//! suspending on the underlying stream until enough bytes are available.
//!
//! # Failure is connection-fatal
//!
//! The format has no recovery marker mid-stream, so a bad begin token or a
//! short read at any stage means the connection is desynced for good. Every
//! error this module returns must be treated by the caller as a reason to
//! tear the connection down; the decoder never resynchronizes on its own.
//!
//! # Buffer reuse
//!
//! The decoder keeps one scratch buffer sized for the common case
//! ([`DEFAULT_MSG_SIZE`]). When the accumulated chunks of a frame outgrow it,
//! the buffer is reallocated to exactly fit and the bytes already read are
//! carried forward, so memory stays bounded by the largest single frame seen
//! instead of growing per chunk.

use std::io;

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::trace;

use crate::constants::{
    BEGIN_TOKEN_LEN, DATA_LEN, DEFAULT_MSG_SIZE, FRAME_HEAD_LEN, LIST_SIZE_LEN, MAX_BUFFER_SIZE,
    RPC_PROTOCOL_BEGIN_TOKEN,
};
use crate::error::{Error, Result};

/// One decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    serial_no: u32,
    body: Bytes,
}

impl RpcResponse {
    /// Serial number of the request this response answers.
    pub fn serial_no(&self) -> u32 {
        self.serial_no
    }

    /// The concatenated response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response, keeping only the body.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// Decodes response frames from a byte stream.
///
/// Implementors suspend the caller until a complete frame is available or the
/// stream fails.
#[async_trait]
pub trait Decoder {
    /// Decode the next response frame.
    async fn decode(&mut self) -> Result<RpcResponse>;
}

/// [`Decoder`] over any [`AsyncRead`] byte stream.
///
/// The stream must already be connected and authenticated; this type imposes
/// no protocol beyond the framing described in the module docs.
#[derive(Debug)]
pub struct FrameDecoder<R> {
    reader: BufReader<R>,
    msg: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameDecoder<R> {
    /// Wrap `stream` in a buffered decoder.
    pub fn new(stream: R) -> Self {
        FrameDecoder {
            reader: BufReader::with_capacity(MAX_BUFFER_SIZE, stream),
            msg: vec![0u8; DEFAULT_MSG_SIZE],
        }
    }

    /// Decode the next response frame from the stream.
    pub async fn decode(&mut self) -> Result<RpcResponse> {
        self.read_frame().await
    }

    async fn read_frame(&mut self) -> Result<RpcResponse> {
        // token + serial number, read atomically as one 8-byte header
        self.reader
            .read_exact(&mut self.msg[..FRAME_HEAD_LEN])
            .await
            .map_err(|e| short_read(e, Error::TruncatedHeader))?;
        let token = (&self.msg[..BEGIN_TOKEN_LEN]).get_u32();
        if token != RPC_PROTOCOL_BEGIN_TOKEN {
            return Err(Error::TokenMismatch {
                found: token,
                expected: RPC_PROTOCOL_BEGIN_TOKEN,
            });
        }

        let mut word = [0u8; LIST_SIZE_LEN];
        self.reader
            .read_exact(&mut word)
            .await
            .map_err(|e| short_read(e, Error::TruncatedLength))?;
        let chunk_count = u32::from_be_bytes(word);

        let mut size = [0u8; DATA_LEN];
        let mut total = FRAME_HEAD_LEN;
        for _ in 0..chunk_count {
            self.reader
                .read_exact(&mut size)
                .await
                .map_err(|e| short_read(e, Error::TruncatedLength))?;
            let chunk_len = u32::from_be_bytes(size) as usize;

            if total + chunk_len > self.msg.len() {
                // Reallocate to exactly fit, carrying already-read bytes
                // forward. Bounds memory to the largest single frame seen.
                let mut grown = vec![0u8; total + chunk_len];
                grown[..total].copy_from_slice(&self.msg[..total]);
                self.msg = grown;
            }

            self.reader
                .read_exact(&mut self.msg[total..total + chunk_len])
                .await
                .map_err(|e| short_read(e, Error::TruncatedBody))?;
            total += chunk_len;
        }

        let serial_no = (&self.msg[BEGIN_TOKEN_LEN..FRAME_HEAD_LEN]).get_u32();
        let body = Bytes::copy_from_slice(&self.msg[FRAME_HEAD_LEN..total]);
        trace!(
            serial_no,
            chunks = chunk_count,
            body_len = body.len(),
            "decoded response frame"
        );

        Ok(RpcResponse { serial_no, body })
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Decoder for FrameDecoder<R> {
    async fn decode(&mut self) -> Result<RpcResponse> {
        self.read_frame().await
    }
}

/// Map a short read to the stage-specific truncation error, preserving the
/// kind of any other I/O failure.
fn short_read(e: io::Error, truncated: Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        truncated
    } else {
        Error::Io(e.kind())
    }
}
