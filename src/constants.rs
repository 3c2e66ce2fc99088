//! Centralized protocol and client constants.
//!
//! This module consolidates the magic numbers used by the frame codec and the
//! consumer cache. Having them in one place makes it easier to:
//!
//! - Understand the wire framing constraints
//! - Update values consistently
//! - Document the rationale for each constant
//!
//! # Categories
//!
//! - **Framing Constants**: wire protocol word sizes and the begin token
//! - **Buffer Constants**: decoder scratch and read buffer sizing
//! - **Lease Constants**: partition lease bookkeeping defaults

use std::time::Duration;

// =============================================================================
// Framing Constants
// =============================================================================

/// Fixed token that begins every RPC frame.
///
/// A frame whose first four bytes do not equal this value indicates framing
/// desync; the connection cannot be recovered and must be torn down.
pub const RPC_PROTOCOL_BEGIN_TOKEN: u32 = 0xFF7F_F4FE;

/// Length of the begin-token word in bytes.
pub const BEGIN_TOKEN_LEN: usize = 4;

/// Length of the serial-number word in bytes.
///
/// The serial number correlates a response frame with the request that
/// produced it.
pub const SERIAL_NO_LEN: usize = 4;

/// Length of the frame header: begin token followed by serial number.
///
/// The header is read in one piece before any body chunk.
pub const FRAME_HEAD_LEN: usize = BEGIN_TOKEN_LEN + SERIAL_NO_LEN;

/// Length of the chunk-count word that follows the frame header.
pub const LIST_SIZE_LEN: usize = 4;

/// Length of each per-chunk size word.
pub const DATA_LEN: usize = 4;

// =============================================================================
// Buffer Constants
// =============================================================================

/// Initial size of the decoder's reusable scratch buffer.
///
/// Sized for the common case; the buffer grows to exactly fit the largest
/// frame seen and is reused across decode calls.
pub const DEFAULT_MSG_SIZE: usize = 4096;

/// Capacity of the buffered reader wrapped around the byte stream (128 KiB).
pub const MAX_BUFFER_SIZE: usize = 128 * 1024;

// =============================================================================
// Lease Constants
// =============================================================================

/// Sentinel for flow-control identifiers that have not been assigned yet.
pub const INVALID_VALUE: i64 = -2;

/// Advisory deadline armed when a partition is leased for fetching.
///
/// `handle_expired_partitions` is the reclaim path; this deadline only
/// records when the lease became suspect.
pub const DEFAULT_CONFIRM_WAIT: Duration = Duration::from_millis(60_000);

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_head_is_token_plus_serial() {
        assert_eq!(FRAME_HEAD_LEN, BEGIN_TOKEN_LEN + SERIAL_NO_LEN);
        assert_eq!(FRAME_HEAD_LEN, 8);
    }

    #[test]
    fn test_scratch_buffer_smaller_than_read_buffer() {
        assert!(DEFAULT_MSG_SIZE < MAX_BUFFER_SIZE);
    }

    #[test]
    fn test_begin_token_value() {
        assert_eq!(RPC_PROTOCOL_BEGIN_TOKEN, 0xFF7F_F4FE);
    }
}
