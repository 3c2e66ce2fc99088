//! # Tidemq
//! Rust-native client runtime for a partitioned pub/sub message queue.
//!
//! This crate provides the consumer-side core of a message-queue client: it
//! tracks which topic partitions the consumer currently owns, mediates
//! consumer-group rebalance events, and decodes the binary RPC frames
//! returned by broker and master connections. This is pure Rust all the way
//! down; meaning memory safety, safe concurrency, low resource usage, and
//! speed.
//!
//! # Goals
//! - Easy to understand code
//! - Leverage best in class libraries such as [Tokio](https://tokio.rs/)
//! - Be a building block for consumers of partitioned message queues
//!
//! ## Getting started
//! Install `tidemq` to your rust project with `cargo add tidemq` or include
//! the following snippet in your `Cargo.toml` dependencies:
//! ```toml
//! tidemq = "0.1"
//! ```
//!
//! ### What this crate is (and is not)
//! Two components do the heavy lifting:
//!
//! - [`codec::FrameDecoder`] turns an already-open byte stream into discrete
//!   response frames.
//! - [`consumer::ConsumerCache`] is the authoritative record of "what this
//!   consumer currently owns" and "what rebalance work is pending", shared by
//!   every task of a consumer session.
//!
//! Connection management, RPC dispatch, and rebalance *policy* live above
//! this crate: a fetch loop reads frames, applies their meaning to the cache,
//! and polls the cache to decide its next action. Decode failures are
//! connection-fatal and must be handled by tearing the connection down --
//! see [`codec`] for the framing contract.
//!
//! ### Driving the runtime
//! ```rust,no_run
//! use tidemq::codec::FrameDecoder;
//! use tidemq::config::ConsumerConfig;
//! use tidemq::consumer::ConsumerCache;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConsumerConfig::from_address(
//!         "127.0.0.1:8715?topics=trade@f1,f2;audit&group=settle",
//!     )?;
//!
//!     let cache = Arc::new(ConsumerCache::new());
//!     cache.set_consumer_info("settle-consumer-1", config.group.clone());
//!
//!     let stream = tokio::net::TcpStream::connect(&config.masters).await?;
//!     let mut decoder = FrameDecoder::new(stream);
//!
//!     loop {
//!         let response = decoder.decode().await?;
//!         // ... dispatch response.body() by response.serial_no(),
//!         //     admit/revoke partitions, enqueue rebalance events ...
//!
//!         while let Some(event) = cache.take_event() {
//!             // apply the rebalance instruction
//!             let _ = event;
//!         }
//!         cache.handle_expired_partitions(Duration::from_secs(60));
//!     }
//! }
//! ```

#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod metadata;
pub mod telemetry;

pub mod prelude {
    //! Main exports of the consumer runtime.
    //!
    //! Pulls in the cache, the frame decoder, and the metadata vocabulary in
    //! one import for the common case of wiring up a consumer loop.

    pub use crate::codec::{Decoder, FrameDecoder, RpcResponse};
    pub use crate::config::ConsumerConfig;
    pub use crate::consumer::ConsumerCache;
    pub use crate::error::{Error, Result};
    pub use crate::metadata::{
        ConsumerEvent, EventStatus, EventType, Node, Partition, SubscribeInfo,
    };
}
