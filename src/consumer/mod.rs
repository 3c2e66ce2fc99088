//! Consumer-side runtime state.
//!
//! This module owns the authoritative in-memory record of what one consumer
//! currently holds: the partitions assigned to it, the lease state of each,
//! and the queue of rebalance instructions waiting to be applied. The
//! higher-level fetch/rebalance loop drives it; broker and master connections
//! feed it with values decoded by [`crate::codec`].

mod cache;

pub use cache::ConsumerCache;
