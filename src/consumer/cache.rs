//! The partition and rebalance-event cache shared by all consumer tasks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::constants::{DEFAULT_CONFIRM_WAIT, INVALID_VALUE};
use crate::metadata::{ConsumerEvent, Node, Partition, SubscribeInfo};

/// State slice guarded by the metadata lock: partition records, the secondary
/// indices, and all lease bookkeeping.
///
/// Keyset invariants, upheld by every mutation:
/// - `partitions` and `partition_sub_info` always share the same keyset.
/// - Every key in a `topic_partitions` or `broker_partitions` bucket exists in
///   `partitions`; empty buckets are pruned, never left behind.
/// - A key is in at most one of `used_partitions` / `index_partitions`, and
///   only while it is also in `partitions`.
/// - A key in `used_partitions` has at most one entry in `partition_timeouts`.
#[derive(Debug, Default)]
struct MetaState {
    /// Partition key → partition, everything this consumer currently knows.
    partitions: HashMap<String, Partition>,
    /// Partition key → subscription binding; mirrors `partitions`.
    partition_sub_info: HashMap<String, SubscribeInfo>,
    /// Topic → partition keys, secondary index.
    topic_partitions: HashMap<String, HashSet<String>>,
    /// Broker → partition keys, secondary index.
    broker_partitions: HashMap<Node, HashSet<String>>,
    /// Partition key → lease-start timestamp (Unix millis). Presence means
    /// the partition is leased to a fetch in flight.
    used_partitions: HashMap<String, i64>,
    /// Partition keys idle and eligible for immediate reuse.
    index_partitions: HashSet<String>,
    /// Partition key → advisory force-release deadline (Unix millis). Swept
    /// by `handle_expired_partitions`, never fired by a timer of its own.
    partition_timeouts: HashMap<String, i64>,
}

impl MetaState {
    /// Purge a partition and its secondary-index entries.
    fn remove_meta_info(&mut self, partition_key: &str) {
        if let Some(partition) = self.partitions.remove(partition_key) {
            if let Some(keys) = self.topic_partitions.get_mut(partition.topic()) {
                keys.remove(partition_key);
                if keys.is_empty() {
                    self.topic_partitions.remove(partition.topic());
                }
            }
            if let Some(keys) = self.broker_partitions.get_mut(partition.node()) {
                keys.remove(partition_key);
                if keys.is_empty() {
                    self.broker_partitions.remove(partition.node());
                }
            }
            self.partition_sub_info.remove(partition_key);
        }
    }

    /// Single choke point for lease-state transitions: drop the lease and its
    /// advisory deadline, then re-enter the idle pool when `reuse` is set and
    /// the partition is still known.
    ///
    /// Every removal and expiry path must come through here so no deadline
    /// entry outlives the lease it was armed for.
    fn reset_idle_partition(&mut self, partition_key: &str, reuse: bool) {
        self.used_partitions.remove(partition_key);
        self.partition_timeouts.remove(partition_key);
        self.index_partitions.remove(partition_key);
        if reuse && self.partitions.contains_key(partition_key) {
            self.index_partitions.insert(partition_key.to_string());
        }
    }
}

/// The authoritative record of what this consumer currently owns and what
/// rebalance work is pending.
///
/// One instance is shared (behind an `Arc`) between the consumer's
/// fetch/rebalance loop and the per-connection tasks feeding it. Internally
/// the state is split behind three independent guards by access pattern --
/// the rebalance event queue, the partition/lease metadata, and the
/// first-registration ledger -- so unrelated operations never serialize on
/// each other. No guard is ever held across I/O.
///
/// # Failure semantics
///
/// No operation returns an error. Absent keys are no-ops, duplicate
/// admissions are idempotent, and an empty event queue is a normal immediate
/// result. Two callers racing on the same key resolve by lock-acquisition
/// order: the last writer under the metadata lock wins, and the cache stays
/// internally consistent either way.
#[derive(Debug)]
pub struct ConsumerCache {
    consumer_id: RwLock<String>,
    group_name: RwLock<String>,
    under_group_ctrl: AtomicBool,
    def_flow_ctrl_id: AtomicI64,
    group_flow_ctrl_id: AtomicI64,
    qry_priority_id: AtomicI32,
    events: Mutex<VecDeque<ConsumerEvent>>,
    meta: Mutex<MetaState>,
    reg_booked: Mutex<HashMap<String, bool>>,
}

impl ConsumerCache {
    /// Create an empty cache with unset flow-control identifiers.
    pub fn new() -> Self {
        ConsumerCache {
            consumer_id: RwLock::new(String::new()),
            group_name: RwLock::new(String::new()),
            under_group_ctrl: AtomicBool::new(false),
            def_flow_ctrl_id: AtomicI64::new(INVALID_VALUE),
            group_flow_ctrl_id: AtomicI64::new(INVALID_VALUE),
            qry_priority_id: AtomicI32::new(INVALID_VALUE as i32),
            events: Mutex::new(VecDeque::new()),
            meta: Mutex::new(MetaState::default()),
            reg_booked: Mutex::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Identity and flow control
    // =========================================================================

    /// Record the consumer identity. Called once during session setup.
    pub fn set_consumer_info(&self, consumer_id: impl Into<String>, group: impl Into<String>) {
        *self.consumer_id.write() = consumer_id.into();
        *self.group_name.write() = group.into();
    }

    /// This consumer's session identifier.
    pub fn consumer_id(&self) -> String {
        self.consumer_id.read().clone()
    }

    /// The consumer group this session belongs to.
    pub fn group_name(&self) -> String {
        self.group_name.read().clone()
    }

    /// Whether group-level flow control rules are in effect.
    pub fn under_group_ctrl(&self) -> bool {
        self.under_group_ctrl.load(Ordering::Acquire)
    }

    /// Server-issued id of the default flow-control rule set.
    pub fn def_flow_ctrl_id(&self) -> i64 {
        self.def_flow_ctrl_id.load(Ordering::Acquire)
    }

    /// Server-issued id of the group flow-control rule set.
    pub fn group_flow_ctrl_id(&self) -> i64 {
        self.group_flow_ctrl_id.load(Ordering::Acquire)
    }

    /// Current query priority id.
    pub fn qry_priority_id(&self) -> i32 {
        self.qry_priority_id.load(Ordering::Acquire)
    }

    /// Record a new default flow-control rule id announced by the master.
    pub fn update_def_flow_ctrl_info(&self, flow_ctrl_id: i64) {
        self.def_flow_ctrl_id.store(flow_ctrl_id, Ordering::Release);
    }

    /// Record a new group flow-control rule id and query priority announced
    /// by the master. Group control is considered active once a valid rule id
    /// has been seen.
    pub fn update_group_flow_ctrl_info(&self, qry_priority_id: i32, flow_ctrl_id: i64) {
        self.group_flow_ctrl_id.store(flow_ctrl_id, Ordering::Release);
        self.qry_priority_id.store(qry_priority_id, Ordering::Release);
        self.under_group_ctrl
            .store(flow_ctrl_id != INVALID_VALUE, Ordering::Release);
    }

    // =========================================================================
    // Rebalance event queue
    // =========================================================================

    /// Append a rebalance instruction to the queue.
    pub fn offer_event(&self, event: ConsumerEvent) {
        self.events.lock().push_back(event);
    }

    /// Pop the oldest pending rebalance instruction, if any.
    ///
    /// Never blocks: an empty queue is a normal result, and callers schedule
    /// their own poll cadence.
    pub fn take_event(&self) -> Option<ConsumerEvent> {
        self.events.lock().pop_front()
    }

    /// Drop all pending rebalance instructions atomically.
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    // =========================================================================
    // Partition admission and removal
    // =========================================================================

    /// Accept a newly assigned partition into the cache.
    ///
    /// First admission of a key inserts the partition, its subscription
    /// binding, and both secondary-index entries; re-admission of a known key
    /// is a no-op for the metadata. Either way the partition ends up idle and
    /// eligible for reuse: re-offering a partition always refreshes its
    /// idle/reuse state, dropping any lease still recorded against it.
    pub fn add_new_partition(&self, new_partition: Partition) {
        let sub = SubscribeInfo::new(
            self.consumer_id(),
            self.group_name(),
            new_partition.clone(),
        );
        let partition_key = new_partition.partition_key().to_string();

        let mut meta = self.meta.lock();
        if !meta.partitions.contains_key(&partition_key) {
            meta.topic_partitions
                .entry(new_partition.topic().to_string())
                .or_default()
                .insert(partition_key.clone());
            meta.broker_partitions
                .entry(new_partition.node().clone())
                .or_default()
                .insert(partition_key.clone());
            meta.partition_sub_info.insert(partition_key.clone(), sub);
            meta.partitions.insert(partition_key.clone(), new_partition);
            debug!(partition = %partition_key, "accepted new partition");
        }
        meta.reset_idle_partition(&partition_key, true);
    }

    /// Remove revoked partitions in bulk, grouping the removed partitions by
    /// owning broker into `partitions` so the caller can issue one release
    /// RPC per broker.
    ///
    /// For each revoked subscription whose partition is currently leased, the
    /// partition's `last_consumed` flag is set to `false` when
    /// `processing_rollback` is set and `true` otherwise; the flag tells the
    /// next owner whether to re-fetch. Lease and idle state is cleared
    /// unconditionally, even for keys the cache no longer knows.
    pub fn remove_and_get_partitions(
        &self,
        subscribe_infos: &[SubscribeInfo],
        processing_rollback: bool,
        partitions: &mut HashMap<Node, Vec<Partition>>,
    ) {
        if subscribe_infos.is_empty() {
            return;
        }
        let mut meta = self.meta.lock();
        for sub in subscribe_infos {
            let partition_key = sub.partition().partition_key().to_string();
            let leased = meta.used_partitions.contains_key(&partition_key);
            let removed = meta.partitions.get_mut(&partition_key).map(|partition| {
                if leased {
                    partition.set_last_consumed(!processing_rollback);
                }
                partition.clone()
            });
            if let Some(partition) = removed {
                debug!(partition = %partition_key, rollback = processing_rollback, "revoking partition");
                partitions
                    .entry(partition.node().clone())
                    .or_default()
                    .push(partition);
                meta.remove_meta_info(&partition_key);
            }
            meta.reset_idle_partition(&partition_key, false);
        }
    }

    /// Remove partitions by bare key, with no revocation side effects.
    ///
    /// Same metadata purge and unconditional lease/idle reset as
    /// [`remove_and_get_partitions`](Self::remove_and_get_partitions), used
    /// when no release RPC needs acknowledging.
    pub fn remove_partitions(&self, partition_keys: &[String]) {
        let mut meta = self.meta.lock();
        for partition_key in partition_keys {
            meta.reset_idle_partition(partition_key, false);
            meta.remove_meta_info(partition_key);
        }
    }

    // =========================================================================
    // Lease lifecycle
    // =========================================================================

    /// Lease one idle partition for fetching.
    ///
    /// Pops an arbitrary key from the idle pool, records the lease-start
    /// timestamp, and arms the advisory force-release deadline. Returns a
    /// snapshot of the leased partition, or `None` when nothing is idle.
    ///
    /// The lease must be returned through
    /// [`release_partition`](Self::release_partition), or it will eventually
    /// be reclaimed by [`handle_expired_partitions`](Self::handle_expired_partitions).
    pub fn select_partition(&self) -> Option<Partition> {
        let mut meta = self.meta.lock();
        let partition_key = meta.index_partitions.iter().next()?.clone();
        meta.index_partitions.remove(&partition_key);
        let partition = meta.partitions.get(&partition_key).cloned()?;

        let now = now_millis();
        meta.used_partitions.insert(partition_key.clone(), now);
        meta.partition_timeouts.insert(
            partition_key.clone(),
            now + DEFAULT_CONFIRM_WAIT.as_millis() as i64,
        );
        debug!(partition = %partition_key, "partition leased for fetch");
        Some(partition)
    }

    /// Return a leased partition to the idle pool.
    pub fn release_partition(&self, partition_key: &str) {
        let mut meta = self.meta.lock();
        meta.reset_idle_partition(partition_key, true);
    }

    /// Reclaim leases older than `wait`.
    ///
    /// The safety-net path for partitions whose owner crashed or stalled
    /// without releasing them: any lease with `now - lease_start > wait` is
    /// marked not-consumed and returned to the idle pool. Cooperative -- the
    /// consumer loop must invoke this periodically; nothing fires on its own.
    pub fn handle_expired_partitions(&self, wait: Duration) {
        let mut meta = self.meta.lock();
        if meta.used_partitions.is_empty() {
            return;
        }
        let curr = now_millis();
        let wait_ms = wait.as_millis() as i64;
        let expired: Vec<String> = meta
            .used_partitions
            .iter()
            .filter_map(|(partition_key, &leased_at)| {
                (curr - leased_at > wait_ms).then(|| partition_key.clone())
            })
            .collect();
        for partition_key in &expired {
            warn!(partition = %partition_key, "lease expired, reclaiming partition");
            if let Some(partition) = meta.partitions.get_mut(partition_key) {
                partition.set_last_consumed(false);
            }
            meta.reset_idle_partition(partition_key, true);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Snapshot of the partitions owned by `broker`.
    pub fn get_partition_by_broker(&self, broker: &Node) -> Vec<Partition> {
        let meta = self.meta.lock();
        match meta.broker_partitions.get(broker) {
            Some(keys) => keys
                .iter()
                .filter_map(|key| meta.partitions.get(key).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Snapshot of every current subscription binding.
    pub fn get_subscribe_info(&self) -> Vec<SubscribeInfo> {
        let meta = self.meta.lock();
        meta.partition_sub_info.values().cloned().collect()
    }

    /// From `subscribe_infos`, the partitions whose key is not yet cached --
    /// what still needs to be requested from brokers. When the cache holds
    /// nothing, every candidate is unsubscribed.
    pub fn filter_partitions(&self, subscribe_infos: &[SubscribeInfo]) -> Vec<Partition> {
        let meta = self.meta.lock();
        if meta.partitions.is_empty() {
            subscribe_infos
                .iter()
                .map(|sub| sub.partition().clone())
                .collect()
        } else {
            subscribe_infos
                .iter()
                .filter(|sub| !meta.partitions.contains_key(sub.partition().partition_key()))
                .map(|sub| sub.partition().clone())
                .collect()
        }
    }

    /// Book a partition key in the registration ledger and return its booked
    /// flag.
    ///
    /// The ledger is append-only and never cleared for the life of the cache,
    /// so this returns `true` from the first call onward for any given key --
    /// a call itself marks the key as seen. Callers that need "never seen
    /// before" must ask before any registration path has touched the key.
    /// Growth is bounded by the number of distinct partitions the session
    /// ever observes.
    pub fn is_first_register(&self, partition_key: &str) -> bool {
        let mut booked = self.reg_booked.lock();
        *booked.entry(partition_key.to_string()).or_insert(true)
    }
}

impl Default for ConsumerCache {
    fn default() -> Self {
        ConsumerCache::new()
    }
}

/// Current Unix time in milliseconds, matching the lease-stamp unit.
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
