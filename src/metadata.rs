//! Value types describing brokers, partitions, subscriptions, and rebalance
//! events.
//!
//! These are the vocabulary shared between the frame codec's callers, the
//! consumer cache, and the surrounding fetch/rebalance loop. All of them are
//! plain values: cloning is cheap enough for the snapshot-copy queries the
//! cache exposes, and none of them perform I/O.
//!
//! # Identity
//!
//! [`Node`] compares and hashes by value (id, host, port) so it can key the
//! cache's per-broker index directly. [`Partition`] carries a precomputed
//! partition key of the form `host:port#topic#partition_id`, globally unique
//! within one consumer's view.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identity of a broker endpoint.
///
/// Nodes are grouping keys: the cache never mutates one, and two nodes with
/// equal id, host, and port are the same broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    id: u32,
    host: String,
    port: u16,
}

impl Node {
    /// Create a broker identity from its parts.
    pub fn new(id: u32, host: impl Into<String>, port: u16) -> Self {
        Node {
            id,
            host: host.into(),
            port,
        }
    }

    /// Numeric broker id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Broker hostname or IP.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Broker port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The `host:port` endpoint string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.id, self.host, self.port)
    }
}

impl FromStr for Node {
    type Err = Error;

    /// Parse a node from its `id:host:port` form.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let (id, host, port) = match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(host), Some(port)) if !host.is_empty() => (id, host, port),
            _ => return Err(Error::Metadata(format!("invalid node string: {s:?}"))),
        };
        let id = id
            .parse::<u32>()
            .map_err(|_| Error::Metadata(format!("invalid node id in {s:?}")))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::Metadata(format!("invalid node port in {s:?}")))?;
        Ok(Node::new(id, host, port))
    }
}

/// One consumable unit: a (topic, partition) pair owned by a single broker.
///
/// The `last_consumed` flag records whether the most recent fetch against this
/// partition yielded data; rebalance-rollback logic reads it to decide whether
/// the next owner should re-fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    node: Node,
    topic: String,
    partition_id: u32,
    key: String,
    last_consumed: bool,
}

impl Partition {
    /// Create a partition owned by `node`.
    pub fn new(node: Node, topic: impl Into<String>, partition_id: u32) -> Self {
        let topic = topic.into();
        let key = format!("{}#{}#{}", node.address(), topic, partition_id);
        Partition {
            node,
            topic,
            partition_id,
            key,
            last_consumed: false,
        }
    }

    /// Owning broker.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Topic this partition belongs to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Partition index within the topic.
    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    /// Globally unique partition key, `host:port#topic#partition_id`.
    pub fn partition_key(&self) -> &str {
        &self.key
    }

    /// Whether the most recent fetch against this partition yielded data.
    pub fn last_consumed(&self) -> bool {
        self.last_consumed
    }

    /// Record whether the most recent fetch yielded data.
    pub fn set_last_consumed(&mut self, last_consumed: bool) {
        self.last_consumed = last_consumed;
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Binding of a [`Partition`] to the (consumer, group) pair that owns it.
///
/// Created when a partition is accepted into the cache and removed when the
/// partition is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeInfo {
    consumer_id: String,
    group: String,
    partition: Partition,
}

impl SubscribeInfo {
    /// Bind `partition` to a consumer and group.
    pub fn new(
        consumer_id: impl Into<String>,
        group: impl Into<String>,
        partition: Partition,
    ) -> Self {
        SubscribeInfo {
            consumer_id: consumer_id.into(),
            group: group.into(),
            partition,
        }
    }

    /// Consumer holding the subscription.
    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    /// Consumer group the subscription belongs to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The subscribed partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }
}

impl fmt::Display for SubscribeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}#{}",
            self.consumer_id,
            self.group,
            self.partition.partition_key()
        )
    }
}

/// Kind of rebalance instruction carried by a [`ConsumerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Connect to the named partitions and start consuming.
    Connect,
    /// Disconnect from the named partitions and release them.
    Disconnect,
    /// Report current subscriptions back to the rebalance driver.
    Report,
    /// Abort any in-flight rebalance processing.
    StopRebalance,
}

/// Processing state of a [`ConsumerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// Enqueued, not yet picked up by the consumer loop.
    ToDo,
    /// Picked up, being applied.
    Processing,
    /// Fully applied.
    Done,
    /// Application failed; the driver decides what happens next.
    Failed,
}

/// A rebalance instruction produced by the external rebalance driver.
///
/// The consumer cache stores these FIFO and never interprets the payload; the
/// consumer loop drains them and applies the partition changes they name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerEvent {
    rebalance_id: i64,
    event_type: EventType,
    status: EventStatus,
    subscribe_info: Vec<SubscribeInfo>,
}

impl ConsumerEvent {
    /// Create an event for one rebalance round.
    pub fn new(
        rebalance_id: i64,
        event_type: EventType,
        status: EventStatus,
        subscribe_info: Vec<SubscribeInfo>,
    ) -> Self {
        ConsumerEvent {
            rebalance_id,
            event_type,
            status,
            subscribe_info,
        }
    }

    /// Rebalance round this event belongs to.
    pub fn rebalance_id(&self) -> i64 {
        self.rebalance_id
    }

    /// What the driver wants done.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Current processing state.
    pub fn status(&self) -> EventStatus {
        self.status
    }

    /// Partitions named by this event.
    pub fn subscribe_info(&self) -> &[SubscribeInfo] {
        &self.subscribe_info
    }

    /// Advance the processing state.
    pub fn set_status(&mut self, status: EventStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node() -> Node {
        Node::new(1, "10.0.0.7", 8123)
    }

    #[test]
    fn test_node_address_and_display() {
        let node = test_node();
        assert_eq!(node.address(), "10.0.0.7:8123");
        assert_eq!(node.to_string(), "1:10.0.0.7:8123");
    }

    #[test]
    fn test_node_round_trip() {
        let node: Node = "1:10.0.0.7:8123".parse().expect("parse node");
        assert_eq!(node, test_node());
        assert_eq!(node.to_string().parse::<Node>().expect("reparse"), node);
    }

    #[test]
    fn test_node_parse_rejects_garbage() {
        assert!("".parse::<Node>().is_err());
        assert!("1:host".parse::<Node>().is_err());
        assert!("x:host:8123".parse::<Node>().is_err());
        assert!("1:host:notaport".parse::<Node>().is_err());
    }

    #[test]
    fn test_node_value_identity() {
        let a = test_node();
        let b = Node::new(1, "10.0.0.7", 8123);
        let c = Node::new(2, "10.0.0.7", 8123);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_partition_key_format() {
        let partition = Partition::new(test_node(), "trade", 3);
        assert_eq!(partition.partition_key(), "10.0.0.7:8123#trade#3");
        assert_eq!(partition.to_string(), partition.partition_key());
    }

    #[test]
    fn test_partition_last_consumed_flag() {
        let mut partition = Partition::new(test_node(), "trade", 0);
        assert!(!partition.last_consumed());
        partition.set_last_consumed(true);
        assert!(partition.last_consumed());
    }

    #[test]
    fn test_subscribe_info_display() {
        let sub = SubscribeInfo::new("c1", "g1", Partition::new(test_node(), "trade", 2));
        assert_eq!(sub.to_string(), "c1@g1#10.0.0.7:8123#trade#2");
    }

    #[test]
    fn test_consumer_event_status_transitions() {
        let mut event = ConsumerEvent::new(7, EventType::Connect, EventStatus::ToDo, vec![]);
        assert_eq!(event.rebalance_id(), 7);
        assert_eq!(event.status(), EventStatus::ToDo);
        event.set_status(EventStatus::Done);
        assert_eq!(event.status(), EventStatus::Done);
    }
}
