//! Consumer configuration.
//!
//! [`ConsumerConfig`] carries everything a consumer session needs before it
//! first talks to a master: the master address list, the consumer group, the
//! subscribed topics with their optional filter items, and the wait/heartbeat
//! knobs the fetch loop reads.
//!
//! Besides building the struct directly, a session can be configured from a
//! single address string of the form accepted by the other client
//! implementations of this protocol:
//!
//! ```text
//! host:port,host:port?topics=Topic1@f1,f2;Topic2&group=Group&tlsEnable=false
//! ```
//!
//! Unknown query parameters are rejected rather than ignored, so typos fail
//! loudly at startup instead of silently running with defaults.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default wait before retrying a fetch that returned no messages.
pub const DEFAULT_MSG_NOT_FOUND_WAIT: Duration = Duration::from_millis(400);

/// Default interval between heartbeats to the master.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10_000);

/// Default number of consecutive heartbeat failures tolerated before the
/// session is considered dead.
pub const DEFAULT_HEARTBEAT_MAX_RETRY_TIMES: u32 = 5;

/// Configuration of one consumer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Comma-separated master address list, `host:port,host:port`.
    pub masters: String,
    /// Consumer group name.
    pub group: String,
    /// Subscribed topics.
    pub topics: Vec<String>,
    /// Optional filter items per topic; topics without an entry consume
    /// everything.
    pub topic_filters: HashMap<String, Vec<String>>,
    /// Whether connections to masters and brokers use TLS.
    pub tls_enable: bool,
    /// Wait before retrying a fetch that returned no messages.
    pub msg_not_found_wait: Duration,
    /// Interval between heartbeats to the master.
    pub heartbeat_interval: Duration,
    /// Consecutive heartbeat failures tolerated before giving up.
    pub heartbeat_max_retry_times: u32,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            masters: String::new(),
            group: String::new(),
            topics: Vec::new(),
            topic_filters: HashMap::new(),
            tls_enable: false,
            msg_not_found_wait: DEFAULT_MSG_NOT_FOUND_WAIT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_max_retry_times: DEFAULT_HEARTBEAT_MAX_RETRY_TIMES,
        }
    }
}

impl ConsumerConfig {
    /// Parse a full consumer configuration from an address string.
    ///
    /// ```
    /// use tidemq::config::ConsumerConfig;
    ///
    /// let config = ConsumerConfig::from_address(
    ///     "127.0.0.1:8715,127.0.0.1:8716?topics=trade@f1,f2;audit&group=settle",
    /// )
    /// .expect("valid address");
    /// assert_eq!(config.group, "settle");
    /// assert_eq!(config.topics, vec!["trade", "audit"]);
    /// ```
    pub fn from_address(address: &str) -> Result<Self> {
        let (masters, query) = address
            .split_once('?')
            .ok_or_else(|| Error::Config(format!("address has no parameters: {address:?}")))?;
        if masters.is_empty() {
            return Err(Error::Config("address has no master list".to_string()));
        }

        let mut config = ConsumerConfig {
            masters: masters.to_string(),
            ..ConsumerConfig::default()
        };

        for pair in query.split('&') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("malformed parameter: {pair:?}")))?;
            match key {
                "topics" => config.parse_topics(value)?,
                "group" => config.group = value.to_string(),
                "tlsEnable" => {
                    config.tls_enable = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid tlsEnable: {value:?}")))?;
                }
                "msgNotFoundWait" => {
                    config.msg_not_found_wait = Duration::from_millis(parse_millis(key, value)?);
                }
                "heartbeatInterval" => {
                    config.heartbeat_interval = Duration::from_millis(parse_millis(key, value)?);
                }
                "heartbeatMaxRetryTimes" => {
                    config.heartbeat_max_retry_times = value.parse().map_err(|_| {
                        Error::Config(format!("invalid heartbeatMaxRetryTimes: {value:?}"))
                    })?;
                }
                _ => return Err(Error::Config(format!("unknown parameter: {key:?}"))),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is complete enough to start a session.
    pub fn validate(&self) -> Result<()> {
        if self.masters.is_empty() {
            return Err(Error::Config("master list must not be empty".to_string()));
        }
        if self.group.is_empty() {
            return Err(Error::Config("group must not be empty".to_string()));
        }
        if self.topics.is_empty() {
            return Err(Error::Config(
                "at least one topic must be subscribed".to_string(),
            ));
        }
        for topic in self.topic_filters.keys() {
            if !self.topics.contains(topic) {
                return Err(Error::Config(format!(
                    "filters reference unsubscribed topic {topic:?}"
                )));
            }
        }
        Ok(())
    }

    /// Parse `Topic1@f1,f2;Topic2` into topics and per-topic filters.
    fn parse_topics(&mut self, value: &str) -> Result<()> {
        for entry in value.split(';') {
            match entry.split_once('@') {
                Some((topic, filters)) => {
                    if topic.is_empty() || filters.is_empty() {
                        return Err(Error::Config(format!("malformed topic entry: {entry:?}")));
                    }
                    self.topics.push(topic.to_string());
                    self.topic_filters.insert(
                        topic.to_string(),
                        filters.split(',').map(str::to_string).collect(),
                    );
                }
                None => {
                    if entry.is_empty() {
                        return Err(Error::Config(format!("malformed topic entry: {entry:?}")));
                    }
                    self.topics.push(entry.to_string());
                }
            }
        }
        Ok(())
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid {key}: {value:?}")))
}
