// src/watch/mod.rs - Long-lived cluster watchers feeding the pipeline

use std::time::Duration;

pub mod metrics;
pub mod node;
pub mod pod;

pub use metrics::MetricsWatcher;
pub use node::NodeWatcher;
pub use pod::PodWatcher;

/// Backoff before re-dialing a failed watch.
pub(crate) const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub(crate) const POD_EVENT_CHANNEL_CAPACITY: usize = 500;
pub(crate) const NODE_EVENT_CHANNEL_CAPACITY: usize = 300;
