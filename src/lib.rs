// src/lib.rs - ClusterPulse: Kubernetes monitoring with a real-time alert
// pipeline

pub mod alert;
pub mod bus;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod hub;
pub mod notifier;
pub mod observe;
pub mod pool;
pub mod rules;
pub mod shutdown;
pub mod state;
pub mod storage;
pub mod watch;

// Re-export commonly used items for convenience
pub use alert::{Alert, AlertEvent, AlertSeverity, AlertSource, AlertStatus};
pub use bus::{AlertSink, EventBus};
pub use config::Config;
pub use dependencies::Dependencies;
pub use error::{MonitorError, Result};
pub use hub::Hub;
pub use pool::WorkerPool;
pub use state::AlertStateManager;
pub use storage::AlertRepository;

/// ClusterPulse version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
