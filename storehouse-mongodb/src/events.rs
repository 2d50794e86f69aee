//! Connection lifecycle logging.
//!
//! [`ConnectionEvents`] is installed as the driver's SDAM event handler so
//! server discovery and monitoring events show up in the logs tagged with
//! the manager name.

use std::sync::atomic::{AtomicBool, Ordering};

use mongodb::event::sdam::{
    SdamEventHandler, ServerClosedEvent, ServerHeartbeatFailedEvent,
    ServerHeartbeatSucceededEvent, ServerOpeningEvent, TopologyDescriptionChangedEvent,
};
use tracing::{Level, info, warn};

/// A driver event reduced to what gets logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The driver started monitoring a server.
    Opening { address: String },
    /// A server left the topology.
    Closed { address: String },
    /// A heartbeat to a server failed.
    HeartbeatFailed { address: String, error: String },
    /// A heartbeat succeeded after a failure.
    Reconnected { address: String },
    /// The topology description changed.
    TopologyChanged { topology: String },
}

impl ConnectionEvent {
    /// The level the event is logged at.
    pub fn level(&self) -> Level {
        match self {
            Self::Opening { .. } | Self::TopologyChanged { .. } => Level::INFO,
            Self::Closed { .. } | Self::HeartbeatFailed { .. } | Self::Reconnected { .. } => {
                Level::WARN
            }
        }
    }

    /// Emit the event for `manager`.
    pub fn log(&self, manager: &str) {
        match self {
            Self::Opening { address } => {
                info!(manager, address = %address, "MongoDB server opening")
            }
            Self::TopologyChanged { topology } => {
                info!(manager, topology = %topology, "MongoDB topology changed")
            }
            Self::Closed { address } => {
                warn!(manager, address = %address, "MongoDB server closed")
            }
            Self::HeartbeatFailed { address, error } => {
                warn!(manager, address = %address, error = %error, "MongoDB heartbeat failed")
            }
            Self::Reconnected { address } => {
                warn!(manager, address = %address, "MongoDB server reconnected")
            }
        }
    }
}

/// SDAM event handler that logs connection lifecycle events.
#[derive(Debug)]
pub struct ConnectionEvents {
    manager: String,
    degraded: AtomicBool,
}

impl ConnectionEvents {
    /// Create a handler tagging events with `manager`.
    pub fn new(manager: impl Into<String>) -> Self {
        Self {
            manager: manager.into(),
            degraded: AtomicBool::new(false),
        }
    }

    /// The manager name events are tagged with.
    pub fn manager(&self) -> &str {
        &self.manager
    }

    /// Record a heartbeat failure.
    pub fn heartbeat_failed(&self, address: String, error: String) -> ConnectionEvent {
        self.degraded.store(true, Ordering::SeqCst);
        ConnectionEvent::HeartbeatFailed { address, error }
    }

    /// Record a heartbeat success; only reported after a failure.
    pub fn heartbeat_succeeded(&self, address: String) -> Option<ConnectionEvent> {
        self.degraded
            .swap(false, Ordering::SeqCst)
            .then_some(ConnectionEvent::Reconnected { address })
    }
}

impl SdamEventHandler for ConnectionEvents {
    fn handle_server_opening_event(&self, event: ServerOpeningEvent) {
        ConnectionEvent::Opening {
            address: event.address.to_string(),
        }
        .log(&self.manager);
    }

    fn handle_server_closed_event(&self, event: ServerClosedEvent) {
        ConnectionEvent::Closed {
            address: event.address.to_string(),
        }
        .log(&self.manager);
    }

    fn handle_topology_description_changed_event(&self, event: TopologyDescriptionChangedEvent) {
        ConnectionEvent::TopologyChanged {
            topology: event.topology_id.to_hex(),
        }
        .log(&self.manager);
    }

    fn handle_server_heartbeat_failed_event(&self, event: ServerHeartbeatFailedEvent) {
        self.heartbeat_failed(event.server_address.to_string(), event.failure.to_string())
            .log(&self.manager);
    }

    fn handle_server_heartbeat_succeeded_event(&self, event: ServerHeartbeatSucceededEvent) {
        if let Some(event) = self.heartbeat_succeeded(event.server_address.to_string()) {
            event.log(&self.manager);
        }
    }
}
