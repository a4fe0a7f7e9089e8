//! Server state shared across handlers.

use std::time::{Duration, Instant};

use crate::host::{HostConfig, MachineRegistry, Negotiator, TokenGateway};
use crate::store::AccessStore;

/// Application state: the host configuration, a store, and the machine
/// registry. Generic over the store so deployments plug in their own.
pub struct AppState<S> {
    /// Immutable host configuration
    pub host: HostConfig,
    /// Access store backing negotiation and the gateway
    pub store: S,
    /// Machine peers registered out of band
    pub machines: MachineRegistry,
    /// Server start time
    pub start_time: Instant,
}

impl<S: AccessStore> AppState<S> {
    /// Create application state
    pub fn new(host: HostConfig, store: S) -> Self {
        Self {
            host,
            store,
            machines: MachineRegistry::new(),
            start_time: Instant::now(),
        }
    }

    /// Attach a machine registry
    pub fn with_machines(mut self, machines: MachineRegistry) -> Self {
        self.machines = machines;
        self
    }

    /// Server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// A request-scoped negotiator
    pub fn negotiator(&self) -> Negotiator<'_, S> {
        Negotiator::new(&self.host, &self.store)
    }

    /// A request-scoped token gateway
    pub fn gateway(&self) -> TokenGateway<'_, S> {
        TokenGateway::new(&self.host, &self.store)
    }
}
