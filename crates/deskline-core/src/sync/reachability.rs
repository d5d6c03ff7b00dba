//! Connectivity tracking.
//!
//! Two signals make up "online": the platform's network availability signal,
//! which the embedding app feeds in, and reachability of the ticket service
//! itself, probed through its health endpoint. The service probe only runs
//! when the network signal transitions, so a flapping radio does not turn
//! into a stream of HTTP probes.

use std::sync::{Arc, Mutex, PoisonError};

use crate::api::TicketApi;

type ReconnectHook = Box<dyn Fn() + Send + Sync>;
type ChangeHook = Box<dyn Fn(bool) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default)]
struct Connectivity {
    network_available: bool,
    service_reachable: bool,
}

impl Connectivity {
    const fn is_online(self) -> bool {
        self.network_available && self.service_reachable
    }
}

/// Tracks whether the remote ticket service is currently reachable.
pub struct ReachabilityMonitor {
    api: Arc<dyn TicketApi>,
    state: Mutex<Connectivity>,
    reconnect_hooks: Mutex<Vec<ReconnectHook>>,
    change_hooks: Mutex<Vec<ChangeHook>>,
}

impl ReachabilityMonitor {
    /// Create a monitor. Both signals start lowered; the embedding app is
    /// expected to feed in the initial network state.
    pub fn new(api: Arc<dyn TicketApi>) -> Self {
        Self {
            api,
            state: Mutex::new(Connectivity::default()),
            reconnect_hooks: Mutex::new(Vec::new()),
            change_hooks: Mutex::new(Vec::new()),
        }
    }

    /// Whether both the network and the service are currently up.
    pub fn is_online(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_online()
    }

    /// Register a callback fired once per offline-to-online transition.
    pub fn on_reconnect(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.reconnect_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Register a callback fired with the new online state on every
    /// effective transition, in either direction.
    pub fn on_change(&self, hook: impl Fn(bool) + Send + Sync + 'static) {
        self.change_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Feed in the platform's network availability signal.
    ///
    /// Losing the network lowers the service signal as well. Regaining it
    /// triggers a health probe; reconnect hooks fire if the probe succeeds.
    pub async fn set_network_available(&self, available: bool) {
        let (went_up, went_offline) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let was_available = state.network_available;
            let was_online = state.is_online();
            state.network_available = available;
            if !available {
                state.service_reachable = false;
            }
            (available && !was_available, was_online && !state.is_online())
        };

        if went_offline {
            tracing::info!("Network lost; ticket service is unreachable");
            self.notify_change(false);
        }
        if went_up {
            self.probe().await;
        }
    }

    /// Re-check service reachability and return the resulting online state.
    ///
    /// Fires reconnect hooks when this probe took the monitor from offline
    /// to online. Skips the HTTP call entirely while the network is down.
    pub async fn probe(&self) -> bool {
        let network_available = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .network_available;
        if !network_available {
            return false;
        }

        let reachable = self.api.health_check().await;

        let (was_online, now_online) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let was_online = state.is_online();
            state.service_reachable = reachable;
            (was_online, state.is_online())
        };

        if now_online != was_online {
            self.notify_change(now_online);
        }
        if now_online && !was_online {
            tracing::info!("Ticket service is reachable again");
            let hooks = self
                .reconnect_hooks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for hook in hooks.iter() {
                hook();
            }
        }

        now_online
    }

    fn notify_change(&self, online: bool) {
        let hooks = self
            .change_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter() {
            hook(online);
        }
    }
}
