//! Per-fingerprint single-flight.
//!
//! The first caller for a key becomes the leader and computes; later
//! callers receive a watch receiver that resolves when the leader's guard
//! is dropped, whether it succeeded or not.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;

use crate::request::Fingerprint;

#[derive(Default)]
pub struct SingleFlight {
    inflight: Mutex<HashMap<Fingerprint, watch::Receiver<()>>>,
}

/// Role assigned by [`SingleFlight::join`].
pub enum Flight<'a> {
    Leader(FlightGuard<'a>),
    Follower(watch::Receiver<()>),
}

/// Held by the leader; releases the key when dropped.
pub struct FlightGuard<'a> {
    owner: &'a SingleFlight,
    key: Fingerprint,
    _done: watch::Sender<()>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut inflight = self.owner.inflight.lock().unwrap_or_else(|e| e.into_inner());
        inflight.remove(&self.key);
    }
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` or attaches to the computation already running for it.
    pub fn join(&self, key: &Fingerprint) -> Flight<'_> {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(rx) = inflight.get(key) {
            return Flight::Follower(rx.clone());
        }

        let (tx, rx) = watch::channel(());
        inflight.insert(key.clone(), rx);
        Flight::Leader(FlightGuard {
            owner: self,
            key: key.clone(),
            _done: tx,
        })
    }

    /// Number of keys currently being computed.
    pub fn len(&self) -> usize {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Waits for the leader to finish. Returns false on timeout.
pub async fn wait(mut rx: watch::Receiver<()>, timeout: Duration) -> bool {
    // `changed` errors once the sender is dropped, which is the signal.
    tokio::time::timeout(timeout, rx.changed()).await.is_ok()
}
