//! Single-flight refresh coordination.
//!
//! Holds the "refresh in flight" flag and the FIFO queue of callers waiting
//! on it. Check-and-set and enqueue happen inside one critical section that
//! never awaits, so concurrent 401s observe the flag atomically.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::error::RefreshError;

/// Outcome delivered to every participant of a refresh cycle.
pub(crate) type Settlement = Result<String, RefreshError>;

/// A caller suspended until the in-flight refresh settles.
///
/// The caller keeps its own request and replays it once settled; the queue
/// only holds what is needed to wake it.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    label: String,
    settle: oneshot::Sender<Settlement>,
}

#[derive(Debug, Default)]
struct CoordinationState {
    refreshing: bool,
    cycle: u64,
    queue: VecDeque<PendingRequest>,
}

/// What a caller that saw a 401 must do next.
pub(crate) enum Role<'a> {
    /// Perform the refresh and settle the cycle through the guard.
    Driver(CycleGuard<'a>),
    /// Wait for the driver's settlement.
    Follower(oneshot::Receiver<Settlement>),
}

#[derive(Debug, Default)]
pub(crate) struct RefreshCoordinator {
    state: Mutex<CoordinationState>,
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Become the driver if no refresh is in flight, otherwise join the queue.
    pub(crate) fn begin_or_enqueue(&self, label: String) -> Role<'_> {
        let mut state = self.lock();
        if !state.refreshing {
            state.refreshing = true;
            state.cycle = state.cycle.wrapping_add(1);
            tracing::debug!(cycle = state.cycle, request = %label, "driving credential refresh");
            return Role::Driver(CycleGuard {
                coordinator: self,
                cycle: state.cycle,
                settled: false,
            });
        }
        let (settle, receiver) = oneshot::channel();
        tracing::debug!(
            cycle = state.cycle,
            request = %label,
            position = state.queue.len(),
            "queued behind in-flight refresh"
        );
        state.queue.push_back(PendingRequest { label, settle });
        Role::Follower(receiver)
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Reset the flag and settle every queued caller in FIFO order.
    fn finish(&self, cycle: u64, outcome: &Settlement) {
        // Flag reset and drain share one critical section: a 401 arriving
        // afterwards starts a new cycle instead of joining a drained queue.
        let drained: Vec<PendingRequest> = {
            let mut state = self.lock();
            state.refreshing = false;
            state.queue.drain(..).collect()
        };
        tracing::debug!(
            cycle,
            waiters = drained.len(),
            success = outcome.is_ok(),
            "settling refresh cycle"
        );
        for pending in drained {
            if pending.settle.send(outcome.clone()).is_err() {
                // Receiver gave up (timed out or was dropped).
                tracing::debug!(cycle, request = %pending.label, "queued request no longer waiting");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinationState> {
        // Never held across an await, and every mutation leaves the state
        // consistent, so poisoning carries no meaning here.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Proof of being the driver for one cycle.
///
/// Dropping it unsettled (the driving future was cancelled) settles the
/// queue with [`RefreshError::Abandoned`] so no follower waits forever.
#[derive(Debug)]
pub(crate) struct CycleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    cycle: u64,
    settled: bool,
}

impl CycleGuard<'_> {
    /// Settle the cycle and hand the same outcome back to the driver.
    pub(crate) fn settle(mut self, outcome: Settlement) -> Settlement {
        self.settled = true;
        self.coordinator.finish(self.cycle, &outcome);
        outcome
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(cycle = self.cycle, "refresh driver dropped before settling");
            self.coordinator
                .finish(self.cycle, &Err(RefreshError::Abandoned));
        }
    }
}
