//! Process-wide pause/drain gate for new claims.
//!
//! The gate is not a per-feature state. It decides whether the claim
//! coordinator may start new work:
//!
//! ```text
//! RUNNING --pause()--> DRAINING   (work in flight)
//! RUNNING --pause()--> PAUSED     (nothing in flight)
//! DRAINING --last in-flight feature completes--> PAUSED
//! DRAINING | PAUSED --resume()--> RUNNING
//! ```
//!
//! In-flight work is never interrupted. The gate only counts it: a claim
//! reserves a slot through a [`ClaimPermit`] before touching the store, and every
//! transition out of `InProgress` gives a slot back. Reserving before the store
//! write means a `pause()` racing with a claim still sees that claim as in flight.
//!
//! State lives in a [`tokio::sync::watch`] channel, which gives atomic
//! read-modify-write through `send_if_modified` and lets observers await state
//! changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info};

/// Gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// New claims are accepted
    Running,
    /// No new claims; waiting for in-flight work to finish
    Draining,
    /// No new claims and nothing in flight
    Paused,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Running => "RUNNING",
            RunState::Draining => "DRAINING",
            RunState::Paused => "PAUSED",
        };
        f.write_str(s)
    }
}

/// Snapshot of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStatus {
    /// Current state
    pub state: RunState,
    /// Features in progress plus outstanding claim reservations
    pub in_flight: usize,
}

/// Pause/drain state machine gating new claims.
#[derive(Debug)]
pub struct PauseDrainController {
    status: watch::Sender<GateStatus>,
}

impl Default for PauseDrainController {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseDrainController {
    /// A running gate with nothing in flight
    #[must_use]
    pub fn new() -> Self {
        Self::with_in_flight(0)
    }

    /// A running gate that already has `in_flight` features in progress,
    /// e.g. after reopening a store with claims that survived a restart.
    #[must_use]
    pub fn with_in_flight(in_flight: usize) -> Self {
        let (status, _) = watch::channel(GateStatus {
            state: RunState::Running,
            in_flight,
        });
        Self { status }
    }

    /// Current state
    #[must_use]
    pub fn current_state(&self) -> RunState {
        self.status.borrow().state
    }

    /// Current state and in-flight count
    #[must_use]
    pub fn status(&self) -> GateStatus {
        *self.status.borrow()
    }

    /// Stop accepting new claims.
    ///
    /// Moves to `DRAINING` if anything is in flight, otherwise straight to
    /// `PAUSED`. Calling it while already draining or paused changes nothing.
    /// Returns the resulting state.
    pub fn pause(&self) -> RunState {
        let mut result = RunState::Running;
        let changed = self.status.send_if_modified(|g| {
            if g.state == RunState::Running {
                g.state = if g.in_flight > 0 {
                    RunState::Draining
                } else {
                    RunState::Paused
                };
                result = g.state;
                true
            } else {
                result = g.state;
                false
            }
        });

        if changed {
            info!(state = %result, "Pause requested");
        }
        result
    }

    /// Accept new claims again, from either `DRAINING` or `PAUSED`.
    pub fn resume(&self) {
        let changed = self.status.send_if_modified(|g| {
            if g.state == RunState::Running {
                return false;
            }
            g.state = RunState::Running;
            true
        });

        if changed {
            info!("Resumed; accepting new claims");
        }
    }

    /// Reserve an in-flight slot for a claim attempt.
    ///
    /// Returns `None` unless the gate is `RUNNING`. The returned permit must be
    /// [committed](ClaimPermit::commit) once a feature is actually claimed; a
    /// dropped permit gives its slot back.
    #[must_use]
    pub fn try_acquire(&self) -> Option<ClaimPermit<'_>> {
        let mut granted = false;
        self.status.send_if_modified(|g| {
            if g.state == RunState::Running {
                g.in_flight += 1;
                granted = true;
            }
            // Count changes alone are not worth waking observers for.
            false
        });

        if granted {
            Some(ClaimPermit {
                gate: self,
                committed: false,
            })
        } else {
            None
        }
    }

    /// Record that an in-progress feature reached passing, pending or blocked.
    ///
    /// Finishes a drain when the in-flight count reaches zero.
    pub(crate) fn record_completion(&self) {
        let mut remaining = 0;
        let drained = self.status.send_if_modified(|g| {
            g.in_flight = g.in_flight.saturating_sub(1);
            remaining = g.in_flight;
            if g.state == RunState::Draining && g.in_flight == 0 {
                g.state = RunState::Paused;
                true
            } else {
                false
            }
        });

        if drained {
            info!("Drain complete; paused");
        } else {
            debug!(in_flight = remaining, "In-flight work completed");
        }
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GateStatus> {
        self.status.subscribe()
    }

    /// Wait until the gate is `PAUSED`. Returns immediately if it already is.
    pub async fn wait_until_paused(&self) {
        let mut rx = self.status.subscribe();
        // Only fails if the sender is dropped, and `self` owns it.
        let _ = rx.wait_for(|g| g.state == RunState::Paused).await;
    }
}

/// An in-flight slot reserved by [`PauseDrainController::try_acquire`].
#[must_use = "dropping a permit immediately gives the slot back"]
#[derive(Debug)]
pub struct ClaimPermit<'a> {
    gate: &'a PauseDrainController,
    committed: bool,
}

impl ClaimPermit<'_> {
    /// Whether the gate is still `RUNNING`, i.e. no pause arrived since the
    /// permit was granted.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.gate.current_state() == RunState::Running
    }

    /// Keep the slot: a feature is now in progress and will report its own
    /// completion.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ClaimPermit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.gate.record_completion();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pause_with_nothing_in_flight_goes_straight_to_paused() {
        let gate = PauseDrainController::new();
        assert_eq!(gate.pause(), RunState::Paused);
        assert!(gate.try_acquire().is_none());
    }

    #[test]
    fn test_drain_completes_after_exactly_k_completions() {
        let gate = PauseDrainController::new();
        for _ in 0..3 {
            gate.try_acquire().unwrap().commit();
        }

        assert_eq!(gate.pause(), RunState::Draining);
        gate.record_completion();
        assert_eq!(gate.current_state(), RunState::Draining);
        gate.record_completion();
        assert_eq!(gate.current_state(), RunState::Draining);
        assert!(gate.try_acquire().is_none(), "no claims while draining");
        gate.record_completion();
        assert_eq!(gate.current_state(), RunState::Paused);
    }

    #[test]
    fn test_dropped_permit_returns_slot() {
        let gate = PauseDrainController::new();
        {
            let _permit = gate.try_acquire().unwrap();
            assert_eq!(gate.status().in_flight, 1);
        }
        assert_eq!(gate.status().in_flight, 0);
    }

    #[test]
    fn test_pause_counts_outstanding_reservation() {
        let gate = PauseDrainController::new();
        let permit = gate.try_acquire().unwrap();

        assert_eq!(gate.pause(), RunState::Draining);
        drop(permit);
        assert_eq!(gate.current_state(), RunState::Paused);
    }

    #[test]
    fn test_resume_reenables_claims() {
        let gate = PauseDrainController::with_in_flight(1);
        assert_eq!(gate.pause(), RunState::Draining);
        gate.resume();
        assert_eq!(gate.current_state(), RunState::Running);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_repeated_pause_is_idempotent() {
        let gate = PauseDrainController::with_in_flight(2);
        assert_eq!(gate.pause(), RunState::Draining);
        assert_eq!(gate.pause(), RunState::Draining);
        assert_eq!(gate.status().in_flight, 2);
    }

    #[tokio::test]
    async fn test_wait_until_paused_wakes_on_drain() {
        let gate = std::sync::Arc::new(PauseDrainController::with_in_flight(1));
        gate.pause();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_until_paused().await })
        };

        gate.record_completion();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drain should finish")
            .unwrap();
    }

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Draining.to_string(), "DRAINING");
        assert_eq!(
            serde_json::to_string(&RunState::Paused).unwrap(),
            "\"PAUSED\""
        );
    }
}
