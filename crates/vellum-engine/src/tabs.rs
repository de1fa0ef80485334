//! Multi-tab coordinator.
//!
//! Tracks which tab advertises itself as the active editor for the draft,
//! per tab:
//!
//! ```text
//! +-----------+  claim won   +---------+  renew on interval
//! | Unclaimed | -----------> | Claimed | ------------------+
//! +-----------+              +---------+ <-----------------+
//!       |                      |     ^
//!       | fresh foreign lease  |     | foreign lease went stale/vacant
//!       v                      |     |
//! +-----------+  lease lost    |     |
//! | Observing | <--------------+-----+
//! +-----------+                |
//!       |                      | unload
//!       v                      v
//!   (unload)              +----------+
//!       +---------------> | Released |
//!                         +----------+
//! ```
//!
//! `Observing` tabs edit and save exactly like claimed ones — the lease
//! only drives the "being edited elsewhere" indicator. Slot errors degrade
//! to keeping the current state; a liveness hint is never worth stalling
//! the editor over.

use vellum_core::config::LeaseConfig;
use vellum_core::ids::TabId;

use crate::lease::{LeaseSlot, LeaseUpdate, TabLease};

/// Coordinator state for this tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabState {
    /// No claim attempted yet.
    Unclaimed,
    /// This tab holds the lease and renews it.
    Claimed,
    /// Another live tab holds the lease; editing continues regardless.
    Observing,
    /// Unloaded; no further claims.
    Released,
}

/// Per-tab lease state machine. All slot access goes through the
/// [`LeaseSlot`] handed in by the caller, so the coordinator itself stays
/// free of I/O.
#[derive(Debug)]
pub struct TabCoordinator {
    tab_id: TabId,
    state: TabState,
    last_renewed_at_ms: i64,
    liveness_window_ms: i64,
    renew_every_ms: i64,
}

impl TabCoordinator {
    /// Create a coordinator with a fresh random tab id.
    #[must_use]
    pub fn new(config: &LeaseConfig) -> Self {
        Self {
            tab_id: TabId::generate(),
            state: TabState::Unclaimed,
            last_renewed_at_ms: 0,
            liveness_window_ms: config.liveness_window_ms,
            renew_every_ms: config.renew_every_ms,
        }
    }

    /// This tab's identity.
    #[must_use]
    pub const fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TabState {
        self.state
    }

    /// Whether the UI should show the "being edited elsewhere" indicator.
    #[must_use]
    pub fn edited_elsewhere(&self) -> bool {
        self.state == TabState::Observing
    }

    /// Attempt a claim on load/focus: take the slot if vacant, stale, or
    /// already ours; otherwise observe.
    pub fn on_load(&mut self, slot: &dyn LeaseSlot, now_ms: i64) {
        self.try_claim(slot, now_ms);
    }

    /// Periodic tick: renew our lease, or re-check a foreign one.
    pub fn poll(&mut self, slot: &dyn LeaseSlot, now_ms: i64) {
        match self.state {
            TabState::Claimed => {
                if now_ms.saturating_sub(self.last_renewed_at_ms) >= self.renew_every_ms {
                    self.try_claim(slot, now_ms);
                }
            }
            TabState::Observing => {
                // The foreign lease may have expired; claim it if so.
                self.try_claim(slot, now_ms);
            }
            TabState::Unclaimed | TabState::Released => {}
        }
    }

    /// React to a slot-change notification from another tab immediately,
    /// instead of waiting for the next poll.
    pub fn reevaluate(&mut self, slot: &dyn LeaseSlot, now_ms: i64) {
        if self.state != TabState::Released {
            self.try_claim(slot, now_ms);
        }
    }

    /// Unload: release the lease if we still hold it.
    pub fn on_unload(&mut self, slot: &dyn LeaseSlot) {
        let tab_id = self.tab_id.clone();
        let result = slot.modify(&mut |current| match current {
            Some(lease) if lease.tab_id == tab_id => LeaseUpdate::Clear,
            _ => LeaseUpdate::Keep,
        });

        if let Err(error) = result {
            tracing::warn!(code = %error.code(), %error, "lease release failed on unload");
        }
        self.state = TabState::Released;
    }

    fn try_claim(&mut self, slot: &dyn LeaseSlot, now_ms: i64) {
        let tab_id = self.tab_id.clone();
        let liveness_window_ms = self.liveness_window_ms;

        let outcome = slot.modify(&mut |current| match current {
            Some(lease)
                if lease.tab_id != tab_id && !lease.is_stale(now_ms, liveness_window_ms) =>
            {
                LeaseUpdate::Keep
            }
            _ => LeaseUpdate::Set(TabLease {
                tab_id: tab_id.clone(),
                heartbeat_at_ms: now_ms,
            }),
        });

        match outcome {
            Ok(Some(lease)) if lease.tab_id == self.tab_id => {
                if self.state != TabState::Claimed {
                    tracing::debug!(tab_id = %self.tab_id, "tab lease claimed");
                }
                self.state = TabState::Claimed;
                self.last_renewed_at_ms = now_ms;
            }
            Ok(_) => {
                if self.state != TabState::Observing {
                    tracing::debug!(tab_id = %self.tab_id, "another tab holds the lease");
                }
                self.state = TabState::Observing;
            }
            Err(error) => {
                // Keep the previous state; the hint degrades quietly.
                tracing::warn!(code = %error.code(), %error, "lease slot inaccessible");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TabCoordinator, TabState};
    use crate::lease::{LeaseSlot, LeaseUpdate, MemoryLease, TabLease};
    use vellum_core::config::LeaseConfig;
    use vellum_core::ids::TabId;

    fn coordinator() -> TabCoordinator {
        TabCoordinator::new(&LeaseConfig::default())
    }

    #[test]
    fn first_tab_claims_vacant_slot() {
        let slot = MemoryLease::new();
        let mut tab = coordinator();

        tab.on_load(&slot, 1_000);
        assert_eq!(tab.state(), TabState::Claimed);
        assert!(!tab.edited_elsewhere());
    }

    #[test]
    fn second_tab_observes_fresh_lease() {
        let slot = MemoryLease::new();
        let mut first = coordinator();
        let mut second = coordinator();

        first.on_load(&slot, 1_000);
        second.on_load(&slot, 2_000);

        assert_eq!(second.state(), TabState::Observing);
        assert!(second.edited_elsewhere());
        // The first tab still holds the slot.
        let holder = slot.read().expect("read").expect("lease");
        assert_eq!(&holder.tab_id, first.tab_id());
    }

    #[test]
    fn stale_lease_is_reclaimed() {
        let slot = MemoryLease::new();
        let mut first = coordinator();
        let mut second = coordinator();

        first.on_load(&slot, 0);
        second.on_load(&slot, 1_000);
        assert_eq!(second.state(), TabState::Observing);

        // The first tab stops renewing; past the liveness window the
        // observer's poll takes over.
        second.poll(&slot, 20_000);
        assert_eq!(second.state(), TabState::Claimed);
    }

    #[test]
    fn claimed_tab_renews_on_interval() {
        let slot = MemoryLease::new();
        let mut tab = coordinator();

        tab.on_load(&slot, 0);
        tab.poll(&slot, 6_000);

        let lease = slot.read().expect("read").expect("lease");
        assert_eq!(lease.heartbeat_at_ms, 6_000);
    }

    #[test]
    fn renewals_keep_the_lease_fresh_for_observers() {
        let slot = MemoryLease::new();
        let mut first = coordinator();
        let mut second = coordinator();

        first.on_load(&slot, 0);
        second.on_load(&slot, 1_000);

        // First renews continually; second can never steal the slot.
        for t in (5_000..40_000).step_by(5_000) {
            first.poll(&slot, t);
            second.poll(&slot, t + 1);
            assert_eq!(second.state(), TabState::Observing, "at t={t}");
        }
    }

    #[test]
    fn unload_releases_only_our_own_lease() {
        let slot = MemoryLease::new();
        let mut first = coordinator();
        let mut second = coordinator();

        first.on_load(&slot, 0);
        second.on_load(&slot, 1_000);

        // The observer unloading must not clear the holder's lease.
        second.on_unload(&slot);
        assert_eq!(second.state(), TabState::Released);
        assert!(slot.read().expect("read").is_some());

        first.on_unload(&slot);
        assert!(slot.read().expect("read").is_none());
    }

    #[test]
    fn reevaluate_reacts_to_released_lease_immediately() {
        let slot = MemoryLease::new();
        let mut first = coordinator();
        let mut second = coordinator();

        first.on_load(&slot, 0);
        second.on_load(&slot, 100);
        first.on_unload(&slot);

        // Change notification: no need to wait for staleness.
        second.reevaluate(&slot, 200);
        assert_eq!(second.state(), TabState::Claimed);
    }

    #[test]
    fn claim_survives_foreign_garbage_lease() {
        let slot = MemoryLease::new();
        slot.modify(&mut |_| {
            LeaseUpdate::Set(TabLease {
                tab_id: TabId::generate(),
                heartbeat_at_ms: -1,
            })
        })
        .expect("seed stale foreign lease");

        let mut tab = coordinator();
        tab.on_load(&slot, 100_000);
        assert_eq!(tab.state(), TabState::Claimed);
    }
}
