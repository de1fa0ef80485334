//! Debounced save scheduler.
//!
//! Pure state machine, independent of any UI or I/O, driven entirely by the
//! timestamps the caller feeds it — which makes every timing property unit
//! testable against a manual clock.
//!
//! Three trigger families feed one coalesced push request:
//!
//! - the **debounce** timer (quiet period after the last edit) settles the
//!   local write and stamps the "saved at" marker — it never pushes;
//! - the **heartbeat** timer requests a push on a fixed period regardless
//!   of typing activity — a steady ceiling on staleness;
//! - **focus events** (blur, hide) request an immediate push.
//!
//! # In-flight suppression
//!
//! ```text
//! +----------+  push due   +-----------+  trigger while busy
//! |   idle   | ----------> | in flight | ------------------+
//! +----------+             +-----------+                   |
//!      ^                      |      |                     v
//!      |        accepted/     |      |             (pending = true)
//!      +--- failed completion-+      | conflict            |
//!      |                             v                     |
//!      |                       +---------+                 |
//!      +--- resume_pushes ---- | blocked |                 |
//!                              +---------+                 |
//!      pending released as an immediate retry on completion
//! ```
//!
//! Pushes are never queued or pipelined: while one is outstanding, further
//! triggers collapse into a single pending attempt released when the
//! in-flight push resolves. A conflict completion blocks all further
//! pushes until [`SaveScheduler::resume_pushes`] — silent retries against a
//! newer server version would either spam rejections or tempt overwrites.

use vellum_core::config::SaveConfig;

/// What caused a push request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushTrigger {
    /// The fixed-period durability heartbeat.
    Heartbeat,
    /// Editor focus left a field.
    Blur,
    /// The tab/page was hidden.
    Hide,
    /// A coalesced attempt released after an in-flight push completed.
    Retry,
}

/// How an in-flight push resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushCompletion {
    /// Store accepted the write.
    Accepted,
    /// Transient failure (store error); the next scheduled trigger retries.
    Failed,
    /// Version conflict; pushing is blocked until explicitly resumed.
    Conflicted,
}

/// Events emitted by a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// The debounce window elapsed: stamp the local write as the
    /// authoritative "saved at" marker.
    LocalSettled,
    /// A push should start now. The scheduler has marked it in flight; the
    /// caller must report back via [`SaveScheduler::complete_push`].
    PushDue(PushTrigger),
}

/// Coalescing save scheduler. See the module docs for the state machine.
#[derive(Debug)]
pub struct SaveScheduler {
    debounce_ms: i64,
    heartbeat_ms: i64,
    debounce_deadline: Option<i64>,
    next_heartbeat_at: i64,
    requested: Option<PushTrigger>,
    in_flight: bool,
    pending: bool,
    blocked: bool,
}

impl SaveScheduler {
    /// Create a scheduler; the first heartbeat is due one period from `now_ms`.
    #[must_use]
    pub fn new(config: &SaveConfig, now_ms: i64) -> Self {
        Self {
            debounce_ms: config.debounce_ms,
            heartbeat_ms: config.heartbeat_ms,
            debounce_deadline: None,
            next_heartbeat_at: now_ms + config.heartbeat_ms,
            requested: None,
            in_flight: false,
            pending: false,
            blocked: false,
        }
    }

    /// A document change happened. (Re)starts the debounce window; the
    /// caller has already written the local cache.
    pub fn on_change(&mut self, now_ms: i64) {
        self.debounce_deadline = Some(now_ms + self.debounce_ms);
    }

    /// A field lost focus: request an immediate push.
    pub fn on_blur(&mut self) {
        self.request(PushTrigger::Blur);
    }

    /// The tab/page was hidden: request an immediate push.
    pub fn on_hide(&mut self) {
        self.request(PushTrigger::Hide);
    }

    /// Whether a push is currently outstanding.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether pushing is blocked on an unresolved conflict.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Advance timers to `now_ms` and collect due work. `can_push` is the
    /// caller's gate (authenticated, online, non-empty content); when it is
    /// false, push triggers are dropped rather than deferred — the next
    /// scheduled trigger simply pushes whatever state is current then.
    pub fn poll(&mut self, now_ms: i64, can_push: bool) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();

        if let Some(deadline) = self.debounce_deadline {
            if now_ms >= deadline {
                self.debounce_deadline = None;
                events.push(SchedulerEvent::LocalSettled);
            }
        }

        if now_ms >= self.next_heartbeat_at {
            // Catch up without emitting a burst after a long idle gap.
            while self.next_heartbeat_at <= now_ms {
                self.next_heartbeat_at += self.heartbeat_ms;
            }
            self.request(PushTrigger::Heartbeat);
        }

        if !can_push {
            self.requested = None;
            return events;
        }

        if let Some(trigger) = self.requested.take() {
            if self.blocked {
                // Conflict pending: no silent retries.
            } else if self.in_flight {
                self.pending = true;
            } else {
                self.in_flight = true;
                events.push(SchedulerEvent::PushDue(trigger));
            }
        }

        events
    }

    /// Report how the in-flight push resolved.
    pub fn complete_push(&mut self, completion: PushCompletion) {
        self.in_flight = false;
        match completion {
            PushCompletion::Accepted | PushCompletion::Failed => {
                if self.pending {
                    self.pending = false;
                    self.request(PushTrigger::Retry);
                }
            }
            PushCompletion::Conflicted => {
                self.pending = false;
                self.blocked = true;
            }
        }
    }

    /// Re-enable pushing after the user reconciled a conflict.
    pub fn resume_pushes(&mut self) {
        self.blocked = false;
    }

    fn request(&mut self, trigger: PushTrigger) {
        // First-come trigger wins; what matters is that *a* push happens.
        if self.requested.is_none() {
            self.requested = Some(trigger);
        }
    }
}
