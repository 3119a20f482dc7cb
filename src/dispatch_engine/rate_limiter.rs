//! Sliding-window rate limiter for upstream calls
//!
//! Every upstream call passes through one shared limiter before it is sent.
//! The limiter keeps a log of admitted call costs and guarantees that the
//! costs admitted inside any rolling window never exceed the ceiling.
//!
//! Key features:
//! - Immediate Admitted / MustWaitUntil decisions with no blocking or sleep
//! - Refused callers get a booked slot, so concurrent refusals receive
//!   distinct, spaced resume times instead of stampeding together
//! - Weighted costs (a cost above the ceiling is clamped to the ceiling)
//! - Lazy expiry: stale entries are pruned on each decision
//! - Uses `tokio::time::Instant` so paused-clock tests drive it

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::time::{Duration, Instant};

use crate::config::DispatchConfig;
use crate::operation::OperationKind;

/// Admission decision for one upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Send now
    Admitted,
    /// A slot is booked at this instant; sleep until then and send
    MustWaitUntil(Instant),
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    at: Instant,
    cost: u32,
}

/// Shared limiter enforcing "at most N weighted calls per interval"
#[derive(Debug)]
pub struct RateLimiter {
    ceiling: u32,
    interval: Duration,
    weights: HashMap<OperationKind, u32>,
    /// Admitted and booked slots, ordered by time
    log: Mutex<VecDeque<Slot>>,
}

impl RateLimiter {
    /// Create a limiter admitting at most `ceiling` cost units per `interval`
    pub fn new(ceiling: u32, interval: Duration) -> Self {
        Self {
            ceiling: ceiling.max(1),
            interval,
            weights: HashMap::new(),
            log: Mutex::new(VecDeque::new()),
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        let mut limiter = Self::new(config.rate_limit_requests(), config.rate_limit_window());
        for kind in OperationKind::ALL {
            let weight = config.operation_weight(kind);
            if weight != 1 {
                limiter.weights.insert(kind, weight);
            }
        }
        limiter
    }

    #[must_use]
    pub fn with_weight(mut self, kind: OperationKind, weight: u32) -> Self {
        self.weights.insert(kind, weight);
        self
    }

    /// Cost of one call of `kind`
    pub fn weight_for(&self, kind: OperationKind) -> u32 {
        self.weights.get(&kind).copied().unwrap_or(1)
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Decide whether a call of `cost` may be sent now
    pub fn admit(&self, cost: u32) -> Admission {
        self.admit_at(cost, Instant::now())
    }

    /// Decision for a call arriving at `now`.
    ///
    /// Either way the call is recorded: immediately when admitted, or at the
    /// earliest instant where the trailing window has room for it.
    pub fn admit_at(&self, cost: u32, now: Instant) -> Admission {
        if cost == 0 {
            return Admission::Admitted;
        }
        let cost = cost.min(self.ceiling);
        let ceiling = u64::from(self.ceiling);
        let mut log = self.log.lock();

        while log.front().is_some_and(|s| s.at + self.interval <= now) {
            log.pop_front();
        }

        // Slots are booked in order, never before an existing one
        let mut at = log.back().map_or(now, |last| last.at.max(now));
        let mut used: u64 = log.iter().map(|s| u64::from(s.cost)).sum();

        for slot in log.iter() {
            if slot.at + self.interval <= at {
                used -= u64::from(slot.cost);
                continue;
            }
            if used + u64::from(cost) <= ceiling {
                break;
            }
            used -= u64::from(slot.cost);
            at = slot.at + self.interval;
        }

        log.push_back(Slot { at, cost });

        if at <= now {
            Admission::Admitted
        } else {
            log::debug!(
                "Rate window full, booked slot in {:?} (cost {cost})",
                at - now
            );
            Admission::MustWaitUntil(at)
        }
    }

    /// Give back a booked slot the caller will not use.
    ///
    /// Removing a future slot can only lower window usage.
    pub fn release(&self, at: Instant, cost: u32) {
        let cost = cost.min(self.ceiling);
        let mut log = self.log.lock();
        if let Some(pos) = log.iter().rposition(|s| s.at == at && s.cost == cost) {
            log.remove(pos);
        }
    }

    /// Cost units inside the trailing window ending at `now`
    pub fn in_window(&self, now: Instant) -> u64 {
        let log = self.log.lock();
        log.iter()
            .filter(|s| s.at <= now && s.at + self.interval > now)
            .map(|s| u64::from(s.cost))
            .sum()
    }
}
