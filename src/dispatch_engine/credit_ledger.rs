//! Credit consumption tracking and budget enforcement
//!
//! The ledger keeps a monotonic lifetime total of consumed credits and,
//! when a budget is configured, answers whether a new operation would push
//! spending past it. With a rolling window configured the budget applies to
//! credits spent inside that window only.
//!
//! Admission reserves the estimated cost under the same lock that checks
//! it, so concurrent operations cannot all pass against one remaining
//! balance. The reservation is released once the upstream has answered and
//! the reported usage has been recorded.

use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

use crate::config::DispatchConfig;
use crate::utils::{DEFAULT_CREDIT_CRITICAL_THRESHOLD, DEFAULT_CREDIT_WARNING_THRESHOLD};

/// Alert level derived from the remaining budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditAlert {
    Normal,
    Warning,
    Critical,
}

/// Point-in-time view of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    /// Lifetime credits consumed
    pub consumed: u64,
    /// Credits counted against the budget (equals `consumed` without a window)
    pub counted: u64,
    /// Credits held by operations still waiting for their reply
    pub reserved: u64,
    pub budget: Option<u64>,
    pub remaining: Option<u64>,
    pub alert: CreditAlert,
}

#[derive(Debug)]
struct LedgerState {
    consumed: u64,
    window: VecDeque<(Instant, u64)>,
    window_total: u64,
    reserved: u64,
    alert: CreditAlert,
}

#[derive(Debug)]
pub struct CreditLedger {
    budget: Option<u64>,
    window: Option<Duration>,
    warning_threshold: u64,
    critical_threshold: u64,
    state: Mutex<LedgerState>,
}

impl CreditLedger {
    /// Ledger with an optional lifetime budget and default alert thresholds
    pub fn new(budget: Option<u64>) -> Self {
        Self {
            budget,
            window: None,
            warning_threshold: DEFAULT_CREDIT_WARNING_THRESHOLD,
            critical_threshold: DEFAULT_CREDIT_CRITICAL_THRESHOLD,
            state: Mutex::new(LedgerState {
                consumed: 0,
                window: VecDeque::new(),
                window_total: 0,
                reserved: 0,
                alert: CreditAlert::Normal,
            }),
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        let mut ledger = Self::new(config.credit_budget()).with_thresholds(
            config.credit_warning_threshold(),
            config.credit_critical_threshold(),
        );
        ledger.window = config.credit_window();
        ledger
    }

    /// Apply the budget to a rolling window instead of the whole lifetime
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, warning: u64, critical: u64) -> Self {
        self.warning_threshold = warning;
        self.critical_threshold = critical;
        self
    }

    pub fn budget(&self) -> Option<u64> {
        self.budget
    }

    /// Record credits the upstream reported for a completed call
    pub fn record_usage(&self, units: u64) -> CreditAlert {
        let now = Instant::now();
        let mut state = self.state.lock();
        if units == 0 {
            return state.alert;
        }

        state.consumed = state.consumed.saturating_add(units);
        if self.window.is_some() {
            state.window.push_back((now, units));
            state.window_total = state.window_total.saturating_add(units);
        }

        let counted = self.counted(&mut state, now);
        let level = self.alert_level(counted);
        if level > state.alert {
            let remaining = self.budget.map(|b| b.saturating_sub(counted)).unwrap_or(0);
            match level {
                CreditAlert::Critical => error!(
                    "Credit budget critical: {remaining} credit(s) remaining ({counted} used)"
                ),
                CreditAlert::Warning => warn!(
                    "Credit budget low: {remaining} credit(s) remaining ({counted} used)"
                ),
                CreditAlert::Normal => {}
            }
        } else if level < state.alert {
            info!("Credit usage back below alert thresholds ({counted} used)");
        }
        state.alert = level;
        level
    }

    /// Lifetime credits consumed; never decreases
    pub fn consumed(&self) -> u64 {
        self.state.lock().consumed
    }

    /// Credits left before the budget is hit, or `None` when unlimited
    pub fn remaining_budget(&self) -> Option<u64> {
        let budget = self.budget?;
        let mut state = self.state.lock();
        let counted = self.counted(&mut state, Instant::now());
        Some(budget.saturating_sub(counted))
    }

    /// Whether spending `units` more would break the budget.
    ///
    /// Credits reserved by operations in flight count as spent. An already
    /// exhausted budget refuses everything, including zero-cost estimates.
    pub fn would_exceed(&self, units: u64) -> bool {
        let Some(budget) = self.budget else {
            return false;
        };
        let mut state = self.state.lock();
        let committed = self.committed(&mut state, Instant::now());
        exceeds(committed, units, budget)
    }

    /// Check `units` against the budget and hold them in one step.
    ///
    /// Returns `None` when the budget cannot cover them. The hold is
    /// released when the returned reservation is dropped.
    pub fn reserve(self: &Arc<Self>, units: u64) -> Option<CreditReservation> {
        if let Some(budget) = self.budget {
            let mut state = self.state.lock();
            let committed = self.committed(&mut state, Instant::now());
            if exceeds(committed, units, budget) {
                return None;
            }
            state.reserved = state.reserved.saturating_add(units);
        }
        Some(CreditReservation {
            ledger: Arc::clone(self),
            units: if self.budget.is_some() { units } else { 0 },
        })
    }

    fn release(&self, units: u64) {
        if units > 0 {
            let mut state = self.state.lock();
            state.reserved = state.reserved.saturating_sub(units);
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut state = self.state.lock();
        let counted = self.counted(&mut state, Instant::now());
        LedgerSnapshot {
            consumed: state.consumed,
            counted,
            reserved: state.reserved,
            budget: self.budget,
            remaining: self.budget.map(|b| b.saturating_sub(counted)),
            alert: self.alert_level(counted),
        }
    }

    fn counted(&self, state: &mut LedgerState, now: Instant) -> u64 {
        let Some(window) = self.window else {
            return state.consumed;
        };
        while let Some(&(at, units)) = state.window.front() {
            if at + window > now {
                break;
            }
            state.window.pop_front();
            state.window_total = state.window_total.saturating_sub(units);
        }
        state.window_total
    }

    fn committed(&self, state: &mut LedgerState, now: Instant) -> u64 {
        self.counted(state, now).saturating_add(state.reserved)
    }

    fn alert_level(&self, counted: u64) -> CreditAlert {
        let Some(budget) = self.budget else {
            return CreditAlert::Normal;
        };
        let remaining = budget.saturating_sub(counted);
        if remaining <= self.critical_threshold {
            CreditAlert::Critical
        } else if remaining <= self.warning_threshold {
            CreditAlert::Warning
        } else {
            CreditAlert::Normal
        }
    }
}

fn exceeds(committed: u64, units: u64, budget: u64) -> bool {
    committed >= budget || committed.saturating_add(units) > budget
}

/// Credits held against the budget for one operation
#[derive(Debug)]
pub struct CreditReservation {
    ledger: Arc<CreditLedger>,
    units: u64,
}

impl CreditReservation {
    pub fn units(&self) -> u64 {
        self.units
    }
}

impl Drop for CreditReservation {
    fn drop(&mut self) {
        self.ledger.release(self.units);
    }
}
