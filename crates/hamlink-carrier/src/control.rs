//! # Carrier Admission & Power Control
//!
//! [`CarrierControl`] owns the full set of subcarrier states for one modem
//! instance. It evaluates per-carrier health against a [`ControlPolicy`],
//! enables/disables carriers, redistributes transmit power proportionally
//! to priority, arms and services timed auto-recovery, and reports
//! aggregate statistics.
//!
//! ## Decision ladder
//!
//! [`CarrierControl::evaluate_carrier`] checks conditions in a fixed
//! priority order; the first failing condition names the disable reason:
//!
//! 1. priority below `priority_threshold` → `power-constraint`
//! 2. SNR below `min_snr_db`             → `low-snr`
//! 3. BER above `max_ber`                → `low-snr` (see
//!    [`BER_VIOLATION_REASON`])
//! 4. interference above threshold       → `high-interference`
//! 5. carrier in the notch set           → `frequency-notch`
//!
//! ## Power invariant
//!
//! Whenever at least one carrier is enabled, the allocations over the
//! enabled set sum to `power_budget`: each enabled carrier `c` receives
//! `power_budget * priority(c) / Σ priority(enabled)`. The split is
//! recomputed from scratch after every transition, priority change, and
//! policy update.
//!
//! ## Time
//!
//! All timing runs off an injected [`quanta::Clock`]. Recovery deadlines
//! live in an explicit map and fire when the host measurement loop calls
//! [`CarrierControl::service_recoveries`] — there is no background timer
//! thread, so the single-writer model holds and tests drive a mock clock
//! instead of sleeping.

use std::collections::{HashMap, HashSet};

use quanta::{Clock, Instant};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::carrier::{
    Carrier, DisableReason, EnableCause, InterferenceReport, PILOT_PRIORITY,
};
use crate::policy::{ControlPolicy, PolicyUpdate};

/// A BER violation is tagged with the same reason as an SNR violation:
/// operator surfaces group both under "signal quality". Giving BER its own
/// variant is a one-line change here.
pub const BER_VIOLATION_REASON: DisableReason = DisableReason::LowSnr;

// ─── Statistics ─────────────────────────────────────────────────────────────

/// Aggregate snapshot for monitoring surfaces. Pure read; serializes to
/// JSON for an operator UI.
#[derive(Debug, Clone, Serialize)]
pub struct CarrierStatistics {
    /// Total carriers owned by the controller.
    pub total: usize,
    /// Carriers currently carrying data.
    pub enabled: usize,
    /// Carriers currently out of the active set.
    pub disabled: usize,
    /// Disabled count per reason. Every reason is present, zero when
    /// unused.
    pub disabled_by_reason: HashMap<DisableReason, usize>,
    /// Mean allocated power across enabled carriers; 0.0 when none.
    pub mean_power: f64,
    /// Carriers with an armed recovery deadline.
    pub pending_recoveries: usize,
}

// ─── Controller ─────────────────────────────────────────────────────────────

/// Per-modem carrier controller.
///
/// One instance per modem; pass it by reference to the modulator and the
/// measurement loop. Never share a process-wide instance — independent
/// radios (and tests) each own their own.
pub struct CarrierControl {
    policy: ControlPolicy,
    /// Carrier records, indexed by id (ids are 0..N-1 and contiguous).
    carriers: Vec<Carrier>,
    /// Carrier id → allocated power share, in units of `power_budget`.
    /// Entries for disabled carriers are stale by design; the modulator
    /// consults the enabled set first.
    power: HashMap<usize, f64>,
    /// Most recent interference report per carrier.
    interference: HashMap<usize, InterferenceReport>,
    /// Carriers excluded by an explicit frequency notch.
    notched: HashSet<usize>,
    /// Carrier id → pending auto-recovery deadline.
    recovery: HashMap<usize, Instant>,
    clock: Clock,
}

impl CarrierControl {
    /// Build a controller with `count` carriers and the given policy
    /// overrides merged onto the defaults. Uses the system monotonic
    /// clock; see [`CarrierControl::with_clock`] for injecting one.
    pub fn new(count: usize, overrides: PolicyUpdate) -> Self {
        Self::with_clock(count, overrides, Clock::new())
    }

    /// Build a controller running off the given clock.
    /// `quanta::Clock::mock()` gives tests deterministic control over
    /// recovery timing.
    pub fn with_clock(count: usize, overrides: PolicyUpdate, clock: Clock) -> Self {
        let mut policy = ControlPolicy::default();
        overrides.apply(&mut policy);

        let carriers: Vec<Carrier> = (0..count).map(Carrier::new).collect();

        // Equal initial split; the first transition or priority change
        // switches to the priority-weighted split.
        let mut power = HashMap::with_capacity(count);
        if count > 0 {
            let share = policy.power_budget / count as f64;
            for c in &carriers {
                power.insert(c.id, share);
            }
        }

        info!(
            carriers = count,
            power_budget = policy.power_budget,
            auto_recovery = policy.auto_recovery,
            "carrier controller initialized"
        );

        CarrierControl {
            policy,
            carriers,
            power,
            interference: HashMap::new(),
            notched: HashSet::new(),
            recovery: HashMap::new(),
            clock,
        }
    }

    // ─── Evaluation ─────────────────────────────────────────────────────

    /// Evaluate one carrier against the policy, transitioning it if the
    /// desired state differs from the current one. Called once per
    /// measurement cycle per carrier by the modem frame loop.
    ///
    /// Returns the desired enabled state whether or not a transition
    /// occurred (a pilot that fails evaluation stays enabled but still
    /// yields `false`). Unknown ids return `false` without side effects.
    pub fn evaluate_carrier(
        &mut self,
        id: usize,
        snr_db: f64,
        ber: f64,
        interference_db: f64,
    ) -> bool {
        let Some(carrier) = self.carriers.get(id) else {
            return false;
        };

        // First failing condition wins.
        let verdict = if carrier.priority < self.policy.priority_threshold {
            Some(DisableReason::PowerConstraint)
        } else if snr_db < self.policy.min_snr_db {
            Some(DisableReason::LowSnr)
        } else if ber > self.policy.max_ber {
            Some(BER_VIOLATION_REASON)
        } else if interference_db > self.policy.interference_threshold_db {
            Some(DisableReason::HighInterference)
        } else if self.notched.contains(&id) {
            Some(DisableReason::FrequencyNotch)
        } else {
            None
        };

        let currently_enabled = carrier.enabled;
        match verdict {
            None if !currently_enabled => self.enable_carrier(id, EnableCause::Evaluation),
            Some(reason) if currently_enabled => self.disable_carrier(id, reason),
            // Unchanged carriers produce no side effects.
            _ => {}
        }

        verdict.is_none()
    }

    // ─── Transitions ────────────────────────────────────────────────────

    /// Take a carrier out of the active set.
    ///
    /// Pilot guard: a carrier at priority exactly 1.0 ignores every reason
    /// except `ManualDisable`. Calling this on an already-disabled carrier
    /// overwrites the reason and re-arms (or cancels) the recovery
    /// deadline for the new reason.
    pub fn disable_carrier(&mut self, id: usize, reason: DisableReason) {
        let now = self.clock.now();
        let auto_recovery = self.policy.auto_recovery;
        let recovery_delay = self.policy.recovery_delay();

        let Some(carrier) = self.carriers.get_mut(id) else {
            return;
        };

        if carrier.priority == PILOT_PRIORITY && reason != DisableReason::ManualDisable {
            debug!(carrier = id, %reason, "pilot carrier protected; disable ignored");
            return;
        }

        if carrier.enabled {
            info!(carrier = id, %reason, "carrier disabled");
        } else {
            debug!(carrier = id, %reason, "disable reason overwritten");
        }

        carrier.enabled = false;
        carrier.reason = Some(reason);
        carrier.disabled_at = Some(now);

        if auto_recovery && reason.recoverable() {
            let deadline = now + recovery_delay;
            carrier.auto_recover_at = Some(deadline);
            // Insert replaces any earlier deadline: one outstanding
            // recovery per carrier.
            self.recovery.insert(id, deadline);
        } else {
            carrier.auto_recover_at = None;
            self.recovery.remove(&id);
        }

        self.redistribute_power();
    }

    /// Re-admit a carrier into the active set, clearing its disable
    /// bookkeeping and cancelling any pending recovery.
    pub fn enable_carrier(&mut self, id: usize, cause: EnableCause) {
        self.recovery.remove(&id);

        let Some(carrier) = self.carriers.get_mut(id) else {
            return;
        };

        if !carrier.enabled {
            info!(carrier = id, %cause, "carrier enabled");
        }
        carrier.enabled = true;
        carrier.reason = None;
        carrier.disabled_at = None;
        carrier.auto_recover_at = None;

        self.redistribute_power();
    }

    /// Operator override. Manual disable bypasses the pilot guard — an
    /// operator may take a pilot down, unlike any automatic path.
    pub fn manual_control(&mut self, id: usize, enable: bool) {
        if enable {
            self.enable_carrier(id, EnableCause::Manual);
        } else {
            self.disable_carrier(id, DisableReason::ManualDisable);
        }
    }

    // ─── Recovery ───────────────────────────────────────────────────────

    /// Fire every recovery whose deadline has passed, re-enabling carriers
    /// that are still disabled. Called by the host measurement loop once
    /// per cycle. Returns the number of carriers re-enabled.
    ///
    /// Recovery is optimistic: it trusts the elapsed delay and does not
    /// re-validate SNR/BER/interference. If conditions have not improved,
    /// the next evaluation cycle disables the carrier again.
    pub fn service_recoveries(&mut self) -> usize {
        if self.recovery.is_empty() {
            return 0;
        }
        let now = self.clock.now();
        let due: Vec<usize> = self
            .recovery
            .iter()
            .filter(|&(_, &deadline)| deadline <= now)
            .map(|(&id, _)| id)
            .collect();

        let mut fired = 0;
        for id in due {
            self.recovery.remove(&id);
            let still_disabled = self.carriers.get(id).is_some_and(|c| !c.enabled);
            if still_disabled {
                debug!(carrier = id, "recovery deadline elapsed");
                self.enable_carrier(id, EnableCause::AutoRecovery);
                fired += 1;
            }
        }
        fired
    }

    // ─── Interference & Notches ─────────────────────────────────────────

    /// Record a spectrum-monitor observation (most-recent-wins per
    /// carrier). When the affected carrier is enabled and the level
    /// exceeds the policy threshold, it is disabled immediately — an
    /// out-of-band trigger independent of the next evaluation cycle.
    pub fn report_interference(&mut self, report: InterferenceReport) {
        let id = report.carrier_id;
        if id >= self.carriers.len() {
            debug!(carrier = id, "interference report for unknown carrier ignored");
            return;
        }

        self.interference.insert(id, report);

        let over = report.level_db > self.policy.interference_threshold_db;
        if over && self.carriers[id].enabled {
            warn!(
                carrier = id,
                level_db = report.level_db,
                kind = %report.kind,
                "interference above threshold"
            );
            self.disable_carrier(id, DisableReason::HighInterference);
        }
    }

    /// Add or remove a frequency notch. Adding force-disables the carrier
    /// immediately, even under perfect measured conditions. Removing does
    /// not re-enable — the carrier stays down until the next evaluation
    /// cycle re-admits it.
    pub fn set_notch_filter(&mut self, id: usize, enable: bool) {
        if enable {
            self.notched.insert(id);
            info!(carrier = id, "notch filter engaged");
            self.disable_carrier(id, DisableReason::FrequencyNotch);
        } else if self.notched.remove(&id) {
            info!(carrier = id, "notch filter cleared; awaiting re-evaluation");
        }
    }

    // ─── Priority & Policy ──────────────────────────────────────────────

    /// Set a carrier's power-share priority, clamped to [0, 1], and
    /// redistribute.
    pub fn set_carrier_priority(&mut self, id: usize, priority: f64) {
        let Some(carrier) = self.carriers.get_mut(id) else {
            return;
        };
        let clamped = priority.clamp(0.0, 1.0);
        debug!(carrier = id, priority = clamped, "carrier priority changed");
        carrier.priority = clamped;
        self.redistribute_power();
    }

    /// Merge a partial policy onto the current one. A changed power
    /// budget reflows allocations immediately.
    pub fn update_policy(&mut self, update: PolicyUpdate) {
        update.apply(&mut self.policy);
        info!(
            power_budget = self.policy.power_budget,
            min_snr_db = self.policy.min_snr_db,
            auto_recovery = self.policy.auto_recovery,
            "policy updated"
        );
        self.redistribute_power();
    }

    /// Return every carrier to the enabled state and clear interference,
    /// notch, and recovery bookkeeping. The carrier set itself (and each
    /// carrier's priority) survives.
    pub fn reset(&mut self) {
        self.recovery.clear();
        self.interference.clear();
        self.notched.clear();
        for carrier in &mut self.carriers {
            carrier.enabled = true;
            carrier.reason = None;
            carrier.disabled_at = None;
            carrier.auto_recover_at = None;
        }
        self.redistribute_power();
        info!(carriers = self.carriers.len(), "controller reset");
    }

    // ─── Power ──────────────────────────────────────────────────────────

    /// Priority-weighted proportional split of the power budget over the
    /// enabled set, recomputed from scratch. An empty enabled set (or an
    /// all-zero priority sum) is a no-op: allocations stay stale, which is
    /// acceptable because nothing is transmitting.
    fn redistribute_power(&mut self) {
        let total_priority: f64 = self
            .carriers
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.priority)
            .sum();
        if total_priority <= 0.0 {
            return;
        }
        let budget = self.policy.power_budget;
        for c in self.carriers.iter().filter(|c| c.enabled) {
            self.power.insert(c.id, budget * c.priority / total_priority);
        }
    }

    // ─── Read Surface ───────────────────────────────────────────────────

    /// Ids of carriers currently carrying data, ascending.
    pub fn enabled_carriers(&self) -> Vec<usize> {
        self.carriers
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.id)
            .collect()
    }

    /// Ids of disabled carriers, optionally filtered by reason, ascending.
    pub fn disabled_carriers(&self, reason: Option<DisableReason>) -> Vec<usize> {
        self.carriers
            .iter()
            .filter(|c| !c.enabled && (reason.is_none() || c.reason == reason))
            .map(|c| c.id)
            .collect()
    }

    /// Allocated power share for a carrier; 0.0 for unknown ids.
    pub fn power_allocation(&self, id: usize) -> f64 {
        self.power.get(&id).copied().unwrap_or(0.0)
    }

    /// State of one carrier; `None` for unknown ids.
    pub fn carrier_state(&self, id: usize) -> Option<&Carrier> {
        self.carriers.get(id)
    }

    /// All carrier records, indexed by id.
    pub fn carriers(&self) -> &[Carrier] {
        &self.carriers
    }

    /// Number of carriers owned by the controller.
    pub fn carrier_count(&self) -> usize {
        self.carriers.len()
    }

    /// Most recent interference report for a carrier, if any.
    pub fn interference_report(&self, id: usize) -> Option<&InterferenceReport> {
        self.interference.get(&id)
    }

    /// Whether a carrier is currently frequency-notched.
    pub fn is_notched(&self, id: usize) -> bool {
        self.notched.contains(&id)
    }

    /// Ids of carriers with an armed recovery deadline, ascending.
    pub fn pending_recoveries(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.recovery.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Current policy.
    pub fn policy(&self) -> &ControlPolicy {
        &self.policy
    }

    /// Aggregate snapshot. Pure read, no side effects.
    pub fn statistics(&self) -> CarrierStatistics {
        let total = self.carriers.len();
        let enabled = self.carriers.iter().filter(|c| c.enabled).count();
        let disabled = total - enabled;

        let mut disabled_by_reason: HashMap<DisableReason, usize> =
            DisableReason::ALL.iter().map(|&r| (r, 0)).collect();
        for c in self.carriers.iter().filter(|c| !c.enabled) {
            if let Some(reason) = c.reason {
                *disabled_by_reason.entry(reason).or_insert(0) += 1;
            }
        }

        let mean_power = if enabled > 0 {
            let sum: f64 = self
                .carriers
                .iter()
                .filter(|c| c.enabled)
                .map(|c| self.power_allocation(c.id))
                .sum();
            sum / enabled as f64
        } else {
            0.0
        };

        CarrierStatistics {
            total,
            enabled,
            disabled,
            disabled_by_reason,
            mean_power,
            pending_recoveries: self.recovery.len(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
