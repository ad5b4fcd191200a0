//! # Carrier Records
//!
//! Per-subcarrier state for the carrier controller, plus the report types
//! fed in by the modem frame loop and the spectrum monitor.
//!
//! Every 6th subcarrier is a pilot tone carrying the timing/channel-
//! estimation reference. Pilots are pinned at priority 1.0 and protected
//! from every automatic disable path; only an explicit manual disable can
//! turn one off.

use std::fmt;

use quanta::Instant;
use serde::{Deserialize, Serialize};

/// Pilot carriers sit at every `PILOT_SPACING`-th subcarrier index.
pub const PILOT_SPACING: usize = 6;

/// Priority assigned to pilot carriers. The disable guard compares against
/// this exact value.
pub const PILOT_PRIORITY: f64 = 1.0;

/// Default priority for data carriers.
pub const DATA_PRIORITY: f64 = 0.5;

// ─── Disable Reasons ────────────────────────────────────────────────────────

/// Why a carrier was taken out of the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisableReason {
    /// Measured SNR below the policy floor, or BER above the policy ceiling.
    LowSnr,
    /// Interference level above the policy threshold.
    HighInterference,
    /// Carrier priority fell below the eligibility threshold.
    PowerConstraint,
    /// Operator took the carrier out explicitly.
    ManualDisable,
    /// Reserved for an external band-plan component that detects a data
    /// tone landing on a pilot bin. No automatic path in this crate emits
    /// it.
    PilotCollision,
    /// Carrier is in the notch set (regulatory band-edge avoidance).
    FrequencyNotch,
}

impl DisableReason {
    /// All reasons, in histogram order.
    pub const ALL: [DisableReason; 6] = [
        DisableReason::LowSnr,
        DisableReason::HighInterference,
        DisableReason::PowerConstraint,
        DisableReason::ManualDisable,
        DisableReason::PilotCollision,
        DisableReason::FrequencyNotch,
    ];

    /// Whether a disable for this reason is eligible for timed
    /// auto-recovery.
    ///
    /// Manual disables stay down until the operator re-enables them, and a
    /// notch disable only ever happens while the notch is active, so
    /// neither arms a recovery deadline.
    pub fn recoverable(self) -> bool {
        !matches!(
            self,
            DisableReason::ManualDisable | DisableReason::FrequencyNotch
        )
    }
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisableReason::LowSnr => "low-snr",
            DisableReason::HighInterference => "high-interference",
            DisableReason::PowerConstraint => "power-constraint",
            DisableReason::ManualDisable => "manual-disable",
            DisableReason::PilotCollision => "pilot-collision",
            DisableReason::FrequencyNotch => "frequency-notch",
        };
        f.write_str(s)
    }
}

/// What re-admitted a carrier into the active set. Logging only — the
/// enabled state carries no cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableCause {
    /// The per-symbol evaluation cycle found the carrier healthy again.
    Evaluation,
    /// The recovery deadline elapsed.
    AutoRecovery,
    /// Operator re-enabled the carrier explicitly.
    Manual,
}

impl fmt::Display for EnableCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnableCause::Evaluation => "evaluation",
            EnableCause::AutoRecovery => "auto-recovery",
            EnableCause::Manual => "manual-enable",
        };
        f.write_str(s)
    }
}

// ─── Interference Reports ───────────────────────────────────────────────────

/// Spectral shape of an observed interferer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterferenceKind {
    /// Single-tone or narrow carrier (e.g. a nearby CW station).
    Narrowband,
    /// Broad spectral rise covering many carriers.
    Wideband,
    /// Short bursts (e.g. lightning static, ignition noise).
    Impulse,
}

impl fmt::Display for InterferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterferenceKind::Narrowband => "narrowband",
            InterferenceKind::Wideband => "wideband",
            InterferenceKind::Impulse => "impulse",
        };
        f.write_str(s)
    }
}

/// One observation from the spectrum monitor. Stored most-recent-wins per
/// carrier; no history is kept.
#[derive(Debug, Clone, Copy)]
pub struct InterferenceReport {
    /// Affected subcarrier index.
    pub carrier_id: usize,
    /// Interference level in dB above the noise floor.
    pub level_db: f64,
    /// Spectral shape of the interferer.
    pub kind: InterferenceKind,
    /// Centre frequency of the interferer in Hz.
    pub frequency_hz: f64,
}

// ─── Carrier State ──────────────────────────────────────────────────────────

/// State of one subcarrier. Created at controller construction and lives
/// for the lifetime of the controller; `id` and the pilot role never
/// change.
#[derive(Debug, Clone)]
pub struct Carrier {
    /// Subcarrier index, 0..N-1.
    pub id: usize,
    /// Whether this carrier currently carries modulated data.
    pub enabled: bool,
    /// Disable cause; `None` while enabled.
    pub reason: Option<DisableReason>,
    /// When the carrier was last disabled; `None` while enabled.
    pub disabled_at: Option<Instant>,
    /// When the pending auto-recovery fires; `None` while enabled or when
    /// no recovery is armed.
    pub auto_recover_at: Option<Instant>,
    /// Share weight for power redistribution, in [0, 1]. Pilots are 1.0.
    pub priority: f64,
}

impl Carrier {
    pub(crate) fn new(id: usize) -> Self {
        let priority = if id % PILOT_SPACING == 0 {
            PILOT_PRIORITY
        } else {
            DATA_PRIORITY
        };
        Carrier {
            id,
            enabled: true,
            reason: None,
            disabled_at: None,
            auto_recover_at: None,
            priority,
        }
    }

    /// Whether this carrier is pilot-protected. The guard is priority-
    /// based, matching the disable path: a data carrier promoted to
    /// priority 1.0 gains the same protection.
    pub fn is_pilot(&self) -> bool {
        self.priority == PILOT_PRIORITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pilots_every_sixth_index() {
        for id in 0..48 {
            let c = Carrier::new(id);
            if id % 6 == 0 {
                assert!(c.is_pilot(), "carrier {id} should be a pilot");
                assert_eq!(c.priority, PILOT_PRIORITY);
            } else {
                assert!(!c.is_pilot(), "carrier {id} should be a data carrier");
                assert_eq!(c.priority, DATA_PRIORITY);
            }
        }
    }

    #[test]
    fn new_carriers_start_enabled() {
        let c = Carrier::new(3);
        assert!(c.enabled);
        assert!(c.reason.is_none());
        assert!(c.disabled_at.is_none());
        assert!(c.auto_recover_at.is_none());
    }

    #[test]
    fn manual_and_notch_are_not_recoverable() {
        assert!(!DisableReason::ManualDisable.recoverable());
        assert!(!DisableReason::FrequencyNotch.recoverable());
        assert!(DisableReason::LowSnr.recoverable());
        assert!(DisableReason::HighInterference.recoverable());
        assert!(DisableReason::PowerConstraint.recoverable());
        assert!(DisableReason::PilotCollision.recoverable());
    }

    #[test]
    fn reason_display_matches_wire_names() {
        assert_eq!(DisableReason::LowSnr.to_string(), "low-snr");
        assert_eq!(DisableReason::FrequencyNotch.to_string(), "frequency-notch");
        assert_eq!(DisableReason::ManualDisable.to_string(), "manual-disable");
    }

    #[test]
    fn reason_serde_round_trip() {
        for reason in DisableReason::ALL {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{reason}\""));
            let back: DisableReason = serde_json::from_str(&json).unwrap();
            assert_eq!(back, reason);
        }
    }
}
