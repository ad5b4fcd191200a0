//! # HamLink Carrier Control
//!
//! OFDM carrier management for the HamLink modem: per-subcarrier admission
//! control, priority-weighted transmit-power redistribution, interference
//! and notch handling, and timed auto-recovery of disabled carriers.
//!
//! The modem frame loop feeds per-symbol `(snr, ber, interference)`
//! measurements into [`CarrierControl::evaluate_carrier`]; the spectrum
//! monitor pushes [`InterferenceReport`]s; a band-plan component drives
//! notch filters. The modulator reads back the enabled set and per-carrier
//! power allocation once per symbol.
//!
//! ```
//! use hamlink_carrier::{CarrierControl, PolicyUpdate};
//!
//! let mut ctl = CarrierControl::new(48, PolicyUpdate::default());
//!
//! // Carrier 7 fades below the 3 dB SNR floor.
//! assert!(!ctl.evaluate_carrier(7, 1.0, 0.0, 0.0));
//! assert!(!ctl.enabled_carriers().contains(&7));
//!
//! // Power stays conserved across the remaining carriers.
//! let total: f64 = ctl
//!     .enabled_carriers()
//!     .iter()
//!     .map(|&id| ctl.power_allocation(id))
//!     .sum();
//! assert!((total - ctl.policy().power_budget).abs() < 1e-9);
//! ```

pub mod carrier;
pub mod control;
pub mod policy;

pub use carrier::{
    Carrier, DisableReason, EnableCause, InterferenceKind, InterferenceReport, DATA_PRIORITY,
    PILOT_PRIORITY, PILOT_SPACING,
};
pub use control::{CarrierControl, CarrierStatistics, BER_VIOLATION_REASON};
pub use policy::{ControlPolicy, PolicyUpdate};
