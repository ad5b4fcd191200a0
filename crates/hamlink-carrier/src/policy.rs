//! # Control Policy
//!
//! Thresholds and budgets the carrier controller evaluates against, plus
//! the partial-update record used at construction and for live policy
//! changes. Both records deserialize from TOML so a host can carry them in
//! its config file; file I/O stays outside this crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Admission thresholds and the transmit power budget.
///
/// Immutable after construction except through
/// [`CarrierControl::update_policy`](crate::CarrierControl::update_policy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPolicy {
    /// Minimum usable signal-to-noise ratio in dB (default 3.0).
    pub min_snr_db: f64,
    /// Maximum tolerable bit error rate (default 1e-3).
    pub max_ber: f64,
    /// Interference level in dB above the noise floor at which a carrier
    /// is pulled (default 10.0).
    pub interference_threshold_db: f64,
    /// Total transmit power split across enabled carriers (default 48.0).
    pub power_budget: f64,
    /// Whether disabled carriers are re-enabled after a fixed delay
    /// (default true).
    pub auto_recovery: bool,
    /// Delay before an auto-recoverable carrier is re-admitted, in
    /// milliseconds (default 5000).
    pub recovery_delay_ms: u64,
    /// Minimum priority for a carrier to remain eligible (default 0.1).
    pub priority_threshold: f64,
}

impl Default for ControlPolicy {
    fn default() -> Self {
        ControlPolicy {
            min_snr_db: 3.0,
            max_ber: 1e-3,
            interference_threshold_db: 10.0,
            power_budget: 48.0,
            auto_recovery: true,
            recovery_delay_ms: 5_000,
            priority_threshold: 0.1,
        }
    }
}

impl ControlPolicy {
    /// Recovery delay as a [`Duration`].
    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }

    /// Parse a full policy from TOML. Missing fields take their defaults.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

/// Partial policy record. Fields left `None` keep their current value when
/// applied — the construction-time overrides and `update_policy` both go
/// through this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyUpdate {
    pub min_snr_db: Option<f64>,
    pub max_ber: Option<f64>,
    pub interference_threshold_db: Option<f64>,
    pub power_budget: Option<f64>,
    pub auto_recovery: Option<bool>,
    pub recovery_delay_ms: Option<u64>,
    pub priority_threshold: Option<f64>,
}

impl PolicyUpdate {
    /// Merge the set fields onto `policy`.
    pub fn apply(&self, policy: &mut ControlPolicy) {
        if let Some(v) = self.min_snr_db {
            policy.min_snr_db = v;
        }
        if let Some(v) = self.max_ber {
            policy.max_ber = v;
        }
        if let Some(v) = self.interference_threshold_db {
            policy.interference_threshold_db = v;
        }
        if let Some(v) = self.power_budget {
            policy.power_budget = v;
        }
        if let Some(v) = self.auto_recovery {
            policy.auto_recovery = v;
        }
        if let Some(v) = self.recovery_delay_ms {
            policy.recovery_delay_ms = v;
        }
        if let Some(v) = self.priority_threshold {
            policy.priority_threshold = v;
        }
    }

    /// Parse a partial policy from TOML. Absent fields stay `None`.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let p = ControlPolicy::default();
        assert_eq!(p.min_snr_db, 3.0);
        assert_eq!(p.max_ber, 1e-3);
        assert_eq!(p.interference_threshold_db, 10.0);
        assert_eq!(p.power_budget, 48.0);
        assert!(p.auto_recovery);
        assert_eq!(p.recovery_delay(), Duration::from_secs(5));
        assert_eq!(p.priority_threshold, 0.1);
    }

    #[test]
    fn update_merges_only_set_fields() {
        let mut p = ControlPolicy::default();
        let update = PolicyUpdate {
            min_snr_db: Some(6.0),
            power_budget: Some(24.0),
            ..Default::default()
        };
        update.apply(&mut p);

        assert_eq!(p.min_snr_db, 6.0);
        assert_eq!(p.power_budget, 24.0);
        // Untouched fields keep their values
        assert_eq!(p.max_ber, 1e-3);
        assert!(p.auto_recovery);
        assert_eq!(p.recovery_delay_ms, 5_000);
    }

    #[test]
    fn empty_update_is_identity() {
        let mut p = ControlPolicy::default();
        PolicyUpdate::default().apply(&mut p);
        assert_eq!(p, ControlPolicy::default());
    }

    #[test]
    fn full_policy_from_toml_with_defaults() {
        let p = ControlPolicy::from_toml(
            r#"
            min_snr_db = 4.5
            auto_recovery = false
            "#,
        )
        .unwrap();
        assert_eq!(p.min_snr_db, 4.5);
        assert!(!p.auto_recovery);
        assert_eq!(p.power_budget, 48.0, "unset field takes default");
    }

    #[test]
    fn partial_policy_from_toml() {
        let u = PolicyUpdate::from_toml("recovery_delay_ms = 250\n").unwrap();
        assert_eq!(u.recovery_delay_ms, Some(250));
        assert!(u.min_snr_db.is_none());

        let mut p = ControlPolicy::default();
        u.apply(&mut p);
        assert_eq!(p.recovery_delay(), Duration::from_millis(250));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(ControlPolicy::from_toml("min_snr_db = \"high\"").is_err());
    }
}
