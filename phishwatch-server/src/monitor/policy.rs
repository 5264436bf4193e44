//! Reclassification state machine
//!
//! Pure transition logic for one `Suspected` record on one tick. The engine
//! gathers the re-evaluation signal (or decides not to ask for one) and this
//! module decides what happens to the record. Nothing here touches the
//! store or the network, so the same signal sequence always yields the same
//! state sequence.

use chrono::{DateTime, Utc};

use super::error::{MonitorError, MonitorResult};
use crate::classifier::Reevaluation;
use crate::models::{MonitoringRecord, RecordState, MILLIUNITS_PER_UNIT};

pub const DEFAULT_HORIZON_UNITS: f64 = 90.0;
pub const DEFAULT_UNITS_PER_TICK: f64 = 0.1;
/// Upper bound for the horizon and the per-tick increment
pub const MAX_POLICY_UNITS: f64 = 1e12;

/// Horizon, per-tick increment and promotion-check cadence.
///
/// The increment and the check cadence are independent: a deployment can
/// poll every tick while advancing time slowly, or the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoringPolicy {
    pub horizon_milliunits: i64,
    pub increment_milliunits: i64,
    pub recheck_every_ticks: u64,
}

impl Default for MonitoringPolicy {
    fn default() -> Self {
        Self {
            horizon_milliunits: 90 * MILLIUNITS_PER_UNIT,
            increment_milliunits: MILLIUNITS_PER_UNIT / 10,
            recheck_every_ticks: 1,
        }
    }
}

impl MonitoringPolicy {
    pub fn new(horizon_units: f64, units_per_tick: f64, recheck_every_ticks: u64) -> MonitorResult<Self> {
        let horizon_milliunits = to_milliunits(horizon_units);
        let increment_milliunits = to_milliunits(units_per_tick);

        for (name, value) in [("monitoring horizon", horizon_units), ("units per tick", units_per_tick)] {
            if value > MAX_POLICY_UNITS {
                return Err(MonitorError::InvalidInput(format!(
                    "{} must not exceed {} units, got {}",
                    name, MAX_POLICY_UNITS, value
                )));
            }
        }
        if !horizon_units.is_finite() || horizon_milliunits <= 0 {
            return Err(MonitorError::InvalidInput(format!(
                "monitoring horizon must be positive, got {}",
                horizon_units
            )));
        }
        if !units_per_tick.is_finite() || increment_milliunits <= 0 {
            return Err(MonitorError::InvalidInput(format!(
                "units per tick must be at least 0.001, got {}",
                units_per_tick
            )));
        }
        if recheck_every_ticks == 0 {
            return Err(MonitorError::InvalidInput(
                "promotion check cadence must be at least one tick".to_string(),
            ));
        }

        Ok(Self {
            horizon_milliunits,
            increment_milliunits,
            recheck_every_ticks,
        })
    }

    pub fn horizon_units(&self) -> f64 {
        self.horizon_milliunits as f64 / MILLIUNITS_PER_UNIT as f64
    }

    /// Ticks a never-promoted record stays `Suspected` before it expires.
    pub fn ticks_to_horizon(&self) -> i64 {
        let ticks = self.horizon_milliunits / self.increment_milliunits;
        if self.horizon_milliunits % self.increment_milliunits == 0 {
            ticks
        } else {
            ticks + 1
        }
    }

    pub fn horizon_reached(&self, record: &MonitoringRecord) -> bool {
        record.elapsed_milliunits >= self.horizon_milliunits
    }

    /// Ticks are numbered from 1.
    pub fn is_recheck_tick(&self, tick: u64) -> bool {
        tick % self.recheck_every_ticks == 0
    }
}

fn to_milliunits(units: f64) -> i64 {
    (units * MILLIUNITS_PER_UNIT as f64).round() as i64
}

// ============================================================================
// TRANSITIONS
// ============================================================================

/// What the engine learned about a record on this tick
#[derive(Debug, Clone)]
pub enum Signal {
    /// No re-evaluation this tick (off-cadence or horizon already reached)
    NotChecked,
    /// Re-evaluated, nothing new
    Clear,
    /// Re-evaluated, new evidence justifies promotion
    Promote(Reevaluation),
}

impl From<Reevaluation> for Signal {
    fn from(re: Reevaluation) -> Self {
        if re.promote {
            Signal::Promote(re)
        } else {
            Signal::Clear
        }
    }
}

/// Effect of one tick on one record
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Record was not `Suspected`; nothing changed
    Unchanged,
    /// Still `Suspected`, elapsed units advanced
    Advanced { elapsed_milliunits: i64 },
    /// `Suspected -> Phishing`; an alert is owed
    Promoted { reason: String },
    /// `Suspected -> Expired`
    Expired,
}

/// Apply one tick to `record`.
///
/// Order: an already-reached horizon expires the record; otherwise a
/// positive signal promotes it immediately; otherwise elapsed time advances
/// and the record expires if that reaches the horizon.
pub fn apply(
    record: &mut MonitoringRecord,
    signal: Signal,
    policy: &MonitoringPolicy,
    now: DateTime<Utc>,
) -> Transition {
    if record.state.is_terminal() {
        return Transition::Unchanged;
    }

    if policy.horizon_reached(record) {
        return expire(record, now);
    }

    if let Signal::Promote(re) = signal {
        let reason = format!(
            "content change detected at unit {:.1}: {}",
            record.elapsed_units(),
            re.reason
        );
        record.state = RecordState::Phishing;
        record.evidence = re.evidence;
        record.reclassification_reason = reason.clone();
        record.last_transition_at = now;
        return Transition::Promoted { reason };
    }

    record.elapsed_milliunits = record.elapsed_milliunits.saturating_add(policy.increment_milliunits);
    if policy.horizon_reached(record) {
        return expire(record, now);
    }

    Transition::Advanced {
        elapsed_milliunits: record.elapsed_milliunits,
    }
}

fn expire(record: &mut MonitoringRecord, now: DateTime<Utc>) -> Transition {
    record.state = RecordState::Expired;
    record.last_transition_at = now;
    Transition::Expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{now_millis, TargetEntity, NOT_APPLICABLE};
    use serde_json::json;

    fn suspected() -> MonitoringRecord {
        MonitoringRecord::new(
            "x.test".into(),
            TargetEntity::new("Acme", "acme.com"),
            RecordState::Suspected,
            json!({"initial": true}),
        )
    }

    fn promote() -> Signal {
        Signal::Promote(Reevaluation {
            promote: true,
            reason: "login page cloned".into(),
            evidence: json!({"visual_similarity_score": 0.93}),
        })
    }

    #[test]
    fn test_default_policy_expires_after_900_ticks() {
        let policy = MonitoringPolicy::default();
        assert_eq!(policy.ticks_to_horizon(), 900);

        let mut record = suspected();
        for tick in 1..900 {
            let t = apply(&mut record, Signal::Clear, &policy, now_millis());
            assert!(matches!(t, Transition::Advanced { .. }), "tick {} ended early", tick);
        }
        assert_eq!(apply(&mut record, Signal::Clear, &policy, now_millis()), Transition::Expired);
        assert_eq!(record.state, RecordState::Expired);
        assert_eq!(record.elapsed_milliunits, 90_000);
        assert_eq!(record.reclassification_reason, NOT_APPLICABLE);
    }

    #[test]
    fn test_promotion_replaces_evidence_and_freezes_units() {
        let policy = MonitoringPolicy::default();
        let mut record = suspected();
        for _ in 0..36 {
            apply(&mut record, Signal::NotChecked, &policy, now_millis());
        }

        let t = apply(&mut record, promote(), &policy, now_millis());
        let Transition::Promoted { reason } = t else {
            panic!("expected promotion, got {:?}", t);
        };
        assert!(reason.contains("unit 3.6"), "{}", reason);
        assert_eq!(record.state, RecordState::Phishing);
        assert_eq!(record.evidence, json!({"visual_similarity_score": 0.93}));
        assert_eq!(record.elapsed_milliunits, 3_600);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let policy = MonitoringPolicy::default();
        for state in [RecordState::Legitimate, RecordState::Phishing, RecordState::Expired] {
            let mut record = suspected();
            record.state = state;
            let before = record.clone();
            assert_eq!(apply(&mut record, promote(), &policy, now_millis()), Transition::Unchanged);
            assert_eq!(apply(&mut record, Signal::Clear, &policy, now_millis()), Transition::Unchanged);
            assert_eq!(record, before);
        }
    }

    #[test]
    fn test_oversized_knobs_are_rejected() {
        assert!(MonitoringPolicy::new(1e300, 0.1, 1).is_err());
        assert!(MonitoringPolicy::new(90.0, f64::MAX, 1).is_err());
        assert!(MonitoringPolicy::new(f64::INFINITY, 0.1, 1).is_err());
        assert!(MonitoringPolicy::new(f64::NAN, 0.1, 1).is_err());

        let widest = MonitoringPolicy::new(MAX_POLICY_UNITS, MAX_POLICY_UNITS, 1).unwrap();
        assert_eq!(widest.ticks_to_horizon(), 1);
        assert_eq!(MonitoringPolicy::new(1.0, 0.3, 1).unwrap().ticks_to_horizon(), 4);
    }

    #[test]
    fn test_out_of_range_elapsed_expires_without_overflow() {
        let policy = MonitoringPolicy::new(MAX_POLICY_UNITS, 0.1, 1).unwrap();
        let mut record = suspected();
        record.elapsed_milliunits = i64::MAX - 1;

        assert_eq!(apply(&mut record, Signal::Clear, &policy, now_millis()), Transition::Expired);
        assert_eq!(record.elapsed_milliunits, i64::MAX - 1);
    }

    #[test]
    fn test_lowered_horizon_expires_before_signal() {
        let policy = MonitoringPolicy::new(1.0, 0.1, 1).unwrap();
        let mut record = suspected();
        record.elapsed_milliunits = 5_000;

        assert_eq!(apply(&mut record, promote(), &policy, now_millis()), Transition::Expired);
        assert_eq!(record.elapsed_milliunits, 5_000);
        assert_eq!(record.evidence, json!({"initial": true}));
    }

    #[test]
    fn test_elapsed_never_decreases() {
        let policy = MonitoringPolicy::new(2.0, 0.3, 1).unwrap();
        let mut record = suspected();
        let mut last = record.elapsed_milliunits;
        for _ in 0..20 {
            apply(&mut record, Signal::Clear, &policy, now_millis());
            assert!(record.elapsed_milliunits >= last);
            last = record.elapsed_milliunits;
        }
        assert_eq!(record.state, RecordState::Expired);
        assert_eq!(record.elapsed_milliunits, 2_100);
    }

    #[test]
    fn test_policy_validation() {
        assert!(MonitoringPolicy::new(0.0, 0.1, 1).is_err());
        assert!(MonitoringPolicy::new(90.0, 0.0, 1).is_err());
        assert!(MonitoringPolicy::new(90.0, 0.1, 0).is_err());
        assert!(MonitoringPolicy::new(f64::NAN, 0.1, 1).is_err());

        let policy = MonitoringPolicy::new(90.0, 0.1, 3).unwrap();
        assert_eq!(policy, MonitoringPolicy { recheck_every_ticks: 3, ..Default::default() });
        assert!(!policy.is_recheck_tick(1));
        assert!(policy.is_recheck_tick(3));
    }

    #[test]
    fn test_clear_reevaluation_maps_to_clear_signal() {
        let re = Reevaluation {
            promote: false,
            reason: "still parked".into(),
            evidence: json!({}),
        };
        assert!(matches!(Signal::from(re), Signal::Clear));
    }
}
