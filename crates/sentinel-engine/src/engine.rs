//! The decision engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration as TimeDelta, Utc};
use tracing::{debug, info, trace};

use sentinel_models::{AlertEvent, ClassId, Detection};

use crate::error::{EngineError, EngineResult};
use crate::policy::{AlertMode, ClassPolicies};
use crate::state::ClassAlertState;

/// Alert mode with durations converted for timestamp arithmetic.
#[derive(Debug, Clone, Copy)]
enum CompiledMode {
    Debounce { cooldown: TimeDelta },
    Threshold { count: u32, suspension: TimeDelta },
}

impl CompiledMode {
    fn compile(class_id: ClassId, mode: AlertMode) -> EngineResult<Self> {
        let convert = |d: std::time::Duration| {
            TimeDelta::from_std(d).map_err(|_| {
                EngineError::invalid_policy(format!("duration for class {class_id} is out of range"))
            })
        };
        Ok(match mode {
            AlertMode::Debounce { cooldown } => CompiledMode::Debounce {
                cooldown: convert(cooldown)?,
            },
            AlertMode::Threshold { count, suspension } => CompiledMode::Threshold {
                count,
                suspension: convert(suspension)?,
            },
        })
    }
}

/// Owns the per-class alert state and decides which detections become alerts.
#[derive(Debug)]
pub struct DecisionEngine {
    policies: ClassPolicies,
    modes: BTreeMap<ClassId, CompiledMode>,
    states: BTreeMap<ClassId, ClassAlertState>,
}

impl DecisionEngine {
    /// Create an engine for the given monitored classes.
    pub fn new(policies: ClassPolicies) -> EngineResult<Self> {
        let mut modes = BTreeMap::new();
        for (class_id, mode) in policies.iter() {
            mode.validate()?;
            modes.insert(class_id, CompiledMode::compile(class_id, mode)?);
        }

        Ok(Self {
            policies,
            modes,
            states: BTreeMap::new(),
        })
    }

    pub fn policies(&self) -> &ClassPolicies {
        &self.policies
    }

    /// Current state of a class; `None` until the class is first seen.
    pub fn state(&self, class_id: ClassId) -> Option<&ClassAlertState> {
        self.states.get(&class_id)
    }

    /// Process the detections of one frame observed at `now`.
    ///
    /// Detections are evaluated in order. A batch containing a confidence
    /// outside `[0, 1]` is rejected whole and no state is touched.
    pub fn process(&mut self, batch: &[Detection], now: DateTime<Utc>) -> EngineResult<Vec<AlertEvent>> {
        if let Some(bad) = batch.iter().find(|d| !d.has_valid_confidence()) {
            return Err(EngineError::ConfidenceOutOfRange {
                class_id: bad.class_id,
                confidence: bad.confidence,
            });
        }

        let mut events = Vec::new();
        for detection in batch {
            if let Some(event) = self.evaluate(detection, now) {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn evaluate(&mut self, detection: &Detection, now: DateTime<Utc>) -> Option<AlertEvent> {
        let class_id = detection.class_id;
        let mode = *self.modes.get(&class_id)?;
        let state = self.states.entry(class_id).or_default();

        match mode {
            CompiledMode::Debounce { cooldown } => {
                let due = state
                    .last_single_alert_at
                    .map_or(true, |last| now - last > cooldown);
                if !due {
                    trace!(class_id = %class_id, "Single alert debounced");
                    return None;
                }

                state.last_single_alert_at = Some(now);
                info!(
                    class_id = %class_id,
                    confidence = detection.confidence,
                    "Single alert decided"
                );
                Some(AlertEvent::single(class_id, detection.confidence, now))
            }
            CompiledMode::Threshold { count, suspension } => {
                if state.resume_if_expired(now) {
                    info!(class_id = %class_id, "Suspension expired, monitoring resumed");
                }

                if state.is_suspended(now) {
                    trace!(class_id = %class_id, "Class suspended, detection ignored");
                    return None;
                }

                state.accumulated_count = state.accumulated_count.saturating_add(1);
                debug!(
                    class_id = %class_id,
                    accumulated = state.accumulated_count,
                    threshold = count,
                    "Detection counted"
                );

                if state.accumulated_count < count {
                    return None;
                }

                let accumulated = state.accumulated_count;
                let until = now
                    .checked_add_signed(suspension)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                state.escalate(until);
                info!(
                    class_id = %class_id,
                    confidence = detection.confidence,
                    count = accumulated,
                    suspended_until = %until,
                    "Bulk alert decided, class suspended"
                );
                Some(AlertEvent::bulk(class_id, detection.confidence, accumulated, now))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sentinel_models::{AlertKind, BoundingBox};
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn det(class: u32, confidence: f64) -> Detection {
        Detection::new(class, confidence, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    fn threshold_engine(class: u32, count: u32, suspension_secs: u64) -> DecisionEngine {
        let policies = ClassPolicies::new()
            .with(class, AlertMode::threshold(count, Duration::from_secs(suspension_secs)))
            .unwrap();
        DecisionEngine::new(policies).unwrap()
    }

    fn debounce_engine(class: u32, cooldown_secs: u64) -> DecisionEngine {
        let policies = ClassPolicies::new()
            .with(class, AlertMode::debounce(Duration::from_secs(cooldown_secs)))
            .unwrap();
        DecisionEngine::new(policies).unwrap()
    }

    #[test]
    fn test_unmonitored_class_is_ignored() {
        let mut engine = threshold_engine(2, 1, 20);
        let events = engine.process(&[det(7, 0.99), det(7, 0.99)], at(0)).unwrap();
        assert!(events.is_empty());
        assert!(engine.state(ClassId(7)).is_none());
    }

    #[test]
    fn test_threshold_scenario() {
        let mut engine = threshold_engine(2, 5, 20);

        for t in 0..4 {
            assert!(engine.process(&[det(2, 0.9)], at(t)).unwrap().is_empty());
        }
        let events = engine.process(&[det(2, 0.9)], at(4)).unwrap();
        assert_eq!(events, vec![AlertEvent::bulk(ClassId(2), 0.9, 5, at(4))]);
        assert_eq!(engine.state(ClassId(2)).unwrap().accumulated_count, 0);

        // Still suspended: not counted, no alert
        assert!(engine.process(&[det(2, 0.9)], at(5)).unwrap().is_empty());
        assert_eq!(engine.state(ClassId(2)).unwrap().accumulated_count, 0);

        // Suspension ended at t=24; t=25 resumes and counts as 1
        assert!(engine.process(&[det(2, 0.9)], at(25)).unwrap().is_empty());
        let state = engine.state(ClassId(2)).unwrap();
        assert_eq!(state.accumulated_count, 1);
        assert_eq!(state.monitoring_suspended_until, None);
    }

    #[test]
    fn test_threshold_fires_again_after_reaccumulation() {
        let mut engine = threshold_engine(1, 3, 10);
        let mut bulk = 0;
        for t in [0, 1, 2, 3, 4, 20, 21, 22] {
            bulk += engine.process(&[det(1, 0.8)], at(t)).unwrap().len();
        }
        assert_eq!(bulk, 2);
    }

    #[test]
    fn test_suspension_ignores_high_confidence() {
        let mut engine = threshold_engine(1, 1, 30);
        assert_eq!(engine.process(&[det(1, 0.6)], at(0)).unwrap().len(), 1);
        for t in 1..30 {
            assert!(engine.process(&[det(1, 1.0), det(1, 1.0)], at(t)).unwrap().is_empty());
        }
        assert_eq!(engine.process(&[det(1, 0.6)], at(30)).unwrap().len(), 1);
    }

    #[test]
    fn test_threshold_counts_every_detection_in_a_frame() {
        let mut engine = threshold_engine(2, 3, 20);
        let events = engine
            .process(&[det(2, 0.5), det(2, 0.6), det(2, 0.7), det(2, 0.8)], at(0))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].confidence, 0.7);
        assert_eq!(events[0].kind, AlertKind::Bulk { count: 3 });
        // Fourth detection arrives inside the fresh suspension window
        assert_eq!(engine.state(ClassId(2)).unwrap().accumulated_count, 0);
    }

    #[test]
    fn test_debounce_window() {
        let mut engine = debounce_engine(0, 2);
        assert_eq!(engine.process(&[det(0, 0.7)], at_ms(0)).unwrap().len(), 1);
        assert!(engine.process(&[det(0, 0.7)], at_ms(1_500)).unwrap().is_empty());
        // Exactly the cooldown is not "more than" the cooldown
        assert!(engine.process(&[det(0, 0.7)], at_ms(2_000)).unwrap().is_empty());
        let events = engine.process(&[det(0, 0.7)], at_ms(2_001)).unwrap();
        assert_eq!(events, vec![AlertEvent::single(ClassId(0), 0.7, at_ms(2_001))]);
    }

    #[test]
    fn test_debounce_one_alert_per_frame() {
        let mut engine = debounce_engine(0, 2);
        let events = engine.process(&[det(0, 0.7), det(0, 0.9)], at(0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].confidence, 0.7);
    }

    #[test]
    fn test_modes_are_independent_per_class() {
        let policies = ClassPolicies::new()
            .with(0u32, AlertMode::debounce(Duration::from_secs(2)))
            .unwrap()
            .with(1u32, AlertMode::threshold(2, Duration::from_secs(20)))
            .unwrap();
        let mut engine = DecisionEngine::new(policies).unwrap();

        let events = engine.process(&[det(0, 0.9), det(1, 0.9)], at(0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertKind::Single);

        let events = engine.process(&[det(0, 0.9), det(1, 0.9)], at(1)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].class_id, ClassId(1));
        assert!(events[0].is_bulk());
    }

    #[test]
    fn test_oversized_suspension_rejected_at_construction() {
        let err = ClassPolicies::new()
            .with(2u32, AlertMode::threshold(1, Duration::from_secs_f64(1e13)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPolicy(_)));
        assert!("2=threshold:1:1e13".parse::<ClassPolicies>().is_err());
    }

    #[test]
    fn test_suspension_near_end_of_time_saturates() {
        let mut engine = threshold_engine(2, 1, 3600);
        let late = DateTime::<Utc>::MAX_UTC - TimeDelta::seconds(10);
        let events = engine.process(&[det(2, 0.9)], late).unwrap();
        assert_eq!(events.len(), 1);
        let state = engine.state(ClassId(2)).unwrap();
        assert_eq!(state.monitoring_suspended_until, Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_invalid_confidence_rejects_whole_batch() {
        let mut engine = threshold_engine(2, 2, 20);
        let err = engine
            .process(&[det(2, 0.9), det(2, 1.2)], at(0))
            .unwrap_err();
        assert!(err.is_contract_violation());
        assert!(engine.state(ClassId(2)).is_none());
    }

    #[test]
    fn test_replay_is_deterministic() {
        let inputs: Vec<(u32, f64, i64)> = vec![
            (2, 0.9, 0),
            (0, 0.5, 0),
            (2, 0.8, 1),
            (0, 0.6, 3),
            (2, 0.7, 2),
            (2, 0.9, 30),
            (2, 0.9, 31),
        ];
        let run = || {
            let policies: ClassPolicies = "0=debounce:2,2=threshold:2:20".parse().unwrap();
            let mut engine = DecisionEngine::new(policies).unwrap();
            inputs
                .iter()
                .flat_map(|(c, conf, t)| engine.process(&[det(*c, *conf)], at(*t)).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
        assert_eq!(run().len(), 4);
    }
}
