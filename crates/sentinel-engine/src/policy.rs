//! Per-class alert policy definitions.
//!
//! Policies are written as `class=mode` entries separated by commas:
//!
//! - `debounce:<cooldown_secs>`
//! - `threshold:<count>:<suspension_secs>`
//!
//! e.g. `0=debounce:2,1=threshold:5:20`. The classes named form the
//! monitored-class set; every other class is ignored by the engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sentinel_models::ClassId;

use crate::error::{EngineError, EngineResult};

/// Longest cooldown or suspension accepted (ten years).
pub const MAX_POLICY_DURATION: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// How alerts are decided for one class. Selected once at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertMode {
    /// Emit a single alert whenever more than `cooldown` has passed since the
    /// previous one for the class.
    Debounce { cooldown: Duration },

    /// Count detections and emit one bulk alert when `count` is reached, then
    /// ignore the class for `suspension`.
    Threshold { count: u32, suspension: Duration },
}

impl AlertMode {
    pub fn debounce(cooldown: Duration) -> Self {
        AlertMode::Debounce { cooldown }
    }

    pub fn threshold(count: u32, suspension: Duration) -> Self {
        AlertMode::Threshold { count, suspension }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertMode::Debounce { .. } => "debounce",
            AlertMode::Threshold { .. } => "threshold",
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        let (field, duration) = match self {
            AlertMode::Threshold { count: 0, .. } => {
                return Err(EngineError::invalid_policy("threshold count must be at least 1"))
            }
            AlertMode::Threshold { suspension, .. } => ("suspension", *suspension),
            AlertMode::Debounce { cooldown } => ("cooldown", *cooldown),
        };
        if duration > MAX_POLICY_DURATION {
            return Err(EngineError::invalid_policy(format!(
                "{field} must be at most {} seconds, got {}",
                MAX_POLICY_DURATION.as_secs(),
                duration.as_secs_f64()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AlertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertMode::Debounce { cooldown } => {
                write!(f, "debounce:{}", cooldown.as_secs_f64())
            }
            AlertMode::Threshold { count, suspension } => {
                write!(f, "threshold:{}:{}", count, suspension.as_secs_f64())
            }
        }
    }
}

fn parse_secs(field: &str, raw: &str) -> EngineResult<Duration> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| EngineError::invalid_policy(format!("{field} must be a number of seconds, got '{raw}'")))?;
    Duration::try_from_secs_f64(secs).map_err(|_| {
        EngineError::invalid_policy(format!("{field} must be a finite, non-negative duration, got '{raw}'"))
    })
}

impl FromStr for AlertMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let mode = match parts.as_slice() {
            [name, cooldown] if name.eq_ignore_ascii_case("debounce") => {
                AlertMode::Debounce {
                    cooldown: parse_secs("cooldown", cooldown)?,
                }
            }
            [name, count, suspension] if name.eq_ignore_ascii_case("threshold") => {
                let count: u32 = count.trim().parse().map_err(|_| {
                    EngineError::invalid_policy(format!("threshold count must be a positive integer, got '{count}'"))
                })?;
                AlertMode::Threshold {
                    count,
                    suspension: parse_secs("suspension", suspension)?,
                }
            }
            _ => {
                return Err(EngineError::invalid_policy(format!(
                    "unknown alert mode '{s}' (expected debounce:<secs> or threshold:<count>:<secs>)"
                )))
            }
        };
        mode.validate()?;
        Ok(mode)
    }
}

/// Mapping from monitored class to its alert mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassPolicies {
    modes: BTreeMap<ClassId, AlertMode>,
}

impl ClassPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class; rejects duplicates so a class never has two modes.
    pub fn insert(&mut self, class_id: ClassId, mode: AlertMode) -> EngineResult<()> {
        mode.validate()?;
        if self.modes.contains_key(&class_id) {
            return Err(EngineError::invalid_policy(format!(
                "class {class_id} configured more than once"
            )));
        }
        self.modes.insert(class_id, mode);
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, class_id: impl Into<ClassId>, mode: AlertMode) -> EngineResult<Self> {
        self.insert(class_id.into(), mode)?;
        Ok(self)
    }

    pub fn get(&self, class_id: ClassId) -> Option<AlertMode> {
        self.modes.get(&class_id).copied()
    }

    pub fn is_monitored(&self, class_id: ClassId) -> bool {
        self.modes.contains_key(&class_id)
    }

    pub fn monitored_classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.modes.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassId, AlertMode)> + '_ {
        self.modes.iter().map(|(c, m)| (*c, *m))
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

impl FromStr for ClassPolicies {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut policies = ClassPolicies::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (class, mode) = entry.split_once('=').ok_or_else(|| {
                EngineError::invalid_policy(format!("policy entry '{entry}' must look like <class>=<mode>"))
            })?;
            let class_id: ClassId = class
                .parse()
                .map_err(|e: sentinel_models::ClassIdParseError| EngineError::invalid_policy(e.to_string()))?;
            policies.insert(class_id, mode.parse()?)?;
        }
        Ok(policies)
    }
}

impl fmt::Display for ClassPolicies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .modes
            .iter()
            .map(|(class, mode)| format!("{class}={mode}"))
            .collect();
        write!(f, "{}", entries.join(","))
    }
}
