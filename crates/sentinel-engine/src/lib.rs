//! Alert decision engine.
//!
//! Turns the detection batch of one processed frame, plus that frame's
//! timestamp, into zero or more [`AlertEvent`](sentinel_models::AlertEvent)s.
//! Each monitored class is governed by exactly one [`AlertMode`]:
//!
//! - `Debounce`: at most one single alert per cooldown window
//! - `Threshold`: accumulate detections, escalate once with a bulk alert,
//!   then suspend the class for a quiet period
//!
//! The engine is synchronous and deterministic: its output depends only on
//! the ordered inputs and the supplied timestamps.

pub mod engine;
pub mod error;
pub mod policy;
pub mod state;

pub use engine::DecisionEngine;
pub use error::{EngineError, EngineResult};
pub use policy::{AlertMode, ClassPolicies};
pub use state::ClassAlertState;
