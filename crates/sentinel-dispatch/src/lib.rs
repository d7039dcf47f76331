//! Alert delivery.
//!
//! This crate provides:
//! - The [`AlertDispatcher`] contract (best-effort, `bool` result)
//! - An HTTP implementation posting alert payloads to the protection endpoint
//! - A class catalog mapping model classes to labels and emergency types
//! - A bounded, drop-oldest [`DispatchQueue`] that keeps delivery off the frame loop

pub mod catalog;
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod queue;

pub use catalog::{ClassCatalog, ClassInfo};
pub use client::{AlertPayload, DispatchConfig, HttpAlertDispatcher, StatusPayload};
pub use dispatcher::AlertDispatcher;
pub use error::{DispatchError, DispatchResult};
pub use queue::{DispatchQueue, DispatchStats, DEFAULT_QUEUE_CAPACITY};
