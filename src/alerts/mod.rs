//! # Alert pipeline.
//!
//! Alerts are derived by the message router and kept in a bounded,
//! newest-first [`AlertBuffer`]. Operators remove them with acknowledge (one id)
//! or clear (everything); the oldest entry is evicted when the buffer is full.
//!
//! ```text
//! router ──► Alert::{feature_state, from_data, from_status} ──► AlertBuffer::raise
//!                                                        [newest, ..., oldest] (≤ capacity)
//! ```

mod alert;
mod buffer;

pub use alert::{Alert, Severity};
pub(crate) use alert::from_millis;
pub use buffer::{AlertBuffer, DEFAULT_ALERT_CAPACITY};
