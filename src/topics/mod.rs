//! # Topic grammar for the supervision bus.
//!
//! Pure functions over topic strings. Producers on the bus do not agree on a
//! leading-slash convention, so every topic is normalized before comparison and
//! every subscription is registered in both forms.
//!
//! ## Wire layout
//! ```text
//! <base>                      unit root
//! <base>/cmd                  commands (observed only)
//! <base>/data                 generic telemetry / explicit alerts
//! <base>/status               threshold status reports
//! <base>/ack                  acknowledgements (reserved)
//! <base>/feat/<key>/$state    feature state reports
//! ```
//!
//! ## Contents
//! - [`normalize`], [`variants`], [`join`]
//! - [`match_feature_state`] strict `feat/<key>/$state` suffix grammar
//! - [`subscription_topics_for`] the full topic set of a unit
//! - [`classify`] segment-based suffix classification ([`TopicClass`])

mod grammar;

pub use grammar::{
    ACK_SUFFIX, COMMAND_SUFFIX, DATA_SUFFIX, FEATURE_SEGMENT, STATE_SEGMENT, STATUS_SUFFIX,
    TopicClass, classify, join, match_feature_state, normalize, relative_path, state_topic,
    subscription_topics_for, variants,
};
