//! # Unit descriptors, statuses and definition parsing.
//!
//! - [`UnitDescriptor`], [`FeatureDescriptor`] immutable identity of a unit
//! - [`FeatureStatus`], [`FeatureState`], [`RunState`] mutable supervision state
//! - [`parse_definition`] builds a descriptor from an AAS-style JSON record

mod definition;
mod descriptor;
mod status;

pub use definition::{DEFAULT_BUS_ENDPOINT, parse_definition};
pub use descriptor::{FeatureDescriptor, UnitDescriptor};
pub use status::{FeatureState, FeatureStatus, RunState};
