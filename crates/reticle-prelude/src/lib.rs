//! Reticle Prelude
//!
//! This crate re-exports the most frequently used public items from the Reticle
//! ecosystem (currently `reticle-core` and `reticle-types`). Down-stream
//! applications can depend on `reticle-prelude` to avoid long import lists and
//! to stay insulated from internal module reshuffles.

#![deny(warnings)]
#![deny(missing_docs)]

// Network, productions and matches ---------------------------------------------------------------

pub use reticle_core::{
    Activation, ActivationId, Bind, Bindings, Condition, Filter, MatchRecord, NetworkConfig, NetworkStats, Pattern,
    Production, ProductionBuilder, ProductionId, ReteError, ReteNetwork, ReteResult, Wme, WmeId,
};

// Value model ----------------------------------------------------------------------------------

pub use reticle_types::{Field, Term, Value, Var};
