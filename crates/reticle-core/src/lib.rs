//! Core functionality for the Reticle Rete engine.
//!
//! This crate provides an incremental pattern matcher over working memory
//! elements of the form (identifier, attribute, value). Productions are
//! compiled into a shared Rete network; every assertion or retraction updates
//! the match set of every production before the call returns.
//!
//! ```
//! use reticle_core::{Production, ReteNetwork, Term, Wme};
//!
//! let mut network = ReteNetwork::new();
//! network
//!     .add_production(
//!         Production::builder(1, "red block on something")
//!             .when(Term::var("x"), "on", Term::var("y"))
//!             .when(Term::var("x"), "color", "red")
//!             .build(),
//!     )
//!     .unwrap();
//! network.add_wme(Wme::new("B1", "on", "B2")).unwrap();
//! network.add_wme(Wme::new("B1", "color", "red")).unwrap();
//! assert_eq!(network.match_count(1).unwrap(), 1);
//! ```

/// Alpha memories and their constant-test index
pub mod alpha_memory;
/// Beta node arena, dispatch and memory nodes
pub mod beta_network;
/// Condition kinds a production is built from
pub mod conditions;
/// Network configuration
pub mod config;
/// Error types
pub mod error;
/// Filter and bind nodes
pub mod filter_node;
/// Join nodes and join-test derivation
pub mod join_node;
/// Negated conjunctive conditions
pub mod ncc_node;
/// Negative nodes
pub mod negative_node;
/// Productions, activations and match records
pub mod production;
/// Network orchestration and public API
pub mod rete_network;
/// Match tokens
pub mod token;
/// Arena ids and working memory elements
pub mod types;

pub use alpha_memory::{AlphaKey, AlphaMemory, KeyField};
pub use beta_network::{BetaNode, BetaNodeKind, NodeType};
pub use conditions::{Bind, Condition, Filter, JoinTest, Pattern};
pub use config::NetworkConfig;
pub use error::{ReteError, ReteResult};
pub use production::{Activation, ActivationId, MatchRecord, Production, ProductionBuilder};
pub use rete_network::{NetworkStats, ReteNetwork};
pub use token::Token;
pub use types::{AlphaMemoryId, Bindings, NodeId, ProductionId, TokenId, Wme, WmeId};

pub use reticle_types::{Field, Term, Value, Var};
