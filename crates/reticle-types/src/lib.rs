//! Reticle Types
//!
//! This crate defines the value model used throughout the Reticle ecosystem
//! (currently `reticle-core` and `reticle-prelude`). It provides the constant
//! `Value` stored in working memory elements, the `Var` placeholder used by
//! rule conditions, and the `Term` that is either of the two.

#![warn(missing_docs)]

mod types;
pub use types::{Field, Term, Value, Var};
