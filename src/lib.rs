//! Feature flag evaluation service.
//!
//! [`evaluation`] holds the decision engine; the rest serves it to SDKs over
//! HTTP from a validated, read-only flagset.

pub mod config;
pub mod error;
pub mod evaluation;
pub mod routes;
pub mod state;
pub mod store;

pub use evaluation::{Evaluated, Evaluation, EvaluationContext, Evaluator, Flag, Reason, Rule};
