//! Fatal-assertion error type.
//!
//! Per §7, the planner has exactly one *recoverable* failure mode ("no pass
//! this attempt"), which is represented as a plain enum (see
//! [`crate::plan::PlanOutcome`]), never as an [`Err`]. Everything in this
//! module is instead a programming-error-grade invariant violation: a node
//! kind the admission table should never have presented, an unknown strategy
//! tag surfacing at command-stream emission, or a weight format outside the
//! two the hardware understands. A correctly-configured planner running on a
//! well-formed graph never produces these.

use crate::graph::NodeId;
use crate::strategy::Strategy;

/// Fatal, non-recoverable planner invariant violation.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// The admission table presented a node kind it should have rejected.
    #[error("node {node:?} has an unexpected kind for the current admission state: {expected}")]
    UnexpectedNodeKind {
        /// The node the fuser was trying to admit.
        node: NodeId,
        /// What kind of node the current state expected instead.
        expected: &'static str,
    },

    /// Command-stream emission was asked to encode a strategy tag it does
    /// not recognise.
    #[error("unknown strategy tag at emission: {0:?}")]
    UnknownStrategyTag(Strategy),

    /// A weight tensor arrived in a format other than `HWIO`/`HWIM`.
    #[error("illegal weight format")]
    IllegalWeightFormat,
}

/// Convenience alias for fallible planner internals.
pub type Result<T> = std::result::Result<T, PlanError>;
