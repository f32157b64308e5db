//! Error types for engine operations.
//!
//! Every mutating operation validates before touching state, so receiving an
//! `Err` means the engine is exactly as it was before the call.

use crate::scene::{CircleId, LineId, NodeId, StickId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("stick {0} does not exist")]
    StickNotFound(StickId),

    #[error("line {0} does not exist")]
    LineNotFound(LineId),

    #[error("circle {0} does not exist")]
    CircleNotFound(CircleId),

    #[error("no active drag")]
    NoActiveDrag,

    #[error("a drag is already in progress")]
    DragInProgress,

    #[error("no active {0} draft")]
    NoActiveDraft(&'static str),

    #[error("a {0} draft is already in progress")]
    DraftInProgress(&'static str),

    #[error("no active resize")]
    NoActiveResize,

    #[error("stick too short: {length:.3} < {min:.3}")]
    StickTooShort { length: f64, min: f64 },

    #[error("line too short: {length:.3} < {min:.3}")]
    LineTooShort { length: f64, min: f64 },

    #[error("circle too small: radius {radius:.3} < {min:.3}")]
    CircleTooSmall { radius: f64, min: f64 },

    #[error("both stick endpoints resolve to node {0}")]
    DuplicateEndpoints(NodeId),

    #[error("stick {0} already connects these nodes")]
    StickExists(StickId),

    #[error("node {node} is not an endpoint of stick {stick}")]
    NotAnEndpoint { stick: StickId, node: NodeId },

    #[error("operation not allowed while physics is running")]
    PhysicsRunning,

    #[error("physics is disabled")]
    PhysicsDisabled,

    #[error("invalid timestep {0}")]
    InvalidTimestep(f64),

    #[error("invalid value {value} for physics option `{name}`")]
    InvalidOption { name: &'static str, value: f64 },

    #[error("point ({x}, {y}) is not finite")]
    NonFinitePoint { x: f64, y: f64 },

    #[error("nothing selected")]
    NothingSelected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_human_readable() {
        assert_eq!(EngineError::NoActiveDrag.to_string(), "no active drag");
        assert_eq!(
            EngineError::StickNotFound(StickId(4)).to_string(),
            "stick s4 does not exist"
        );
        assert_eq!(
            EngineError::StickTooShort { length: 1.0, min: 4.0 }.to_string(),
            "stick too short: 1.000 < 4.000"
        );
    }
}
