//! Scene graph module
//!
//! Id-keyed storage for nodes, sticks and positional constraints, plus the
//! graph queries the solvers build on.

pub mod component;
pub mod entity;
pub mod hinge;
pub mod store;

pub use component::{connected_component, Component};
pub use entity::{
    AttachmentConstraint, AttachmentId, CircleConstraint, CircleId, EntityRef, LineConstraint,
    LineId, Node, NodeConstraint, NodeId, Stick, StickId,
};
pub use hinge::{interior_stick_hit, HingeChange};
pub use store::{Scene, SceneSnapshot, StickHit};
