//! Interactive solver module
//!
//! Positional projection rules and the drag solver built on them.

pub mod drag;
pub mod projection;

pub use drag::{DragConfig, DragMode, DragSolver, SolveResult};
pub use projection::{refine_scene, Bond, ProjectionReport, Workspace};
