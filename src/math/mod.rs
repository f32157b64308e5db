//! Math utilities module
//!
//! Geometry primitives for points, segments, lines and circles in the plane.

mod geometry;

pub use geometry::{
    direction_and_length, distance_to_segment, is_finite_point, line_normal, project_to_circle,
    project_to_line, project_to_segment, segment_parameter, signed_angle, signed_circle_offset,
    signed_line_offset, unit_or_x, DEGENERATE_LENGTH,
};

// Re-export the vector type used throughout the crate
pub use glam::DVec2;
