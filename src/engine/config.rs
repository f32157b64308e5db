/// Distances used when editing and snapping, in scene units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditConfig {
    /// Stick endpoints within this distance of a pivot reuse it.
    pub snap_radius: f64,
    /// Stick endpoints within this distance of a stick interior become hinges.
    pub stick_hit_radius: f64,
    /// Interior hits closer than this to a host endpoint are ignored.
    pub hinge_end_zone: f64,
    pub min_stick_length: f64,
    pub min_line_length: f64,
    pub min_circle_radius: f64,
    /// Dragged nodes closer than this to a line or circle snap onto it.
    pub line_snap_distance: f64,
    pub release_normal_offset: f64,
    pub release_min_normal_step: f64,
    /// Normal step must exceed the tangential step by this factor to release.
    pub release_normal_ratio: f64,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            snap_radius: 12.0,
            stick_hit_radius: 8.0,
            hinge_end_zone: 12.0,
            min_stick_length: 4.0,
            min_line_length: 4.0,
            min_circle_radius: 4.0,
            line_snap_distance: 12.0,
            release_normal_offset: 16.0,
            release_min_normal_step: 1.5,
            release_normal_ratio: 1.25,
        }
    }
}

impl EditConfig {
    pub fn new(snap_radius: f64) -> Self {
        Self {
            snap_radius,
            ..Default::default()
        }
    }

    pub fn with_stick_hit_radius(mut self, radius: f64) -> Self {
        self.stick_hit_radius = radius;
        self
    }

    pub fn with_hinge_end_zone(mut self, zone: f64) -> Self {
        self.hinge_end_zone = zone;
        self
    }

    pub fn with_min_stick_length(mut self, length: f64) -> Self {
        self.min_stick_length = length;
        self
    }

    pub fn with_line_snap_distance(mut self, distance: f64) -> Self {
        self.line_snap_distance = distance;
        self
    }

    pub fn with_release_thresholds(mut self, offset: f64, min_step: f64, ratio: f64) -> Self {
        self.release_normal_offset = offset;
        self.release_min_normal_step = min_step;
        self.release_normal_ratio = ratio;
        self
    }
}
