use glam::DVec2;

/// Lengths below this are treated as degenerate when normalizing.
pub const DEGENERATE_LENGTH: f64 = 1e-9;

/// Unit vector along `v`, or `+X` when `v` is too short to have a direction.
#[inline]
pub fn unit_or_x(v: DVec2) -> DVec2 {
    let len = v.length();
    if len > DEGENERATE_LENGTH {
        v / len
    } else {
        DVec2::X
    }
}

/// Unit direction from `a` to `b` together with the distance between them.
#[inline]
pub fn direction_and_length(a: DVec2, b: DVec2) -> (DVec2, f64) {
    let delta = b - a;
    let len = delta.length();
    if len > DEGENERATE_LENGTH {
        (delta / len, len)
    } else {
        (DVec2::X, len)
    }
}

/// Barycentric parameter of the projection of `p` onto segment `ab`, clamped to `[0, 1]`.
pub fn segment_parameter(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= DEGENERATE_LENGTH * DEGENERATE_LENGTH {
        return 0.0;
    }
    ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
}

/// Closest point on segment `ab` to `p`, with its barycentric parameter.
pub fn project_to_segment(p: DVec2, a: DVec2, b: DVec2) -> (f64, DVec2) {
    let t = segment_parameter(p, a, b);
    (t, a.lerp(b, t))
}

pub fn distance_to_segment(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let (_, closest) = project_to_segment(p, a, b);
    p.distance(closest)
}

/// Unit normal of the infinite line through `a` and `b` (left-hand perpendicular of `a → b`).
#[inline]
pub fn line_normal(a: DVec2, b: DVec2) -> DVec2 {
    unit_or_x(b - a).perp()
}

/// Signed perpendicular offset of `p` from the infinite line through `a` and `b`.
#[inline]
pub fn signed_line_offset(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    (p - a).dot(line_normal(a, b))
}

/// Orthogonal projection of `p` onto the infinite line through `a` and `b`.
pub fn project_to_line(p: DVec2, a: DVec2, b: DVec2) -> DVec2 {
    p - line_normal(a, b) * signed_line_offset(p, a, b)
}

/// Signed radial offset of `p` from a circle (`> 0` outside).
#[inline]
pub fn signed_circle_offset(p: DVec2, center: DVec2, radius: f64) -> f64 {
    p.distance(center) - radius
}

/// Closest point on the circle to `p`; a point at the center projects along `+X`.
pub fn project_to_circle(p: DVec2, center: DVec2, radius: f64) -> DVec2 {
    center + unit_or_x(p - center) * radius
}

/// Signed angle from `u` to `v` in `(-π, π]`.
#[inline]
pub fn signed_angle(u: DVec2, v: DVec2) -> f64 {
    u.perp_dot(v).atan2(u.dot(v))
}

pub fn is_finite_point(p: DVec2) -> bool {
    p.x.is_finite() && p.y.is_finite()
}
