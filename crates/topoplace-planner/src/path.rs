//! Piecewise-linear paths parametrized on `[0, 1]`.
//!
//! A [`CandidatePath`] runs `start -> waypoints... -> end`, with every
//! control point (both anchors included) evenly spaced in parameter.
//! The homotopy test evaluates these paths at fixed parameter steps to
//! trace the closed loop whose winding number it measures.

use crate::types::Point;

/// A piecewise-linear path through an ordered list of control points.
///
/// Invariant: there are always at least two control points, so
/// `at(0.0)` is the start anchor and `at(1.0)` the end anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePath {
    control: Vec<Point>,
}

/// Build the path `start -> waypoints... -> end`.
///
/// With no waypoints the path is the straight segment between the two
/// anchors.
#[must_use = "returns the constructed path"]
pub fn build_path(start: Point, end: Point, waypoints: &[Point]) -> CandidatePath {
    let mut control = Vec::with_capacity(waypoints.len() + 2);
    control.push(start);
    control.extend_from_slice(waypoints);
    control.push(end);
    CandidatePath { control }
}

impl CandidatePath {
    /// Evaluate the path at parameter `t`.
    ///
    /// `t = 0` and `t = 1` return the anchors exactly; values outside
    /// `[0, 1]` are clamped. In between, `frac = t * (M - 1)` selects
    /// the segment `floor(frac)` and the fractional part interpolates
    /// along it, where `M` is the number of control points.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn at(&self, t: f64) -> Point {
        let last = self.control.len() - 1;
        if t <= 0.0 || t.is_nan() {
            return self.control[0];
        }
        if t >= 1.0 {
            return self.control[last];
        }

        let frac = t * last as f64;
        // `frac < last` for t < 1, but rounding can land exactly on it.
        let idx = (frac.floor() as usize).min(last - 1);
        let alpha = frac - idx as f64;
        self.control[idx].lerp(self.control[idx + 1], alpha)
    }

    /// The start anchor.
    #[must_use]
    pub fn start(&self) -> Point {
        self.control[0]
    }

    /// The end anchor.
    #[must_use]
    pub fn end(&self) -> Point {
        self.control[self.control.len() - 1]
    }

    /// All control points, anchors included.
    #[must_use]
    pub fn control_points(&self) -> &[Point] {
        &self.control
    }

    /// Number of control points (always at least two).
    #[must_use]
    pub fn control_point_count(&self) -> usize {
        self.control.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Point, expected: Point) {
        assert!(
            actual.distance(expected) < 1e-9,
            "expected ({}, {}), got ({}, {})",
            expected.x,
            expected.y,
            actual.x,
            actual.y,
        );
    }

    #[test]
    fn endpoints_are_exact() {
        let start = Point::new(0.1, 0.7);
        let end = Point::new(93.3, 17.9);
        let waypoints = [
            Point::new(10.3, 50.1),
            Point::new(33.3, 66.6),
            Point::new(71.9, 2.2),
        ];
        let path = build_path(start, end, &waypoints);
        assert_eq!(path.at(0.0), start);
        assert_eq!(path.at(1.0), end);
    }

    #[test]
    fn no_waypoints_is_straight_line() {
        let path = build_path(Point::new(0.0, 0.0), Point::new(10.0, 20.0), &[]);
        assert_eq!(path.control_point_count(), 2);
        assert_close(path.at(0.25), Point::new(2.5, 5.0));
        assert_close(path.at(0.5), Point::new(5.0, 10.0));
    }

    #[test]
    fn single_waypoint_is_reached_at_half() {
        let path = build_path(
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            &[Point::new(10.0, 10.0)],
        );
        assert_close(path.at(0.5), Point::new(10.0, 10.0));
        assert_close(path.at(0.25), Point::new(5.0, 5.0));
        assert_close(path.at(0.75), Point::new(15.0, 5.0));
    }

    #[test]
    fn waypoints_are_evenly_spaced_in_parameter() {
        // Four control points: segments at t in [0, 1/3), [1/3, 2/3), [2/3, 1].
        let path = build_path(
            Point::new(0.0, 0.0),
            Point::new(3.0, 3.0),
            &[Point::new(1.0, 0.0), Point::new(1.0, 3.0)],
        );
        assert_close(path.at(1.0 / 3.0), Point::new(1.0, 0.0));
        assert_close(path.at(0.5), Point::new(1.0, 1.5));
        assert_close(path.at(2.0 / 3.0), Point::new(1.0, 3.0));
        assert_close(path.at(5.0 / 6.0), Point::new(2.0, 3.0));
    }

    #[test]
    fn parameter_outside_unit_interval_is_clamped() {
        let start = Point::new(1.0, 1.0);
        let end = Point::new(5.0, 9.0);
        let path = build_path(start, end, &[Point::new(3.0, 0.0)]);
        assert_eq!(path.at(-0.5), start);
        assert_eq!(path.at(1.5), end);
        assert_eq!(path.at(f64::NAN), start);
    }

    #[test]
    fn just_below_one_stays_on_last_segment() {
        let path = build_path(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            &[Point::new(5.0, 5.0)],
        );
        let p = path.at(1.0 - f64::EPSILON);
        assert!(p.distance(Point::new(10.0, 0.0)) < 1e-9);
    }

    #[test]
    fn accessors_report_anchors() {
        let path = build_path(Point::new(1.0, 2.0), Point::new(3.0, 4.0), &[]);
        assert_eq!(path.start(), Point::new(1.0, 2.0));
        assert_eq!(path.end(), Point::new(3.0, 4.0));
        assert_eq!(path.control_points().len(), 2);
    }
}
