//! Homotopy comparison by winding numbers around obstacle centroids.
//!
//! Two paths sharing both anchors are concatenated into a closed loop:
//! the reference path forward, then the candidate path backward. If the
//! loop winds around an obstacle centroid, the paths pass that obstacle
//! on opposite sides and are topologically distinct.
//!
//! This module defines the [`WindingMethod`] enum for selecting how the
//! loop is traced at runtime, and [`HomotopyComparator`], which caches
//! the reference half of the loop so that a planning call only traces
//! the candidate half per sample.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::path::{CandidatePath, build_path};
use crate::types::{PlannerError, Point};

/// Selects how the closed loop is traced when computing winding numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindingMethod {
    /// Sweep the loop parameter over `[0, 2]` in fixed steps, sampling
    /// the reference path on `[0, 1)` and the candidate path backward on
    /// `[1, 2]`.
    ///
    /// Coarse steps can skip over reference waypoints, so the traced
    /// loop is a resampling of the true one. The final sample returns to
    /// the start anchor so the loop is closed.
    FixedStep {
        /// Parameter increment. Snapped so that `1 / step` is a whole
        /// number of samples per path.
        step: f64,
    },

    /// Sum the signed angles over the exact control polygon
    /// `start -> waypoints -> end -> candidate -> start`.
    Exact,
}

impl WindingMethod {
    /// Default sweep increment for [`FixedStep`](Self::FixedStep).
    pub const DEFAULT_STEP: f64 = 0.05;

    /// Check that the method parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::InvalidConfig`] if a fixed step is not a
    /// finite value in `(0, 1]`.
    pub fn validate(&self) -> Result<(), PlannerError> {
        match *self {
            Self::FixedStep { step } if !(step.is_finite() && step > 0.0 && step <= 1.0) => Err(
                PlannerError::InvalidConfig(format!("winding step must be in (0, 1], got {step}")),
            ),
            _ => Ok(()),
        }
    }

    /// Samples per path for the fixed-step sweep.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn samples_per_path(step: f64) -> usize {
        let per_unit = (1.0 / step).round();
        if per_unit.is_finite() && per_unit >= 1.0 {
            per_unit as usize
        } else {
            1
        }
    }
}

impl Default for WindingMethod {
    fn default() -> Self {
        Self::FixedStep {
            step: Self::DEFAULT_STEP,
        }
    }
}

/// Signed angle (radians, in `(-π, π]`) turning vector `from` onto `to`.
#[must_use]
pub fn signed_angle(from: Point, to: Point) -> f64 {
    from.cross(to).atan2(from.dot(to))
}

/// Accumulated turning angle of `(p - center)` as `p` walks the given
/// points in order.
///
/// The walk is not closed implicitly: pass the first point again at the
/// end to close the loop.
#[must_use]
pub fn winding_angle<I>(points: I, center: Point) -> f64
where
    I: IntoIterator<Item = Point>,
{
    let mut total = 0.0;
    let mut last: Option<Point> = None;
    for p in points {
        let v = p.relative_to(center);
        if let Some(prev) = last {
            total += signed_angle(prev, v);
        }
        last = Some(v);
    }
    total
}

/// Quantize an accumulated angle to the nearest whole number of turns.
///
/// Anything within half a turn of zero becomes zero, which absorbs the
/// discretization error of a fixed-step sweep.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn winding_number(angle: f64) -> i64 {
    if angle.is_finite() {
        (angle / TAU).round() as i64
    } else {
        0
    }
}

/// Compares candidate placements against a fixed reference path.
///
/// The reference path runs `start -> waypoints -> end` through the
/// observed shape. Each candidate path runs `start -> candidate -> end`.
#[derive(Debug, Clone)]
pub struct HomotopyComparator {
    method: WindingMethod,
    start: Point,
    end: Point,
    /// Reference half of the loop, without the shared `end` anchor.
    reference_half: Vec<Point>,
}

impl HomotopyComparator {
    /// Prepare a comparator for the reference path through `waypoints`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(start: Point, end: Point, waypoints: &[Point], method: WindingMethod) -> Self {
        let reference = build_path(start, end, waypoints);
        let reference_half = match method {
            WindingMethod::FixedStep { step } => {
                let n = WindingMethod::samples_per_path(step);
                (0..n).map(|i| reference.at(i as f64 / n as f64)).collect()
            }
            WindingMethod::Exact => {
                let control = reference.control_points();
                control[..control.len() - 1].to_vec()
            }
        };
        Self {
            method,
            start,
            end,
            reference_half,
        }
    }

    /// The winding method in use.
    #[must_use]
    pub const fn method(&self) -> WindingMethod {
        self.method
    }

    /// The closed loop: reference forward, then the candidate path
    /// backward from `end` to `start`.
    #[allow(clippy::cast_precision_loss)]
    fn closed_loop(&self, candidate: Point) -> Vec<Point> {
        let candidate_path: CandidatePath = build_path(self.start, self.end, &[candidate]);
        let mut points = self.reference_half.clone();
        match self.method {
            WindingMethod::FixedStep { step } => {
                let n = WindingMethod::samples_per_path(step);
                points.reserve(n + 1);
                points.extend((0..=n).map(|i| candidate_path.at((n - i) as f64 / n as f64)));
            }
            WindingMethod::Exact => {
                points.extend(candidate_path.control_points().iter().rev().copied());
            }
        }
        points
    }

    /// Winding number of the closed loop around each centroid, in order.
    #[must_use]
    pub fn winding_numbers(&self, candidate: Point, centroids: &[Point]) -> Vec<i64> {
        let closed = self.closed_loop(candidate);
        centroids
            .iter()
            .map(|&c| winding_number(winding_angle(closed.iter().copied(), c)))
            .collect()
    }

    /// Whether the candidate path is topologically distinct from the
    /// reference, i.e. the loop encircles at least one centroid.
    ///
    /// Always `false` when there are no centroids.
    #[must_use]
    pub fn differs(&self, candidate: Point, centroids: &[Point]) -> bool {
        if centroids.is_empty() {
            return false;
        }
        let closed = self.closed_loop(candidate);
        centroids
            .iter()
            .any(|&c| winding_number(winding_angle(closed.iter().copied(), c)) != 0)
    }
}

/// One-shot homotopy test between the reference path through
/// `waypoints` and the path through `candidate`.
///
/// Prefer [`HomotopyComparator`] when testing many candidates against
/// the same reference.
#[must_use]
pub fn differs(
    start: Point,
    end: Point,
    waypoints: &[Point],
    candidate: Point,
    centroids: &[Point],
    method: WindingMethod,
) -> bool {
    HomotopyComparator::new(start, end, waypoints, method).differs(candidate, centroids)
}
