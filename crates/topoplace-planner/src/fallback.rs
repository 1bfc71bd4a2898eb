//! Fallback placement when the search cannot or did not succeed.
//!
//! The fallback jitters the release point by up to `fallback_jitter`
//! pixels on each axis and clamps the result into the frame. It is
//! returned with `success = false` and carries no topology, collision or
//! reachability guarantee; callers should treat it as "proceed with
//! caution", not discard it.

use rand::distr::{Distribution, Uniform};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::types::{Dimensions, PlannerConfig, PlanningResult, Point};

/// Deterministic fallback placement near `regrasp`.
///
/// The jitter generator is seeded from `config.seed` on every call, so
/// the degenerate-input and exhausted-search paths return the same
/// point for the same inputs.
#[must_use]
pub fn fallback_point(regrasp: Point, frame: Dimensions, config: &PlannerConfig) -> Point {
    let jitter = config.fallback_jitter;
    let offset = match Uniform::new_inclusive(-jitter, jitter) {
        Ok(dist) => {
            let mut rng = StdRng::seed_from_u64(config.seed);
            Point::new(dist.sample(&mut rng), dist.sample(&mut rng))
        }
        // Non-finite or negative jitter: no perturbation.
        Err(_) => Point::new(0.0, 0.0),
    };

    let jittered = Point::new(regrasp.x + offset.x, regrasp.y + offset.y);
    if jittered.is_finite() {
        frame.clamp(jittered)
    } else {
        frame.clamp(Point::new(0.0, 0.0))
    }
}

/// The fallback wrapped as an unsuccessful [`PlanningResult`].
#[must_use]
pub fn fallback_result(regrasp: Point, frame: Dimensions, config: &PlannerConfig) -> PlanningResult {
    PlanningResult {
        success: false,
        point: fallback_point(regrasp, frame, config),
    }
}
