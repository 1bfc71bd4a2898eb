//! Constrained rejection sampling for the placement point.
//!
//! Candidates are drawn uniformly over the frame plus a margin, from a
//! generator seeded by [`PlannerConfig::seed`], and the first one that
//! satisfies every constraint is returned. There is no attempt to find
//! a best candidate: for identical inputs the same sample is accepted
//! every time.
//!
//! A candidate is accepted when:
//!
//! 1. the path `start -> candidate -> end` winds around an obstacle
//!    relative to the observed shape,
//! 2. it is not on the inflated obstacle surface,
//! 3. it is strictly inside the robot's reach,
//! 4. its distance to the start anchor deviates little from the release
//!    point's, and
//! 5. likewise for the end anchor.

use rand::distr::{Distribution, Uniform};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::fallback::fallback_result;
use crate::homotopy::HomotopyComparator;
use crate::obstacle::ObstacleField;
use crate::observer::{NullObserver, PlanObserver, PlanOutcome, PredicateChecks, SampleEvent};
use crate::types::{Dimensions, PlannerConfig, PlannerError, PlanningResult, Point, Polyline};

/// Inputs for one planning call.
///
/// Everything here is read-only for the duration of the call.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    /// Observed shape of the object, `start` anchor first.
    pub polyline: &'a Polyline,
    /// Release point proposed by the grasp planner.
    pub regrasp: Point,
    /// Obstacles over the frame.
    pub obstacles: &'a ObstacleField,
    /// Robot base position in image coordinates.
    pub robot: Point,
    /// Visible frame size.
    pub frame: Dimensions,
}

impl PlanRequest<'_> {
    /// Reject geometry the planner is not meant to handle.
    ///
    /// [`plan`] never panics on malformed input, but its answer is
    /// meaningless for it; callers should validate at their boundary.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::MalformedGeometry`] for a polyline with
    /// fewer than two points, non-finite coordinates, or an empty frame,
    /// and [`PlannerError::DimensionMismatch`] when the obstacle field
    /// does not cover the frame.
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.polyline.len() < 2 {
            return Err(PlannerError::MalformedGeometry(format!(
                "polyline needs at least 2 points, got {}",
                self.polyline.len()
            )));
        }
        if let Some(i) = self.polyline.points().iter().position(|p| !p.is_finite()) {
            return Err(PlannerError::MalformedGeometry(format!(
                "polyline point {i} is not finite"
            )));
        }
        for (name, p) in [("regrasp point", self.regrasp), ("robot position", self.robot)] {
            if !p.is_finite() {
                return Err(PlannerError::MalformedGeometry(format!(
                    "{name} is not finite"
                )));
            }
        }
        if self.frame.is_empty() {
            return Err(PlannerError::MalformedGeometry(format!(
                "frame {}x{} has no area",
                self.frame.width, self.frame.height
            )));
        }
        self.obstacles.check_frame(self.frame)
    }
}

/// Squared relative deviation of `‖sample − anchor‖` from `reference`.
#[must_use]
pub fn relative_distance_deviation(reference: f64, sample: Point, anchor: Point) -> f64 {
    let deviation = (sample.distance(anchor) - reference) / reference;
    deviation * deviation
}

/// The five acceptance predicates, prepared for one request.
#[derive(Debug, Clone)]
pub struct PlacementConstraints<'a> {
    start: Point,
    end: Point,
    dist_to_start0: f64,
    dist_to_end0: f64,
    robot: Point,
    reach_radius: f64,
    near_tolerance: f64,
    obstacles: &'a ObstacleField,
    comparator: HomotopyComparator,
}

impl<'a> PlacementConstraints<'a> {
    /// Prepare the predicates, or `None` if the polyline is empty.
    #[must_use]
    pub fn new(request: &PlanRequest<'a>, config: &PlannerConfig) -> Option<Self> {
        let start = request.polyline.start()?;
        let end = request.polyline.end()?;
        Some(Self {
            start,
            end,
            dist_to_start0: request.regrasp.distance(start),
            dist_to_end0: request.regrasp.distance(end),
            robot: request.robot,
            reach_radius: config.robot_reach_radius,
            near_tolerance: config.near_tolerance,
            obstacles: request.obstacles,
            comparator: HomotopyComparator::new(
                start,
                end,
                request.polyline.waypoints(),
                config.winding_method,
            ),
        })
    }

    /// Distances from the release point to the start and end anchors.
    #[must_use]
    pub const fn reference_distances(&self) -> (f64, f64) {
        (self.dist_to_start0, self.dist_to_end0)
    }

    /// Evaluate every predicate for `candidate`.
    #[must_use]
    pub fn evaluate(&self, candidate: Point) -> PredicateChecks {
        PredicateChecks {
            homotopy_differs: self
                .comparator
                .differs(candidate, self.obstacles.centroids()),
            collision_free: !self.obstacles.is_in_collision(candidate),
            reachable: self.robot.distance(candidate) < self.reach_radius,
            near_start: relative_distance_deviation(self.dist_to_start0, candidate, self.start)
                < self.near_tolerance,
            near_end: relative_distance_deviation(self.dist_to_end0, candidate, self.end)
                < self.near_tolerance,
        }
    }
}

/// Uniform sampling rectangle: the frame grown by a margin on all sides.
#[derive(Debug, Clone, Copy)]
struct SamplingRegion {
    x: Uniform<f64>,
    y: Uniform<f64>,
}

impl SamplingRegion {
    /// `None` when the rectangle is empty or not finite.
    fn new(frame: Dimensions, margin: f64) -> Option<Self> {
        let x = Uniform::new(-margin, f64::from(frame.width) + margin).ok()?;
        let y = Uniform::new(-margin, f64::from(frame.height) + margin).ok()?;
        Some(Self { x, y })
    }

    fn sample(&self, rng: &mut StdRng) -> Point {
        let x = self.x.sample(rng);
        let y = self.y.sample(rng);
        Point::new(x, y)
    }
}

/// Plan a placement point.
///
/// Returns `success = true` with the first sample satisfying every
/// constraint. Otherwise returns the fallback placement with
/// `success = false`: immediately when the release point coincides with
/// an anchor, or after the sampling budget runs out.
#[must_use]
pub fn plan(request: &PlanRequest<'_>, config: &PlannerConfig) -> PlanningResult {
    plan_observed(request, config, &mut NullObserver)
}

/// [`plan`], reporting every evaluated sample and the outcome to
/// `observer`.
pub fn plan_observed<O>(
    request: &PlanRequest<'_>,
    config: &PlannerConfig,
    observer: &mut O,
) -> PlanningResult
where
    O: PlanObserver + ?Sized,
{
    run(request, config, observer).0
}

/// Search, report the finish, and hand back the outcome as well.
pub(crate) fn run<O>(
    request: &PlanRequest<'_>,
    config: &PlannerConfig,
    observer: &mut O,
) -> (PlanningResult, PlanOutcome)
where
    O: PlanObserver + ?Sized,
{
    let (result, outcome) = search(request, config, observer);
    observer.on_finish(outcome, &result);
    (result, outcome)
}

fn search<O>(
    request: &PlanRequest<'_>,
    config: &PlannerConfig,
    observer: &mut O,
) -> (PlanningResult, PlanOutcome)
where
    O: PlanObserver + ?Sized,
{
    let fallback = || fallback_result(request.regrasp, request.frame, config);

    let Some(constraints) = PlacementConstraints::new(request, config) else {
        log::warn!("empty polyline, using fallback placement");
        return (fallback(), PlanOutcome::Degenerate);
    };
    if request.regrasp.approx_eq(constraints.start) || request.regrasp.approx_eq(constraints.end)
    {
        log::warn!(
            "release point ({:.1}, {:.1}) is on an anchor, using fallback placement",
            request.regrasp.x,
            request.regrasp.y
        );
        return (fallback(), PlanOutcome::Degenerate);
    }

    let Some(region) = SamplingRegion::new(request.frame, config.extend_margin) else {
        log::warn!(
            "empty sampling region for frame {}x{} with margin {}, using fallback placement",
            request.frame.width,
            request.frame.height,
            config.extend_margin
        );
        return (fallback(), PlanOutcome::Exhausted);
    };

    log::debug!(
        "planning placement: {} polyline points, {} obstacles, budget {}",
        request.polyline.len(),
        request.obstacles.centroids().len(),
        config.max_iterations
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    for iteration in 0..config.max_iterations {
        let point = region.sample(&mut rng);
        let checks = constraints.evaluate(point);
        observer.on_sample(&SampleEvent {
            iteration,
            point,
            checks,
        });
        if checks.all() {
            log::debug!(
                "accepted ({:.1}, {:.1}) at iteration {iteration}",
                point.x,
                point.y
            );
            return (
                PlanningResult {
                    success: true,
                    point,
                },
                PlanOutcome::Accepted { iteration },
            );
        }
    }

    log::warn!(
        "no placement found in {} samples, using fallback placement",
        config.max_iterations
    );
    (fallback(), PlanOutcome::Exhausted)
}
