//! Pass-through diagnostic stream for a planning call.
//!
//! The sampler reports every evaluated candidate and the final outcome
//! to a [`PlanObserver`]. Observers are write-only from the planner's
//! point of view: nothing they do can influence which sample is
//! accepted.

use serde::{Deserialize, Serialize};

use crate::types::{PlanningResult, Point};

/// Outcome of the five acceptance predicates for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct PredicateChecks {
    /// The candidate path winds around an obstacle relative to the
    /// observed shape.
    pub homotopy_differs: bool,
    /// The candidate is not on the inflated obstacle surface.
    pub collision_free: bool,
    /// The candidate is strictly inside the robot's reach.
    pub reachable: bool,
    /// The distance to the start anchor is close to the release point's.
    pub near_start: bool,
    /// The distance to the end anchor is close to the release point's.
    pub near_end: bool,
}

impl PredicateChecks {
    /// Whether every predicate holds.
    #[must_use]
    pub const fn all(&self) -> bool {
        self.homotopy_differs
            && self.collision_free
            && self.reachable
            && self.near_start
            && self.near_end
    }
}

/// One evaluated candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleEvent {
    /// Zero-based index of the sampling iteration.
    pub iteration: usize,
    /// The candidate placement.
    pub point: Point,
    /// Predicate results for the candidate.
    pub checks: PredicateChecks,
}

impl SampleEvent {
    /// Whether this candidate was accepted.
    #[must_use]
    pub const fn accepted(&self) -> bool {
        self.checks.all()
    }
}

/// How a planning call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOutcome {
    /// A candidate satisfied every predicate.
    Accepted {
        /// Iteration at which it was drawn.
        iteration: usize,
    },
    /// The release point sits on an anchor (or the polyline is empty);
    /// no sample was drawn.
    Degenerate,
    /// The budget ran out, or no sample could be drawn, without an
    /// acceptable candidate.
    Exhausted,
}

impl PlanOutcome {
    /// Short human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Degenerate => "degenerate",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Receives planning progress.
///
/// All methods default to doing nothing so implementors pick the events
/// they care about.
pub trait PlanObserver {
    /// Called once per evaluated candidate, in iteration order.
    fn on_sample(&mut self, _event: &SampleEvent) {}

    /// Called exactly once when the call returns.
    fn on_finish(&mut self, _outcome: PlanOutcome, _result: &PlanningResult) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl PlanObserver for NullObserver {}

impl<T: PlanObserver + ?Sized> PlanObserver for &mut T {
    fn on_sample(&mut self, event: &SampleEvent) {
        (**self).on_sample(event);
    }

    fn on_finish(&mut self, outcome: PlanOutcome, result: &PlanningResult) {
        (**self).on_finish(outcome, result);
    }
}

/// Pairs fan every event out to both observers, left first.
impl<A: PlanObserver, B: PlanObserver> PlanObserver for (A, B) {
    fn on_sample(&mut self, event: &SampleEvent) {
        self.0.on_sample(event);
        self.1.on_sample(event);
    }

    fn on_finish(&mut self, outcome: PlanOutcome, result: &PlanningResult) {
        self.0.on_finish(outcome, result);
        self.1.on_finish(outcome, result);
    }
}

/// Observer that keeps the evaluated candidates for later rendering.
///
/// With a limit set, only the first `limit` samples are kept; the
/// accepted sample is always kept.
#[derive(Debug, Clone, Default)]
pub struct SampleRecorder {
    limit: Option<usize>,
    samples: Vec<SampleEvent>,
    finish: Option<(PlanOutcome, PlanningResult)>,
}

impl SampleRecorder {
    /// Record every sample.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record at most `limit` samples (plus the accepted one).
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Recorded samples in iteration order.
    #[must_use]
    pub fn samples(&self) -> &[SampleEvent] {
        &self.samples
    }

    /// The final outcome, once the call has finished.
    #[must_use]
    pub fn outcome(&self) -> Option<PlanOutcome> {
        self.finish.map(|(outcome, _)| outcome)
    }

    /// The returned result, once the call has finished.
    #[must_use]
    pub fn result(&self) -> Option<PlanningResult> {
        self.finish.map(|(_, result)| result)
    }
}

impl PlanObserver for SampleRecorder {
    fn on_sample(&mut self, event: &SampleEvent) {
        let under_limit = self.limit.is_none_or(|limit| self.samples.len() < limit);
        if under_limit || event.accepted() {
            self.samples.push(*event);
        }
    }

    fn on_finish(&mut self, outcome: PlanOutcome, result: &PlanningResult) {
        self.finish = Some((outcome, *result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TRUE: PredicateChecks = PredicateChecks {
        homotopy_differs: true,
        collision_free: true,
        reachable: true,
        near_start: true,
        near_end: true,
    };

    fn event(iteration: usize, checks: PredicateChecks) -> SampleEvent {
        SampleEvent {
            iteration,
            point: Point::new(1.0, 2.0),
            checks,
        }
    }

    #[test]
    fn all_requires_every_predicate() {
        assert!(ALL_TRUE.all());
        let variants = [
            PredicateChecks {
                homotopy_differs: false,
                ..ALL_TRUE
            },
            PredicateChecks {
                collision_free: false,
                ..ALL_TRUE
            },
            PredicateChecks {
                reachable: false,
                ..ALL_TRUE
            },
            PredicateChecks {
                near_start: false,
                ..ALL_TRUE
            },
            PredicateChecks {
                near_end: false,
                ..ALL_TRUE
            },
        ];
        for checks in variants {
            assert!(!checks.all(), "{checks:?} should not pass");
        }
    }

    #[test]
    fn recorder_keeps_samples_and_finish() {
        let mut recorder = SampleRecorder::new();
        let rejected = PredicateChecks {
            reachable: false,
            ..ALL_TRUE
        };
        recorder.on_sample(&event(0, rejected));
        recorder.on_sample(&event(1, ALL_TRUE));
        let result = PlanningResult {
            success: true,
            point: Point::new(1.0, 2.0),
        };
        recorder.on_finish(PlanOutcome::Accepted { iteration: 1 }, &result);

        assert_eq!(recorder.samples().len(), 2);
        assert!(!recorder.samples()[0].accepted());
        assert!(recorder.samples()[1].accepted());
        assert_eq!(
            recorder.outcome(),
            Some(PlanOutcome::Accepted { iteration: 1 })
        );
        assert_eq!(recorder.result(), Some(result));
    }

    #[test]
    fn recorder_limit_still_keeps_accepted_sample() {
        let mut recorder = SampleRecorder::with_limit(2);
        let rejected = PredicateChecks {
            near_end: false,
            ..ALL_TRUE
        };
        for i in 0..5 {
            recorder.on_sample(&event(i, rejected));
        }
        recorder.on_sample(&event(5, ALL_TRUE));
        let iterations: Vec<usize> = recorder.samples().iter().map(|e| e.iteration).collect();
        assert_eq!(iterations, vec![0, 1, 5]);
    }

    #[test]
    fn recorder_without_finish_has_no_outcome() {
        let recorder = SampleRecorder::new();
        assert!(recorder.outcome().is_none());
        assert!(recorder.result().is_none());
    }

    #[test]
    fn paired_observers_both_see_events() {
        let mut first = SampleRecorder::new();
        let mut second = SampleRecorder::with_limit(0);
        {
            let mut pair = (&mut first, &mut second);
            pair.on_sample(&event(0, ALL_TRUE));
            pair.on_finish(PlanOutcome::Exhausted, &PlanningResult {
                success: false,
                point: Point::new(0.0, 0.0),
            });
        }
        assert_eq!(first.samples().len(), 1);
        // Limit of zero still keeps the accepted sample.
        assert_eq!(second.samples().len(), 1);
        assert_eq!(first.outcome(), Some(PlanOutcome::Exhausted));
        assert_eq!(second.outcome(), Some(PlanOutcome::Exhausted));
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(PlanOutcome::Accepted { iteration: 3 }.label(), "accepted");
        assert_eq!(PlanOutcome::Degenerate.label(), "degenerate");
        assert_eq!(PlanOutcome::Exhausted.label(), "exhausted");
    }
}
