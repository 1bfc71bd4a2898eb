//! Planning diagnostics: timing, sample counts, and rejection reasons.
//!
//! These diagnostics are permanent instrumentation for tuning the
//! planner's parameters against recorded scenes. They are collected by
//! an ordinary [`PlanObserver`], so gathering them cannot change which
//! sample is accepted.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observer::{PlanObserver, PlanOutcome, SampleEvent};
use crate::sampler::{PlanRequest, run};
use crate::types::{Dimensions, PlannerConfig, PlanningResult, Point};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for [`plan_with_diagnostics`].
///
/// The planner library does not read the system clock itself; binaries
/// supply an implementation (typically backed by `std::time::Instant`).
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Per-predicate rejection counts.
///
/// A sample failing several predicates is counted once under each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    /// Samples whose path is homotopic to the observed shape.
    pub homotopy: usize,
    /// Samples on the inflated obstacle surface.
    pub collision: usize,
    /// Samples outside the robot's reach.
    pub reach: usize,
    /// Samples too far from (or too close to) the start anchor.
    pub near_start: usize,
    /// Samples too far from (or too close to) the end anchor.
    pub near_end: usize,
}

impl RejectionCounts {
    fn record(&mut self, event: &SampleEvent) {
        let checks = &event.checks;
        self.homotopy += usize::from(!checks.homotopy_differs);
        self.collision += usize::from(!checks.collision_free);
        self.reach += usize::from(!checks.reachable);
        self.near_start += usize::from(!checks.near_start);
        self.near_end += usize::from(!checks.near_end);
    }

    fn rows(&self) -> [(&'static str, usize); 5] {
        [
            ("homotopy", self.homotopy),
            ("collision", self.collision),
            ("reach", self.reach),
            ("near start", self.near_start),
            ("near end", self.near_end),
        ]
    }
}

/// Summary of the obstacle field a call was planned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleSummary {
    /// Number of obstacle centroids used by the homotopy test.
    pub centroid_count: usize,
    /// Occupied pixels before inflation.
    pub occupied_pixels: u64,
    /// Occupied pixels after inflation.
    pub inflated_pixels: u64,
}

/// Diagnostics collected from a single planning call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDiagnostics {
    /// How the call ended.
    pub outcome: PlanOutcome,
    /// The returned placement.
    pub result: PlanningResult,
    /// Number of samples evaluated.
    pub samples: usize,
    /// Samples that failed at least one predicate.
    pub rejected: usize,
    /// Which predicates rejected samples.
    pub rejections: RejectionCounts,
    /// Visible frame size.
    pub frame: Dimensions,
    /// Number of points in the observed shape.
    pub polyline_points: usize,
    /// Obstacle field summary.
    pub obstacles: ObstacleSummary,
    /// Wall-clock duration of the call (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl PlanDiagnostics {
    /// Fraction of evaluated samples that were rejected, or `0.0` when no
    /// sample was drawn.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rejection_rate(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.rejected as f64 / self.samples as f64
        }
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Placement Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Frame: {}x{} ({} pixels)",
            self.frame.width,
            self.frame.height,
            self.frame.pixel_count(),
        ));
        lines.push(format!(
            "Obstacles: {} centroids, {} px occupied, {} px inflated",
            self.obstacles.centroid_count,
            self.obstacles.occupied_pixels,
            self.obstacles.inflated_pixels,
        ));
        lines.push(format!("Polyline: {} points", self.polyline_points));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        let outcome = match self.outcome {
            PlanOutcome::Accepted { iteration } => format!("accepted at iteration {iteration}"),
            other => other.label().to_string(),
        };
        lines.push(format!("Outcome: {outcome}"));
        lines.push(format!(
            "Placement: ({:.2}, {:.2}) success={}",
            self.result.point.x, self.result.point.y, self.result.success,
        ));
        lines.push(format!(
            "Samples: {}  |  Rejected: {} ({:.1}%)",
            self.samples,
            self.rejected,
            self.rejection_rate() * 100.0,
        ));
        lines.push(String::new());

        lines.push(format!("{:<16} {:>10} {:>10}", "Predicate", "Rejected", "% Samples"));
        lines.push("-".repeat(40));
        for (name, count) in self.rejections.rows() {
            lines.push(format!(
                "{name:<16} {count:>10} {:>9.1}%",
                percent(count, self.samples)
            ));
        }

        lines.join("\n")
    }
}

/// Observer that accumulates [`PlanDiagnostics`] counters.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsObserver {
    samples: usize,
    rejected: usize,
    rejections: RejectionCounts,
}

impl DiagnosticsObserver {
    /// Fresh counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples seen so far.
    #[must_use]
    pub const fn samples(&self) -> usize {
        self.samples
    }

    /// Rejection counts so far.
    #[must_use]
    pub const fn rejections(&self) -> RejectionCounts {
        self.rejections
    }
}

impl PlanObserver for DiagnosticsObserver {
    fn on_sample(&mut self, event: &SampleEvent) {
        self.samples += 1;
        if !event.accepted() {
            self.rejected += 1;
            self.rejections.record(event);
        }
    }
}

/// Run [`plan`](crate::plan) and collect diagnostics alongside the
/// result.
pub fn plan_with_diagnostics<C: Clock>(
    request: &PlanRequest<'_>,
    config: &PlannerConfig,
    clock: &C,
) -> (PlanningResult, PlanDiagnostics) {
    plan_with_diagnostics_observed(request, config, clock, &mut crate::observer::NullObserver)
}

/// [`plan_with_diagnostics`], also forwarding every event to `observer`.
pub fn plan_with_diagnostics_observed<C, O>(
    request: &PlanRequest<'_>,
    config: &PlannerConfig,
    clock: &C,
    observer: &mut O,
) -> (PlanningResult, PlanDiagnostics)
where
    C: Clock,
    O: PlanObserver,
{
    let started = clock.now();
    let mut counters = DiagnosticsObserver::new();
    let (result, outcome) = run(request, config, &mut (&mut counters, observer));
    let total_duration = clock.elapsed(&started);

    let diagnostics = PlanDiagnostics {
        outcome,
        result,
        samples: counters.samples,
        rejected: counters.rejected,
        rejections: counters.rejections,
        frame: request.frame,
        polyline_points: request.polyline.len(),
        obstacles: ObstacleSummary {
            centroid_count: request.obstacles.centroids().len(),
            occupied_pixels: request.obstacles.obstacle_pixel_count(),
            inflated_pixels: request.obstacles.inflated_pixel_count(),
        },
        total_duration,
    };

    log::info!(
        "placement {} at ({:.1}, {:.1}) after {} samples in {:.3}ms",
        diagnostics.outcome.label(),
        result.point.x,
        result.point.y,
        diagnostics.samples,
        duration_ms(total_duration),
    );

    (result, diagnostics)
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Mean placement over several diagnostics, for multi-run summaries.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_point(all: &[PlanDiagnostics]) -> Option<Point> {
    if all.is_empty() {
        return None;
    }
    let n = all.len() as f64;
    let (sx, sy) = all
        .iter()
        .fold((0.0, 0.0), |(sx, sy), d| (sx + d.result.point.x, sy + d.result.point.y));
    Some(Point::new(sx / n, sy / n))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use image::{GrayImage, Luma};

    use super::*;
    use crate::obstacle::ObstacleField;
    use crate::observer::{PredicateChecks, SampleRecorder};
    use crate::types::Polyline;

    /// Clock that advances one millisecond per reading.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl TickClock {
        fn new() -> Self {
            Self {
                ticks: Cell::new(0),
            }
        }
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn scene() -> (Polyline, ObstacleField) {
        let polyline = Polyline::new(vec![
            Point::new(10.0, 10.0),
            Point::new(50.0, 90.0),
            Point::new(90.0, 90.0),
        ]);
        let mask = GrayImage::from_fn(100, 100, |x, y| {
            if (45..=55).contains(&x) && (45..=55).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        (polyline, ObstacleField::from_mask(&mask, 0))
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn rejection_counts_tally_each_failing_predicate() {
        let mut counts = RejectionCounts::default();
        counts.record(&SampleEvent {
            iteration: 0,
            point: Point::new(0.0, 0.0),
            checks: PredicateChecks {
                homotopy_differs: false,
                collision_free: true,
                reachable: false,
                near_start: true,
                near_end: false,
            },
        });
        assert_eq!(
            counts,
            RejectionCounts {
                homotopy: 1,
                collision: 0,
                reach: 1,
                near_start: 0,
                near_end: 1,
            }
        );
    }

    #[test]
    fn diagnostics_match_the_plain_result() {
        let (polyline, obstacles) = scene();
        let request = PlanRequest {
            polyline: &polyline,
            regrasp: Point::new(50.0, 90.0),
            obstacles: &obstacles,
            robot: Point::new(50.0, 50.0),
            frame: Dimensions::new(100, 100),
        };
        let config = PlannerConfig {
            robot_reach_radius: 200.0,
            ..PlannerConfig::default()
        };
        let plain = crate::plan(&request, &config);
        let (result, diag) = plan_with_diagnostics(&request, &config, &TickClock::new());

        assert_eq!(plain, result);
        assert_eq!(diag.result, result);
        assert!(result.success);
        let PlanOutcome::Accepted { iteration } = diag.outcome else {
            unreachable!("expected acceptance");
        };
        assert_eq!(diag.samples, iteration + 1);
        assert_eq!(diag.rejected, iteration);
        assert_eq!(diag.total_duration, Duration::from_millis(1));
        assert_eq!(diag.obstacles.centroid_count, 1);
        assert_eq!(diag.obstacles.occupied_pixels, 121);
        assert_eq!(diag.polyline_points, 3);
    }

    #[test]
    fn forwarded_observer_sees_same_samples() {
        let (polyline, obstacles) = scene();
        let request = PlanRequest {
            polyline: &polyline,
            regrasp: Point::new(50.0, 90.0),
            obstacles: &obstacles,
            robot: Point::new(50.0, 50.0),
            frame: Dimensions::new(100, 100),
        };
        let config = PlannerConfig {
            robot_reach_radius: 200.0,
            ..PlannerConfig::default()
        };
        let mut recorder = SampleRecorder::new();
        let (result, diag) =
            plan_with_diagnostics_observed(&request, &config, &TickClock::new(), &mut recorder);
        assert_eq!(recorder.samples().len(), diag.samples);
        assert_eq!(recorder.result(), Some(result));
        assert_eq!(recorder.outcome(), Some(diag.outcome));
    }

    #[test]
    fn degenerate_call_reports_no_samples() {
        let (polyline, obstacles) = scene();
        let request = PlanRequest {
            polyline: &polyline,
            regrasp: Point::new(10.0, 10.0),
            obstacles: &obstacles,
            robot: Point::new(50.0, 50.0),
            frame: Dimensions::new(100, 100),
        };
        let (result, diag) =
            plan_with_diagnostics(&request, &PlannerConfig::default(), &TickClock::new());
        assert!(!result.success);
        assert_eq!(diag.outcome, PlanOutcome::Degenerate);
        assert_eq!(diag.samples, 0);
        assert!((diag.rejection_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn report_produces_nonempty_string() {
        let diag = PlanDiagnostics {
            outcome: PlanOutcome::Accepted { iteration: 41 },
            result: PlanningResult {
                success: true,
                point: Point::new(70.0, 30.0),
            },
            samples: 42,
            rejected: 41,
            rejections: RejectionCounts {
                homotopy: 30,
                collision: 2,
                reach: 0,
                near_start: 20,
                near_end: 25,
            },
            frame: Dimensions::new(100, 100),
            polyline_points: 3,
            obstacles: ObstacleSummary {
                centroid_count: 1,
                occupied_pixels: 121,
                inflated_pixels: 900,
            },
            total_duration: Duration::from_millis(3),
        };

        let report = diag.report();
        assert!(report.contains("Placement Diagnostics Report"));
        assert!(report.contains("accepted at iteration 41"));
        assert!(report.contains("homotopy"));
        assert!(report.contains("Frame: 100x100"));
    }

    #[test]
    fn diagnostics_serialize_duration_as_seconds() {
        let diag = PlanDiagnostics {
            outcome: PlanOutcome::Exhausted,
            result: PlanningResult {
                success: false,
                point: Point::new(1.0, 2.0),
            },
            samples: 0,
            rejected: 0,
            rejections: RejectionCounts::default(),
            frame: Dimensions::new(10, 10),
            polyline_points: 2,
            obstacles: ObstacleSummary {
                centroid_count: 0,
                occupied_pixels: 0,
                inflated_pixels: 0,
            },
            total_duration: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&diag).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 1.5).abs() < 1e-12);
        let back: PlanDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back, diag);
    }

    #[test]
    fn mean_point_averages_results() {
        assert!(mean_point(&[]).is_none());
        let mut a = PlanDiagnostics {
            outcome: PlanOutcome::Exhausted,
            result: PlanningResult {
                success: false,
                point: Point::new(0.0, 10.0),
            },
            samples: 0,
            rejected: 0,
            rejections: RejectionCounts::default(),
            frame: Dimensions::new(10, 10),
            polyline_points: 2,
            obstacles: ObstacleSummary {
                centroid_count: 0,
                occupied_pixels: 0,
                inflated_pixels: 0,
            },
            total_duration: Duration::ZERO,
        };
        let b = a.clone();
        a.result.point = Point::new(4.0, 0.0);
        assert_eq!(mean_point(&[a, b]), Some(Point::new(2.0, 5.0)));
    }
}
