//! topoplace-planner: Topology-aware placement planning (sans-IO).
//!
//! Given the observed shape of a deformable linear object (a hose, a
//! cable) as a polyline, a release point proposed by an upstream grasp
//! planner, and the obstacles in view, picks where to set the free end
//! down so that the object ends up wound differently around the
//! obstacles than it is now, while staying off the obstacles, within the
//! robot's reach, and plausibly far from both anchors:
//!
//! obstacle field -> reference path -> constrained sampling ->
//! (fallback on failure).
//!
//! Everything happens in the 2D image plane. This crate has **no I/O
//! dependencies**: masks arrive decoded or as in-memory bytes, and
//! results are plain data. Scene files and rendering live in the bench
//! and export crates.

pub mod diagnostics;
pub mod fallback;
pub mod homotopy;
pub mod observer;
pub mod obstacle;
pub mod path;
pub mod sampler;
pub mod scenario;
pub mod types;

pub use diagnostics::{Clock, PlanDiagnostics, plan_with_diagnostics};
pub use homotopy::{HomotopyComparator, WindingMethod};
pub use observer::{PlanObserver, PlanOutcome, PredicateChecks, SampleEvent, SampleRecorder};
pub use obstacle::{Detection, ObstacleField};
pub use sampler::{PlanRequest, plan, plan_observed};
pub use scenario::Scenario;
pub use types::{Dimensions, GrayImage, PlannerConfig, PlannerError, PlanningResult, Point, Polyline};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Two obstacles side by side, below the hose.
    fn two_obstacle_mask() -> GrayImage {
        GrayImage::from_fn(200, 100, |x, y| {
            let left = (40..=50).contains(&x) && (45..=55).contains(&y);
            let right = (150..=160).contains(&x) && (45..=55).contains(&y);
            image::Luma([if left || right { 255 } else { 0 }])
        })
    }

    #[test]
    fn field_from_png_bytes_plans_end_to_end() {
        use image::ImageEncoder;

        let mask = two_obstacle_mask();
        let mut png = Vec::new();
        image::codecs::png::PngEncoder::new(&mut png)
            .write_image(
                mask.as_raw(),
                mask.width(),
                mask.height(),
                image::ExtendedColorType::L8,
            )
            .unwrap();

        let decoded = obstacle::decode_mask(&png).unwrap();
        let obstacles = ObstacleField::from_mask(&decoded, 6);
        assert_eq!(obstacles.centroids().len(), 2);

        let polyline = Polyline::new(vec![
            Point::new(10.0, 20.0),
            Point::new(100.0, 20.0),
            Point::new(190.0, 20.0),
        ]);
        let request = PlanRequest {
            polyline: &polyline,
            regrasp: Point::new(100.0, 20.0),
            obstacles: &obstacles,
            robot: Point::new(100.0, 50.0),
            frame: Dimensions::new(200, 100),
        };
        let config = PlannerConfig::default();
        config.validate().unwrap();
        request.validate().unwrap();

        let result = plan(&request, &config);
        assert!(result.success);
        assert!(!obstacles.is_in_collision(result.point));
        assert!(homotopy::differs(
            Point::new(10.0, 20.0),
            Point::new(190.0, 20.0),
            polyline.waypoints(),
            result.point,
            obstacles.centroids(),
            config.winding_method,
        ));
    }

    #[test]
    fn different_seeds_may_differ_but_each_is_reproducible() {
        let obstacles = ObstacleField::from_mask(&two_obstacle_mask(), 0);
        let polyline = Polyline::new(vec![
            Point::new(10.0, 20.0),
            Point::new(100.0, 20.0),
            Point::new(190.0, 20.0),
        ]);
        let request = PlanRequest {
            polyline: &polyline,
            regrasp: Point::new(100.0, 20.0),
            obstacles: &obstacles,
            robot: Point::new(100.0, 50.0),
            frame: Dimensions::new(200, 100),
        };
        for seed in [0, 1, 42] {
            let config = PlannerConfig {
                seed,
                ..PlannerConfig::default()
            };
            assert_eq!(plan(&request, &config), plan(&request, &config));
        }
    }
}
