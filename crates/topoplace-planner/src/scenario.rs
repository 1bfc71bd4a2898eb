//! Recorded planning scene.
//!
//! A [`Scenario`] bundles everything one planning call needs, in a shape
//! that deserializes from JSON. It stays I/O-free: an obstacle mask is
//! referenced by path and decoded by the caller.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::obstacle::{DEFAULT_OBSTACLE_CLASS, Detection, ObstacleField};
use crate::sampler::PlanRequest;
use crate::types::{Dimensions, PlannerConfig, PlannerError, Point, Polyline};

fn default_obstacle_class() -> String {
    DEFAULT_OBSTACLE_CLASS.to_owned()
}

/// Inputs for one planning call, as recorded from a robot session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Visible frame size.
    pub frame: Dimensions,
    /// Observed shape of the object, start anchor first.
    pub polyline: Polyline,
    /// Release point proposed by the grasp planner.
    pub regrasp: Point,
    /// Robot base position in image coordinates.
    pub robot: Point,
    /// Perception detections; only `obstacle_class` ones are obstacles.
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Pre-extracted obstacle centroids, replacing the derived ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroids: Option<Vec<Point>>,
    /// Path to an occupancy mask image, relative to the scenario file.
    /// Takes precedence over `detections` for occupancy and centroids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_path: Option<String>,
    /// Detection class treated as an obstacle.
    #[serde(default = "default_obstacle_class")]
    pub obstacle_class: String,
    /// Planner parameters; missing fields take their defaults.
    #[serde(default)]
    pub config: PlannerConfig,
}

impl Scenario {
    /// Build the obstacle field for this scene.
    ///
    /// `mask` is the decoded image at `mask_path`, if any. Without a mask
    /// the field is rasterized from `detections`.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::DimensionMismatch`] if `mask` does not
    /// match `frame`.
    pub fn obstacle_field(&self, mask: Option<&GrayImage>) -> Result<ObstacleField, PlannerError> {
        let kernel = self.config.inflation_kernel;
        let field = match mask {
            Some(mask) => {
                let field = ObstacleField::from_mask(mask, kernel);
                field.check_frame(self.frame)?;
                field
            }
            None => ObstacleField::from_detections(
                self.frame,
                &self.detections,
                &self.obstacle_class,
                kernel,
            ),
        };
        Ok(match &self.centroids {
            Some(centroids) => field.with_centroids(centroids.clone()),
            None => field,
        })
    }

    /// A request borrowing this scene's geometry.
    #[must_use]
    pub const fn request<'a>(&'a self, obstacles: &'a ObstacleField) -> PlanRequest<'a> {
        PlanRequest {
            polyline: &self.polyline,
            regrasp: self.regrasp,
            obstacles,
            robot: self.robot,
            frame: self.frame,
        }
    }

    /// Check the configuration and geometry.
    ///
    /// # Errors
    ///
    /// Returns the first [`PlannerError`] raised by
    /// [`PlannerConfig::validate`] or [`PlanRequest::validate`].
    pub fn validate(&self, obstacles: &ObstacleField) -> Result<(), PlannerError> {
        self.config.validate()?;
        self.request(obstacles).validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;

    const MINIMAL: &str = r#"{
        "frame": { "width": 100, "height": 100 },
        "polyline": [ { "x": 10, "y": 10 }, { "x": 50, "y": 90 }, { "x": 90, "y": 90 } ],
        "regrasp": { "x": 50, "y": 90 },
        "robot": { "x": 50, "y": 50 }
    }"#;

    #[test]
    fn minimal_scenario_uses_defaults() {
        let scenario: Scenario = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(scenario.polyline.len(), 3);
        assert_eq!(scenario.obstacle_class, DEFAULT_OBSTACLE_CLASS);
        assert_eq!(scenario.config, PlannerConfig::default());
        assert!(scenario.detections.is_empty());

        let field = scenario.obstacle_field(None).unwrap();
        assert!(field.centroids().is_empty());
        assert!(scenario.validate(&field).is_ok());
    }

    #[test]
    fn detections_and_partial_config_are_read() {
        let json = r#"{
            "frame": { "width": 100, "height": 100 },
            "polyline": [ { "x": 10, "y": 10 }, { "x": 90, "y": 90 } ],
            "regrasp": { "x": 50, "y": 90 },
            "robot": { "x": 50, "y": 50 },
            "detections": [
                { "class": "battery", "polygon": [
                    { "x": 40, "y": 40 }, { "x": 60, "y": 40 },
                    { "x": 60, "y": 60 }, { "x": 40, "y": 60 } ] },
                { "class": "hose", "polygon": [
                    { "x": 0, "y": 0 }, { "x": 5, "y": 0 }, { "x": 5, "y": 5 } ] }
            ],
            "config": { "robot_reach_radius": 200, "seed": 7 }
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert!((scenario.config.robot_reach_radius - 200.0).abs() < f64::EPSILON);
        assert_eq!(scenario.config.seed, 7);
        assert_eq!(
            scenario.config.max_iterations,
            PlannerConfig::DEFAULT_MAX_ITERATIONS
        );

        let field = scenario.obstacle_field(None).unwrap();
        assert_eq!(field.centroids().len(), 1);
        assert!(field.centroids()[0].distance(Point::new(50.0, 50.0)) < 1.0);
    }

    #[test]
    fn supplied_centroids_override_derived_ones() {
        let mut scenario: Scenario = serde_json::from_str(MINIMAL).unwrap();
        scenario.centroids = Some(vec![Point::new(30.0, 70.0)]);
        let field = scenario.obstacle_field(None).unwrap();
        assert_eq!(field.centroids(), &[Point::new(30.0, 70.0)]);
    }

    #[test]
    fn mask_takes_precedence_and_must_match_frame() {
        let scenario: Scenario = serde_json::from_str(MINIMAL).unwrap();
        let mut mask = GrayImage::new(100, 100);
        mask.put_pixel(20, 30, Luma([255]));
        let field = scenario.obstacle_field(Some(&mask)).unwrap();
        assert_eq!(field.centroids(), &[Point::new(20.0, 30.0)]);

        let wrong = GrayImage::new(64, 64);
        assert!(matches!(
            scenario.obstacle_field(Some(&wrong)),
            Err(PlannerError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn invalid_config_is_reported_by_validate() {
        let mut scenario: Scenario = serde_json::from_str(MINIMAL).unwrap();
        scenario.config.near_tolerance = -1.0;
        let field = scenario.obstacle_field(None).unwrap();
        assert!(matches!(
            scenario.validate(&field),
            Err(PlannerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn scenario_survives_json() {
        let scenario: Scenario = serde_json::from_str(MINIMAL).unwrap();
        let json = serde_json::to_string(&scenario).unwrap();
        let back: Scenario = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scenario);
    }
}
