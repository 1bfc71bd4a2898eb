//! Shared types for the topoplace placement planner.

use serde::{Deserialize, Serialize};

use crate::homotopy::WindingMethod;

/// Re-export `GrayImage` so downstream crates can build obstacle masks
/// without depending on `image` directly.
pub use image::GrayImage;

/// Absolute tolerance used by [`Point::approx_eq`].
const APPROX_ABS_TOL: f64 = 1e-8;

/// Relative tolerance used by [`Point::approx_eq`].
const APPROX_REL_TOL: f64 = 1e-5;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Vector from `origin` to `self`.
    #[must_use]
    pub fn relative_to(self, origin: Self) -> Self {
        Self::new(self.x - origin.x, self.y - origin.y)
    }

    /// Dot product, treating both points as vectors from the origin.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }

    /// Z component of the cross product `self × other`.
    #[must_use]
    pub fn cross(self, other: Self) -> f64 {
        self.x.mul_add(other.y, -(self.y * other.x))
    }

    /// Linear interpolation: `self` at `t = 0`, `other` at `t = 1`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            t.mul_add(other.x - self.x, self.x),
            t.mul_add(other.y - self.y, self.y),
        )
    }

    /// Both coordinates are finite (not NaN or infinite).
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Component-wise closeness with a small absolute and relative
    /// tolerance: `|a - b| <= 1e-8 + 1e-5 * |b|`.
    ///
    /// Used to detect a release point sitting on one of the anchors.
    #[must_use]
    pub fn approx_eq(self, other: Self) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= APPROX_REL_TOL.mul_add(b.abs(), APPROX_ABS_TOL);
        close(self.x, other.x) && close(self.y, other.y)
    }
}

/// Ordered points along the observed shape of the deformable object.
///
/// The first point is the `start` anchor, the last is the `end` anchor,
/// and everything between them is a waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// The start anchor, if any.
    #[must_use]
    pub fn start(&self) -> Option<Point> {
        self.0.first().copied()
    }

    /// The end anchor, if any.
    #[must_use]
    pub fn end(&self) -> Option<Point> {
        self.0.last().copied()
    }

    /// Interior points, excluding both anchors.
    ///
    /// Empty for polylines with fewer than three points.
    #[must_use]
    pub fn waypoints(&self) -> &[Point] {
        if self.0.len() < 3 {
            &[]
        } else {
            &self.0[1..self.0.len() - 1]
        }
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the frame covers no pixels.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamp a point into the closed rectangle `[0, width] × [0, height]`.
    #[must_use]
    pub fn clamp(self, p: Point) -> Point {
        Point::new(
            p.x.clamp(0.0, f64::from(self.width)),
            p.y.clamp(0.0, f64::from(self.height)),
        )
    }
}

/// The planner's only durable output.
///
/// When `success` is `false` the point comes from the fallback policy:
/// still usable as a placement target, but it carries no topology,
/// collision, or reachability guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanningResult {
    /// Whether a sample satisfying every constraint was found.
    pub success: bool,
    /// Placement point in image coordinates.
    pub point: Point,
}

/// Configuration for the placement planner.
///
/// All parameters have defaults matching the values the planner was
/// tuned with on the hose regrasping demo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum distance (pixels) from the robot to an accepted placement.
    /// Samples at exactly this distance are rejected.
    pub robot_reach_radius: f64,

    /// How far (pixels) outside the visible frame samples may be drawn.
    pub extend_margin: f64,

    /// Upper bound on the squared relative deviation between a sample's
    /// distance to each anchor and the release point's distance to it.
    pub near_tolerance: f64,

    /// Sampling budget before giving up and using the fallback.
    pub max_iterations: usize,

    /// Seed for the sampling and fallback generators.
    pub seed: u64,

    /// How winding numbers are computed by the homotopy test.
    pub winding_method: WindingMethod,

    /// Half-width (pixels) of the square jitter added to the release
    /// point by the fallback policy.
    pub fallback_jitter: f64,

    /// Side length (pixels) of the square dilation kernel used to
    /// inflate obstacle masks. Zero disables inflation.
    pub inflation_kernel: u32,
}

impl PlannerConfig {
    /// Default robot reach radius in pixels.
    pub const DEFAULT_ROBOT_REACH_RADIUS: f64 = 750.0;
    /// Default out-of-frame sampling margin in pixels.
    pub const DEFAULT_EXTEND_MARGIN: f64 = 100.0;
    /// Default anchor-distance tolerance.
    pub const DEFAULT_NEAR_TOLERANCE: f64 = 0.30;
    /// Default sampling budget.
    pub const DEFAULT_MAX_ITERATIONS: usize = 5000;
    /// Default generator seed.
    pub const DEFAULT_SEED: u64 = 0;
    /// Default fallback jitter half-width in pixels.
    pub const DEFAULT_FALLBACK_JITTER: f64 = 150.0;
    /// Default obstacle inflation kernel size in pixels.
    pub const DEFAULT_INFLATION_KERNEL: u32 = 20;
    /// Largest supported inflation kernel.
    pub const MAX_INFLATION_KERNEL: u32 = 255;

    /// Check that every parameter is usable by the planner.
    ///
    /// A zero `max_iterations` is accepted: every call then resolves
    /// straight to the fallback.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), PlannerError> {
        let non_negative = [
            ("robot_reach_radius", self.robot_reach_radius),
            ("extend_margin", self.extend_margin),
            ("near_tolerance", self.near_tolerance),
            ("fallback_jitter", self.fallback_jitter),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(PlannerError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        self.winding_method.validate()?;
        if self.inflation_kernel > Self::MAX_INFLATION_KERNEL {
            return Err(PlannerError::InvalidConfig(format!(
                "inflation_kernel must be at most {}, got {}",
                Self::MAX_INFLATION_KERNEL,
                self.inflation_kernel
            )));
        }
        Ok(())
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            robot_reach_radius: Self::DEFAULT_ROBOT_REACH_RADIUS,
            extend_margin: Self::DEFAULT_EXTEND_MARGIN,
            near_tolerance: Self::DEFAULT_NEAR_TOLERANCE,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            seed: Self::DEFAULT_SEED,
            winding_method: WindingMethod::default(),
            fallback_jitter: Self::DEFAULT_FALLBACK_JITTER,
            inflation_kernel: Self::DEFAULT_INFLATION_KERNEL,
        }
    }
}

/// Errors raised at the planner's input boundary.
///
/// Planning itself never fails: degenerate input and an exhausted
/// search both resolve to the fallback placement. These errors cover
/// configuration and geometry that callers should reject before
/// planning.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// Failed to decode an obstacle mask image.
    #[error("failed to decode obstacle mask: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The obstacle mask bytes were empty.
    #[error("obstacle mask data is empty")]
    EmptyInput,

    /// Planner configuration is invalid.
    #[error("invalid planner configuration: {0}")]
    InvalidConfig(String),

    /// Input geometry cannot be planned over.
    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    /// An obstacle mask does not cover the planning frame exactly.
    #[error(
        "obstacle mask is {}x{} but the frame is {}x{}",
        actual.width,
        actual.height,
        expected.width,
        expected.height
    )]
    DimensionMismatch {
        /// Frame dimensions.
        expected: Dimensions,
        /// Mask dimensions.
        actual: Dimensions,
    },
}

/// Serde-compatible proxy for `PlannerError`.
#[derive(Serialize, Deserialize)]
enum PlannerErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidConfig(String),
    MalformedGeometry(String),
    DimensionMismatch {
        expected: Dimensions,
        actual: Dimensions,
    },
}

impl Serialize for PlannerError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PlannerErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PlannerErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => PlannerErrorProxy::InvalidConfig(s.clone()),
            Self::MalformedGeometry(s) => PlannerErrorProxy::MalformedGeometry(s.clone()),
            Self::DimensionMismatch { expected, actual } => PlannerErrorProxy::DimensionMismatch {
                expected: *expected,
                actual: *actual,
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PlannerError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PlannerErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image error cannot be rebuilt; keep its message.
            PlannerErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("obstacle mask decode error: {msg}"))
            }
            PlannerErrorProxy::EmptyInput => Self::EmptyInput,
            PlannerErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            PlannerErrorProxy::MalformedGeometry(s) => Self::MalformedGeometry(s),
            PlannerErrorProxy::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
        })
    }
}
