//! Obstacle field: inflated occupancy for collision tests and centroids
//! for the homotopy test.
//!
//! Perception hands over obstacles either as a raw occupancy mask or as
//! per-instance polygon detections. Both are turned into an
//! [`ObstacleField`], which keeps two views of the same obstacles:
//!
//! - an *inflated* mask, dilated by a square kernel so that placements
//!   keep a safety margin from obstacle edges (collision test only);
//! - one centroid per obstacle instance (homotopy test only).

use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::morphology::{Mask, grayscale_dilate};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PlannerConfig, PlannerError, Point};

/// Obstacle class the demo perception model reports.
pub const DEFAULT_OBSTACLE_CLASS: &str = "battery";

const OCCUPIED: Luma<u8> = Luma([255]);
const FREE: Luma<u8> = Luma([0]);

/// A single object instance reported by the perception model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class name, e.g. `"battery"` or `"hose"`.
    pub class: String,
    /// Outline in pixel coordinates. An explicit closing vertex is
    /// allowed and ignored.
    pub polygon: Vec<Point>,
}

/// Obstacles over the planning frame.
#[derive(Debug, Clone)]
pub struct ObstacleField {
    occupancy: GrayImage,
    inflated: GrayImage,
    centroids: Vec<Point>,
}

impl ObstacleField {
    /// A field with no obstacles.
    #[must_use]
    pub fn empty(dimensions: Dimensions) -> Self {
        let blank = GrayImage::new(dimensions.width, dimensions.height);
        Self {
            occupancy: blank.clone(),
            inflated: blank,
            centroids: Vec::new(),
        }
    }

    /// Build a field from a raw occupancy mask.
    ///
    /// Any nonzero pixel is an obstacle. Each 8-connected region
    /// contributes one centroid, the mean of its pixel coordinates.
    #[must_use]
    pub fn from_mask(mask: &GrayImage, inflation_kernel: u32) -> Self {
        let occupancy = binarize(mask);
        let centroids = region_centroids(&occupancy);
        let inflated = inflate(&occupancy, inflation_kernel);
        log::debug!(
            "obstacle field from {}x{} mask: {} regions",
            mask.width(),
            mask.height(),
            centroids.len()
        );
        Self {
            occupancy,
            inflated,
            centroids,
        }
    }

    /// Build a field from perception detections of one obstacle class.
    ///
    /// Every matching polygon is filled into the combined mask. Centroids
    /// are taken per detection rather than per connected region, so two
    /// touching instances still count as two obstacles. Polygons with
    /// fewer than three distinct vertices are skipped.
    #[must_use]
    pub fn from_detections(
        dimensions: Dimensions,
        detections: &[Detection],
        class: &str,
        inflation_kernel: u32,
    ) -> Self {
        let mut occupancy = GrayImage::new(dimensions.width, dimensions.height);
        let mut centroids = Vec::new();

        for detection in detections.iter().filter(|d| d.class == class) {
            let Some(instance) = rasterize_polygon(dimensions, &detection.polygon) else {
                log::debug!(
                    "skipping degenerate {class} polygon with {} vertices",
                    detection.polygon.len()
                );
                continue;
            };
            if let Some(com) = center_of_mass(&instance) {
                centroids.push(com);
            }
            for (dst, src) in occupancy.pixels_mut().zip(instance.pixels()) {
                if src.0[0] != 0 {
                    *dst = OCCUPIED;
                }
            }
        }

        let inflated = inflate(&occupancy, inflation_kernel);
        log::debug!(
            "obstacle field from detections: {} {class} instances",
            centroids.len()
        );
        Self {
            occupancy,
            inflated,
            centroids,
        }
    }

    /// Replace the centroids with ones extracted elsewhere.
    ///
    /// The occupancy and inflated masks are left untouched.
    #[must_use]
    pub fn with_centroids(mut self, centroids: Vec<Point>) -> Self {
        self.centroids = centroids;
        self
    }

    /// Size of the occupancy surface.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.occupancy.width(), self.occupancy.height())
    }

    /// Binary occupancy before inflation (0 or 255).
    #[must_use]
    pub const fn occupancy(&self) -> &GrayImage {
        &self.occupancy
    }

    /// Occupancy after inflation (0 or 255). Used for collision tests.
    #[must_use]
    pub const fn inflated(&self) -> &GrayImage {
        &self.inflated
    }

    /// One point per obstacle instance. Used for homotopy tests.
    #[must_use]
    pub fn centroids(&self) -> &[Point] {
        &self.centroids
    }

    /// Number of occupied pixels before inflation.
    #[must_use]
    pub fn obstacle_pixel_count(&self) -> u64 {
        count_occupied(&self.occupancy)
    }

    /// Number of occupied pixels after inflation.
    #[must_use]
    pub fn inflated_pixel_count(&self) -> u64 {
        count_occupied(&self.inflated)
    }

    /// Whether `p` lands on the inflated obstacle surface.
    ///
    /// Points outside the mask are never in collision: there is no
    /// occupancy information there and the workspace beyond the frame is
    /// assumed clear.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn is_in_collision(&self, p: Point) -> bool {
        let (width, height) = self.inflated.dimensions();
        let inside = p.x >= 0.0 && p.x < f64::from(width) && p.y >= 0.0 && p.y < f64::from(height);
        if !inside {
            return false;
        }
        self.inflated.get_pixel(p.x as u32, p.y as u32).0[0] != 0
    }

    /// Check that the field covers exactly the planning frame.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::DimensionMismatch`] otherwise.
    pub fn check_frame(&self, frame: Dimensions) -> Result<(), PlannerError> {
        let actual = self.dimensions();
        if actual == frame {
            Ok(())
        } else {
            Err(PlannerError::DimensionMismatch {
                expected: frame,
                actual,
            })
        }
    }
}

/// Decode an obstacle mask from encoded image bytes (PNG).
///
/// # Errors
///
/// Returns [`PlannerError::EmptyInput`] if `bytes` is empty.
/// Returns [`PlannerError::ImageDecode`] if the data is not a decodable
/// image.
pub fn decode_mask(bytes: &[u8]) -> Result<GrayImage, PlannerError> {
    if bytes.is_empty() {
        return Err(PlannerError::EmptyInput);
    }
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_luma8())
}

/// Map every nonzero pixel to 255 and everything else to 0.
#[must_use = "returns the binary mask"]
pub fn binarize(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y).0[0] == 0 {
            FREE
        } else {
            OCCUPIED
        }
    })
}

/// Dilate a binary mask with a `size × size` square kernel, once.
///
/// The kernel anchor sits at `(size / 2, size / 2)`, as in OpenCV, so
/// even sizes reach one pixel further down and right than up and left:
/// a size of 20 spreads a pixel at `x` over `x - 9 ..= x + 10`. A size
/// of zero or one leaves the mask unchanged. Sizes beyond
/// [`PlannerConfig::MAX_INFLATION_KERNEL`] are clamped.
#[must_use = "returns the inflated mask"]
pub fn inflate(mask: &GrayImage, size: u32) -> GrayImage {
    let size = size.min(PlannerConfig::MAX_INFLATION_KERNEL);
    if size <= 1 {
        return mask.clone();
    }
    let anchor = u8::try_from(size / 2).unwrap_or(u8::MAX);
    let kernel = Mask::from_image(&GrayImage::from_pixel(size, size, OCCUPIED), anchor, anchor);
    grayscale_dilate(mask, &kernel)
}

/// Centroid of every 8-connected nonzero region, in label order.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn region_centroids(mask: &GrayImage) -> Vec<Point> {
    let binary = binarize(mask);
    let labels = connected_components(&binary, Connectivity::Eight, FREE);

    // (sum_x, sum_y, count) per label; label 0 is background.
    let mut sums: Vec<(f64, f64, u64)> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label == 0 {
            continue;
        }
        if sums.len() < label {
            sums.resize(label, (0.0, 0.0, 0));
        }
        let entry = &mut sums[label - 1];
        entry.0 += f64::from(x);
        entry.1 += f64::from(y);
        entry.2 += 1;
    }

    sums.into_iter()
        .filter(|&(_, _, n)| n > 0)
        .map(|(sx, sy, n)| Point::new(sx / n as f64, sy / n as f64))
        .collect()
}

/// Mean coordinate of the nonzero pixels, or `None` for an empty mask.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn center_of_mass(mask: &GrayImage) -> Option<Point> {
    let (mut sx, mut sy, mut n) = (0.0, 0.0, 0_u64);
    for (x, y, p) in mask.enumerate_pixels() {
        if p.0[0] != 0 {
            sx += f64::from(x);
            sy += f64::from(y);
            n += 1;
        }
    }
    (n > 0).then(|| Point::new(sx / n as f64, sy / n as f64))
}

/// Fill a polygon into a fresh mask of the given size.
///
/// Vertices are rounded to whole pixels. Repeated consecutive vertices
/// and an explicit closing vertex are dropped; `None` if fewer than
/// three distinct vertices remain.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn rasterize_polygon(dimensions: Dimensions, polygon: &[Point]) -> Option<GrayImage> {
    let mut vertices: Vec<imageproc::point::Point<i32>> = Vec::with_capacity(polygon.len());
    for p in polygon.iter().filter(|p| p.is_finite()) {
        let v = imageproc::point::Point::new(p.x.round() as i32, p.y.round() as i32);
        if vertices.last() != Some(&v) {
            vertices.push(v);
        }
    }
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    if vertices.len() < 3 {
        return None;
    }

    let mut mask = GrayImage::new(dimensions.width, dimensions.height);
    draw_polygon_mut(&mut mask, &vertices, OCCUPIED);
    Some(mask)
}

/// Count nonzero pixels.
fn count_occupied(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
}
