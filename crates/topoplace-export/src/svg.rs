//! SVG rendering of a planning scene.
//!
//! Draws the inputs and the answer of one planning call on top of each
//! other, in image coordinates, so a placement can be inspected by eye:
//!
//! - the frame outline and the sampling margin around it,
//! - obstacle occupancy and its inflated safety margin, as one
//!   `<rect>` per horizontal pixel run,
//! - obstacle centroids,
//! - the observed polyline and the release point,
//! - the anchor-distance band around each anchor and the robot's reach,
//! - optionally the evaluated samples,
//! - the placement and the path `start -> placement -> end`.
//!
//! The document is built with the [`svg`] crate, which handles XML
//! escaping and path data formatting. This is a pure function with no
//! I/O; it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Group, Path, Rectangle, Title};
use svg::node::{Node, Text, Value};

use topoplace_planner::observer::SampleEvent;
use topoplace_planner::{
    Dimensions, GrayImage, ObstacleField, PlannerConfig, PlanningResult, Point, Polyline,
};

/// XML namespace for the embedded planner configuration.
const METADATA_NAMESPACE: &str = "urn:topoplace:plan:1";

const OBSTACLE_FILL: &str = "#c0392b";
const INFLATED_FILL: &str = "#f5b7b1";
const POLYLINE_STROKE: &str = "#2c3e50";
const ANCHOR_STROKE: &str = "#2980b9";
const REACH_STROKE: &str = "#8e44ad";
const SUCCESS_STROKE: &str = "#27ae60";
const FALLBACK_STROKE: &str = "#e67e22";
const SAMPLE_FILL: &str = "#95a5a6";

/// Metadata to embed in the SVG document.
///
/// Both text fields are optional. When present, a `<title>` and/or
/// `<desc>` element is emitted immediately after the opening `<svg>`
/// tag. Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the scenario filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized [`PlannerConfig`], emitted inside `<metadata>` so the
    /// rendering carries the parameters that produced it.
    pub config_json: Option<&'a str>,
}

/// Everything drawn by [`to_svg`].
#[derive(Debug, Clone, Copy)]
pub struct PlanScene<'a> {
    /// Visible frame size.
    pub frame: Dimensions,
    /// Observed shape of the object.
    pub polyline: &'a Polyline,
    /// Release point proposed by the grasp planner.
    pub regrasp: Point,
    /// Robot base position.
    pub robot: Point,
    /// Obstacles over the frame.
    pub obstacles: &'a ObstacleField,
    /// Parameters the call ran with (reach, margin, tolerance).
    pub config: &'a PlannerConfig,
    /// The planner's answer, if it has been run.
    pub result: Option<PlanningResult>,
    /// Evaluated samples to draw; may be empty.
    pub samples: &'a [SampleEvent],
}

/// Build an SVG path `d` attribute string from a sequence of points.
///
/// Uses `M` for the first point and `L` for subsequent points.
/// Returns an empty string for fewer than 2 points.
///
/// # Examples
///
/// ```
/// use topoplace_planner::Point;
/// use topoplace_export::build_path_data;
///
/// let d = build_path_data(&[Point::new(10.0, 20.0), Point::new(30.0, 40.0)]);
/// assert_eq!(d, "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(points: &[Point]) -> String {
    let [first, rest @ ..] = points else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }

    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// Horizontal runs of nonzero pixels as `(y, x_start, x_end_exclusive)`.
#[must_use]
pub fn mask_runs(mask: &GrayImage) -> Vec<(u32, u32, u32)> {
    let mut runs = Vec::new();
    for (y, row) in mask.enumerate_rows() {
        let mut open: Option<u32> = None;
        for (x, _, pixel) in row {
            match (pixel.0[0] != 0, open) {
                (true, None) => open = Some(x),
                (false, Some(x0)) => {
                    runs.push((y, x0, x));
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(x0) = open {
            runs.push((y, x0, mask.width()));
        }
    }
    runs
}

fn mask_group(id: &str, mask: &GrayImage, fill: &str) -> Group {
    mask_runs(mask)
        .into_iter()
        .fold(Group::new().set("id", id).set("fill", fill), |group, (y, x0, x1)| {
            group.add(
                Rectangle::new()
                    .set("x", x0)
                    .set("y", y)
                    .set("width", x1 - x0)
                    .set("height", 1),
            )
        })
}

fn marker(p: Point, r: f64, fill: &str) -> Circle {
    Circle::new()
        .set("cx", p.x)
        .set("cy", p.y)
        .set("r", r)
        .set("fill", fill)
}

fn ring(center: Point, r: f64, stroke: &str, dash: Option<&str>) -> Circle {
    let circle = Circle::new()
        .set("cx", center.x)
        .set("cy", center.y)
        .set("r", r)
        .set("fill", "none")
        .set("stroke", stroke)
        .set("stroke-width", 1);
    match dash {
        Some(dash) => circle.set("stroke-dasharray", dash),
        None => circle,
    }
}

/// Anchor-distance bands: for each anchor, the circle through the
/// release point and the limits of `near_tolerance` around it.
fn anchor_group(scene: &PlanScene<'_>) -> Group {
    let mut group = Group::new()
        .set("id", "anchors")
        .set("class", "anchor-band");
    let anchors = [scene.polyline.start(), scene.polyline.end()];
    // ((d - d0) / d0)^2 < tol  <=>  d0 (1 - sqrt(tol)) < d < d0 (1 + sqrt(tol))
    let spread = scene.config.near_tolerance.max(0.0).sqrt();
    for anchor in anchors.into_iter().flatten() {
        let d0 = scene.regrasp.distance(anchor);
        if !(d0.is_finite() && d0 > 0.0) {
            continue;
        }
        group = group
            .add(marker(anchor, 2.5, ANCHOR_STROKE))
            .add(ring(anchor, d0, ANCHOR_STROKE, None));
        let inner = d0 * (1.0 - spread);
        if inner > 0.0 {
            group = group.add(ring(anchor, inner, ANCHOR_STROKE, Some("2 3")));
        }
        group = group.add(ring(anchor, d0 * (1.0 + spread), ANCHOR_STROKE, Some("2 3")));
    }
    group
}

fn sample_group(samples: &[SampleEvent]) -> Group {
    samples.iter().filter(|e| !e.accepted()).fold(
        Group::new().set("id", "samples").set("fill", SAMPLE_FILL),
        |group, event| {
            group.add(
                Circle::new()
                    .set("cx", event.point.x)
                    .set("cy", event.point.y)
                    .set("r", 0.75),
            )
        },
    )
}

fn placement_group(scene: &PlanScene<'_>, result: PlanningResult) -> Group {
    let stroke = if result.success {
        SUCCESS_STROKE
    } else {
        FALLBACK_STROKE
    };
    let mut group = Group::new()
        .set("id", "placement")
        .set("class", if result.success { "success" } else { "fallback" });
    if let (Some(start), Some(end)) = (scene.polyline.start(), scene.polyline.end()) {
        let d = build_path_data(&[start, result.point, end]);
        group = group.add(
            Path::new()
                .set("d", d)
                .set("fill", "none")
                .set("stroke", stroke)
                .set("stroke-width", 1.5)
                .set("stroke-dasharray", "6 3"),
        );
    }
    group.add(marker(result.point, 3.5, stroke))
}

/// Render a planning scene as an SVG string.
///
/// The `viewBox` covers the frame grown by `config.extend_margin` so
/// out-of-frame samples and placements stay visible; the frame itself
/// is outlined.
#[must_use]
pub fn to_svg(scene: &PlanScene<'_>, metadata: &SvgMetadata<'_>) -> String {
    let w = f64::from(scene.frame.width);
    let h = f64::from(scene.frame.height);
    let margin = if scene.config.extend_margin.is_finite() {
        scene.config.extend_margin.max(0.0)
    } else {
        0.0
    };
    let view_w = 2.0f64.mul_add(margin, w);
    let view_h = 2.0f64.mul_add(margin, h);

    let mut doc = Document::new()
        .set("width", view_w)
        .set("height", view_h)
        .set("viewBox", format!("{} {} {view_w} {view_h}", -margin, -margin));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("topoplace:config");
        config_el.assign("xmlns:topoplace", METADATA_NAMESPACE);
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    doc = doc.add(
        Rectangle::new()
            .set("id", "frame")
            .set("x", 0)
            .set("y", 0)
            .set("width", scene.frame.width)
            .set("height", scene.frame.height)
            .set("fill", "white")
            .set("stroke", "black")
            .set("stroke-width", 1),
    );

    doc = doc
        .add(mask_group("inflated", scene.obstacles.inflated(), INFLATED_FILL))
        .add(mask_group("occupancy", scene.obstacles.occupancy(), OBSTACLE_FILL));

    if !scene.samples.is_empty() {
        doc = doc.add(sample_group(scene.samples));
    }

    doc = doc.add(scene.obstacles.centroids().iter().fold(
        Group::new().set("id", "centroids"),
        |group, &c| {
            group.add(
                marker(c, 2.0, "black")
                    .set("stroke", "white")
                    .set("stroke-width", 0.5),
            )
        },
    ));

    doc = doc.add(ring(
        scene.robot,
        scene.config.robot_reach_radius,
        REACH_STROKE,
        Some("8 4"),
    ));
    doc = doc.add(marker(scene.robot, 3.0, REACH_STROKE).set("id", "robot"));
    doc = doc.add(anchor_group(scene));

    let d = build_path_data(scene.polyline.points());
    if !d.is_empty() {
        doc = doc.add(
            Path::new()
                .set("id", "polyline")
                .set("d", d)
                .set("fill", "none")
                .set("stroke", POLYLINE_STROKE)
                .set("stroke-width", 2),
        );
    }
    doc = doc.add(marker(scene.regrasp, 3.0, POLYLINE_STROKE).set("id", "regrasp"));

    if let Some(result) = scene.result {
        doc = doc.add(placement_group(scene, result));
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
