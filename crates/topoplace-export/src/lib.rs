//! topoplace-export: Scene renderers (sans-IO)
//!
//! Turns a planning call's inputs and result into viewable formats.
//! Currently supports SVG.

pub mod svg;

pub use svg::{PlanScene, SvgMetadata, build_path_data, mask_runs, to_svg};
