//! topoplace-bench: CLI tool for placement parameter experimentation and diagnostics.
//!
//! Loads a recorded planning scene (JSON), runs the placement planner on
//! it with configurable parameters, and prints diagnostics. Useful for:
//!
//! - Comparing winding methods (`fixed-step` vs `exact`)
//! - Tuning reach, margin, tolerance, and inflation on recorded scenes
//! - Checking how often a scene falls back across seeds
//! - Rendering the scene, samples, and placement to SVG
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin topoplace-bench -- [OPTIONS] <SCENARIO_PATH>
//! ```
//!
//! Set `RUST_LOG=debug` to see the planner's own log output.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use topoplace_planner::diagnostics::{
    Clock, PlanDiagnostics, mean_point, plan_with_diagnostics_observed,
};
use topoplace_planner::obstacle::decode_mask;
use topoplace_planner::{
    GrayImage, ObstacleField, PlanOutcome, PlannerConfig, SampleRecorder, Scenario, WindingMethod,
};

/// Placement parameter experimentation and diagnostics for topoplace.
///
/// Runs the placement planner on a recorded scene with configurable
/// parameters and prints timing, outcome, and rejection diagnostics.
#[derive(Parser)]
#[command(name = "topoplace-bench", version)]
struct Cli {
    /// Path to the scenario JSON file.
    scenario_path: PathBuf,

    /// Robot reach radius in pixels.
    #[arg(long)]
    reach: Option<f64>,

    /// Out-of-frame sampling margin in pixels.
    #[arg(long)]
    extend_margin: Option<f64>,

    /// Anchor-distance tolerance (squared relative deviation).
    #[arg(long)]
    near_tolerance: Option<f64>,

    /// Sampling budget.
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Generator seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Winding number method.
    #[arg(long, value_enum)]
    winding: Option<Winding>,

    /// Sweep step for the fixed-step winding method (0-1].
    ///
    /// Selects the fixed-step method unless `--winding exact` is given.
    /// Without it, the scenario's step is kept, or the default when the
    /// scenario uses the exact method.
    #[arg(long)]
    winding_step: Option<f64>,

    /// Fallback jitter half-width in pixels.
    #[arg(long)]
    fallback_jitter: Option<f64>,

    /// Obstacle inflation kernel size in pixels.
    #[arg(long)]
    inflation_kernel: Option<u32>,

    /// Write SVG rendering of the first run to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Maximum number of rejected samples drawn in the SVG.
    #[arg(long, default_value_t = 2000)]
    svg_samples: usize,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Add the run index to the seed on every run.
    #[arg(long)]
    vary_seed: bool,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full planner config as a JSON string.
    ///
    /// When provided, the scenario's config and all other planner
    /// parameter flags are ignored. Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Winding method selection.
#[derive(Clone, Copy, ValueEnum)]
enum Winding {
    /// Fixed-step parameter sweep along both paths.
    FixedStep,
    /// Exact signed-angle sum over the closed control polygon.
    Exact,
}

/// Build a [`PlannerConfig`] from the scenario and CLI arguments.
///
/// If `--config-json` is provided, it replaces the scenario's config and
/// all individual parameter flags are ignored. Otherwise each flag that
/// is given overrides the scenario's value.
fn config_from_cli(cli: &Cli, scenario: &Scenario) -> Result<PlannerConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let base = &scenario.config;
    Ok(PlannerConfig {
        robot_reach_radius: cli.reach.unwrap_or(base.robot_reach_radius),
        extend_margin: cli.extend_margin.unwrap_or(base.extend_margin),
        near_tolerance: cli.near_tolerance.unwrap_or(base.near_tolerance),
        max_iterations: cli.max_iterations.unwrap_or(base.max_iterations),
        seed: cli.seed.unwrap_or(base.seed),
        winding_method: winding_from_cli(cli.winding, cli.winding_step, base.winding_method),
        fallback_jitter: cli.fallback_jitter.unwrap_or(base.fallback_jitter),
        inflation_kernel: cli.inflation_kernel.unwrap_or(base.inflation_kernel),
    })
}

/// Resolve the winding method from `--winding` and `--winding-step`.
///
/// A step alone implies the fixed-step method; a missing step falls back
/// to the base method's step.
fn winding_from_cli(
    winding: Option<Winding>,
    step: Option<f64>,
    base: WindingMethod,
) -> WindingMethod {
    let base_step = match base {
        WindingMethod::FixedStep { step } => step,
        WindingMethod::Exact => WindingMethod::DEFAULT_STEP,
    };
    match (winding, step) {
        (Some(Winding::Exact), _) => WindingMethod::Exact,
        (Some(Winding::FixedStep), step) | (None, step @ Some(_)) => WindingMethod::FixedStep {
            step: step.unwrap_or(base_step),
        },
        (None, None) => base,
    }
}

/// Read and parse the scenario, plus its mask image if it names one.
fn load_scenario(path: &Path) -> Result<(Scenario, Option<GrayImage>), String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&text)
        .map_err(|e| format!("Error parsing scenario {}: {e}", path.display()))?;

    let mask = match scenario.mask_path.as_deref() {
        Some(relative) => {
            let mask_path = path
                .parent()
                .map_or_else(|| PathBuf::from(relative), |dir| dir.join(relative));
            let bytes = std::fs::read(&mask_path)
                .map_err(|e| format!("Error reading mask {}: {e}", mask_path.display()))?;
            let mask = decode_mask(&bytes)
                .map_err(|e| format!("Error decoding mask {}: {e}", mask_path.display()))?;
            log::debug!(
                "loaded mask {} ({}x{})",
                mask_path.display(),
                mask.width(),
                mask.height()
            );
            Some(mask)
        }
        None => None,
    };
    Ok((scenario, mask))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let (mut scenario, mask) = match load_scenario(&cli.scenario_path) {
        Ok(loaded) => loaded,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    scenario.config = match config_from_cli(&cli, &scenario) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let obstacles = match scenario.obstacle_field(mask.as_ref()) {
        Ok(field) => field,
        Err(e) => {
            eprintln!("Error building obstacle field: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = scenario.validate(&obstacles) {
        eprintln!("Invalid scenario: {e}");
        return ExitCode::FAILURE;
    }

    eprintln!(
        "Scenario: {} ({}x{}, {} polyline points, {} obstacles)",
        cli.scenario_path.display(),
        scenario.frame.width,
        scenario.frame.height,
        scenario.polyline.len(),
        obstacles.centroids().len(),
    );
    eprintln!("Config: {:#?}", scenario.config);
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let config = if cli.vary_seed {
            PlannerConfig {
                seed: scenario.config.seed.wrapping_add(run as u64),
                ..scenario.config.clone()
            }
        } else {
            scenario.config.clone()
        };

        let mut recorder = SampleRecorder::with_limit(cli.svg_samples);
        let (result, diagnostics) = plan_with_diagnostics_observed(
            &scenario.request(&obstacles),
            &config,
            &StdClock,
            &mut recorder,
        );

        if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
        }

        // Write SVG on the first run only.
        if run == 0
            && let Some(ref svg_path) = cli.svg
        {
            write_svg(&cli, svg_path, &scenario, &obstacles, &config, result, &recorder);
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

fn write_svg(
    cli: &Cli,
    svg_path: &Path,
    scenario: &Scenario,
    obstacles: &ObstacleField,
    config: &PlannerConfig,
    result: topoplace_planner::PlanningResult,
    recorder: &SampleRecorder,
) {
    let title = cli
        .scenario_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bench");
    let desc = format!("{config:#?}");
    let config_json = serde_json::to_string(config).ok();
    let metadata = topoplace_export::SvgMetadata {
        title: Some(title),
        description: Some(&desc),
        config_json: config_json.as_deref(),
    };
    let scene = topoplace_export::PlanScene {
        frame: scenario.frame,
        polyline: &scenario.polyline,
        regrasp: scenario.regrasp,
        robot: scenario.robot,
        obstacles,
        config,
        result: Some(result),
        samples: recorder.samples(),
    };
    let svg = topoplace_export::to_svg(&scene, &metadata);
    match std::fs::write(svg_path, &svg) {
        Ok(()) => {
            eprintln!(
                "SVG written to {} ({} bytes)",
                svg_path.display(),
                svg.len(),
            );
        }
        Err(e) => {
            eprintln!("Error writing SVG to {}: {e}", svg_path.display());
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PlanDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    let n = all_diagnostics.len() as f64;
    let accepted = all_diagnostics
        .iter()
        .filter(|d| matches!(d.outcome, PlanOutcome::Accepted { .. }))
        .count();
    let degenerate = all_diagnostics
        .iter()
        .filter(|d| d.outcome == PlanOutcome::Degenerate)
        .count();
    let mean_samples = all_diagnostics.iter().map(|d| d.samples as f64).sum::<f64>() / n;

    println!(
        "Accepted: {accepted}/{}  |  Degenerate: {degenerate}  |  Mean samples: {mean_samples:.1}",
        all_diagnostics.len(),
    );
    if let Some(p) = mean_point(all_diagnostics) {
        println!("Mean placement: ({:.2}, {:.2})", p.x, p.y);
    }

    println!();
    println!("{:<16} {:>14}", "Predicate", "Mean rejected");
    println!("{}", "-".repeat(32));

    let rejection_extractors: &[(&str, RejectionExtractor)] = &[
        ("homotopy", |d| d.rejections.homotopy),
        ("collision", |d| d.rejections.collision),
        ("reach", |d| d.rejections.reach),
        ("near start", |d| d.rejections.near_start),
        ("near end", |d| d.rejections.near_end),
    ];

    for (name, extractor) in rejection_extractors {
        let mean = all_diagnostics.iter().map(|d| extractor(d) as f64).sum::<f64>() / n;
        println!("{name:<16} {mean:>14.1}");
    }
}

/// Function pointer type for extracting a rejection count from diagnostics.
type RejectionExtractor = fn(&PlanDiagnostics) -> usize;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SHIPPED: &str = include_str!("../scenarios/hose-around-battery.json");

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("topoplace-bench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_scenario_config() {
        let scenario: Scenario = serde_json::from_str(SHIPPED).unwrap();
        let cli = parse(&["s.json", "--seed", "9", "--winding", "exact", "--reach", "300"]);
        let config = config_from_cli(&cli, &scenario).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.winding_method, WindingMethod::Exact);
        assert!((config.robot_reach_radius - 300.0).abs() < f64::EPSILON);
        assert_eq!(config.max_iterations, scenario.config.max_iterations);
    }

    #[test]
    fn winding_step_falls_back_to_the_scenario() {
        let mut scenario: Scenario = serde_json::from_str(SHIPPED).unwrap();
        scenario.config.winding_method = WindingMethod::FixedStep { step: 0.1 };

        let cli = parse(&["s.json", "--winding", "fixed-step"]);
        let config = config_from_cli(&cli, &scenario).unwrap();
        assert_eq!(config.winding_method, WindingMethod::FixedStep { step: 0.1 });

        let cli = parse(&["s.json", "--winding-step", "0.02"]);
        let config = config_from_cli(&cli, &scenario).unwrap();
        assert_eq!(config.winding_method, WindingMethod::FixedStep { step: 0.02 });

        let cli = parse(&["s.json", "--winding-step", "0.02", "--winding", "exact"]);
        let config = config_from_cli(&cli, &scenario).unwrap();
        assert_eq!(config.winding_method, WindingMethod::Exact);
    }

    #[test]
    fn winding_step_from_exact_scenario_uses_default() {
        let mut scenario: Scenario = serde_json::from_str(SHIPPED).unwrap();
        scenario.config.winding_method = WindingMethod::Exact;

        let cli = parse(&["s.json"]);
        let config = config_from_cli(&cli, &scenario).unwrap();
        assert_eq!(config.winding_method, WindingMethod::Exact);

        let cli = parse(&["s.json", "--winding", "fixed-step"]);
        let config = config_from_cli(&cli, &scenario).unwrap();
        assert_eq!(
            config.winding_method,
            WindingMethod::FixedStep {
                step: WindingMethod::DEFAULT_STEP
            }
        );
    }

    #[test]
    fn config_json_replaces_everything() {
        let scenario: Scenario = serde_json::from_str(SHIPPED).unwrap();
        let cli = parse(&["s.json", "--seed", "9", "--config-json", r#"{"seed": 3}"#]);
        let config = config_from_cli(&cli, &scenario).unwrap();
        assert_eq!(config.seed, 3);
        assert_eq!(config.max_iterations, PlannerConfig::DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let scenario: Scenario = serde_json::from_str(SHIPPED).unwrap();
        let cli = parse(&["s.json", "--config-json", "{not json"]);
        assert!(config_from_cli(&cli, &scenario).is_err());
    }

    #[test]
    fn shipped_scenario_is_valid() {
        let scenario: Scenario = serde_json::from_str(SHIPPED).unwrap();
        let obstacles = scenario.obstacle_field(None).unwrap();
        assert_eq!(obstacles.centroids().len(), 1);
        scenario.validate(&obstacles).unwrap();
    }

    #[test]
    fn missing_scenario_file_is_an_error() {
        let err = load_scenario(Path::new("/nonexistent/scenario.json")).unwrap_err();
        assert!(err.contains("Error reading"));
    }
}
