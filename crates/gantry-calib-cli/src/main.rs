use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gantry_calib_core::kinematics::{self, InverseOptions};
use gantry_calib_core::{AxisBounds, CalibrationParams, Real, Vec3};
use gantry_calib_optim::Powell;
use gantry_calib_optim::feasibility::{
    JointSearchOptions, check_joint_bounds, jacobian_invertibility,
};
use gantry_calib_pipeline::io::{
    load_alignment_init, load_bad_frames, load_calibration, write_synced_csv,
};
use gantry_calib_pipeline::{
    CalibrationSession, GantryCalibrationConfig, GantryCalibrationInput, GantryCalibrationProblem,
    JsonFileCache, kinematics_config, run_calibration,
};
use log::info;

/// Gantry vs. motion-capture calibration.
#[derive(Debug, Parser)]
#[command(author, version, about = "Gantry vs. motion-capture calibration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Align the capture to the gantry and fit the calibration model.
    Calibrate(CalibrateArgs),
    /// Check a fitted model against axis and joint limits.
    Check(CheckArgs),
    /// Print the controller configuration for a fitted model.
    PrintConfig {
        #[arg(long, default_value = "calibration_params.json")]
        calibration: PathBuf,
    },
    /// Physical position for a joint position.
    Forward(PointArgs),
    /// Joint position for a physical position.
    Inverse(PointArgs),
}

#[derive(Debug, Args)]
struct CalibrateArgs {
    /// Motion-capture CSV export.
    #[arg(long, default_value = "take_optitrack.csv")]
    optitrack: PathBuf,
    /// Gantry position log.
    #[arg(long, default_value = "take_gantry.csv")]
    gantry: PathBuf,
    /// Rigid body to track; the first one in the export if omitted.
    #[arg(long)]
    rigid_body: Option<String>,
    /// Cache file for the alignment parameters [default: alignment_params.json].
    #[arg(long)]
    alignment: Option<String>,
    /// Cache file for the calibration parameters [default: calibration_params.json].
    #[arg(long)]
    calibration: Option<String>,
    /// Stop after alignment.
    #[arg(long)]
    skip_calibration: bool,
    /// Keep the samples listed in the bad-frames file.
    #[arg(long)]
    no_remove_bad_frames: bool,
    /// Bad frame ranges; ignored when the file does not exist.
    #[arg(long, default_value = "bad_frames.json")]
    bad_frames: PathBuf,
    /// Alignment starting point; ignored when the file does not exist.
    #[arg(long, default_value = "alignment_init.json")]
    alignment_init: PathBuf,
    #[arg(long)]
    recompute_alignment: bool,
    #[arg(long)]
    recompute_calibration: bool,
    /// JSON GantryCalibrationConfig; flags above override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the whole session as JSON.
    #[arg(long)]
    session_out: Option<PathBuf>,
    /// Write the synchronized tracks as CSV.
    #[arg(long)]
    output_csv: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[arg(long, default_value = "calibration_params.json")]
    calibration: PathBuf,
    /// Lower XYZ axis positions.
    #[arg(long, num_args = 3, required = true, allow_negative_numbers = true)]
    axis_min: Vec<Real>,
    /// Upper XYZ axis positions.
    #[arg(long, num_args = 3, required = true, allow_negative_numbers = true)]
    axis_max: Vec<Real>,
    /// Lower XYZ joint values.
    #[arg(long, num_args = 3, required = true, allow_negative_numbers = true)]
    joints_min: Vec<Real>,
    /// Upper XYZ joint values.
    #[arg(long, num_args = 3, required = true, allow_negative_numbers = true)]
    joints_max: Vec<Real>,
}

#[derive(Debug, Args)]
struct PointArgs {
    #[arg(long, default_value = "calibration_params.json")]
    calibration: PathBuf,
    #[arg(allow_negative_numbers = true)]
    x: Real,
    #[arg(allow_negative_numbers = true)]
    y: Real,
    #[arg(allow_negative_numbers = true)]
    z: Real,
}

fn vec3(values: &[Real]) -> Result<Vec3> {
    anyhow::ensure!(values.len() == 3, "expected 3 values, got {}", values.len());
    Ok(Vec3::new(values[0], values[1], values[2]))
}

fn load_config(path: &Path) -> Result<GantryCalibrationConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    Ok(serde_json::from_str(&data)?)
}

fn calibration_config(args: &CalibrateArgs) -> Result<GantryCalibrationConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GantryCalibrationConfig::default(),
    };
    if let Some(key) = &args.alignment {
        config.alignment_key = Some(key.clone());
    }
    if let Some(key) = &args.calibration {
        config.calibration_key = Some(key.clone());
    }
    config.calibrate &= !args.skip_calibration;
    config.remove_bad_frames &= !args.no_remove_bad_frames;
    config.recompute_alignment |= args.recompute_alignment;
    config.recompute_calibration |= args.recompute_calibration;
    Ok(config)
}

/// Run the full calibration and return the export as pretty JSON.
fn calibrate_from_files(args: &CalibrateArgs) -> Result<String> {
    let mut input = GantryCalibrationInput::from_files(
        &args.optitrack,
        &args.gantry,
        args.rigid_body.as_deref(),
    )?;
    if args.bad_frames.exists() {
        input = input.with_bad_frames(load_bad_frames(&args.bad_frames)?);
    } else {
        info!("no bad frames file at {}", args.bad_frames.display());
    }
    if args.alignment_init.exists() {
        input = input.with_alignment_init(load_alignment_init(&args.alignment_init)?);
    }

    let mut session = CalibrationSession::<GantryCalibrationProblem>::with_input(input)?;
    session.set_config(calibration_config(args)?)?;
    run_calibration(&mut session, &mut JsonFileCache::new("."))?;

    if let Some(path) = &args.output_csv {
        if let Some(synced) = &session.state.synced {
            write_synced_csv(synced, path)?;
        }
    }
    if let Some(path) = &args.session_out {
        session.save(path)?;
    }

    let export = session.export()?;
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Jacobian check over the joint limits, then the joint range check over
/// the axis limits. Returns the report text and whether both passed.
fn check_from_file(args: &CheckArgs) -> Result<(String, bool)> {
    let params = load_calibration(&args.calibration)?;
    let axis_bounds = AxisBounds::new(vec3(&args.axis_min)?, vec3(&args.axis_max)?)?;
    let joint_bounds = AxisBounds::new(vec3(&args.joints_min)?, vec3(&args.joints_max)?)?;
    let mut out = String::new();

    let jacobian = jacobian_invertibility(&params, &joint_bounds);
    writeln!(
        out,
        "Jacobian invertibility: norm 1 = {} < 1 -> {}",
        jacobian.norm_1,
        jacobian.norm_1 < 1.0
    )?;
    writeln!(
        out,
        "Jacobian invertibility: norm inf = {} < 1 -> {}",
        jacobian.norm_inf,
        jacobian.norm_inf < 1.0
    )?;
    if !jacobian.passed {
        writeln!(
            out,
            "Jacobian invertibility test failed. Jacobian may be non-invertible on the joint space."
        )?;
        return Ok((out, false));
    }
    writeln!(
        out,
        "Jacobian invertibility test passed. Jacobian is invertible on the joint space."
    )?;

    let report = check_joint_bounds(
        &params,
        &axis_bounds,
        &joint_bounds,
        &JointSearchOptions::default(),
        &Powell::default(),
    )?;
    for r in &report.ranges {
        writeln!(
            out,
            "Joint {} min {} at {}, max {} at {}",
            r.axis,
            r.min.value,
            fmt_point(&r.min.position),
            r.max.value,
            fmt_point(&r.max.position)
        )?;
    }
    if report.passed {
        writeln!(out, "Joint bounds test passed. Inverse kinematics is within joint limits.")?;
    } else {
        writeln!(out, "Joint bounds test failed. Inverse kinematics is out of joint limits.")?;
    }
    Ok((out, report.passed))
}

fn fmt_point(p: &Vec3) -> String {
    format!("[{}, {}, {}]", p.x, p.y, p.z)
}

fn forward_from_file(args: &PointArgs) -> Result<String> {
    let params = load_calibration(&args.calibration)?;
    let p = kinematics::forward(&params, &Vec3::new(args.x, args.y, args.z));
    Ok(fmt_point(&p))
}

fn inverse_from_file(args: &PointArgs) -> Result<String> {
    let params: CalibrationParams = load_calibration(&args.calibration)?;
    let target = Vec3::new(args.x, args.y, args.z);
    let solution = kinematics::inverse(&params, &target, None, None, &InverseOptions::default());
    if !solution.converged() {
        log::warn!(
            "inverse stopped with {:?} after {} iterations",
            solution.status,
            solution.iterations
        );
    }
    Ok(fmt_point(&solution.joints))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match try_main() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

/// Run the selected command; `Ok(false)` means a check failed.
fn try_main() -> Result<bool> {
    let cli = Cli::parse();
    match &cli.command {
        Command::Calibrate(args) => println!("{}", calibrate_from_files(args)?),
        Command::Check(args) => {
            let (report, passed) = check_from_file(args)?;
            print!("{report}");
            return Ok(passed);
        }
        Command::PrintConfig { calibration } => {
            print!("{}", kinematics_config(&load_calibration(calibration)?));
        }
        Command::Forward(args) => println!("{}", forward_from_file(args)?),
        Command::Inverse(args) => println!("{}", inverse_from_file(args)?),
    }
    Ok(true)
}
