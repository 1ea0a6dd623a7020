use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use savings_curve::persist::load_sketch_points;
use savings_curve::{
    load_or_default, remove_store, save_milestones, sketch_normalize, Horizon, Mode, Params, Plan,
    Planner, Sketch, SketchPoint,
};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod chart;
mod view;

use chart::{render_chart_guard, ChartKind};

const DEFAULT_DAYS: u32 = 30;
const DEFAULT_TARGET: f64 = 1000.0;
const DEFAULT_STORE: &str = "milestones.csv";

#[derive(Parser, Debug)]
#[command(author, version, about = "Daily savings plan from sparse milestones", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive the per-day schedule and write it as CSV/plots
    Plan(PlanArgs),
    /// Add a milestone to the store (exact duplicates are ignored)
    Add(EditArgs),
    /// Set the milestone for a day, replacing any existing ones
    Set(EditArgs),
    /// Remove every milestone on a day
    Remove(RemoveArgs),
    /// Reset the store to the two-point default
    Clear(StoreArgs),
    /// Delete the persisted store
    Reset(StoreArgs),
    /// Resample free-form points and offset them to a desired sum
    Sketch(SketchArgs),
}

#[derive(clap::Args, Debug, Clone)]
struct PlanOpts {
    /// Milestone store CSV (`Day,Savings`)
    #[arg(long, value_hint = ValueHint::FilePath)]
    store: Option<PathBuf>,

    /// JSON config file; explicit flags take precedence
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Number of scheduled days
    #[arg(short, long)]
    days: Option<u32>,

    /// Total amount to save over the horizon
    #[arg(short, long)]
    target: Option<f64>,

    /// Milestone semantics
    #[arg(long, value_enum)]
    mode: Option<ModeOpt>,

    /// Do not clip days to the daily ceiling (target / days)
    #[arg(long, action = ArgAction::SetTrue)]
    no_clip: bool,

    /// Keep the adjusted values even when they leave [0, ceiling]
    #[arg(long, action = ArgAction::SetTrue)]
    no_reclip: bool,

    /// Calendar date of day 0, used to label schedule rows
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Log timings of major stages
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(clap::Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    opts: PlanOpts,

    /// Extra milestones as `day:value` (repeatable or comma separated)
    #[arg(short, long = "point")]
    points: Vec<String>,

    /// Output schedule CSV path (`-` for stdout)
    #[arg(short, long, default_value = "schedule.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Output PNG figure path (defaults next to CSV)
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Output SVG figure path
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Disable plot generation
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,

    /// Print the per-day table to stdout
    #[arg(long, action = ArgAction::SetTrue)]
    table: bool,

    /// Print the summary as JSON to stdout
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Write the milestones (including `--point` additions) back to the store
    #[arg(long, action = ArgAction::SetTrue)]
    save: bool,
}

#[derive(clap::Args, Debug)]
struct EditArgs {
    #[command(flatten)]
    opts: PlanOpts,

    /// Day index (0-based; the horizon itself is the boundary day)
    day: u32,

    /// Amount for the day (cumulative amount in cumulative mode)
    #[arg(allow_negative_numbers = true)]
    value: f64,
}

#[derive(clap::Args, Debug)]
struct RemoveArgs {
    #[command(flatten)]
    opts: PlanOpts,

    /// Day whose milestones are removed
    day: u32,
}

#[derive(clap::Args, Debug)]
struct StoreArgs {
    #[command(flatten)]
    opts: PlanOpts,
}

#[derive(clap::Args, Debug)]
struct SketchArgs {
    /// CSV file with `x,y` columns
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Points as `x:y` (repeatable or comma separated)
    #[arg(short, long = "point")]
    points: Vec<String>,

    /// Number of evenly spaced samples
    #[arg(long)]
    samples: Option<usize>,

    /// Desired sum of the samples (defaults to their own sum)
    #[arg(long, allow_negative_numbers = true)]
    sum: Option<f64>,

    /// Output sample CSV path (`-` for stdout)
    #[arg(short, long, default_value = "sketch.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeOpt {
    Daily,
    Cumulative,
}

impl From<ModeOpt> for Mode {
    fn from(value: ModeOpt) -> Self {
        match value {
            ModeOpt::Daily => Mode::Daily,
            ModeOpt::Cumulative => Mode::Cumulative,
        }
    }
}

impl Command {
    fn verbose(&self) -> bool {
        match self {
            Command::Plan(args) => args.opts.verbose,
            Command::Add(args) | Command::Set(args) => args.opts.verbose,
            Command::Remove(args) => args.opts.verbose,
            Command::Clear(args) | Command::Reset(args) => args.opts.verbose,
            Command::Sketch(args) => args.verbose,
        }
    }
}

/// Optional settings file. Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PlanConfig {
    days: Option<u32>,
    target: Option<f64>,
    mode: Option<Mode>,
    clip_to_ceiling: Option<bool>,
    reclip: Option<bool>,
    start_date: Option<NaiveDate>,
    store: Option<PathBuf>,
}

#[derive(Debug)]
struct Settings {
    horizon: Horizon,
    target: f64,
    params: Params,
    start_date: Option<NaiveDate>,
    store: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.command.verbose() {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Plan(args) => handle_plan(args),
        Command::Add(args) => handle_edit(args, false),
        Command::Set(args) => handle_edit(args, true),
        Command::Remove(args) => handle_remove(args),
        Command::Clear(args) => handle_clear(args),
        Command::Reset(args) => handle_reset(args),
        Command::Sketch(args) => handle_sketch(args),
    }
}

fn resolve_settings(opts: &PlanOpts) -> Result<Settings> {
    let config = match opts.config.as_ref() {
        Some(path) => load_config(path)?,
        None => PlanConfig::default(),
    };

    let days = opts.days.or(config.days).unwrap_or(DEFAULT_DAYS);
    let horizon = Horizon::new(days)?;
    let target = opts.target.or(config.target).unwrap_or(DEFAULT_TARGET);
    if !target.is_finite() || target <= 0.0 {
        return Err(anyhow!("--target must be a positive number, got {}", target));
    }

    let mut params = Params::default();
    if let Some(mode) = config.mode {
        params.mode = mode;
    }
    if let Some(mode) = opts.mode {
        params.mode = mode.into();
    }
    params.clip_to_ceiling = !opts.no_clip && config.clip_to_ceiling.unwrap_or(true);
    params.reclip = !opts.no_reclip && config.reclip.unwrap_or(true);

    Ok(Settings {
        horizon,
        target,
        params,
        start_date: opts.start_date.or(config.start_date),
        store: opts
            .store
            .clone()
            .or(config.store)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE)),
    })
}

fn load_config(path: &Path) -> Result<PlanConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a valid config", path.display()))
}

/// Load the store and open a session on it. Points past the configured horizon
/// are discarded here, so every command that saves writes the fitted store.
fn open_planner(settings: &Settings) -> Result<Planner> {
    let store = load_or_default(
        &settings.store,
        settings.horizon,
        settings.params.mode,
        settings.target,
    );
    Ok(Planner::with_store(
        store,
        settings.horizon,
        settings.target,
        settings.params.clone(),
    )?)
}

fn handle_plan(args: PlanArgs) -> Result<()> {
    let settings = resolve_settings(&args.opts)?;
    let mut planner = open_planner(&settings)?;

    for (day, value) in parse_point_list(&args.points)? {
        planner
            .add_milestone(day, value)
            .with_context(|| format!("cannot add milestone {}:{}", day, value))?;
    }

    let t_compute = Instant::now();
    let plan = planner.recompute()?;
    if args.opts.profile || args.opts.verbose {
        info!(
            "Compute stage: {:.3} ms ({} days)",
            t_compute.elapsed().as_secs_f64() * 1000.0,
            plan.schedule.len()
        );
    }
    report_plan(&plan);

    if args.save {
        save_milestones(&settings.store, planner.store())?;
        info!("Saved {} milestones: {}", planner.store().len(), settings.store.display());
    }

    if is_stdout(&args.output) {
        write_schedule_stdout(&plan, settings.start_date)?;
        if args.table {
            // stdout carries the CSV
            eprint!("{}", view::render_table(&plan, settings.start_date));
        }
    } else {
        let t_csv = Instant::now();
        write_schedule_csv(&plan, settings.start_date, &args.output)?;
        if args.opts.profile || args.opts.verbose {
            info!(
                "CSV stage: {:.1} ms ({} rows)",
                t_csv.elapsed().as_secs_f64() * 1000.0,
                plan.schedule.len()
            );
        }
        info!("Wrote schedule CSV: {}", args.output.display());
        if args.table {
            print!("{}", view::render_table(&plan, settings.start_date));
        }
    }

    if args.json {
        let text = serde_json::to_string_pretty(&plan.summary)?;
        println!("{}", text);
    }

    if !args.no_plot {
        let mut targets: Vec<(PathBuf, ChartKind)> = Vec::new();
        if let Some(path) = args.png.as_ref() {
            targets.push((path.clone(), ChartKind::Png));
        } else if !is_stdout(&args.output) {
            let mut png_path = args.output.clone();
            png_path.set_extension("png");
            targets.push((png_path, ChartKind::Png));
        }
        if let Some(path) = args.svg.as_ref() {
            targets.push((path.clone(), ChartKind::Svg));
        }

        for (path, kind) in targets {
            let t_plot = Instant::now();
            if let Err(err) = render_chart_guard(&plan, &path, kind) {
                warn!("Skipping plot ({}): {}", path.display(), err);
            } else {
                info!("Wrote plot: {}", path.display());
            }
            if args.opts.profile || args.opts.verbose {
                info!(
                    "Plot stage: {:.1} ms",
                    t_plot.elapsed().as_secs_f64() * 1000.0
                );
            }
        }
    }

    Ok(())
}

fn handle_edit(args: EditArgs, replace: bool) -> Result<()> {
    let settings = resolve_settings(&args.opts)?;
    let mut planner = open_planner(&settings)?;
    let plan = if replace {
        planner.set_milestone(args.day, args.value)?
    } else {
        planner.add_milestone(args.day, args.value)?
    };
    save_milestones(&settings.store, planner.store())?;
    info!(
        "Milestone {}:{} stored ({} total): {}",
        args.day,
        args.value,
        planner.store().len(),
        settings.store.display()
    );
    report_plan(&plan);
    Ok(())
}

fn handle_remove(args: RemoveArgs) -> Result<()> {
    let settings = resolve_settings(&args.opts)?;
    let mut planner = open_planner(&settings)?;
    let before = planner.store().len();
    let plan = planner.remove_milestone(args.day)?;
    let removed = before - planner.store().len();
    if removed == 0 {
        warn!("No milestone on day {}", args.day);
    }
    save_milestones(&settings.store, planner.store())?;
    report_plan(&plan);
    Ok(())
}

fn handle_clear(args: StoreArgs) -> Result<()> {
    let settings = resolve_settings(&args.opts)?;
    let mut planner = open_planner(&settings)?;
    let plan = planner.clear()?;
    save_milestones(&settings.store, planner.store())?;
    info!("Store reset to defaults: {}", settings.store.display());
    report_plan(&plan);
    Ok(())
}

fn handle_reset(args: StoreArgs) -> Result<()> {
    let settings = resolve_settings(&args.opts)?;
    if remove_store(&settings.store)? {
        info!("Deleted milestone store: {}", settings.store.display());
    } else {
        info!("No milestone store at {}", settings.store.display());
    }
    Ok(())
}

fn handle_sketch(args: SketchArgs) -> Result<()> {
    let mut points: Vec<SketchPoint> = match args.input.as_ref() {
        Some(path) => load_sketch_points(path)?,
        None => Vec::new(),
    };
    points.extend(parse_sketch_points(&args.points)?);
    if points.len() < 2 {
        return Err(anyhow!("add at least two points (--input or --point x:y)"));
    }

    let samples = args.samples.unwrap_or_else(|| Params::default().sketch_samples);
    let sketch = sketch_normalize(&points, samples, args.sum)?;
    info!(
        "Sum before: {:.2}, offset: {:.4}, sum after: {:.2}",
        sketch.summary.sum_before, sketch.summary.adjustment, sketch.summary.sum_after
    );

    if is_stdout(&args.output) {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_sketch_rows(&sketch, &mut writer)
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_sketch_rows(&sketch, &mut writer)?;
        info!("Wrote sketch CSV: {}", args.output.display());
        Ok(())
    }
}

fn report_plan(plan: &Plan) {
    if !plan.dropped.is_empty() {
        warn!(
            "{} milestone(s) past day {} ignored",
            plan.dropped.len(),
            plan.horizon.boundary_day()
        );
    }
    info!("{}", view::render_summary(plan));
    if let Some(message) = residual_warning(plan) {
        warn!("{}", message);
    }
}

fn residual_warning(plan: &Plan) -> Option<String> {
    let residual = plan.summary.residual();
    if residual.abs() <= 1e-6 {
        return None;
    }
    let message = match (plan.mode, plan.ceiling) {
        (Mode::Daily, Some(_)) => format!(
            "Schedule misses the target by {:.2} after clipping to the daily ceiling",
            residual
        ),
        (Mode::Daily, None) => format!("Schedule misses the target by {:.2}", residual),
        (Mode::Cumulative, _) => format!(
            "Final running total misses the target by {:.2}",
            residual
        ),
    };
    Some(message)
}

fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn parse_point_list(tokens: &[String]) -> Result<Vec<(u32, f64)>> {
    split_tokens(tokens)
        .map(|token| -> Result<(u32, f64)> {
            let (day, value) = token
                .split_once(':')
                .ok_or_else(|| anyhow!("invalid point '{}': expected day:value", token))?;
            let day: u32 = day
                .trim()
                .parse()
                .with_context(|| format!("invalid day in '{}': expected integer", token))?;
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("invalid value in '{}': expected number", token))?;
            Ok((day, value))
        })
        .collect()
}

fn parse_sketch_points(tokens: &[String]) -> Result<Vec<SketchPoint>> {
    split_tokens(tokens)
        .map(|token| -> Result<SketchPoint> {
            let (x, y) = token
                .split_once(':')
                .ok_or_else(|| anyhow!("invalid point '{}': expected x:y", token))?;
            let x: f64 = x
                .trim()
                .parse()
                .with_context(|| format!("invalid x in '{}'", token))?;
            let y: f64 = y
                .trim()
                .parse()
                .with_context(|| format!("invalid y in '{}'", token))?;
            Ok(SketchPoint { x, y })
        })
        .collect()
}

fn split_tokens(tokens: &[String]) -> impl Iterator<Item = &str> {
    tokens
        .iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn write_schedule_stdout(plan: &Plan, start_date: Option<NaiveDate>) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::Writer::from_writer(handle);
    write_schedule_rows(plan, start_date, &mut writer)
}

fn write_schedule_csv(plan: &Plan, start_date: Option<NaiveDate>, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_schedule_rows(plan, start_date, &mut writer)
}

fn write_schedule_rows<W: Write>(
    plan: &Plan,
    start_date: Option<NaiveDate>,
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    let mut header = vec!["day"];
    if start_date.is_some() {
        header.push("date");
    }
    header.extend(["raw", "amount", "cumulative", "at_ceiling"]);
    writer.write_record(&header)?;

    let cumulative = plan.cumulative();
    for (day, (&amount, &raw)) in plan.schedule.iter().zip(plan.raw.iter()).enumerate() {
        let mut row = vec![day.to_string()];
        if let Some(start) = start_date {
            row.push(view::day_label(start, day));
        }
        row.push(format!("{:.2}", raw));
        row.push(format!("{:.2}", amount));
        row.push(format!("{:.2}", cumulative[day]));
        row.push(plan.at_ceiling(day).to_string());
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_sketch_rows<W: Write>(sketch: &Sketch, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(["x", "sample", "normalized"])?;
    for ((x, sample), normalized) in sketch
        .xs
        .iter()
        .zip(sketch.samples.iter())
        .zip(sketch.normalized.iter())
    {
        writer.write_record([
            format!("{:.4}", x),
            format!("{:.4}", sample),
            format!("{:.4}", normalized),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
