use std::fs;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use route_grade::{
    analyze_route, assess, parse_track, resolve_elevations, Coordinate, ElevationMode,
    ElevationSource, Route, RouteProfile, SafetyParams, StopAssessment,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod open_elevation;
mod plot;

use open_elevation::OpenElevationClient;
use plot::{render_profile_guard, ChartKind, ProfilePlot};

#[derive(Parser, Debug)]
#[command(author, version, about = "Route slope hazard assessment CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify stops near a GPX/FIT route as safe or dangerous
    Assess(AssessArgs),
    /// Write the distance axis and angle profile of a GPX/FIT route
    Profile(ProfileArgs),
}

#[derive(Args, Debug)]
struct RouteArgs {
    /// GPX/FIT route file
    #[arg(value_hint = ValueHint::FilePath)]
    route: PathBuf,

    /// Elevation source
    #[arg(long, value_enum, default_value_t = ElevationOpt::Auto)]
    elevation: ElevationOpt,

    /// Open-Elevation compatible lookup endpoint
    #[arg(long, default_value = open_elevation::DEFAULT_URL)]
    elevation_url: String,

    /// Points per elevation request
    #[arg(long, default_value_t = 500)]
    elevation_batch: usize,

    /// Elevation request timeout (seconds)
    #[arg(long, default_value_t = 30.0)]
    elevation_timeout: f64,

    /// Output PNG figure path (defaults next to CSV)
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Output SVG figure path
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Disable plot generation
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct AssessArgs {
    #[command(flatten)]
    route: RouteArgs,

    /// CSV of stops with lat/lon columns
    #[arg(long, value_hint = ValueHint::FilePath)]
    stops: Option<PathBuf>,

    /// Extra stop as LAT,LON (repeatable)
    #[arg(long = "stop", value_parser = parse_stop_arg, allow_hyphen_values = true, action = ArgAction::Append)]
    stop: Vec<Coordinate>,

    /// Maximum tolerated absolute slope (degrees)
    #[arg(long)]
    angle_threshold: Option<f64>,

    /// One-sided coverage around each stop (meters)
    #[arg(long)]
    stop_coverage: Option<f64>,

    /// JSON file with safety parameters; flags override it
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Output CSV path for stop verdicts (`-` for stdout)
    #[arg(short, long, default_value = "stops.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Also write the route profile CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    profile_csv: Option<PathBuf>,

    /// Also write the full assessment as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    json: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[command(flatten)]
    route: RouteArgs,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "profile.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ElevationOpt {
    Auto,
    Recorded,
    Lookup,
}

impl From<ElevationOpt> for ElevationMode {
    fn from(value: ElevationOpt) -> Self {
        match value {
            ElevationOpt::Auto => ElevationMode::Auto,
            ElevationOpt::Recorded => ElevationMode::Recorded,
            ElevationOpt::Lookup => ElevationMode::Lookup,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Assess(args) => args.route.verbose,
        Command::Profile(args) => args.route.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Assess(args) => handle_assess(args),
        Command::Profile(args) => handle_profile(args),
    }
}

fn handle_assess(args: AssessArgs) -> Result<()> {
    let mut params = match args.config.as_ref() {
        Some(path) => load_params(path)?,
        None => SafetyParams::default(),
    };
    if let Some(threshold) = args.angle_threshold {
        params.angle_threshold = threshold;
    }
    if let Some(coverage) = args.stop_coverage {
        params.stop_coverage = coverage;
    }
    params.validate()?;

    let mut stops = match args.stops.as_ref() {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            read_stops(file).with_context(|| format!("failed to read stops {}", path.display()))?
        }
        None => Vec::new(),
    };
    stops.extend(args.stop.iter().copied());
    if stops.is_empty() {
        warn!("No stops supplied; only the route profile will be computed");
    }

    let route = load_route(&args.route)?;

    let t_compute = Instant::now();
    let assessment = assess(&route, &stops, &params)?;
    let dangerous = assessment
        .stops
        .iter()
        .filter(|s| s.verdict.is_dangerous())
        .count();
    if args.route.verbose {
        info!(
            "Compute stage: {:.1} ms",
            t_compute.elapsed().as_secs_f64() * 1000.0
        );
    }
    info!(
        "Assessed {} stops: {} dangerous (threshold {:.2} deg, coverage {:.0} m)",
        assessment.stops.len(),
        dangerous,
        params.angle_threshold,
        params.stop_coverage
    );
    for (index, stop) in assessment.stops.iter().enumerate() {
        debug!(
            "stop {} ({:.6}, {:.6}): {} window {:?}, max {:.2} deg",
            index,
            stop.stop.lat,
            stop.stop.lon,
            stop.verdict,
            stop.window.as_tuple(),
            stop.max_abs_angle_deg
        );
    }

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_stop_rows(&assessment.stops, &mut writer)?;
    } else {
        let mut writer = csv_writer(&args.output)?;
        write_stop_rows(&assessment.stops, &mut writer)?;
        info!("Wrote stop verdicts: {}", args.output.display());
    }

    if let Some(path) = args.profile_csv.as_ref() {
        let mut writer = csv_writer(path)?;
        write_profile_rows(&route, &assessment.profile, &mut writer)?;
        info!("Wrote route profile: {}", path.display());
    }

    if let Some(path) = args.json.as_ref() {
        let text = serde_json::to_string_pretty(&assessment)?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote assessment JSON: {}", path.display());
    }

    let plot = ProfilePlot {
        distance_m: &assessment.profile.distance_axis,
        elevation_m: route.elevations(),
        angle_deg: &assessment.profile.angle_profile,
        stops: &assessment.stops,
    };
    render_plots(&args.route, &args.output, &plot);
    Ok(())
}

fn handle_profile(args: ProfileArgs) -> Result<()> {
    let route = load_route(&args.route)?;
    let profile = analyze_route(&route)?;
    info!(
        "Route profile: {} points over {:.1} m",
        profile.len(),
        profile.total_distance_m()
    );

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_profile_rows(&route, &profile, &mut writer)?;
    } else {
        let mut writer = csv_writer(&args.output)?;
        write_profile_rows(&route, &profile, &mut writer)?;
        info!("Wrote route profile: {}", args.output.display());
    }

    let plot = ProfilePlot {
        distance_m: &profile.distance_axis,
        elevation_m: route.elevations(),
        angle_deg: &profile.angle_profile,
        stops: &[],
    };
    render_plots(&args.route, &args.output, &plot);
    Ok(())
}

fn load_route(args: &RouteArgs) -> Result<Route> {
    let t_parse = Instant::now();
    let data =
        fs::read(&args.route).with_context(|| format!("failed to read {}", args.route.display()))?;
    let hint = args
        .route
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("gpx");
    let points = parse_track(&data, hint)
        .with_context(|| format!("failed to parse {}", args.route.display()))?;
    if args.verbose {
        info!(
            "Parse stage: {:.1} ms ({} points)",
            t_parse.elapsed().as_secs_f64() * 1000.0,
            points.len()
        );
    }

    let mode: ElevationMode = args.elevation.into();
    let client = match mode {
        ElevationMode::Recorded => None,
        ElevationMode::Auto | ElevationMode::Lookup => {
            if !args.elevation_timeout.is_finite() || args.elevation_timeout <= 0.0 {
                return Err(anyhow!("--elevation-timeout must be a positive number of seconds"));
            }
            Some(OpenElevationClient::new(
                &args.elevation_url,
                args.elevation_batch,
                Duration::from_secs_f64(args.elevation_timeout),
            )?)
        }
    };
    let source = client.as_ref().map(|c| c as &dyn ElevationSource);
    let elevations = resolve_elevations(&points, mode, source)
        .with_context(|| format!("no elevations for {}", args.route.display()))?;

    let waypoints = points.iter().map(|p| p.coord).collect();
    let route = Route::new(waypoints, elevations)
        .with_context(|| format!("invalid route {}", args.route.display()))?;
    info!("Route loaded: {} points", route.len());
    Ok(route)
}

fn render_plots(args: &RouteArgs, output: &Path, plot: &ProfilePlot) {
    if args.no_plot {
        return;
    }
    let mut targets: Vec<PathBuf> = Vec::new();
    if let Some(path) = args.png.as_ref() {
        targets.push(path.clone());
    } else if output.as_os_str() != "-" {
        let mut png_path = output.to_path_buf();
        png_path.set_extension("png");
        targets.push(png_path);
    }
    if let Some(path) = args.svg.as_ref() {
        targets.push(path.clone());
    }

    for path in targets {
        let t_plot = Instant::now();
        match render_profile_guard(plot, &path, ChartKind::from_path(&path)) {
            Ok(()) => info!("Wrote plot: {}", path.display()),
            Err(err) => warn!("Skipping plot render ({}): {}", path.display(), err),
        }
        if args.verbose {
            info!(
                "Plot stage: {:.1} ms",
                t_plot.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
}

fn load_params(path: &Path) -> Result<SafetyParams> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let params: SafetyParams = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid parameter file", path.display()))?;
    Ok(params)
}

fn parse_stop_arg(input: &str) -> Result<Coordinate, String> {
    let (lat, lon) = input
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{}'", input))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude '{}'", lon.trim()))?;
    Ok(Coordinate::new(lat, lon))
}

fn read_stops<R: Read>(reader: R) -> Result<Vec<Coordinate>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };
    let lat_col = find(&["lat", "latitude"]).ok_or_else(|| anyhow!("stops CSV has no lat column"))?;
    let lon_col = find(&["lon", "lng", "longitude"])
        .ok_or_else(|| anyhow!("stops CSV has no lon column"))?;

    let mut stops = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let field = |col: usize| -> Result<f64> {
            let raw = record.get(col).unwrap_or("").trim();
            raw.parse()
                .with_context(|| format!("row {}: invalid number '{}'", row + 1, raw))
        };
        stops.push(Coordinate::new(field(lat_col)?, field(lon_col)?));
    }
    Ok(stops)
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(csv::Writer::from_writer(file))
}

fn write_stop_rows<W: Write>(stops: &[StopAssessment], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record([
        "stop_index",
        "lat",
        "lon",
        "verdict",
        "left",
        "center",
        "right",
        "nearest_distance_m",
        "max_abs_angle_deg",
    ])?;
    for (index, stop) in stops.iter().enumerate() {
        writer.write_record([
            index.to_string(),
            format!("{:.6}", stop.stop.lat),
            format!("{:.6}", stop.stop.lon),
            stop.verdict.label().to_string(),
            stop.window.left.to_string(),
            stop.window.center.to_string(),
            stop.window.right.to_string(),
            format!("{:.3}", stop.nearest_distance_m),
            format!("{:.3}", stop.max_abs_angle_deg),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_profile_rows<W: Write>(
    route: &Route,
    profile: &RouteProfile,
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    writer.write_record([
        "index",
        "lat",
        "lon",
        "elevation_m",
        "distance_m",
        "angle_deg",
    ])?;
    let rows = route
        .waypoints()
        .iter()
        .zip(route.elevations())
        .zip(profile.distance_axis.iter().zip(&profile.angle_profile));
    for (index, ((coord, elevation), (distance, angle))) in rows.enumerate() {
        writer.write_record([
            index.to_string(),
            format!("{:.6}", coord.lat),
            format!("{:.6}", coord.lon),
            format!("{:.2}", elevation),
            format!("{:.3}", distance),
            format!("{:.4}", angle),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
