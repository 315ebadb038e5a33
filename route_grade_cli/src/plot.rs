//! Elevation and angle profile charts.

use std::panic;
use std::path::Path;

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use route_grade::StopAssessment;

pub enum ChartKind {
    Png,
    Svg,
}

impl ChartKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => ChartKind::Svg,
            _ => ChartKind::Png,
        }
    }
}

/// Plain data handed to the renderer.
pub struct ProfilePlot<'a> {
    pub distance_m: &'a [f64],
    pub elevation_m: &'a [f64],
    pub angle_deg: &'a [f64],
    pub stops: &'a [StopAssessment],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { min, max, mean })
    }
}

struct Panel<'a> {
    title: &'a str,
    y_desc: &'a str,
    unit: &'a str,
    values: &'a [f64],
}

const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const MEAN_COLOR: RGBColor = RGBColor(214, 190, 0);

/// Render both panels, turning backend errors and panics into a message.
pub fn render_profile_guard(plot: &ProfilePlot, path: &Path, kind: ChartKind) -> Result<(), String> {
    let render = || -> Result<(), String> {
        let result = match kind {
            ChartKind::Png => {
                let root = BitMapBackend::new(path, (1300, 1300)).into_drawing_area();
                render_profile(root, plot)
            }
            ChartKind::Svg => {
                let root = SVGBackend::new(path, (1300, 1300)).into_drawing_area();
                render_profile(root, plot)
            }
        };
        result.map_err(|e| format!("plotting error: {}", e))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_profile<DB>(root: DrawingArea<DB, Shift>, plot: &ProfilePlot) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically(650);
    draw_panel(
        &upper,
        plot,
        &Panel {
            title: "Elevation profile",
            y_desc: "Elevation (m)",
            unit: "m",
            values: plot.elevation_m,
        },
    )?;
    draw_panel(
        &lower,
        plot,
        &Panel {
            title: "Angle profile",
            y_desc: "Angle (deg)",
            unit: "deg",
            values: plot.angle_deg,
        },
    )?;
    root.present()?;
    Ok(())
}

fn draw_panel<DB>(area: &DrawingArea<DB, Shift>, plot: &ProfilePlot, panel: &Panel) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let Some(stats) = Summary::of(panel.values) else {
        return Ok(());
    };
    let x_max = plot.distance_m.last().copied().unwrap_or(0.0).max(1.0);
    let (y_min, y_max) = padded_range(stats.min.min(0.0), stats.max.max(0.0));

    let mut chart = ChartBuilder::on(area)
        .margin(25)
        .caption(
            panel.title,
            FontDesc::new(FontFamily::SansSerif, 22.0, FontStyle::Normal),
        )
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Distance (m)")
        .y_desc(panel.y_desc)
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.1}", v))
        .draw()?;

    let min_width = x_max * 0.002;
    for stop in plot.stops {
        let x0 = plot.distance_m[stop.window.left];
        let x1 = plot.distance_m[stop.window.right].max(x0 + min_width);
        let tint = if stop.verdict.is_dangerous() {
            RED.mix(0.12)
        } else {
            GREEN.mix(0.12)
        };
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x0, y_min), (x1, y_max)],
            tint.filled(),
        )))?;
    }

    let points = || {
        plot.distance_m
            .iter()
            .copied()
            .zip(panel.values.iter().copied())
    };
    chart.draw_series(AreaSeries::new(points(), 0.0, LINE_COLOR.mix(0.1)))?;
    chart.draw_series(LineSeries::new(points(), LINE_COLOR.stroke_width(2)))?;

    let references = [
        ("min", stats.min, GREEN),
        ("max", stats.max, RED),
        ("mean", stats.mean, MEAN_COLOR),
    ];
    for (label, value, color) in references {
        chart
            .draw_series(LineSeries::new(
                vec![(0.0, value), (x_max, value)],
                color.stroke_width(2),
            ))?
            .label(format!("{}: {:.2} {}", label, value, panel.unit))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .label_font(FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;
    Ok(())
}

fn padded_range(lo: f64, hi: f64) -> (f64, f64) {
    let span = (hi - lo).max(1.0);
    (lo - span * 0.05, hi + span * 0.05)
}
