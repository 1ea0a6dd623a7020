use std::panic;
use std::path::Path;

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use savings_curve::Plan;

const RAW_COLOR: RGBColor = RGBColor(150, 150, 150);
const SCHEDULE_COLOR: RGBColor = RGBColor(34, 139, 34);
const MILESTONE_COLOR: RGBColor = RGBColor(30, 90, 200);
const CEILING_COLOR: RGBColor = RGBColor(200, 0, 60);

pub enum ChartKind {
    Png,
    Svg,
}

/// Render the plan chart, turning backend panics into errors.
pub fn render_chart_guard(plan: &Plan, path: &Path, kind: ChartKind) -> Result<(), String> {
    let render = || -> Result<(), String> {
        render_chart(plan, path, kind).map_err(|e| format!("plotting error: {}", e))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_chart(plan: &Plan, path: &Path, kind: ChartKind) -> Result<()> {
    if plan.schedule.is_empty() {
        return Ok(());
    }
    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, (1280, 720)).into_drawing_area();
            draw_plan_chart(root, plan)
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, (1280, 720)).into_drawing_area();
            draw_plan_chart(root, plan)
        }
    }
}

/// Raw interpolation, final schedule, milestones and the daily ceiling.
/// Text-free so no font backend is required.
fn draw_plan_chart<DB>(root: DrawingArea<DB, Shift>, plan: &Plan) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let in_range: Vec<(f64, f64)> = plan
        .milestones
        .iter()
        .filter(|m| plan.horizon.contains(m.day))
        .map(|m| (m.day as f64, m.value))
        .collect();

    let values = plan
        .raw
        .iter()
        .chain(plan.schedule.iter())
        .chain(in_range.iter().map(|(_, v)| v))
        .chain(plan.ceiling.iter())
        .copied()
        .filter(|v| v.is_finite());
    let (mut y_min, mut y_max) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if (y_max - y_min).abs() < f64::EPSILON {
        y_max = y_min + 1.0;
    }
    let pad = (y_max - y_min) * 0.05;
    y_min -= pad;
    y_max += pad;
    let x_max = (plan.schedule.len().saturating_sub(1) as f64).max(1.0);

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(30)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    chart.draw_series(LineSeries::new(
        [(0.0, 0.0), (x_max, 0.0)],
        &RGBColor(210, 210, 210),
    ))?;

    if let Some(ceiling) = plan.ceiling {
        chart.draw_series(LineSeries::new(
            [(0.0, ceiling), (x_max, ceiling)],
            &CEILING_COLOR,
        ))?;
    }

    chart.draw_series(LineSeries::new(
        plan.raw.iter().enumerate().map(|(d, &v)| (d as f64, v)),
        &RAW_COLOR,
    ))?;

    chart.draw_series(LineSeries::new(
        plan.schedule.iter().enumerate().map(|(d, &v)| (d as f64, v)),
        SCHEDULE_COLOR.stroke_width(3),
    ))?;

    chart.draw_series(
        in_range
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 5, MILESTONE_COLOR.filled())),
    )?;

    root.present()?;
    Ok(())
}
