//! Server-side PNG snapshot of the price scatter.
//!
//! Rendering goes through a temporary file that is removed when the
//! `NamedTempFile` guard drops, whichever way `render_png` returns.

use std::ops::Range;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use plotters::style::full_palette::{GREY, ORANGE};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::types::{RefineColor, TradeRecord};

const MARKER_RADIUS: i32 = 6;
const MARKER_ALPHA: f64 = 0.5;

fn marker_color(color: RefineColor) -> RGBColor {
    match color {
        RefineColor::Black => BLACK,
        RefineColor::Blue => BLUE,
        RefineColor::Green => GREEN,
        RefineColor::Orange => ORANGE,
        RefineColor::Red => RED,
        RefineColor::Gray => GREY,
    }
}

/// Axis ranges covering every record. Degenerate spans are widened so the
/// chart can still be built for zero or one record.
pub fn plot_bounds(records: &[TradeRecord]) -> (Range<DateTime<Utc>>, Range<f64>) {
    let first = records.iter().map(|r| r.log_date).min();
    let last = records.iter().map(|r| r.log_date).max();
    let dates = match (first, last) {
        (Some(first), Some(last)) if first < last => first.and_utc()..last.and_utc(),
        (Some(only), _) => {
            let at = only.and_utc();
            at - Duration::hours(1)..at + Duration::hours(1)
        }
        _ => {
            let now = Utc::now();
            now - Duration::days(1)..now
        }
    };

    let max_price = records.iter().map(TradeRecord::price_mz).fold(0.0_f64, f64::max);
    let top = if max_price > 0.0 { max_price * 1.1 } else { 1.0 };
    (dates, 0.0..top)
}

pub fn draw_scatter<'a, T>(
    backend: T,
    title: &str,
    records: &[TradeRecord],
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync + 'a>>
where
    T: 'a + DrawingBackend,
{
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let (x_range, y_range) = plot_bounds(records);
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .caption(title, ("sans-serif", 28).into_font())
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc("日付")
        .y_desc("価格(Mz)")
        .x_labels(6)
        .x_label_formatter(&|x| x.format("%Y-%m-%d").to_string())
        .draw()?;

    chart.draw_series(records.iter().map(|r| {
        Circle::new(
            (r.log_date.and_utc(), r.price_mz()),
            MARKER_RADIUS,
            marker_color(r.color()).mix(MARKER_ALPHA).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Renders the scatter to PNG bytes. Blocking; run it off the async workers.
pub fn render_png(title: &str, records: &[TradeRecord], size: (u32, u32)) -> Result<Vec<u8>> {
    render_png_in(&std::env::temp_dir(), title, records, size)
}

fn render_png_in(
    dir: &Path,
    title: &str,
    records: &[TradeRecord],
    size: (u32, u32),
) -> Result<Vec<u8>> {
    let file = tempfile::Builder::new()
        .prefix("trade-chart-")
        .suffix(".png")
        .tempfile_in(dir)?;

    {
        let backend = BitMapBackend::new(file.path(), size);
        draw_scatter(backend, title, records).map_err(|e| AppError::Render(e.to_string()))?;
    }

    let bytes = std::fs::read(file.path())?;
    debug!(path = %file.path().display(), bytes = bytes.len(), "chart rendered");
    Ok(bytes)
}
