use std::path::Path;

use anyhow::Context;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::models::{CertificateRecord, Dataset, Datasets, EngagementRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width bins spanning the data's min to max; the last bin is closed.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // A single distinct value still gets a visible bar.
    let (min, max) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
    let width = (max - min) / bins as f64;

    let mut counts = vec![0usize; bins];
    for value in values {
        let index = (((value - min) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: min + width * i as f64,
            end: min + width * (i + 1) as f64,
            count,
        })
        .collect()
}

fn draw_histogram(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    dataset: &Dataset<EngagementRecord>,
    bins: usize,
) -> anyhow::Result<()> {
    let histogram = histogram_bins(&dataset.minutes(), bins);
    let (x_min, x_max) = match (histogram.first(), histogram.last()) {
        (Some(first), Some(last)) => (first.start, last.end),
        _ => (0.0, 1.0),
    };
    let y_max = histogram.iter().map(|b| b.count).max().unwrap_or(0).max(1);

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("Minutes Watched Distribution - {}", dataset.id),
            ("sans-serif", 20),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, 0usize..y_max + y_max / 10 + 1)?;
    chart
        .configure_mesh()
        .x_desc("Minutes")
        .y_desc("Count")
        .draw()?;
    chart
        .draw_series(histogram.iter().map(|bin| {
            Rectangle::new([(bin.start, 0), (bin.end, bin.count)], BLUE.mix(0.6).filled())
        }))?;
    Ok(())
}

/// One histogram panel per engagement dataset on a 2x2 grid.
pub fn render_distributions(datasets: &Datasets, bins: usize, path: &Path) -> anyhow::Result<()> {
    let root = BitMapBackend::new(path, (1500, 1000)).into_drawing_area();
    root.fill(&WHITE)?;

    let panels = root.split_evenly((2, 2));
    for (panel, dataset) in panels.iter().zip(datasets.engagement()) {
        draw_histogram(panel, dataset, bins)
            .with_context(|| format!("failed to draw histogram for {}", dataset.id))?;
    }

    root.present()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Scatter plot of minutes watched against certificates issued.
pub fn render_correlation(
    certificates: &Dataset<CertificateRecord>,
    path: &Path,
) -> anyhow::Result<()> {
    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_max = certificates
        .records
        .iter()
        .map(|r| r.minutes_watched)
        .fold(0.0, f64::max)
        .max(1.0);
    let y_max = certificates
        .records
        .iter()
        .map(|r| f64::from(r.certificates_issued))
        .fold(0.0, f64::max)
        .max(1.0);

    let mut chart = ChartBuilder::on(&root)
        .caption("Minutes Watched vs Certificates", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..x_max * 1.05, 0.0..y_max * 1.05)?;
    chart
        .configure_mesh()
        .x_desc("Minutes")
        .y_desc("Certificates")
        .draw()?;
    chart
        .draw_series(certificates.records.iter().map(|r| {
            Circle::new(
                (r.minutes_watched, f64::from(r.certificates_issued)),
                3,
                BLUE.mix(0.5).filled(),
            )
        }))?;

    root.present()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
