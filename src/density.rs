use std::collections::HashMap;

use crate::model::{BlockId, ModelDataset};

/// Palette ordered from the sparsest to the densest bin.
pub const DENSITY_COLORS: [&str; 8] = [
    "#fc9d30", "#fcf347", "#b7fc47", "#6af73b", "#29ba3a", "#198a2c", "#035112", "#0c2e13",
];

pub const COLOR_COUNT: usize = DENSITY_COLORS.len();

/// Share of values dropped at each end before measuring the range.
const TRIM_FRACTION: f64 = 0.008;

/// Above this trimmed maximum, range and step snap to multiples of 5.
const SNAP_THRESHOLD: f64 = 40.0;
const SNAP: f64 = 5.0;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DensityBreaks {
    pub breaks: Vec<f64>,
    pub min: f64,
    pub max: f64,
}

pub fn compute_breaks(densities: &[f64]) -> DensityBreaks {
    let mut sorted: Vec<f64> = densities.iter().copied().filter(|d| d.is_finite()).collect();
    if sorted.is_empty() {
        return DensityBreaks::default();
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    let start = (n * TRIM_FRACTION).floor() as usize;
    let end = ((n * (1.0 - TRIM_FRACTION)).ceil() as usize).min(sorted.len());
    let trimmed = &sorted[start..end.max(start + 1)];

    let raw_min = trimmed[0];
    let raw_max = trimmed[trimmed.len() - 1];
    let snapped = raw_max > SNAP_THRESHOLD;
    let (min, max) = if snapped {
        ((raw_min / SNAP).floor() * SNAP, (raw_max / SNAP).ceil() * SNAP)
    } else {
        (raw_min, raw_max)
    };

    let range = max - min;
    let mut step = if snapped {
        let approx = (range / COLOR_COUNT as f64).round();
        ((approx / SNAP).floor() * SNAP).max(SNAP)
    } else {
        range / COLOR_COUNT as f64
    };
    let spread = |step: f64| -> Vec<f64> { (1..COLOR_COUNT).map(|i| min + i as f64 * step).collect() };
    let mut breaks = spread(step);
    // equal or near-equal values collapse the thresholds
    if !breaks.windows(2).all(|w| w[0] < w[1]) {
        step = 1.0;
        breaks = spread(step);
    }
    DensityBreaks {
        breaks,
        min,
        max: min + step * COLOR_COUNT as f64,
    }
}

/// Bin index for `value`; 0 is the sparsest bin.
pub fn classify(value: f64, breaks: &[f64]) -> usize {
    let density = value.ceil();
    for i in (0..breaks.len()).rev() {
        if density > breaks[i] {
            return i + 1;
        }
    }
    0
}

pub fn density_color(value: f64, breaks: &[f64]) -> &'static str {
    DENSITY_COLORS[classify(value, breaks).min(COLOR_COUNT - 1)]
}

#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub color: &'static str,
    pub label: String,
}

/// Legend rows from the sparsest bin upwards.
pub fn legend_entries(b: &DensityBreaks) -> Vec<LegendEntry> {
    if b.breaks.is_empty() {
        return Vec::new();
    }
    let mut edges = Vec::with_capacity(b.breaks.len() + 2);
    edges.push(b.min);
    edges.extend_from_slice(&b.breaks);
    edges.push(b.max);
    (0..COLOR_COUNT)
        .map(|i| {
            let from = edges[i];
            let label = if i == COLOR_COUNT - 1 {
                format!("> {:.0}.00", from.round() - 1.0)
            } else {
                let to = edges[i + 1] - 1.0;
                format!("{:.0}.00 - {:.0}.99", from, to)
            };
            LegendEntry {
                color: DENSITY_COLORS[i],
                label,
            }
        })
        .collect()
}

/// Per-block mean over the datasets that carry a density for that block.
pub fn average_block_densities<'a>(
    datasets: impl IntoIterator<Item = &'a ModelDataset>,
) -> HashMap<BlockId, f64> {
    let mut sums: HashMap<BlockId, (f64, u32)> = HashMap::new();
    for ds in datasets {
        let Some(blocks) = &ds.block_densities else { continue };
        for (id, d) in blocks {
            if !d.is_finite() {
                continue;
            }
            let e = sums.entry(id.clone()).or_insert((0.0, 0));
            e.0 += d;
            e.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(id, (sum, count))| (id, sum / count as f64))
        .collect()
}
