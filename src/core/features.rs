// Feature derivation: FD, RUL, PH and SoH from a canonical series

use ndarray::{s, Array1};
use tracing::debug;

use crate::core::constants::{SMOOTHING_WINDOW, ZERO_VOLTAGE_SUBSTITUTE};
use crate::core::format::{CanonicalSeries, FeaturePoint, FeatureSeries, FeatureTrace};

/// Direction in which a column's change counts as accumulated progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// `previous - current`, e.g. voltage lost.
    Decline,
    /// `current - previous`, e.g. time elapsed.
    Rise,
}

/// Intermediate and final arrays of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub deltas: Array1<f64>,
    pub cumulative: Array1<f64>,
    pub normalized: Array1<f64>,
    pub smoothed: Array1<f64>,
}

/// Per-sample differences with a zero first element.
pub fn deltas(values: &[f64]) -> Array1<f64> {
    let mut out = Array1::zeros(values.len());
    for i in 1..values.len() {
        out[i] = values[i] - values[i - 1];
    }
    out
}

/// Run deltas → cumulative → normalize → smooth over one column.
pub fn degradation_signal(values: &[f64], orientation: Orientation) -> Signal {
    let deltas = deltas(values);
    let steps = match orientation {
        Orientation::Decline => -&deltas,
        Orientation::Rise => deltas.clone(),
    };

    let mut cumulative = Array1::zeros(steps.len());
    let mut running = 0.0;
    for (i, step) in steps.iter().enumerate() {
        running += step;
        cumulative[i] = running;
    }

    let peak = cumulative.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let normalized = if peak > 0.0 {
        cumulative.mapv(|c| c / peak)
    } else {
        Array1::zeros(cumulative.len())
    };

    let smoothed = trailing_mean(&normalized, SMOOTHING_WINDOW);

    Signal {
        deltas,
        cumulative,
        normalized,
        smoothed,
    }
}

/// Trailing moving average; the first `window - 1` points average over
/// however many samples exist so far.
pub fn trailing_mean(values: &Array1<f64>, window: usize) -> Array1<f64> {
    let window = window.max(1);
    let mut out = Array1::zeros(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = values.slice(s![start..i + 1]);
        out[i] = slice.sum() / slice.len() as f64;
    }
    out
}

/// Derive the feature series. Output is index-aligned with `series`.
///
/// - FD: normalized, smoothed cumulative voltage loss.
/// - PH: `1 - FD`.
/// - RUL: `1 -` the normalized, smoothed elapsed time.
/// - SoH: `100 * (1 -` the normalized, smoothed rise of `1 / voltage`).
pub fn derive(series: &CanonicalSeries) -> FeatureSeries {
    let times = series.times();
    let voltages = series.voltages();
    let inverse: Vec<f64> = voltages
        .iter()
        .map(|v| if *v == 0.0 { 1.0 / ZERO_VOLTAGE_SUBSTITUTE } else { 1.0 / v })
        .collect();

    let fd = degradation_signal(&voltages, Orientation::Decline);
    let elapsed = degradation_signal(&times, Orientation::Rise);
    let impedance = degradation_signal(&inverse, Orientation::Rise);

    let points = (0..series.len())
        .map(|i| FeaturePoint {
            time: times[i],
            fd: fd.smoothed[i],
            rul: 1.0 - elapsed.smoothed[i],
            ph: 1.0 - fd.smoothed[i],
            soh: 100.0 * (1.0 - impedance.smoothed[i]),
        })
        .collect();

    debug!("Derived {} feature points", series.len());

    FeatureSeries {
        points,
        trace: FeatureTrace {
            dt: deltas(&times).to_vec(),
            dv: fd.deltas.to_vec(),
            cum_loss: fd.cumulative.to_vec(),
            fd_raw: fd.normalized.to_vec(),
        },
    }
}
