// Alignment of two decay curves on a shared voltage grid

use ndarray::Array1;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::core::constants::{ALIGNMENT_GRID_POINTS, ZERO_VOLTAGE_SUBSTITUTE};
use crate::core::error::{DecayError, Result};
use crate::core::format::{AlignmentResult, CanonicalSeries};

/// Piecewise-linear `y(x)` with linear extrapolation past both ends.
#[derive(Debug, Clone)]
pub struct LinearInterpolant {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearInterpolant {
    /// Build from unsorted knots. Repeated `x` values collapse to their
    /// first occurrence in input order, so every segment has non-zero width
    /// and both ends extrapolate along a real slope.
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self> {
        if xs.is_empty() || xs.len() != ys.len() {
            return Err(DecayError::DegenerateCurve(
                "interpolant needs matching, non-empty knots",
            ));
        }

        let mut knots: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
        knots.sort_by_key(|(x, _)| OrderedFloat(*x));
        knots.dedup_by(|later, first| later.0 == first.0);

        let (xs, ys) = knots.into_iter().unzip();
        Ok(Self { xs, ys })
    }

    pub fn min_x(&self) -> f64 {
        self.xs[0]
    }

    pub fn max_x(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }

    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if n == 1 {
            return self.ys[0];
        }

        // Segment [lo, lo + 1] used for x; end segments extrapolate
        let upper = self.xs.partition_point(|&k| k <= x);
        let lo = upper.clamp(1, n - 1) - 1;
        let (x0, x1) = (self.xs[lo], self.xs[lo + 1]);
        let (y0, y1) = (self.ys[lo], self.ys[lo + 1]);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }

    pub fn eval_many(&self, grid: &Array1<f64>) -> Array1<f64> {
        grid.mapv(|x| self.eval(x))
    }
}

/// Time as a function of voltage and of inverse voltage for one curve.
struct CurveInterpolants {
    by_voltage: LinearInterpolant,
    by_inverse: LinearInterpolant,
}

impl CurveInterpolants {
    fn build(series: &CanonicalSeries, label: &'static str) -> Result<Self> {
        if series.is_empty() {
            return Err(DecayError::DegenerateCurve(label));
        }

        let times = series.times();
        let voltages: Vec<f64> = series
            .samples
            .iter()
            .map(|s| substitute_zero(s.voltage))
            .collect();
        let inverse: Vec<f64> = voltages.iter().map(|v| 1.0 / v).collect();

        Ok(Self {
            by_voltage: LinearInterpolant::new(&voltages, &times)?,
            by_inverse: LinearInterpolant::new(&inverse, &times)?,
        })
    }
}

fn substitute_zero(voltage: f64) -> f64 {
    if voltage == 0.0 {
        ZERO_VOLTAGE_SUBSTITUTE
    } else {
        voltage
    }
}

fn common_grid(a: &LinearInterpolant, b: &LinearInterpolant) -> Array1<f64> {
    let lo = a.min_x().min(b.min_x());
    let hi = a.max_x().max(b.max_x());
    Array1::linspace(lo, hi, ALIGNMENT_GRID_POINTS)
}

/// Compare `observed` against `baseline` on shared voltage and
/// inverse-voltage grids.
///
/// `time_difference[i]` is `t_observed(v_i) - t_baseline(v_i)`: positive
/// means the observed curve reaches that voltage later. Values outside a
/// curve's own voltage range are linearly extrapolated and not clipped.
pub fn align(baseline: &CanonicalSeries, observed: &CanonicalSeries) -> Result<AlignmentResult> {
    let base = CurveInterpolants::build(baseline, "baseline series is empty")?;
    let obs = CurveInterpolants::build(observed, "observed series is empty")?;

    let grid = common_grid(&base.by_voltage, &obs.by_voltage);
    let inverse_grid = common_grid(&base.by_inverse, &obs.by_inverse);

    let diff = obs.by_voltage.eval_many(&grid) - base.by_voltage.eval_many(&grid);
    let diff_inverse =
        obs.by_inverse.eval_many(&inverse_grid) - base.by_inverse.eval_many(&inverse_grid);

    debug!(
        "Aligned curves over V [{:.4}, {:.4}] and 1/V [{:.4}, {:.4}]",
        grid[0],
        grid[grid.len() - 1],
        inverse_grid[0],
        inverse_grid[inverse_grid.len() - 1]
    );

    Ok(AlignmentResult {
        common_voltage_grid: grid.to_vec(),
        time_difference: diff.to_vec(),
        common_inverse_voltage_grid: inverse_grid.to_vec(),
        time_difference_inverse: diff_inverse.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(times: &[f64], voltages: &[f64]) -> CanonicalSeries {
        CanonicalSeries::from_pairs(times, voltages)
    }

    #[test]
    fn test_interpolant_inside_and_extrapolated() {
        let f = LinearInterpolant::new(&[3.0, 1.0, 2.0], &[30.0, 10.0, 20.0]).unwrap();
        assert_eq!(f.eval(1.5), 15.0);
        assert_eq!(f.eval(0.0), 0.0);
        assert_eq!(f.eval(5.0), 50.0);
        assert_eq!(f.eval(3.0), 30.0);
    }

    #[test]
    fn test_interpolant_single_knot_is_constant() {
        let f = LinearInterpolant::new(&[2.0], &[7.0]).unwrap();
        assert_eq!(f.eval(-10.0), 7.0);
        assert_eq!(f.eval(10.0), 7.0);
    }

    #[test]
    fn test_interpolant_repeated_knot_keeps_first() {
        let f = LinearInterpolant::new(&[1.0, 1.0, 2.0], &[5.0, 6.0, 8.0]).unwrap();
        assert_eq!(f.eval(1.0), 5.0);
        assert_eq!(f.eval(0.5), 3.5);
        assert_eq!(f.eval(1.5), 6.5);
    }

    #[test]
    fn test_plateau_curve_extrapolates_past_top_voltage() {
        // Voltage holds at 5 V for the first three samples
        let voltages = [5.0, 5.0, 5.0, 4.0, 3.0, 1.0];
        let times = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let f = LinearInterpolant::new(&voltages, &times).unwrap();

        // Top segment runs from (4 V, 3 s) to (5 V, 0 s): slope -3 s/V
        assert_eq!(f.eval(5.0), 0.0);
        assert!((f.eval(4.999) - 0.003).abs() < 1e-9);
        assert!((f.eval(5.5) + 1.5).abs() < 1e-12);
        assert!((f.eval(6.0) + 3.0).abs() < 1e-12);

        let observed = curve(&[0.0, 1.0, 2.0], &[6.0, 4.0, 1.0]);
        let result = align(&curve(&times, &voltages), &observed).unwrap();
        let top = ALIGNMENT_GRID_POINTS - 1;
        assert!((result.common_voltage_grid[top] - 6.0).abs() < 1e-12);
        // Observed is at 0 s, baseline extrapolates to -3 s
        assert!((result.time_difference[top] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_grid_shape_and_bounds() {
        let base = curve(&[0.0, 1.0, 2.0], &[3.0, 2.0, 1.0]);
        let obs = curve(&[0.0, 2.0, 4.0], &[3.3, 2.0, 0.5]);
        let result = align(&base, &obs).unwrap();

        assert_eq!(result.common_voltage_grid.len(), ALIGNMENT_GRID_POINTS);
        assert_eq!(result.time_difference.len(), ALIGNMENT_GRID_POINTS);
        assert_eq!(result.common_inverse_voltage_grid.len(), ALIGNMENT_GRID_POINTS);
        assert_eq!(result.time_difference_inverse.len(), ALIGNMENT_GRID_POINTS);

        assert_eq!(result.common_voltage_grid[0], 0.5);
        assert!((result.common_voltage_grid[ALIGNMENT_GRID_POINTS - 1] - 3.3).abs() < 1e-12);
        assert!((result.common_inverse_voltage_grid[0] - 1.0 / 3.3).abs() < 1e-12);
        let inverse_top = result.common_inverse_voltage_grid[ALIGNMENT_GRID_POINTS - 1];
        assert!((inverse_top - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_slower_decay_is_positive() {
        let base = curve(&[0.0, 1.0, 2.0], &[3.0, 2.0, 1.0]);
        let slow = curve(&[0.0, 2.0, 4.0], &[3.0, 2.0, 1.0]);
        let result = align(&base, &slow).unwrap();
        // At 2 V the slow curve is 1 s behind
        let mid = result
            .common_voltage_grid
            .iter()
            .position(|v| (*v - 2.0).abs() < 0.003)
            .unwrap();
        assert!(result.time_difference[mid] > 0.0);
        assert!(result.time_difference.iter().all(|d| *d >= -1e-9));
    }

    #[test]
    fn test_alignment_is_antisymmetric() {
        let a = curve(&[0.0, 1.0, 2.0, 3.0], &[3.3, 2.5, 1.2, 0.0]);
        let b = curve(&[0.0, 1.5, 2.5], &[3.0, 2.0, 0.4]);
        let ab = align(&a, &b).unwrap();
        let ba = align(&b, &a).unwrap();

        assert_eq!(ab.common_voltage_grid, ba.common_voltage_grid);
        for (x, y) in ab.time_difference.iter().zip(ba.time_difference.iter()) {
            assert_eq!(*x, -*y);
        }
        let inverse = ab.time_difference_inverse.iter().zip(ba.time_difference_inverse.iter());
        for (x, y) in inverse {
            assert_eq!(*x, -*y);
        }
    }

    #[test]
    fn test_zero_voltage_is_substituted() {
        let a = curve(&[0.0, 1.0], &[1.0, 0.0]);
        let result = align(&a, &a).unwrap();
        assert_eq!(result.common_voltage_grid[0], ZERO_VOLTAGE_SUBSTITUTE);
        let inverse_top = result.common_inverse_voltage_grid[ALIGNMENT_GRID_POINTS - 1];
        assert!((inverse_top - 100.0).abs() < 1e-9);
        assert!(result.time_difference_inverse.iter().all(|d| *d == 0.0));
    }

    #[test]
    fn test_empty_series_is_degenerate() {
        let a = curve(&[0.0], &[1.0]);
        assert!(matches!(
            align(&CanonicalSeries::new(), &a),
            Err(DecayError::DegenerateCurve(_))
        ));
        assert!(matches!(
            align(&a, &CanonicalSeries::new()),
            Err(DecayError::DegenerateCurve(_))
        ));
    }
}
