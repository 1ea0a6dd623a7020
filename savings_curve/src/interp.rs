use ndarray::Array1;

use crate::{Horizon, Milestone, PlanError};

/// Expand sorted milestones into one value per scheduled day.
///
/// Each segment `[x0, x1)` is filled on the straight line through its end
/// points; the last milestone's day takes its value directly. Zero-width
/// segments are skipped. Days before the first milestone stay at zero and days
/// past the horizon are never written, so the boundary milestone only shapes
/// the slope of the final segment.
pub fn interpolate_daily(sorted: &[Milestone], horizon: Horizon) -> Result<Array1<f64>, PlanError> {
    if sorted.len() < 2 {
        return Err(PlanError::InsufficientMilestones {
            found: sorted.len(),
        });
    }
    let len = horizon.days() as usize;
    let mut out = Array1::<f64>::zeros(len);

    for pair in sorted.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if end.day <= start.day {
            continue;
        }
        let span = (end.day - start.day) as f64;
        let x0 = start.day as usize;
        let stop = (end.day as usize).min(len);
        for day in x0..stop {
            let frac = (day - x0) as f64 / span;
            out[day] = start.value + (end.value - start.value) * frac;
        }
    }

    if let Some(last) = sorted.last() {
        if horizon.contains(last.day) {
            out[last.day as usize] = last.value;
        }
    }
    Ok(out)
}

/// `count` evenly spaced values from `start` to `end`, both ends included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count as f64 - 1.0);
            let mut out: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
            out[count - 1] = end;
            out
        }
    }
}

/// Linear interpolation on sorted `xs`, holding the end values outside the range.
pub fn interpolate_at(target: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let len = xs.len().min(ys.len());
    if len == 0 {
        return 0.0;
    }
    if target <= xs[0] {
        return ys[0];
    }
    for i in 1..len {
        if target <= xs[i] {
            let (x0, x1) = (xs[i - 1], xs[i]);
            let (y0, y1) = (ys[i - 1], ys[i]);
            if (x1 - x0).abs() < f64::EPSILON {
                return y1;
            }
            let frac = ((target - x0) / (x1 - x0)).clamp(0.0, 1.0);
            return y0 + (y1 - y0) * frac;
        }
    }
    ys[len - 1]
}

/// Sample the piecewise-linear curve through sorted `(xs, ys)` at `count`
/// evenly spaced positions spanning `xs`.
pub fn sample_uniform(xs: &[f64], ys: &[f64], count: usize) -> (Vec<f64>, Vec<f64>) {
    let (Some(&lo), Some(&hi)) = (xs.first(), xs.last()) else {
        return (Vec::new(), Vec::new());
    };
    let positions = linspace(lo, hi, count);
    let values = positions
        .iter()
        .map(|&x| interpolate_at(x, xs, ys))
        .collect();
    (positions, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(u32, f64)]) -> Vec<Milestone> {
        raw.iter().copied().map(Milestone::from).collect()
    }

    fn horizon(days: u32) -> Horizon {
        Horizon::new(days).unwrap()
    }

    #[test]
    fn test_linear_segment() {
        let out = interpolate_daily(&pts(&[(0, 0.0), (10, 100.0)]), horizon(11)).unwrap();
        assert_eq!(out[5], 50.0);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[10], 100.0);
        for day in 0..10 {
            assert!((out[day] - 10.0 * day as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_exact_at_milestones() {
        let milestones = pts(&[(0, 3.0), (4, -2.0), (9, 7.5), (12, 1.0)]);
        let out = interpolate_daily(&milestones, horizon(12)).unwrap();
        assert_eq!(out.len(), 12);
        assert_eq!(out[0], 3.0);
        assert_eq!(out[4], -2.0);
        assert_eq!(out[9], 7.5);
    }

    #[test]
    fn test_boundary_milestone_shapes_last_segment() {
        let out = interpolate_daily(&pts(&[(0, 0.0), (2, 20.0), (4, 0.0)]), horizon(4)).unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 10.0, 20.0, 10.0]);
    }

    #[test]
    fn test_degenerate_segment_skipped() {
        // The later point on day 2 wins for the segment that follows it.
        let out = interpolate_daily(
            &pts(&[(0, 0.0), (2, 10.0), (2, 30.0), (4, 30.0)]),
            horizon(5),
        )
        .unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 5.0, 30.0, 30.0, 30.0]);
    }

    #[test]
    fn test_days_before_first_milestone_are_zero() {
        let out = interpolate_daily(&pts(&[(2, 4.0), (4, 8.0)]), horizon(5)).unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 0.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_requires_two_points() {
        assert_eq!(
            interpolate_daily(&pts(&[(0, 1.0)]), horizon(3)),
            Err(PlanError::InsufficientMilestones { found: 1 })
        );
    }

    #[test]
    fn test_linspace_endpoints() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(2.0, 9.0, 1), vec![2.0]);
        assert!(linspace(2.0, 9.0, 0).is_empty());
        let many = linspace(0.1, 0.7, 7);
        assert_eq!(many[6], 0.7);
    }

    #[test]
    fn test_interpolate_at_clamps_outside() {
        let xs = [1.0, 3.0];
        let ys = [10.0, 30.0];
        assert_eq!(interpolate_at(0.0, &xs, &ys), 10.0);
        assert_eq!(interpolate_at(2.0, &xs, &ys), 20.0);
        assert_eq!(interpolate_at(5.0, &xs, &ys), 30.0);
    }

    #[test]
    fn test_sample_uniform_covers_range() {
        let (positions, values) = sample_uniform(&[0.0, 4.0], &[0.0, 8.0], 5);
        assert_eq!(positions, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(values, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }
}
