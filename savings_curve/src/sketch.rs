//! Free-form curve mode: arbitrary `(x, y)` points resampled to a fixed number
//! of samples and offset to a desired sum.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::interp::sample_uniform;
use crate::normalize::{normalize, Summary};
use crate::PlanError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SketchPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sketch {
    /// Input points sorted by `x`.
    pub points: Vec<SketchPoint>,
    pub xs: Vec<f64>,
    pub samples: Vec<f64>,
    pub normalized: Vec<f64>,
    pub summary: Summary,
}

/// Resample the polyline through `points` at `count` positions and shift every
/// sample by the same offset so they sum to `desired_sum`. Without a desired
/// sum the samples keep their own total and the offset is zero.
pub fn sketch_normalize(
    points: &[SketchPoint],
    count: usize,
    desired_sum: Option<f64>,
) -> Result<Sketch, PlanError> {
    if points.len() < 2 {
        return Err(PlanError::InsufficientMilestones {
            found: points.len(),
        });
    }
    if count == 0 {
        return Err(PlanError::InvalidParameter(
            "sample count must be positive".into(),
        ));
    }
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(PlanError::InvalidParameter(
            "sketch points must be finite".into(),
        ));
    }
    if let Some(sum) = desired_sum.filter(|s| !s.is_finite()) {
        return Err(PlanError::InvalidParameter(format!(
            "desired sum must be finite, got {sum}"
        )));
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x));
    let xs: Vec<f64> = sorted.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = sorted.iter().map(|p| p.y).collect();

    let (positions, samples) = sample_uniform(&xs, &ys, count);
    let samples = Array1::from_vec(samples);
    let target = desired_sum.unwrap_or_else(|| samples.sum());
    let (normalized, summary) = normalize(&samples, target, None, false)?;

    Ok(Sketch {
        points: sorted,
        xs: positions,
        samples: samples.to_vec(),
        normalized: normalized.to_vec(),
        summary,
    })
}
