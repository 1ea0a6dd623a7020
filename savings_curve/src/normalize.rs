use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::PlanError;

/// Scalars reported alongside a normalized schedule.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    /// Sum of the (clipped) series before the uniform adjustment.
    pub sum_before: f64,
    /// Amount added to every day.
    pub adjustment: f64,
    pub sum_after: f64,
    pub target: f64,
    /// Value compared against `target`: the final sum for daily plans, the
    /// last day's running total for cumulative plans.
    pub realized: f64,
}

impl Summary {
    /// Gap left between target and realized value, non-zero after a re-clip.
    pub fn residual(&self) -> f64 {
        self.target - self.realized
    }
}

/// Reconcile a dense series with `target`.
///
/// With a ceiling the series is first clipped to `[0, ceiling]`. The shortfall
/// against `target` is then spread evenly over every day. When `reclip` is set
/// the result is clipped again, which may leave the final sum short of (or
/// over) the target; the gap is reported through [`Summary::residual`].
pub fn normalize(
    values: &Array1<f64>,
    target: f64,
    ceiling: Option<f64>,
    reclip: bool,
) -> Result<(Array1<f64>, Summary), PlanError> {
    if values.is_empty() {
        return Err(PlanError::InvalidParameter(
            "cannot normalize an empty schedule".into(),
        ));
    }
    let days = values.len() as f64;

    let clipped = match ceiling {
        Some(c) => clip(values, c),
        None => values.clone(),
    };
    let sum_before = clipped.sum();
    let adjustment = (target - sum_before) / days;
    let mut adjusted = clipped.mapv(|v| v + adjustment);

    if let (Some(c), true) = (ceiling, reclip) {
        adjusted = clip(&adjusted, c);
    }
    let sum_after = adjusted.sum();

    Ok((
        adjusted,
        Summary {
            sum_before,
            adjustment,
            sum_after,
            target,
            realized: sum_after,
        },
    ))
}

fn clip(values: &Array1<f64>, ceiling: f64) -> Array1<f64> {
    values.mapv(|v| v.max(0.0).min(ceiling))
}
