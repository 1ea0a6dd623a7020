//! Core savings curve computation: milestones in, per-day schedule out.

use std::fmt;

use ndarray::Array1;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod interp;
pub mod normalize;
pub mod persist;
pub mod session;
pub mod sketch;
pub mod store;

pub use interp::{interpolate_daily, linspace, sample_uniform};
pub use normalize::{normalize, Summary};
pub use persist::{load_milestones, load_or_default, remove_store, save_milestones};
pub use session::Planner;
pub use sketch::{sketch_normalize, Sketch, SketchPoint};
pub use store::{adjust_to_horizon, HorizonAdjustment, MilestoneStore};

/// Upper bound accepted for the number of scheduled days.
pub const MAX_HORIZON_DAYS: u32 = 365;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("insufficient milestones: need at least 2, found {found}")]
    InsufficientMilestones { found: usize },
    #[error("invalid horizon {0}: expected 1..={max} days", max = MAX_HORIZON_DAYS)]
    InvalidHorizon(u32),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("milestone store unavailable: {0}")]
    Persistence(String),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Milestones are per-day amounts; the schedule is rescaled to sum to the target.
    Daily,
    /// Milestones are running totals; the schedule is the raw interpolation.
    Cumulative,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Daily
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Daily => f.write_str("daily"),
            Mode::Cumulative => f.write_str("cumulative"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Params {
    pub mode: Mode,
    pub clip_to_ceiling: bool,
    pub reclip: bool,
    pub sketch_samples: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            mode: Mode::Daily,
            clip_to_ceiling: true,
            reclip: true,
            sketch_samples: 80,
        }
    }
}

impl Params {
    /// Daily ceiling for `target` spread over `horizon`, when one applies.
    pub fn ceiling(&self, target: f64, horizon: Horizon) -> Option<f64> {
        match self.mode {
            Mode::Daily if self.clip_to_ceiling => Some(target / horizon.days() as f64),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Milestone {
    pub day: u32,
    pub value: f64,
}

impl Milestone {
    pub fn new(day: u32, value: f64) -> Self {
        Self { day, value }
    }

    /// Exact-pair identity used for deduplication. `NaN` compares equal to itself.
    pub(crate) fn key(&self) -> (u32, OrderedFloat<f64>) {
        (self.day, OrderedFloat(self.value))
    }
}

impl From<(u32, f64)> for Milestone {
    fn from((day, value): (u32, f64)) -> Self {
        Milestone::new(day, value)
    }
}

/// Number of scheduled days. The schedule covers days `0..days`; day `days`
/// is the boundary day and may only carry the closing milestone.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "u32", into = "u32")]
pub struct Horizon(u32);

impl Horizon {
    pub fn new(days: u32) -> Result<Self, PlanError> {
        if days == 0 || days > MAX_HORIZON_DAYS {
            return Err(PlanError::InvalidHorizon(days));
        }
        Ok(Self(days))
    }

    pub fn days(self) -> u32 {
        self.0
    }

    pub fn boundary_day(self) -> u32 {
        self.0
    }

    pub fn contains(self, day: u32) -> bool {
        day < self.0
    }
}

impl TryFrom<u32> for Horizon {
    type Error = PlanError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Horizon::new(value)
    }
}

impl From<Horizon> for u32 {
    fn from(value: Horizon) -> Self {
        value.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub horizon: Horizon,
    pub mode: Mode,
    /// Horizon-adjusted milestones in ascending day order.
    pub milestones: Vec<Milestone>,
    /// Milestones removed because they fell past the boundary day.
    pub dropped: Vec<Milestone>,
    pub ceiling: Option<f64>,
    /// Interpolated values before normalization.
    pub raw: Vec<f64>,
    pub schedule: Vec<f64>,
    pub summary: Summary,
}

impl Plan {
    /// Running total of the final schedule.
    pub fn cumulative(&self) -> Vec<f64> {
        self.schedule
            .iter()
            .scan(0.0, |acc, &v| {
                *acc += v;
                Some(*acc)
            })
            .collect()
    }

    pub fn at_ceiling(&self, day: usize) -> bool {
        match (self.ceiling, self.schedule.get(day)) {
            (Some(c), Some(&v)) => (v - c).abs() <= 1e-9 * c.abs().max(1.0),
            _ => false,
        }
    }
}

/// Run the full pipeline: horizon adjustment, daily interpolation, normalization.
pub fn compute_plan(
    milestones: &[Milestone],
    horizon: Horizon,
    target: f64,
    params: &Params,
) -> Result<Plan, PlanError> {
    if !target.is_finite() {
        return Err(PlanError::InvalidParameter(format!(
            "target total must be finite, got {target}"
        )));
    }
    let ceiling = params.ceiling(target, horizon);
    if ceiling.is_some() && target < 0.0 {
        return Err(PlanError::InvalidParameter(
            "target total must be non-negative when a daily ceiling applies".into(),
        ));
    }

    let adjusted = adjust_to_horizon(milestones, horizon);
    let raw = interpolate_daily(&adjusted.milestones, horizon)?;

    let (schedule, summary) = match params.mode {
        Mode::Daily => normalize(&raw, target, ceiling, params.reclip)?,
        Mode::Cumulative => {
            let total = raw.sum();
            let realized = raw.iter().last().copied().unwrap_or(0.0);
            (
                raw.clone(),
                Summary {
                    sum_before: total,
                    adjustment: 0.0,
                    sum_after: total,
                    target,
                    realized,
                },
            )
        }
    };

    debug!(
        days = horizon.days(),
        mode = %params.mode,
        milestones = adjusted.milestones.len(),
        dropped = adjusted.dropped.len(),
        sum_before = summary.sum_before,
        adjustment = summary.adjustment,
        sum_after = summary.sum_after,
        "plan recomputed"
    );

    Ok(Plan {
        horizon,
        mode: params.mode,
        milestones: adjusted.milestones,
        dropped: adjusted.dropped,
        ceiling,
        raw: to_vec(&raw),
        schedule: to_vec(&schedule),
        summary,
    })
}

fn to_vec(values: &Array1<f64>) -> Vec<f64> {
    values.iter().copied().collect()
}
