use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Horizon, Milestone, Mode};

/// Sparse set of user-placed milestones, kept in insertion order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MilestoneStore {
    points: Vec<Milestone>,
}

impl MilestoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two-point starting store for a fresh plan.
    ///
    /// Daily plans run from `(0, 0)` to the boundary `(N, 0)`. Cumulative plans
    /// run from `(0, 0)` to `(N - 1, target)` so the last scheduled day lands on
    /// the target exactly.
    ///
    /// A one-day cumulative plan has no room for both points inside the
    /// schedule: the target goes on the boundary day `(1, target)`, so the only
    /// scheduled day reads `0.0` and the whole target shows up as residual.
    pub fn with_defaults(horizon: Horizon, mode: Mode, target: f64) -> Self {
        let mut store = Self::new();
        store.remove_all(horizon, mode, target);
        store
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Milestone>,
    {
        let mut store = Self::new();
        for point in points {
            store.add(point.day, point.value);
        }
        store
    }

    /// Insert a milestone unless the exact `(day, value)` pair is present.
    /// Returns whether the store changed.
    pub fn add(&mut self, day: u32, value: f64) -> bool {
        let candidate = Milestone::new(day, value);
        if self.points.iter().any(|p| p.key() == candidate.key()) {
            return false;
        }
        self.points.push(candidate);
        true
    }

    /// Replace every milestone on `day` with a single `(day, value)`.
    pub fn upsert(&mut self, day: u32, value: f64) {
        self.points.retain(|p| p.day != day);
        self.points.push(Milestone::new(day, value));
    }

    /// Remove every milestone on `day`, returning how many were removed.
    pub fn remove_day(&mut self, day: u32) -> usize {
        let before = self.points.len();
        self.points.retain(|p| p.day != day);
        before - self.points.len()
    }

    pub fn remove_all(&mut self, horizon: Horizon, mode: Mode, target: f64) {
        self.points.clear();
        match mode {
            Mode::Daily => {
                self.points.push(Milestone::new(0, 0.0));
                self.points.push(Milestone::new(horizon.boundary_day(), 0.0));
            }
            Mode::Cumulative => {
                self.points.push(Milestone::new(0, 0.0));
                let last = horizon.days() - 1;
                if last > 0 {
                    self.points.push(Milestone::new(last, target));
                } else {
                    self.points.push(Milestone::new(horizon.boundary_day(), target));
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Milestone> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[Milestone] {
        &self.points
    }

    /// Milestones ascending by day. Points sharing a day keep insertion order.
    pub fn sorted_view(&self) -> Vec<Milestone> {
        let mut sorted = self.points.clone();
        sorted.sort_by_key(|p| p.day);
        sorted
    }

    /// Apply [`adjust_to_horizon`] to the stored points in place.
    pub fn adjust(&mut self, horizon: Horizon) -> HorizonAdjustment {
        let adjusted = adjust_to_horizon(&self.points, horizon);
        self.points = adjusted.milestones.clone();
        adjusted
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HorizonAdjustment {
    /// Surviving milestones, ascending by day, ending on the boundary day.
    pub milestones: Vec<Milestone>,
    pub dropped: Vec<Milestone>,
    pub boundary_added: bool,
}

impl HorizonAdjustment {
    pub fn changed(&self) -> bool {
        self.boundary_added || !self.dropped.is_empty()
    }
}

/// Drop milestones past the boundary day and make sure one sits on it.
///
/// The origin is never fabricated: callers seed a default store first.
pub fn adjust_to_horizon(milestones: &[Milestone], horizon: Horizon) -> HorizonAdjustment {
    let boundary = horizon.boundary_day();
    let (mut kept, dropped): (Vec<Milestone>, Vec<Milestone>) =
        milestones.iter().copied().partition(|m| m.day <= boundary);

    let boundary_added = !kept.iter().any(|m| m.day == boundary);
    if boundary_added {
        kept.push(Milestone::new(boundary, 0.0));
    }
    kept.sort_by_key(|m| m.day);

    if !dropped.is_empty() {
        debug!(
            boundary,
            dropped = dropped.len(),
            "milestones past the horizon dropped"
        );
    }

    HorizonAdjustment {
        milestones: kept,
        dropped,
        boundary_added,
    }
}
