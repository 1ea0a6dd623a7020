use tracing::{debug, info};

use crate::store::MilestoneStore;
use crate::{compute_plan, Horizon, Params, Plan, PlanError};

/// Caller-owned editing session.
///
/// Every mutation re-runs the whole pipeline against a candidate state and
/// only commits when that succeeds, so a rejected edit leaves the session
/// exactly as it was.
#[derive(Clone, Debug)]
pub struct Planner {
    store: MilestoneStore,
    horizon: Horizon,
    target: f64,
    params: Params,
}

impl Planner {
    pub fn new(horizon: Horizon, target: f64, params: Params) -> Result<Self, PlanError> {
        let store = MilestoneStore::with_defaults(horizon, params.mode, target);
        Self::with_store(store, horizon, target, params)
    }

    /// Open a session on an existing store. The store is fitted to `horizon`
    /// right away, so points past the boundary day do not outlive the session.
    pub fn with_store(
        mut store: MilestoneStore,
        horizon: Horizon,
        target: f64,
        params: Params,
    ) -> Result<Self, PlanError> {
        check_target(target)?;
        fit_to_horizon(&mut store, horizon);
        Ok(Self {
            store,
            horizon,
            target,
            params,
        })
    }

    pub fn store(&self) -> &MilestoneStore {
        &self.store
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn recompute(&self) -> Result<Plan, PlanError> {
        compute_plan(self.store.as_slice(), self.horizon, self.target, &self.params)
    }

    /// Add a milestone; an identical `(day, value)` pair is a no-op.
    pub fn add_milestone(&mut self, day: u32, value: f64) -> Result<Plan, PlanError> {
        self.check_point(day, value)?;
        let mut candidate = self.clone();
        if !candidate.store.add(day, value) {
            debug!(day, value, "milestone already present");
        }
        self.commit(candidate)
    }

    /// Set the value for `day`, replacing any milestones already on it.
    pub fn set_milestone(&mut self, day: u32, value: f64) -> Result<Plan, PlanError> {
        self.check_point(day, value)?;
        let mut candidate = self.clone();
        candidate.store.upsert(day, value);
        self.commit(candidate)
    }

    pub fn remove_milestone(&mut self, day: u32) -> Result<Plan, PlanError> {
        let mut candidate = self.clone();
        candidate.store.remove_day(day);
        self.commit(candidate)
    }

    /// Reset to the two-point default for the current horizon and target.
    pub fn clear(&mut self) -> Result<Plan, PlanError> {
        let mut candidate = self.clone();
        candidate
            .store
            .remove_all(self.horizon, self.params.mode, self.target);
        self.commit(candidate)
    }

    /// Change the horizon. Milestones past the new boundary are discarded and
    /// a boundary point is added when missing.
    pub fn set_horizon(&mut self, days: u32) -> Result<Plan, PlanError> {
        let horizon = Horizon::new(days)?;
        let mut candidate = self.clone();
        candidate.horizon = horizon;
        fit_to_horizon(&mut candidate.store, horizon);
        self.commit(candidate)
    }

    pub fn set_target(&mut self, target: f64) -> Result<Plan, PlanError> {
        check_target(target)?;
        let mut candidate = self.clone();
        candidate.target = target;
        self.commit(candidate)
    }

    fn commit(&mut self, candidate: Planner) -> Result<Plan, PlanError> {
        let plan = candidate.recompute()?;
        *self = candidate;
        Ok(plan)
    }

    fn check_point(&self, day: u32, value: f64) -> Result<(), PlanError> {
        if day > self.horizon.boundary_day() {
            return Err(PlanError::InvalidParameter(format!(
                "day {day} is past the horizon of {} days",
                self.horizon.days()
            )));
        }
        if !value.is_finite() {
            return Err(PlanError::InvalidParameter(format!(
                "milestone value must be finite, got {value}"
            )));
        }
        Ok(())
    }
}

fn fit_to_horizon(store: &mut MilestoneStore, horizon: Horizon) {
    let adjusted = store.adjust(horizon);
    if !adjusted.dropped.is_empty() {
        info!(
            days = horizon.days(),
            dropped = adjusted.dropped.len(),
            "milestones past the horizon discarded"
        );
    } else if adjusted.boundary_added {
        debug!(days = horizon.days(), "boundary milestone added");
    }
}

fn check_target(target: f64) -> Result<(), PlanError> {
    if !target.is_finite() || target < 0.0 {
        return Err(PlanError::InvalidParameter(format!(
            "target total must be a non-negative number, got {target}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Milestone, Mode};

    fn unclipped() -> Params {
        Params {
            clip_to_ceiling: false,
            reclip: false,
            ..Params::default()
        }
    }

    #[test]
    fn test_session_end_to_end() {
        let mut planner = Planner::with_store(
            MilestoneStore::from_points([Milestone::new(0, 0.0), Milestone::new(3, 30.0)]),
            Horizon::new(4).unwrap(),
            60.0,
            unclipped(),
        )
        .unwrap();
        let plan = planner.recompute().unwrap();
        assert_eq!(plan.schedule, vec![0.0, 10.0, 20.0, 30.0]);

        let plan = planner.set_target(80.0).unwrap();
        assert_eq!(plan.schedule, vec![5.0, 15.0, 25.0, 35.0]);
        assert_eq!(planner.target(), 80.0);
    }

    #[test]
    fn test_shrinking_horizon_drops_points() {
        let mut planner = Planner::with_store(
            MilestoneStore::from_points([
                Milestone::new(0, 0.0),
                Milestone::new(5, 10.0),
                Milestone::new(20, 0.0),
            ]),
            Horizon::new(20).unwrap(),
            100.0,
            Params::default(),
        )
        .unwrap();
        let plan = planner.set_horizon(10).unwrap();
        assert_eq!(plan.schedule.len(), 10);
        assert_eq!(
            planner.store().sorted_view(),
            vec![
                Milestone::new(0, 0.0),
                Milestone::new(5, 10.0),
                Milestone::new(10, 0.0),
            ]
        );
    }

    #[test]
    fn test_opening_store_discards_points_past_horizon() {
        let planner = Planner::with_store(
            MilestoneStore::from_points([
                Milestone::new(0, 0.0),
                Milestone::new(20, 5.0),
                Milestone::new(30, 0.0),
            ]),
            Horizon::new(10).unwrap(),
            100.0,
            Params::default(),
        )
        .unwrap();
        assert_eq!(
            planner.store().as_slice(),
            &[Milestone::new(0, 0.0), Milestone::new(10, 0.0)]
        );
        assert!(planner.recompute().unwrap().dropped.is_empty());
    }

    #[test]
    fn test_rejected_edit_leaves_state() {
        let mut planner =
            Planner::new(Horizon::new(10).unwrap(), 100.0, Params::default()).unwrap();
        let before = planner.store().clone();

        assert!(planner.set_target(f64::INFINITY).is_err());
        assert!(planner.add_milestone(11, 1.0).is_err());
        assert!(planner.set_horizon(0).is_err());
        // Removing the origin leaves only the boundary point.
        assert_eq!(
            planner.remove_milestone(0).unwrap_err(),
            PlanError::InsufficientMilestones { found: 1 }
        );

        assert_eq!(planner.store(), &before);
        assert_eq!(planner.target(), 100.0);
        assert_eq!(planner.horizon().days(), 10);
    }

    #[test]
    fn test_add_and_set_milestones() {
        let mut planner =
            Planner::new(Horizon::new(10).unwrap(), 100.0, unclipped()).unwrap();
        planner.add_milestone(5, 10.0).unwrap();
        planner.add_milestone(5, 10.0).unwrap();
        assert_eq!(planner.store().len(), 3);

        planner.add_milestone(5, 20.0).unwrap();
        assert_eq!(planner.store().len(), 4);

        let plan = planner.set_milestone(5, 30.0).unwrap();
        assert_eq!(planner.store().len(), 3);
        assert_eq!(plan.raw[5], 30.0);
    }

    #[test]
    fn test_clear_restores_defaults() {
        let params = Params {
            mode: Mode::Cumulative,
            ..Params::default()
        };
        let mut planner = Planner::new(Horizon::new(5).unwrap(), 50.0, params).unwrap();
        planner.add_milestone(2, 40.0).unwrap();
        let plan = planner.clear().unwrap();
        assert_eq!(planner.store().len(), 2);
        assert_eq!(plan.schedule, vec![0.0, 12.5, 25.0, 37.5, 50.0]);
    }
}
