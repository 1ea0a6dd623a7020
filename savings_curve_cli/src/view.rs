//! Plain-text rendering of a computed plan.

use std::fmt::Write as _;

use chrono::{Days, NaiveDate};
use savings_curve::{Mode, Plan};

pub fn day_label(start: NaiveDate, day: usize) -> String {
    start
        .checked_add_days(Days::new(day as u64))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| format!("+{}", day))
}

pub fn render_summary(plan: &Plan) -> String {
    let s = &plan.summary;
    match plan.mode {
        Mode::Daily => {
            let mut out = format!(
                "{} days: sum before {:.2}, adjustment {:+.4}/day, sum after {:.2} (target {:.2})",
                plan.horizon.days(),
                s.sum_before,
                s.adjustment,
                s.sum_after,
                s.target
            );
            if let Some(ceiling) = plan.ceiling {
                let _ = write!(out, ", ceiling {:.2}/day", ceiling);
            }
            out
        }
        Mode::Cumulative => format!(
            "{} days: final total {:.2} (target {:.2})",
            plan.horizon.days(),
            s.realized,
            s.target
        ),
    }
}

/// Per-day table. `^` marks a milestone day, `*` a day sitting on the ceiling.
pub fn render_table(plan: &Plan, start_date: Option<NaiveDate>) -> String {
    let cumulative = plan.cumulative();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:<10}  {:>12}  {:>12}  {:>12}",
        "day", "date", "raw", "amount", "cumulative"
    );
    for (day, &amount) in plan.schedule.iter().enumerate() {
        let date = start_date
            .map(|start| day_label(start, day))
            .unwrap_or_default();
        let milestone = plan.milestones.iter().any(|m| m.day as usize == day);
        let marker = match (milestone, plan.at_ceiling(day)) {
            (true, true) => "^*",
            (true, false) => "^",
            (false, true) => "*",
            (false, false) => "",
        };
        let _ = writeln!(
            out,
            "{:>5}  {:<10}  {:>12.2}  {:>12.2}  {:>12.2} {}",
            day,
            date,
            plan.raw.get(day).copied().unwrap_or(0.0),
            amount,
            cumulative[day],
            marker
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use savings_curve::{compute_plan, Horizon, Milestone, Params};

    fn plan() -> Plan {
        compute_plan(
            &[Milestone::new(0, 0.0), Milestone::new(3, 30.0)],
            Horizon::new(4).unwrap(),
            40.0,
            &Params::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_day_label() {
        let start = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap();
        assert_eq!(day_label(start, 0), "2023-12-30");
        assert_eq!(day_label(start, 3), "2024-01-02");
    }

    #[test]
    fn test_table_marks_milestones_and_ceiling() {
        let plan = plan();
        let table = render_table(&plan, None);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].trim_end().ends_with('^'));
        // Day 3 was 30 before clipping to the 10/day ceiling.
        assert!(lines[4].trim_end().ends_with("^*"));
    }

    #[test]
    fn test_summary_mentions_ceiling() {
        let text = render_summary(&plan());
        assert!(text.starts_with("4 days:"));
        assert!(text.contains("ceiling 10.00/day"));
    }
}
