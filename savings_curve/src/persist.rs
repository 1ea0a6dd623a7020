//! Milestone store persistence: a two-column `Day,Savings` CSV rewritten on
//! every save.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::sketch::SketchPoint;
use crate::store::MilestoneStore;
use crate::{Horizon, Milestone, Mode, PlanError};

#[derive(Debug, Serialize, Deserialize)]
struct MilestoneRow {
    #[serde(rename = "Day")]
    day: u32,
    #[serde(rename = "Savings")]
    savings: f64,
}

/// Read milestones in file order. Exact duplicate rows collapse into one.
pub fn load_milestones(path: &Path) -> Result<MilestoneStore, PlanError> {
    let file = File::open(path)
        .map_err(|e| PlanError::Persistence(format!("{}: {}", path.display(), e)))?;
    let mut reader = csv::Reader::from_reader(file);
    let mut points = Vec::new();
    for row in reader.deserialize::<MilestoneRow>() {
        let row = row.map_err(|e| PlanError::Persistence(format!("{}: {}", path.display(), e)))?;
        points.push(Milestone::new(row.day, row.savings));
    }
    Ok(MilestoneStore::from_points(points))
}

/// Overwrite `path` with the store's milestones in insertion order.
pub fn save_milestones(path: &Path, store: &MilestoneStore) -> Result<(), PlanError> {
    let to_err = |e: csv::Error| PlanError::Persistence(format!("{}: {}", path.display(), e));
    let mut writer = csv::Writer::from_path(path).map_err(to_err)?;
    for point in store.iter() {
        writer
            .serialize(MilestoneRow {
                day: point.day,
                savings: point.value,
            })
            .map_err(to_err)?;
    }
    if store.is_empty() {
        writer.write_record(["Day", "Savings"]).map_err(to_err)?;
    }
    writer
        .flush()
        .map_err(|e| PlanError::Persistence(format!("{}: {}", path.display(), e)))?;
    Ok(())
}

/// Load the store at `path`, falling back to the two-point default when the
/// file is missing or unreadable.
pub fn load_or_default(path: &Path, horizon: Horizon, mode: Mode, target: f64) -> MilestoneStore {
    match load_milestones(path) {
        Ok(store) => {
            info!(
                "Loaded {} milestones from {}",
                store.len(),
                path.display()
            );
            store
        }
        Err(err) => {
            if path.exists() {
                warn!("Falling back to default milestones ({})", err);
            } else {
                info!(
                    "No milestone store at {}; starting from defaults",
                    path.display()
                );
            }
            MilestoneStore::with_defaults(horizon, mode, target)
        }
    }
}

/// Delete the persisted store. Returns whether a file was removed.
pub fn remove_store(path: &Path) -> Result<bool, PlanError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PlanError::Persistence(format!("{}: {}", path.display(), e))),
    }
}

/// Read free-form `x,y` points for the sketch mode.
pub fn load_sketch_points(path: &Path) -> Result<Vec<SketchPoint>, PlanError> {
    let to_err = |e: csv::Error| PlanError::Persistence(format!("{}: {}", path.display(), e));
    let mut reader = csv::Reader::from_path(path).map_err(to_err)?;
    reader
        .deserialize::<SketchPoint>()
        .map(|row| row.map_err(to_err))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn horizon(days: u32) -> Horizon {
        Horizon::new(days).unwrap()
    }

    #[test]
    fn test_save_then_load_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("milestones.csv");
        let store = MilestoneStore::from_points([
            Milestone::new(9, 4.5),
            Milestone::new(0, 0.0),
            Milestone::new(30, 0.0),
        ]);
        save_milestones(&path, &store).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Day,Savings\n9,4.5\n"));

        let loaded = load_milestones(&path).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("milestones.csv");
        let long = MilestoneStore::from_points((0..10).map(|d| Milestone::new(d, d as f64)));
        save_milestones(&path, &long).unwrap();
        let short = MilestoneStore::from_points([Milestone::new(1, 1.0)]);
        save_milestones(&path, &short).unwrap();
        assert_eq!(load_milestones(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("milestones.csv");
        save_milestones(&path, &MilestoneStore::new()).unwrap();
        assert!(load_milestones(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let store = load_or_default(&path, horizon(20), Mode::Daily, 100.0);
        assert_eq!(
            store.as_slice(),
            &[Milestone::new(0, 0.0), Milestone::new(20, 0.0)]
        );
    }

    #[test]
    fn test_garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Day,Savings").unwrap();
        writeln!(file, "soon,lots").unwrap();
        drop(file);

        assert!(matches!(
            load_milestones(&path),
            Err(PlanError::Persistence(_))
        ));
        let store = load_or_default(&path, horizon(7), Mode::Cumulative, 70.0);
        assert_eq!(
            store.as_slice(),
            &[Milestone::new(0, 0.0), Milestone::new(6, 70.0)]
        );
    }

    #[test]
    fn test_remove_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("milestones.csv");
        save_milestones(&path, &MilestoneStore::new()).unwrap();
        assert!(remove_store(&path).unwrap());
        assert!(!remove_store(&path).unwrap());
    }

    #[test]
    fn test_load_sketch_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sketch.csv");
        fs::write(&path, "x,y\n0.5,1\n-2,3.25\n").unwrap();
        let points = load_sketch_points(&path).unwrap();
        assert_eq!(
            points,
            vec![SketchPoint { x: 0.5, y: 1.0 }, SketchPoint { x: -2.0, y: 3.25 }]
        );
    }
}
