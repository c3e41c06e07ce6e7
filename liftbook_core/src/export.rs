//! CSV export of the workout library.
//!
//! Flattens folders, workouts and exercises into one row per exercise so the
//! library can be opened in a spreadsheet.

use crate::{Exercise, Folder, Library, Result, Workout};
use std::io::Write;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    folder_id: &'a str,
    folder_name: &'a str,
    workout_id: &'a str,
    workout_name: &'a str,
    exercise_id: Option<&'a str>,
    exercise_name: Option<&'a str>,
    sets: Option<u32>,
    reps: Option<u32>,
    weight: Option<f64>,
    notes: Option<&'a str>,
    last_performed: Option<String>,
}

impl<'a> CsvRow<'a> {
    fn new(folder: &'a Folder, workout: &'a Workout, exercise: Option<&'a Exercise>) -> Self {
        CsvRow {
            folder_id: &folder.id,
            folder_name: &folder.name,
            workout_id: &workout.id,
            workout_name: &workout.name,
            exercise_id: exercise.map(|e| e.id.as_str()),
            exercise_name: exercise.map(|e| e.name.as_str()),
            sets: exercise.map(|e| e.sets),
            reps: exercise.map(|e| e.reps),
            weight: exercise.and_then(|e| e.weight),
            notes: exercise.and_then(|e| e.notes.as_deref()),
            last_performed: workout.last_performed.map(|t| t.to_rfc3339()),
        }
    }
}

/// Write the library as CSV and return the number of data rows
///
/// Workouts without exercises still get one row with empty exercise columns.
/// Empty folders produce no rows.
pub fn export_csv<W: Write>(library: &Library, out: W) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    let mut rows = 0;

    for folder in &library.folders {
        for workout in &folder.workouts {
            if workout.exercises.is_empty() {
                writer.serialize(CsvRow::new(folder, workout, None))?;
                rows += 1;
            }
            for exercise in &workout.exercises {
                writer.serialize(CsvRow::new(folder, workout, Some(exercise)))?;
                rows += 1;
            }
        }
    }

    writer.flush()?;
    tracing::info!("Exported {} rows", rows);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn library() -> Library {
        let t = Utc.with_ymd_and_hms(2024, 4, 5, 12, 0, 0).unwrap();
        let workout = |id: &str, exercises: Vec<Exercise>| Workout {
            id: id.into(),
            name: format!("Workout {}", id),
            exercises,
            last_performed: None,
            created_at: t,
            updated_at: t,
        };
        Library {
            folders: vec![
                Folder {
                    id: "f1".into(),
                    name: "Push, Day".into(),
                    created_at: t,
                    updated_at: t,
                    workouts: vec![
                        workout(
                            "w1",
                            vec![
                                Exercise {
                                    id: "e1".into(),
                                    name: "Bench".into(),
                                    sets: 3,
                                    reps: 8,
                                    weight: Some(100.0),
                                    notes: None,
                                },
                                Exercise {
                                    id: "e2".into(),
                                    name: "Dips".into(),
                                    sets: 3,
                                    reps: 12,
                                    weight: None,
                                    notes: Some("bodyweight".into()),
                                },
                            ],
                        ),
                        workout("w2", vec![]),
                    ],
                },
                Folder {
                    id: "f2".into(),
                    name: "Empty".into(),
                    created_at: t,
                    updated_at: t,
                    workouts: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_export_rows() {
        let mut out = Vec::new();
        let rows = export_csv(&library(), &mut out).unwrap();
        assert_eq!(rows, 3);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("folder_id,folder_name,workout_id"));
        assert_eq!(
            lines[1],
            r#"f1,"Push, Day",w1,Workout w1,e1,Bench,3,8,100.0,,"#
        );
        assert_eq!(lines[3], r#"f1,"Push, Day",w2,Workout w2,,,,,,,"#);
    }

    #[test]
    fn test_export_empty_library() {
        let mut out = Vec::new();
        assert_eq!(export_csv(&Library::default(), &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }
}
