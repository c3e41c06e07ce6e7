//! JSON codec for the persisted library document.
//!
//! The document is `{ "folders": [...] }` with camelCase field names and
//! RFC 3339 timestamps. Decoding re-hydrates every timestamp into a typed
//! `DateTime<Utc>` and validates the hierarchy before handing it out.

use crate::{Error, Folder, Library, Result, Workout};
use std::collections::HashSet;

/// Encode a library as compact JSON
pub fn encode(library: &Library) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(library)?)
}

/// Encode a library as indented JSON
pub fn encode_pretty(library: &Library) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(library)?)
}

/// Decode a library document
///
/// Empty or whitespace-only input yields an empty library. Anything that
/// does not parse, or parses into an inconsistent hierarchy, is `CorruptState`.
pub fn decode(bytes: &[u8]) -> Result<Library> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Library::default());
    }

    let library: Library = serde_json::from_slice(bytes)
        .map_err(|e| Error::CorruptState(format!("unreadable library document: {}", e)))?;

    validate(&library)?;
    Ok(library)
}

/// Check identifier uniqueness and timestamp ordering across the hierarchy
pub fn validate(library: &Library) -> Result<()> {
    let mut folder_ids = HashSet::new();
    for folder in &library.folders {
        if !folder_ids.insert(folder.id.as_str()) {
            return Err(Error::CorruptState(format!(
                "duplicate folder id {}",
                folder.id
            )));
        }
        validate_folder(folder)?;
    }
    Ok(())
}

fn validate_folder(folder: &Folder) -> Result<()> {
    if folder.updated_at < folder.created_at {
        return Err(Error::CorruptState(format!(
            "folder {} updated before it was created",
            folder.id
        )));
    }

    let mut workout_ids = HashSet::new();
    for workout in &folder.workouts {
        if !workout_ids.insert(workout.id.as_str()) {
            return Err(Error::CorruptState(format!(
                "duplicate workout id {} in folder {}",
                workout.id, folder.id
            )));
        }
        validate_workout(workout)?;
    }
    Ok(())
}

fn validate_workout(workout: &Workout) -> Result<()> {
    if workout.updated_at < workout.created_at {
        return Err(Error::CorruptState(format!(
            "workout {} updated before it was created",
            workout.id
        )));
    }

    let mut exercise_ids = HashSet::new();
    for exercise in &workout.exercises {
        if !exercise_ids.insert(exercise.id.as_str()) {
            return Err(Error::CorruptState(format!(
                "duplicate exercise id {} in workout {}",
                exercise.id, workout.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Exercise;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn nested_library() -> Library {
        Library {
            folders: vec![Folder {
                id: "f1".into(),
                name: "Push Day".into(),
                created_at: ts(0),
                updated_at: ts(60),
                workouts: vec![Workout {
                    id: "w1".into(),
                    name: "Bench".into(),
                    last_performed: Some(ts(30)),
                    created_at: ts(10),
                    updated_at: ts(20),
                    exercises: vec![
                        Exercise {
                            id: "e1".into(),
                            name: "Bench Press".into(),
                            sets: 3,
                            reps: 8,
                            weight: Some(100.0),
                            notes: Some("pause on chest".into()),
                        },
                        Exercise {
                            id: "e2".into(),
                            name: "Dips".into(),
                            sets: 3,
                            reps: 12,
                            weight: None,
                            notes: None,
                        },
                    ],
                }],
            }],
        }
    }

    #[test]
    fn test_roundtrip_nested_library() {
        let library = nested_library();
        let decoded = decode(&encode(&library).unwrap()).unwrap();
        assert_eq!(decoded, library);

        let pretty = decode(&encode_pretty(&library).unwrap()).unwrap();
        assert_eq!(pretty, library);
    }

    #[test]
    fn test_roundtrip_empty_library() {
        let library = Library::default();
        assert_eq!(decode(&encode(&library).unwrap()).unwrap(), library);
    }

    #[test]
    fn test_document_uses_camel_case_timestamps() {
        let json = String::from_utf8(encode(&nested_library()).unwrap()).unwrap();
        assert!(json.starts_with(r#"{"folders":["#));
        assert!(json.contains(r#""createdAt":"2023-11-14T22:13:20Z""#));
        assert!(json.contains(r#""lastPerformed":"#));
    }

    #[test]
    fn test_decode_empty_payload_is_empty_library() {
        assert!(decode(b"").unwrap().is_empty());
        assert!(decode(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rehydrates_javascript_dates() {
        let doc = r#"{"folders":[{"id":"1712345678901","name":"Legs","workouts":[],
            "createdAt":"2024-04-05T19:34:38.901Z","updatedAt":"2024-04-05T19:34:38.901Z"}]}"#;
        let library = decode(doc.as_bytes()).unwrap();
        let folder = &library.folders[0];
        assert_eq!(folder.id, "1712345678901");
        assert_eq!(
            folder.created_at,
            Utc.timestamp_millis_opt(1_712_345_678_901).unwrap()
        );
    }

    #[test]
    fn test_decode_truncated_is_corrupt() {
        let bytes = encode(&nested_library()).unwrap();
        let err = decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(err.is_corrupt_state());
    }

    #[test]
    fn test_decode_unknown_shape_is_corrupt() {
        assert!(decode(b"[1, 2, 3]").unwrap_err().is_corrupt_state());
        assert!(decode(br#"{"folders":[],"extra":true}"#)
            .unwrap_err()
            .is_corrupt_state());
        assert!(decode(
            br#"{"folders":[{"id":"a","name":"x","workouts":[],"createdAt":"yesterday","updatedAt":"today"}]}"#
        )
        .unwrap_err()
        .is_corrupt_state());
    }

    #[test]
    fn test_decode_rejects_duplicate_folder_ids() {
        let mut library = nested_library();
        library.folders.push(library.folders[0].clone());
        let bytes = encode(&library).unwrap();
        assert!(decode(&bytes).unwrap_err().is_corrupt_state());
    }

    #[test]
    fn test_decode_rejects_backwards_timestamps() {
        let mut library = nested_library();
        library.folders[0].workouts[0].updated_at = ts(10) - Duration::seconds(1);
        let bytes = encode(&library).unwrap();
        assert!(decode(&bytes).unwrap_err().is_corrupt_state());
    }
}
