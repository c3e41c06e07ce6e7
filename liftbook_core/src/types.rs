//! Core domain types for the Liftbook workout library.
//!
//! This module defines the fundamental types used throughout the system:
//! - The persisted hierarchy (library, folders, workouts, exercises)
//! - Drafts supplied by callers when creating workouts
//! - Selection and the immutable snapshots handed to subscribers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Generate a fresh identifier for a folder, workout or exercise
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// Persisted Types
// ============================================================================

/// A named movement with planned sets/reps/weight
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Exercise {
    /// Create an exercise with a freshly generated id
    pub fn new(name: impl Into<String>, sets: u32, reps: u32) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            sets,
            reps,
            weight: None,
            notes: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// A named, ordered collection of exercises
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Workout {
    pub id: String,
    pub name: String,
    pub exercises: Vec<Exercise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_performed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named grouping of workouts
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub workouts: Vec<Workout>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    pub fn workout(&self, workout_id: &str) -> Option<&Workout> {
        self.workouts.iter().find(|w| w.id == workout_id)
    }
}

/// The single persisted aggregate
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Library {
    pub folders: Vec<Folder>,
}

impl Library {
    pub fn folder(&self, folder_id: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == folder_id)
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

// ============================================================================
// Caller-supplied Types
// ============================================================================

/// The caller-supplied part of a new workout; id and timestamps are assigned by the store
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkoutDraft {
    pub name: String,
    pub exercises: Vec<Exercise>,
    pub last_performed: Option<DateTime<Utc>>,
}

impl WorkoutDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_exercise(mut self, exercise: Exercise) -> Self {
        self.exercises.push(exercise);
        self
    }
}

// ============================================================================
// Selection and Snapshot Types
// ============================================================================

/// Which folder is "current" for the active session (never persisted)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub current_folder_id: Option<String>,
}

impl Selection {
    /// Default selection for a freshly loaded library: the first folder, if any
    pub fn initial(library: &Library) -> Self {
        Self {
            current_folder_id: library.folders.first().map(|f| f.id.clone()),
        }
    }

    pub fn is_selected(&self, folder_id: &str) -> bool {
        self.current_folder_id.as_deref() == Some(folder_id)
    }

    /// Re-point the selection after `deleted_id` was removed from `library`
    ///
    /// Leaves the selection alone unless it referenced the deleted folder.
    pub fn fallback_after_delete(&mut self, deleted_id: &str, library: &Library) {
        if self.is_selected(deleted_id) {
            *self = Self::initial(library);
        }
    }
}

/// Immutable point-in-time view of the library plus selection
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub library: Arc<Library>,
    pub selection: Selection,
    /// Increases by one for every applied change
    pub revision: u64,
    /// False when the most recent write to storage failed
    pub durable: bool,
}

impl Snapshot {
    pub fn folders(&self) -> &[Folder] {
        &self.library.folders
    }

    pub fn current_folder(&self) -> Option<&Folder> {
        self.selection
            .current_folder_id
            .as_deref()
            .and_then(|id| self.library.folder(id))
    }
}
