//! The workout store: owner of the canonical library.
//!
//! Every mutation is a read-modify-write of the whole library performed under
//! a single lock: read the current snapshot, compute the next one, persist it,
//! swap it in, then notify subscribers. Mutations are therefore serialized in
//! call order even when the store is shared across threads.

use crate::codec;
use crate::observer::{Subscribers, Subscription, SubscriptionId};
use crate::{
    Error, Exercise, Folder, Library, Result, Selection, Snapshot, Storage, Workout,
    WorkoutDraft,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Source of timestamps for created/updated bookkeeping
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Next `updatedAt` value: the current time, but always strictly after `previous`
fn touch(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::milliseconds(1);
    if now >= floor {
        now
    } else {
        floor
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(
            "folder name must not be empty".into(),
        ));
    }
    Ok(trimmed)
}

fn validate_exercises(exercises: &[Exercise]) -> Result<()> {
    let mut seen = HashSet::new();
    for exercise in exercises {
        if !seen.insert(exercise.id.as_str()) {
            return Err(Error::InvalidArgument(format!(
                "duplicate exercise id {}",
                exercise.id
            )));
        }
        // JSON has no encoding for inf/NaN; serde_json would write null
        if exercise.weight.is_some_and(|w| !w.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "exercise {} has a non-finite weight",
                exercise.id
            )));
        }
    }
    Ok(())
}

fn folder_not_found(folder_id: &str) -> Error {
    Error::NotFound(format!("folder {}", folder_id))
}

struct State<S> {
    storage: S,
    library: Arc<Library>,
    selection: Selection,
    revision: u64,
    durable: bool,
    loaded: bool,
    subscribers: Subscribers,
}

impl<S> State<S> {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            library: Arc::clone(&self.library),
            selection: self.selection.clone(),
            revision: self.revision,
            durable: self.durable,
        }
    }

    /// Swap in new state, bump the revision and notify subscribers
    fn publish(&mut self, library: Arc<Library>, selection: Selection) -> Snapshot {
        self.library = library;
        self.selection = selection;
        self.revision += 1;
        let snapshot = self.snapshot();
        self.subscribers.broadcast(&snapshot);
        snapshot
    }

    fn folder_index(&self, folder_id: &str) -> Result<usize> {
        self.library
            .folders
            .iter()
            .position(|f| f.id == folder_id)
            .ok_or_else(|| folder_not_found(folder_id))
    }
}

/// Owner of the in-memory library, its selection and its subscribers
pub struct WorkoutStore<S: Storage> {
    state: Mutex<State<S>>,
    clock: Box<dyn Clock>,
    pretty: bool,
}

impl<S: Storage> WorkoutStore<S> {
    /// Create an unloaded store; call [`WorkoutStore::load`] before mutating
    pub fn new(storage: S) -> Self {
        Self::with_clock(storage, SystemClock)
    }

    pub fn with_clock(storage: S, clock: impl Clock + 'static) -> Self {
        Self {
            state: Mutex::new(State {
                storage,
                library: Arc::new(Library::default()),
                selection: Selection::default(),
                revision: 0,
                durable: true,
                loaded: false,
                subscribers: Subscribers::default(),
            }),
            clock: Box::new(clock),
            pretty: false,
        }
    }

    /// Write indented JSON instead of compact JSON
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State<S>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_loaded(&self) -> Result<MutexGuard<'_, State<S>>> {
        let state = self.lock();
        if !state.loaded {
            return Err(Error::NotLoaded);
        }
        Ok(state)
    }

    fn encode(&self, library: &Library) -> Result<Vec<u8>> {
        if self.pretty {
            codec::encode_pretty(library)
        } else {
            codec::encode(library)
        }
    }

    /// Persist `library` and publish it with `selection`
    ///
    /// The in-memory state is replaced even when the write fails; the
    /// published snapshot is then marked non-durable and the write error is
    /// returned.
    fn commit(
        &self,
        state: &mut State<S>,
        library: Library,
        selection: Selection,
    ) -> Result<Snapshot> {
        let bytes = self.encode(&library)?;
        let written = state.storage.write(&bytes);
        state.durable = written.is_ok();
        if let Err(e) = &written {
            tracing::warn!("Library change kept in memory but not persisted: {}", e);
        }

        let snapshot = state.publish(Arc::new(library), selection);
        written.map(|_| snapshot)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Load the library from storage
    ///
    /// An absent record yields an empty library. A record that cannot be
    /// decoded is handed to the storage for safekeeping, the store starts from
    /// an empty library, and `CorruptState` is returned. A storage read
    /// failure leaves the store unloaded so the load can be retried.
    pub fn load(&self) -> Result<Snapshot> {
        let mut state = self.lock();
        let bytes = state.storage.read()?;

        let (library, outcome) = match bytes {
            None => {
                tracing::info!("No stored library, starting empty");
                (Library::default(), Ok(()))
            }
            Some(bytes) => match codec::decode(&bytes) {
                Ok(library) => (library, Ok(())),
                Err(e) => {
                    tracing::warn!("Stored library is unreadable: {}", e);
                    let reason = match e {
                        Error::CorruptState(reason) => reason,
                        other => other.to_string(),
                    };
                    let detail = match state.storage.preserve_unreadable(&bytes) {
                        Ok(Some(location)) => {
                            format!("{}; unreadable data preserved at {}", reason, location)
                        }
                        Ok(None) => reason,
                        Err(preserve_err) => {
                            tracing::warn!(
                                "Unable to preserve unreadable library: {}",
                                preserve_err
                            );
                            format!("{}; unreadable data could not be preserved", reason)
                        }
                    };
                    (Library::default(), Err(Error::CorruptState(detail)))
                }
            },
        };

        // Keep a selection made before loading if it still resolves
        let selection = match state.selection.current_folder_id.as_deref() {
            Some(id) if library.folder(id).is_some() => state.selection.clone(),
            _ => Selection::initial(&library),
        };

        tracing::info!("Loaded library with {} folders", library.folders.len());
        state.loaded = true;
        state.durable = true;
        let snapshot = state.publish(Arc::new(library), selection);
        outcome.map(|_| snapshot)
    }

    /// Drop all durable state and start over with an empty library
    pub fn reset(&self) -> Result<Snapshot> {
        let mut state = self.lock();
        let cleared = state.storage.clear();
        state.loaded = true;
        state.durable = cleared.is_ok();
        if let Err(e) = &cleared {
            tracing::warn!("Library reset in memory but storage was not cleared: {}", e);
        } else {
            tracing::info!("Library reset");
        }

        let snapshot = state.publish(Arc::new(Library::default()), Selection::default());
        cleared.map(|_| snapshot)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Current immutable snapshot; stale as soon as the next change lands
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    pub fn folder(&self, folder_id: &str) -> Option<Folder> {
        self.lock().library.folder(folder_id).cloned()
    }

    pub fn workout(&self, folder_id: &str, workout_id: &str) -> Option<Workout> {
        self.lock()
            .library
            .folder(folder_id)
            .and_then(|f| f.workout(workout_id))
            .cloned()
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Receive the current snapshot now and every subsequent one
    ///
    /// Undrained snapshots pile up in the subscription; see [`Subscription`].
    pub fn subscribe(&self) -> Subscription {
        let mut state = self.lock();
        let current = state.snapshot();
        state.subscribers.add(current)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().subscribers.remove(id)
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Change the current folder; in-memory only and not validated
    pub fn set_current_folder(&self, folder_id: Option<&str>) -> Snapshot {
        let mut state = self.lock();
        let library = Arc::clone(&state.library);
        let selection = Selection {
            current_folder_id: folder_id.map(str::to_owned),
        };
        state.publish(library, selection)
    }

    // ------------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------------

    pub fn add_folder(&self, name: &str) -> Result<Folder> {
        let name = validate_name(name)?;
        let mut state = self.lock_loaded()?;

        let now = self.clock.now();
        let folder = Folder {
            id: crate::new_id(),
            name: name.to_owned(),
            workouts: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let mut library = Library::clone(&state.library);
        library.folders.push(folder.clone());

        let mut selection = state.selection.clone();
        if selection.current_folder_id.is_none() {
            selection.current_folder_id = Some(folder.id.clone());
        }

        tracing::debug!("Adding folder {} ({})", folder.name, folder.id);
        self.commit(&mut state, library, selection)?;
        Ok(folder)
    }

    pub fn rename_folder(&self, folder_id: &str, name: &str) -> Result<Folder> {
        let name = validate_name(name)?;
        let mut state = self.lock_loaded()?;
        let index = state.folder_index(folder_id)?;

        let mut library = Library::clone(&state.library);
        let folder = &mut library.folders[index];
        folder.name = name.to_owned();
        folder.updated_at = touch(folder.updated_at, self.clock.now());
        let renamed = folder.clone();

        let selection = state.selection.clone();
        self.commit(&mut state, library, selection)?;
        Ok(renamed)
    }

    /// Remove a folder and everything in it; absent ids are a no-op
    pub fn delete_folder(&self, folder_id: &str) -> Result<()> {
        let mut state = self.lock_loaded()?;
        if state.library.folder(folder_id).is_none() {
            tracing::debug!("Folder {} already absent", folder_id);
            return Ok(());
        }

        let mut library = Library::clone(&state.library);
        library.folders.retain(|f| f.id != folder_id);

        let mut selection = state.selection.clone();
        selection.fallback_after_delete(folder_id, &library);

        tracing::debug!("Deleting folder {}", folder_id);
        self.commit(&mut state, library, selection)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Workouts
    // ------------------------------------------------------------------------

    pub fn add_workout(&self, folder_id: &str, draft: WorkoutDraft) -> Result<Workout> {
        validate_exercises(&draft.exercises)?;
        let mut state = self.lock_loaded()?;
        let index = state.folder_index(folder_id)?;

        let now = self.clock.now();
        let workout = Workout {
            id: crate::new_id(),
            name: draft.name,
            exercises: draft.exercises,
            last_performed: draft.last_performed,
            created_at: now,
            updated_at: now,
        };

        let mut library = Library::clone(&state.library);
        let folder = &mut library.folders[index];
        folder.workouts.push(workout.clone());
        folder.updated_at = touch(folder.updated_at, now);

        tracing::debug!("Adding workout {} to folder {}", workout.id, folder_id);
        let selection = state.selection.clone();
        self.commit(&mut state, library, selection)?;
        Ok(workout)
    }

    /// Remove a workout; an absent workout id still touches the folder
    pub fn delete_workout(&self, folder_id: &str, workout_id: &str) -> Result<()> {
        let mut state = self.lock_loaded()?;
        let index = state.folder_index(folder_id)?;

        let mut library = Library::clone(&state.library);
        let folder = &mut library.folders[index];
        folder.workouts.retain(|w| w.id != workout_id);
        folder.updated_at = touch(folder.updated_at, self.clock.now());

        tracing::debug!("Deleting workout {} from folder {}", workout_id, folder_id);
        let selection = state.selection.clone();
        self.commit(&mut state, library, selection)?;
        Ok(())
    }

    /// Replace the workout whose id matches `workout.id`
    ///
    /// The stored id and `createdAt` are kept and `updatedAt` is set by the
    /// store. Returns the stored replacement, or `None` if the folder has no
    /// workout with that id (the folder is touched either way).
    pub fn update_workout(&self, folder_id: &str, workout: Workout) -> Result<Option<Workout>> {
        validate_exercises(&workout.exercises)?;
        let mut state = self.lock_loaded()?;
        let index = state.folder_index(folder_id)?;

        let now = self.clock.now();
        let mut library = Library::clone(&state.library);
        let folder = &mut library.folders[index];

        let replaced = folder
            .workouts
            .iter_mut()
            .find(|w| w.id == workout.id)
            .map(|existing| {
                *existing = Workout {
                    id: existing.id.clone(),
                    created_at: existing.created_at,
                    updated_at: touch(existing.updated_at, now),
                    ..workout
                };
                existing.clone()
            });
        folder.updated_at = touch(folder.updated_at, now);

        if replaced.is_none() {
            tracing::debug!("No workout to update in folder {}", folder_id);
        }
        let selection = state.selection.clone();
        self.commit(&mut state, library, selection)?;
        Ok(replaced)
    }
}
