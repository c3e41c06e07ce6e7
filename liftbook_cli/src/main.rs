use clap::{Parser, Subcommand};
use liftbook_core::*;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "liftbook")]
#[command(about = "Personal workout library", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage folders
    Folder {
        #[command(subcommand)]
        action: FolderCommand,
    },

    /// Manage workouts inside a folder
    Workout {
        #[command(subcommand)]
        action: WorkoutCommand,
    },

    /// Export the library as CSV
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Wipe all stored workout data
    Reset {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum FolderCommand {
    /// List folders (the current folder is marked with *)
    List,
    /// Create a folder
    Add { name: String },
    /// Rename a folder
    Rename { id: String, name: String },
    /// Delete a folder and its workouts
    Rm { id: String },
}

#[derive(Subcommand)]
enum WorkoutCommand {
    /// List workouts in a folder (defaults to the current folder)
    List { folder_id: Option<String> },
    /// Create a workout
    Add {
        folder_id: String,
        name: String,
        /// Exercise as NAME:SETSxREPS[@WEIGHT], repeatable
        #[arg(long = "exercise", value_parser = parse_exercise)]
        exercises: Vec<Exercise>,
    },
    /// Show a workout's exercises
    Show { folder_id: String, workout_id: String },
    /// Delete a workout
    Rm { folder_id: String, workout_id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        liftbook_core::logging::init_with_level("debug");
    } else {
        liftbook_core::logging::init();
    }

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);
    let store = open_store(data_dir, &config)?;

    match cli.command {
        Commands::Folder { action } => cmd_folder(&store, action),
        Commands::Workout { action } => cmd_workout(&store, action),
        Commands::Export { out } => cmd_export(&store, out),
        Commands::Reset { yes } => cmd_reset(&store, yes),
    }
}

/// Open and load the library, continuing on an empty one if the stored data is unreadable
fn open_store(data_dir: PathBuf, config: &Config) -> Result<WorkoutStore<FileStorage>> {
    let storage = FileStorage::new(data_dir, config.storage.key.as_str());
    let store = WorkoutStore::new(storage).pretty(config.storage.pretty);

    match store.load() {
        Ok(_) => {}
        Err(e) if e.is_corrupt_state() => {
            eprintln!("warning: {}", e);
            eprintln!("warning: continuing with an empty library");
        }
        Err(e) => return Err(e),
    }
    Ok(store)
}

fn cmd_folder(store: &WorkoutStore<FileStorage>, action: FolderCommand) -> Result<()> {
    match action {
        FolderCommand::List => {
            let snapshot = store.snapshot();
            if snapshot.folders().is_empty() {
                println!("No folders yet.");
            }
            for folder in snapshot.folders() {
                let marker = if snapshot.selection.is_selected(&folder.id) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {}  {}  ({} workouts)",
                    marker,
                    folder.id,
                    folder.name,
                    folder.workouts.len()
                );
            }
        }
        FolderCommand::Add { name } => {
            let folder = store.add_folder(&name)?;
            println!("✓ Created folder {} ({})", folder.name, folder.id);
        }
        FolderCommand::Rename { id, name } => {
            let folder = store.rename_folder(&id, &name)?;
            println!("✓ Renamed folder {} to {}", folder.id, folder.name);
        }
        FolderCommand::Rm { id } => {
            if store.folder(&id).is_none() {
                println!("No folder {} - nothing to delete.", id);
                return Ok(());
            }
            store.delete_folder(&id)?;
            println!("✓ Deleted folder {}", id);
        }
    }
    Ok(())
}

fn cmd_workout(store: &WorkoutStore<FileStorage>, action: WorkoutCommand) -> Result<()> {
    match action {
        WorkoutCommand::List { folder_id } => {
            let snapshot = store.snapshot();
            let folder = match folder_id {
                Some(id) => snapshot
                    .library
                    .folder(&id)
                    .ok_or_else(|| Error::NotFound(format!("folder {}", id)))?,
                None => snapshot
                    .current_folder()
                    .ok_or_else(|| Error::NotFound("no folders yet".into()))?,
            };

            println!("{}", folder.name);
            if folder.workouts.is_empty() {
                println!("  No workouts yet.");
            }
            for workout in &folder.workouts {
                println!(
                    "  {}  {}  ({} exercises)",
                    workout.id,
                    workout.name,
                    workout.exercises.len()
                );
            }
        }
        WorkoutCommand::Add {
            folder_id,
            name,
            exercises,
        } => {
            let draft = WorkoutDraft {
                name,
                exercises,
                last_performed: None,
            };
            let workout = store.add_workout(&folder_id, draft)?;
            println!("✓ Created workout {} ({})", workout.name, workout.id);
        }
        WorkoutCommand::Show {
            folder_id,
            workout_id,
        } => {
            let workout = store.workout(&folder_id, &workout_id).ok_or_else(|| {
                Error::NotFound(format!("workout {} in folder {}", workout_id, folder_id))
            })?;
            display_workout(&workout);
        }
        WorkoutCommand::Rm {
            folder_id,
            workout_id,
        } => {
            store.delete_workout(&folder_id, &workout_id)?;
            println!("✓ Deleted workout {}", workout_id);
        }
    }
    Ok(())
}

fn cmd_export(store: &WorkoutStore<FileStorage>, out: Option<PathBuf>) -> Result<()> {
    let snapshot = store.snapshot();
    match out {
        Some(path) => {
            let file = std::fs::File::create(&path)?;
            let rows = export_csv(&snapshot.library, file)?;
            println!("✓ Exported {} rows to {}", rows, path.display());
        }
        None => {
            let stdout = io::stdout();
            export_csv(&snapshot.library, stdout.lock())?;
        }
    }
    Ok(())
}

fn cmd_reset(store: &WorkoutStore<FileStorage>, yes: bool) -> Result<()> {
    if !yes {
        return Err(Error::InvalidArgument(
            "reset deletes every folder and workout; pass --yes to confirm".into(),
        ));
    }
    store.reset()?;
    println!("✓ Storage cleared");
    io::stdout().flush()?;
    Ok(())
}

fn display_workout(workout: &Workout) {
    println!("\n  {}", workout.name);
    if let Some(last) = workout.last_performed {
        println!("  Last performed: {}", last.format("%Y-%m-%d %H:%M"));
    }
    println!();

    if workout.exercises.is_empty() {
        println!("  No exercises yet.");
    }
    for exercise in &workout.exercises {
        match exercise.weight {
            Some(weight) => println!(
                "  → {}: {} x {} @ {}",
                exercise.name, exercise.sets, exercise.reps, weight
            ),
            None => println!("  → {}: {} x {}", exercise.name, exercise.sets, exercise.reps),
        }
        if let Some(ref notes) = exercise.notes {
            println!("    {}", notes);
        }
    }
    println!();
}

/// Parse `NAME:SETSxREPS[@WEIGHT]`, e.g. `Bench Press:3x8@100`
fn parse_exercise(spec: &str) -> std::result::Result<Exercise, String> {
    let (name, plan) = spec
        .rsplit_once(':')
        .ok_or_else(|| format!("expected NAME:SETSxREPS[@WEIGHT], got {:?}", spec))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("exercise name must not be empty".into());
    }

    let (counts, weight) = match plan.split_once('@') {
        Some((counts, weight)) => {
            let weight: f64 = weight
                .trim()
                .parse()
                .map_err(|_| format!("invalid weight {:?}", weight))?;
            if !weight.is_finite() {
                return Err(format!("weight must be a finite number, got {}", weight));
            }
            (counts, Some(weight))
        }
        None => (plan, None),
    };

    let (sets, reps) = counts
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected SETSxREPS, got {:?}", counts))?;
    let sets: u32 = sets
        .trim()
        .parse()
        .map_err(|_| format!("invalid set count {:?}", sets))?;
    let reps: u32 = reps
        .trim()
        .parse()
        .map_err(|_| format!("invalid rep count {:?}", reps))?;

    let exercise = Exercise::new(name, sets, reps);
    Ok(match weight {
        Some(weight) => exercise.with_weight(weight),
        None => exercise,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exercise_with_weight() {
        let exercise = parse_exercise("Bench Press:3x8@100").unwrap();
        assert_eq!(exercise.name, "Bench Press");
        assert_eq!((exercise.sets, exercise.reps), (3, 8));
        assert_eq!(exercise.weight, Some(100.0));
    }

    #[test]
    fn test_parse_exercise_without_weight() {
        let exercise = parse_exercise("Pull-up: 4X10").unwrap();
        assert_eq!((exercise.sets, exercise.reps), (4, 10));
        assert_eq!(exercise.weight, None);
    }

    #[test]
    fn test_parse_exercise_rejects_garbage() {
        assert!(parse_exercise("Bench").is_err());
        assert!(parse_exercise(":3x8").is_err());
        assert!(parse_exercise("Bench:3by8").is_err());
        assert!(parse_exercise("Bench:3x8@heavy").is_err());
        assert!(parse_exercise("Squat:5x5@NaN").is_err());
        assert!(parse_exercise("Squat:5x5@inf").is_err());
    }
}
