//! electrotrack - Post-workout hydration and electrolyte recommendations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use electrotrack::config::EngineConfig;
use electrotrack::ml::{HydrationEngine, Trainer};
use electrotrack::models::{
    ActivityLevel, AthleteProfile, ElectrolyteLevel, EnvironmentalData, Gender, HydrationOutcome,
    IntensityLevel, Location, WorkoutMetrics, WorkoutRecord, WorkoutType,
};
use electrotrack::session::SessionManager;
use electrotrack::Database;

const DB_PATH: &str = "electrotrack.db";
const MODEL_PATH: &str = "electrotrack-model.json";

#[derive(Parser)]
#[command(name = "electrotrack")]
#[command(author, version, about = "Hydration and electrolyte recommendations after workouts")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "ELECTROTRACK_DB", default_value = DB_PATH)]
    db: String,

    /// Engine configuration (TOML); defaults apply when absent
    #[arg(long, env = "ELECTROTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Trained model file (JSON)
    #[arg(long, env = "ELECTROTRACK_MODEL", default_value = MODEL_PATH)]
    model: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register or update an athlete profile
    Register {
        athlete_id: String,

        #[arg(long)]
        age: u32,

        /// M, F or other
        #[arg(long, value_parser = parse_gender)]
        gender: Gender,

        #[arg(long)]
        weight: f64,

        #[arg(long)]
        height: f64,

        /// recreational, competitive or elite
        #[arg(long, value_parser = parse_activity, default_value = "recreational")]
        activity: ActivityLevel,

        /// Resting heart rate (bpm)
        #[arg(long)]
        resting_hr: u32,

        /// Lab-measured sweat rate (L/h)
        #[arg(long)]
        sweat_rate: Option<f64>,
    },

    /// Recommend hydration for a completed workout and store it
    Recommend(RecommendArgs),

    /// Record what the athlete actually drank after a workout
    LogOutcome {
        workout_id: String,

        /// Liters consumed
        #[arg(long)]
        volume: f64,

        /// none, low, medium or high
        #[arg(long, value_parser = parse_electrolyte)]
        electrolyte: ElectrolyteLevel,
    },

    /// Fit the model on workouts with recorded outcomes
    Train,

    /// List workout history
    History {
        athlete_id: String,

        /// Only workouts from the last N days
        #[arg(short, long)]
        days: Option<i64>,

        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Args)]
struct RecommendArgs {
    athlete_id: String,

    /// Workout duration in minutes
    #[arg(long)]
    duration: f64,

    /// Average heart rate (bpm)
    #[arg(long)]
    hr: u32,

    /// Weight before the workout (kg)
    #[arg(long)]
    pre: f64,

    /// Weight after the workout (kg)
    #[arg(long)]
    post: f64,

    /// Fluid consumed during the workout (L)
    #[arg(long, default_value = "0")]
    intake: f64,

    /// distance, sprint, field or other
    #[arg(long, value_parser = parse_workout_type, default_value = "other")]
    workout_type: WorkoutType,

    #[arg(long)]
    distance: Option<f64>,

    /// low, medium or high; inferred from heart rate when omitted
    #[arg(long, value_parser = parse_intensity)]
    intensity: Option<IntensityLevel>,

    /// Temperature (°F); conditions are unknown when omitted
    #[arg(long)]
    temp: Option<f64>,

    #[arg(long, default_value = "50")]
    humidity: f64,

    #[arg(long)]
    indoor: bool,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let db = Arc::new(Database::open(&cli.db)?);
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Register {
            athlete_id,
            age,
            gender,
            weight,
            height,
            activity,
            resting_hr,
            sweat_rate,
        } => {
            let profile = AthleteProfile::new(age, gender, weight, height, activity, resting_hr)?
                .with_known_sweat_rate(sweat_rate)?;
            db.add_athlete(&athlete_id, &profile)?;
            println!("Registered: {} ({}, {} kg)", athlete_id, activity.name(), weight);
        }

        Commands::Recommend(args) => {
            let engine = Arc::new(load_engine(config, &cli.model));
            let sessions = SessionManager::new(engine, db.clone(), db.clone());

            let environment = args.temp.map(|temp| {
                let location = if args.indoor { Location::Indoor } else { Location::Outdoor };
                EnvironmentalData::new(temp, args.humidity, location)
            });
            let metrics = WorkoutMetrics {
                duration_minutes: args.duration,
                average_heart_rate_bpm: args.hr,
                pre_workout_weight_kg: args.pre,
                post_workout_weight_kg: args.post,
                fluid_intake_liters: args.intake,
                workout_type: args.workout_type,
                distance_km: args.distance,
                intensity_level: args.intensity,
            };

            let (record, recommendation) =
                sessions.complete_workout(&args.athlete_id, metrics, environment)?;
            db.save_workout(&record)?;

            println!("{}", recommendation);
            println!();
            println!("Workout id: {}", record.workout_id);
        }

        Commands::LogOutcome {
            workout_id,
            volume,
            electrolyte,
        } => {
            let outcome = HydrationOutcome {
                actual_volume_liters: volume,
                actual_electrolyte: electrolyte,
            };
            let record = db.record_outcome(&workout_id, outcome)?;
            println!(
                "Logged outcome for {}: {:.2} L, {} electrolytes (recommended {:.2} L)",
                workout_id,
                volume,
                electrolyte.name(),
                record.recommendation.volume_liters
            );
        }

        Commands::Train => {
            let engine: HydrationEngine = HydrationEngine::new(config.clone());
            let trainer = Trainer::new(&config);
            let records = db.all_workouts()?;

            let summary = trainer.fit(engine.model(), &*db, &records)?;
            engine.model().save(&cli.model)?;

            println!("Model Training");
            println!("{:-<40}", "");
            println!("Training samples:      {}", summary.training.sample_count);
            println!("Volume MAE:            {:.3} L", summary.training.volume_mae);
            println!("Volume R²:             {:.3}", summary.training.volume_r2);
            println!("Electrolyte accuracy:  {:.1}%", summary.training.electrolyte_accuracy * 100.0);
            match summary.holdout {
                Some(holdout) => {
                    println!("Holdout samples:       {}", holdout.sample_count);
                    println!("Holdout volume MAE:    {:.3} L", holdout.volume_mae);
                    println!("Holdout accuracy:      {:.1}%", holdout.electrolyte_accuracy * 100.0);
                }
                None => println!("Holdout:               none"),
            }
            println!("Saved to {}", cli.model.display());
        }

        Commands::History {
            athlete_id,
            days,
            limit,
        } => {
            let records: Vec<WorkoutRecord> = match days {
                Some(days) => db
                    .workouts_between(Utc::now() - Duration::days(days), Utc::now())?
                    .into_iter()
                    .filter(|r| r.athlete_id == athlete_id)
                    .collect(),
                None => db.get_workouts(&athlete_id)?,
            };

            println!("Workout history: {}", athlete_id);
            println!("{:-<72}", "");
            for r in records.iter().rev().take(limit) {
                let loss = r.final_metrics().map_or(0.0, WorkoutMetrics::weight_loss_kg);
                let outcome = r
                    .outcome
                    .as_ref()
                    .map(|o| format!("{:.2} L", o.actual_volume_liters))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{} | {:36} | -{:.2} kg | rec {:.2} L {:6} | drank {}",
                    r.started_at.format("%Y-%m-%d %H:%M"),
                    r.workout_id,
                    loss,
                    r.recommendation.volume_liters,
                    r.recommendation.electrolyte_level.name(),
                    outcome
                );
            }
        }
    }

    Ok(())
}

/// Engine with the saved model if there is one; rules only otherwise
fn load_engine(config: EngineConfig, model_path: &Path) -> HydrationEngine {
    let engine = HydrationEngine::new(config);
    if model_path.exists()
        && let Err(e) = engine.model().load(model_path)
    {
        warn!(path = %model_path.display(), error = %e, "Ignoring unreadable model, using rules only");
    }
    engine
}

fn parse_gender(s: &str) -> Result<Gender, String> {
    Gender::from_code(s).ok_or_else(|| format!("unknown gender '{}'", s))
}

fn parse_activity(s: &str) -> Result<ActivityLevel, String> {
    ActivityLevel::from_name(s).ok_or_else(|| format!("unknown activity level '{}'", s))
}

fn parse_electrolyte(s: &str) -> Result<ElectrolyteLevel, String> {
    ElectrolyteLevel::from_name(s).ok_or_else(|| format!("unknown electrolyte level '{}'", s))
}

fn parse_workout_type(s: &str) -> Result<WorkoutType, String> {
    WorkoutType::from_name(s).ok_or_else(|| format!("unknown workout type '{}'", s))
}

fn parse_intensity(s: &str) -> Result<IntensityLevel, String> {
    IntensityLevel::from_name(s).ok_or_else(|| format!("unknown intensity '{}'", s))
}
