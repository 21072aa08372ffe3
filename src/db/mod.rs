//! Database module - SQLite storage for athletes and workout records

use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::HydrationError;
use crate::models::{ActivityLevel, AthleteProfile, Gender, HydrationOutcome, WorkoutRecord};
use crate::store::{AthleteRegistry, HistoryStore};

/// Database wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS athletes (
                id TEXT PRIMARY KEY,
                age INTEGER NOT NULL,
                gender TEXT NOT NULL,
                weight_kg REAL NOT NULL,
                height_cm REAL NOT NULL,
                activity_level TEXT NOT NULL,
                baseline_heart_rate INTEGER NOT NULL,
                registered_at TEXT NOT NULL
            )",
            [],
        )?;

        // Migration: add known_sweat_rate_lph column if missing
        let has_sweat_rate: bool = conn
            .prepare("SELECT known_sweat_rate_lph FROM athletes LIMIT 1")
            .is_ok();
        if !has_sweat_rate {
            let _ = conn.execute(
                "ALTER TABLE athletes ADD COLUMN known_sweat_rate_lph REAL",
                [],
            );
        }

        // Full record as JSON; the indexed columns are for lookup and ordering
        conn.execute(
            "CREATE TABLE IF NOT EXISTS workouts (
                id TEXT PRIMARY KEY,
                athlete_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                record TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_workouts_athlete ON workouts (athlete_id, started_at)",
            [],
        )?;

        Ok(())
    }

    /// Register or replace an athlete
    pub fn add_athlete(&self, athlete_id: &str, profile: &AthleteProfile) -> Result<()> {
        profile.validate()?;
        self.conn().execute(
            "INSERT OR REPLACE INTO athletes (id, age, gender, weight_kg, height_cm, activity_level, baseline_heart_rate, known_sweat_rate_lph, registered_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                athlete_id,
                profile.age,
                profile.gender.code(),
                profile.weight_kg,
                profile.height_cm,
                profile.activity_level.name(),
                profile.baseline_heart_rate,
                profile.known_sweat_rate_lph,
                timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    pub fn get_athlete(&self, athlete_id: &str) -> Result<Option<AthleteProfile>> {
        let row = self
            .conn()
            .query_row(
                "SELECT age, gender, weight_kg, height_cm, activity_level, baseline_heart_rate, known_sweat_rate_lph FROM athletes WHERE id = ?1",
                params![athlete_id],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, u32>(5)?,
                        row.get::<_, Option<f64>>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((age, gender, weight_kg, height_cm, activity, baseline_hr, sweat_rate)) = row else {
            return Ok(None);
        };
        let gender = Gender::from_code(&gender)
            .ok_or_else(|| anyhow!("unknown gender code '{}' for {}", gender, athlete_id))?;
        let activity_level = ActivityLevel::from_name(&activity)
            .ok_or_else(|| anyhow!("unknown activity level '{}' for {}", activity, athlete_id))?;

        let profile = AthleteProfile::new(age, gender, weight_kg, height_cm, activity_level, baseline_hr)?
            .with_known_sweat_rate(sweat_rate)?;
        Ok(Some(profile))
    }

    /// Insert or overwrite a workout record
    pub fn save_workout(&self, record: &WorkoutRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO workouts (id, athlete_id, started_at, record) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.workout_id,
                record.athlete_id,
                timestamp(record.started_at),
                json,
            ],
        )?;
        Ok(())
    }

    /// Workouts of one athlete, oldest first
    pub fn get_workouts(&self, athlete_id: &str) -> Result<Vec<WorkoutRecord>> {
        self.query_workouts(
            "SELECT record FROM workouts WHERE athlete_id = ?1 ORDER BY started_at ASC",
            params![athlete_id],
        )
    }

    /// Every stored workout, oldest first
    pub fn all_workouts(&self) -> Result<Vec<WorkoutRecord>> {
        self.query_workouts("SELECT record FROM workouts ORDER BY started_at ASC", [])
    }

    /// Attach what the athlete actually drank to a stored workout
    pub fn record_outcome(&self, workout_id: &str, outcome: HydrationOutcome) -> Result<WorkoutRecord> {
        outcome.validate()?;
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT record FROM workouts WHERE id = ?1",
                params![workout_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            bail!("workout {} not found", workout_id);
        };

        let record: WorkoutRecord = serde_json::from_str(&json)
            .with_context(|| format!("corrupt workout record {}", workout_id))?;
        let updated = record.with_outcome(outcome);
        self.save_workout(&updated)?;
        Ok(updated)
    }

    /// Workouts started within the given window, oldest first
    pub fn workouts_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<WorkoutRecord>> {
        self.query_workouts(
            "SELECT record FROM workouts WHERE started_at >= ?1 AND started_at < ?2 ORDER BY started_at ASC",
            params![timestamp(from), timestamp(to)],
        )
    }

    fn query_workouts(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<WorkoutRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|json| serde_json::from_str(json).context("corrupt workout record"))
            .collect()
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn storage_error(err: anyhow::Error) -> HydrationError {
    HydrationError::Storage(format!("{:#}", err))
}

impl AthleteRegistry for Database {
    fn lookup(&self, athlete_id: &str) -> crate::error::Result<Option<AthleteProfile>> {
        self.get_athlete(athlete_id).map_err(storage_error)
    }
}

impl HistoryStore for Database {
    fn fetch_history(&self, athlete_id: &str) -> crate::error::Result<Vec<WorkoutRecord>> {
        self.get_workouts(athlete_id).map_err(storage_error)
    }
}
