//! Session manager - live tracking of one athlete's workout
//!
//! A session is opened with an initial observation, receives incremental
//! updates while the workout runs, and is closed with the final observation.
//! Each transition checks only the new observation against the last accepted
//! one, then derives features from the sequence and stores a fresh
//! recommendation.
//!
//! Calls against the same session are serialized by a per-session mutex. The
//! latest recommendation is published as an immutable `Arc` snapshot, so
//! readers never wait on an in-flight update.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{HydrationError, Result};
use crate::ml::{FittedModel, HydrationEngine, HydrationModel};
use crate::models::{
    AthleteProfile, EnvironmentalData, Recommendation, WorkoutMetrics, WorkoutRecord,
};
use crate::store::{AthleteRegistry, HistoryStore};

/// Opaque session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    /// Terminal
    Closed,
}

/// Mutations a session can receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Update,
    End,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Update => "update",
            SessionEvent::End => "end",
        }
    }
}

impl SessionState {
    /// State after `event`, or `InvalidSessionState` if the transition does not exist
    pub fn transition(self, id: SessionId, event: SessionEvent) -> Result<SessionState> {
        match (self, event) {
            (SessionState::Open, SessionEvent::Update) => Ok(SessionState::Open),
            (SessionState::Open, SessionEvent::End) => Ok(SessionState::Closed),
            (SessionState::Closed, event) => Err(HydrationError::InvalidSessionState {
                id,
                state: self,
                operation: event.name(),
            }),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Open => write!(f, "open"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug)]
struct Session {
    athlete_id: String,
    profile: AthleteProfile,
    state: SessionState,
    observations: Vec<WorkoutMetrics>,
    environment: Option<EnvironmentalData>,
    history: Vec<WorkoutRecord>,
    started_at: DateTime<Utc>,
}

struct SessionSlot {
    session: Mutex<Session>,
    latest: RwLock<Arc<Recommendation>>,
}

impl SessionSlot {
    fn latest(&self) -> Arc<Recommendation> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, recommendation: Recommendation) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(recommendation);
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub id: SessionId,
    pub athlete_id: String,
    pub state: SessionState,
    pub observation_count: usize,
    pub started_at: DateTime<Utc>,
    pub latest: Arc<Recommendation>,
}

pub struct SessionManager<M = FittedModel> {
    engine: Arc<HydrationEngine<M>>,
    registry: Arc<dyn AthleteRegistry>,
    history: Arc<dyn HistoryStore>,
    sessions: RwLock<HashMap<SessionId, Arc<SessionSlot>>>,
}

impl<M: HydrationModel> SessionManager<M> {
    pub fn new(
        engine: Arc<HydrationEngine<M>>,
        registry: Arc<dyn AthleteRegistry>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            engine,
            registry,
            history,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<HydrationEngine<M>> {
        &self.engine
    }

    /// Open a session and issue the first in-workout recommendation
    pub fn start_session(
        &self,
        athlete_id: &str,
        initial_metrics: WorkoutMetrics,
        environment: Option<EnvironmentalData>,
    ) -> Result<SessionId> {
        let profile = self
            .registry
            .lookup(athlete_id)?
            .ok_or_else(|| HydrationError::UnknownAthlete(athlete_id.to_string()))?;
        let history = self.history.fetch_history(athlete_id)?;

        let observations = vec![initial_metrics];
        let recommendation =
            self.recommend(&profile, &observations, environment.as_ref(), &history, true)?;

        let id = SessionId::new();
        let slot = SessionSlot {
            session: Mutex::new(Session {
                athlete_id: athlete_id.to_string(),
                profile,
                state: SessionState::Open,
                observations,
                environment,
                history,
                started_at: Utc::now(),
            }),
            latest: RwLock::new(Arc::new(recommendation)),
        };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(slot));

        info!(session = %id, athlete_id, "Session started");
        Ok(id)
    }

    /// Append an observation and re-recommend
    pub fn update_session(&self, id: SessionId, metrics: WorkoutMetrics) -> Result<Recommendation> {
        let slot = self.slot(id)?;
        let mut session = slot.session.lock().unwrap_or_else(PoisonError::into_inner);
        let next_state = session.state.transition(id, SessionEvent::Update)?;

        let recommendation = self.append(&mut session, metrics, true)?;
        session.state = next_state;
        slot.publish(recommendation.clone());

        debug!(
            session = %id,
            observations = session.observations.len(),
            volume = recommendation.volume_liters,
            "Session updated"
        );
        Ok(recommendation)
    }

    /// Close the session with the final observation
    pub fn end_session(
        &self,
        id: SessionId,
        final_metrics: WorkoutMetrics,
    ) -> Result<(WorkoutRecord, Recommendation)> {
        let slot = self.slot(id)?;
        let mut session = slot.session.lock().unwrap_or_else(PoisonError::into_inner);
        let next_state = session.state.transition(id, SessionEvent::End)?;

        let recommendation = self.append(&mut session, final_metrics, false)?;
        session.state = next_state;
        slot.publish(recommendation.clone());

        let record = WorkoutRecord {
            workout_id: id.to_string(),
            athlete_id: session.athlete_id.clone(),
            started_at: session.started_at,
            ended_at: Utc::now(),
            observations: session.observations.clone(),
            environment: session.environment.clone(),
            recommendation: recommendation.clone(),
            outcome: None,
        };

        info!(
            session = %id,
            athlete_id = %session.athlete_id,
            observations = record.observations.len(),
            volume = recommendation.volume_liters,
            electrolyte = recommendation.electrolyte_level.name(),
            "Session closed"
        );
        Ok((record, recommendation))
    }

    /// Run a workout reported only after it finished through a full session.
    ///
    /// The session opens at minute zero with nothing lost, then closes with
    /// `metrics`, so the record holds two distinct observations. The closed
    /// session is archived before returning.
    pub fn complete_workout(
        &self,
        athlete_id: &str,
        metrics: WorkoutMetrics,
        environment: Option<EnvironmentalData>,
    ) -> Result<(WorkoutRecord, Recommendation)> {
        let id = self.start_session(athlete_id, metrics.starting_point(), environment)?;
        let closed = self.end_session(id, metrics);
        if let Err(e) = &closed {
            debug!(session = %id, error = %e, "Discarding unfinished session");
        }
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        closed
    }

    /// Most recent recommendation; does not wait on updates in progress
    pub fn latest(&self, id: SessionId) -> Result<Arc<Recommendation>> {
        Ok(self.slot(id)?.latest())
    }

    pub fn status(&self, id: SessionId) -> Result<SessionStatus> {
        let slot = self.slot(id)?;
        let session = slot.session.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(SessionStatus {
            id,
            athlete_id: session.athlete_id.clone(),
            state: session.state,
            observation_count: session.observations.len(),
            started_at: session.started_at,
            latest: slot.latest(),
        })
    }

    /// Drop a closed session once its record has been persisted
    pub fn archive(&self, id: SessionId) -> Result<()> {
        let slot = self.slot(id)?;
        let state = slot.session.lock().unwrap_or_else(PoisonError::into_inner).state;
        if state == SessionState::Open {
            return Err(HydrationError::InvalidSessionState {
                id,
                state,
                operation: "archive",
            });
        }
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        debug!(session = %id, "Session archived");
        Ok(())
    }

    pub fn open_sessions(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .values()
            .filter(|slot| {
                slot.session.lock().unwrap_or_else(PoisonError::into_inner).state == SessionState::Open
            })
            .count()
    }

    fn slot(&self, id: SessionId) -> Result<Arc<SessionSlot>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(HydrationError::SessionNotFound(id))
    }

    fn recommend(
        &self,
        profile: &AthleteProfile,
        observations: &[WorkoutMetrics],
        environment: Option<&EnvironmentalData>,
        history: &[WorkoutRecord],
        in_progress: bool,
    ) -> Result<Recommendation> {
        let features = self.engine.extractor().extract_series(
            profile,
            observations,
            environment,
            Some(history),
            in_progress,
        )?;
        Ok(self.engine.recommend(&features))
    }

    /// Push `metrics` and recommend; on error the observation is taken back out
    fn append(&self, session: &mut Session, metrics: WorkoutMetrics, in_progress: bool) -> Result<Recommendation> {
        session.observations.push(metrics);
        let features = self.engine.extractor().extract_appended(
            &session.profile,
            &session.observations,
            session.environment.as_ref(),
            Some(session.history.as_slice()),
            in_progress,
        );
        match features {
            Ok(features) => Ok(self.engine.recommend(&features)),
            Err(e) => {
                session.observations.pop();
                Err(e)
            }
        }
    }
}
