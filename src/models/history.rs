use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::Serialize;

use super::{FromSqliteRow, SetType};

/// One completed set, frozen at the time the workout was completed.
#[derive(Debug, Clone, Serialize)]
pub struct SetHistory {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub workout_id: String,
    pub workout_name: String,
    pub exercise_id: String,
    pub exercise_name: String,
    pub set_number: i32,
    pub reps: i32,
    pub weight: f64,
    pub set_type: SetType,
    pub performed_at: DateTime<Utc>,
}

impl FromSqliteRow for SetHistory {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let set_type: String = row.get("set_type")?;
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            session_id: row.get("session_id")?,
            workout_id: row.get("workout_id")?,
            workout_name: row.get("workout_name")?,
            exercise_id: row.get("exercise_id")?,
            exercise_name: row.get("exercise_name")?,
            set_number: row.get("set_number")?,
            reps: row.get("reps")?,
            weight: row.get("weight")?,
            set_type: SetType::parse(&set_type),
            performed_at: row.get("performed_at")?,
        })
    }
}

/// Aggregate row for one completed workout session.
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutHistoryEntry {
    pub session_id: String,
    pub workout_id: String,
    pub workout_name: String,
    pub performed_at: DateTime<Utc>,
    pub exercise_count: i64,
    pub set_count: i64,
    pub total_reps: i64,
    pub total_volume: f64,
}

impl FromSqliteRow for WorkoutHistoryEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get("session_id")?,
            workout_id: row.get("workout_id")?,
            workout_name: row.get("workout_name")?,
            performed_at: row.get("performed_at")?,
            exercise_count: row.get("exercise_count")?,
            set_count: row.get("set_count")?,
            total_reps: row.get("total_reps")?,
            total_volume: row.get("total_volume")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExerciseProgress {
    pub exercise_id: String,
    pub exercise_name: Option<String>,
    pub max_weight: Option<f64>,
    pub best_estimated_one_rep_max: Option<f64>,
    pub total_volume: f64,
    pub entries: Vec<SetHistory>,
}

impl ExerciseProgress {
    pub fn from_entries(exercise_id: &str, entries: Vec<SetHistory>) -> Self {
        let working: Vec<&SetHistory> = entries
            .iter()
            .filter(|e| e.set_type.counts_toward_stats() && e.reps > 0)
            .collect();

        let max_weight = working.iter().map(|e| e.weight).reduce(f64::max);
        let best_estimated_one_rep_max = working
            .iter()
            .map(|e| estimated_one_rep_max(e.weight, e.reps))
            .reduce(f64::max);
        let total_volume = working.iter().map(|e| e.weight * f64::from(e.reps)).sum();

        Self {
            exercise_id: exercise_id.to_string(),
            exercise_name: entries.first().map(|e| e.exercise_name.clone()),
            max_weight,
            best_estimated_one_rep_max,
            total_volume,
            entries,
        }
    }
}

/// Epley estimate. A single rep is the lift itself.
pub fn estimated_one_rep_max(weight: f64, reps: i32) -> f64 {
    match reps {
        r if r <= 0 => 0.0,
        1 => weight,
        r => weight * (1.0 + f64::from(r) / 30.0),
    }
}
