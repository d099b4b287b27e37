use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::{FromSqliteRow, Set};

pub const MAX_WORKOUT_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromSqliteRow for Workout {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// List entry with child counts.
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutSummary {
    pub id: String,
    pub name: String,
    pub exercise_count: i64,
    pub set_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromSqliteRow for WorkoutSummary {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            exercise_count: row.get("exercise_count")?,
            set_count: row.get("set_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutExercise {
    pub id: String,
    pub workout_id: String,
    pub exercise_id: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl FromSqliteRow for WorkoutExercise {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            workout_id: row.get("workout_id")?,
            exercise_id: row.get("exercise_id")?,
            position: row.get("position")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkoutExerciseDetail {
    pub id: String,
    pub exercise_id: String,
    pub exercise_name: String,
    pub category: String,
    pub body_part: String,
    pub position: i32,
    pub sets: Vec<Set>,
}

impl FromSqliteRow for WorkoutExerciseDetail {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            exercise_id: row.get("exercise_id")?,
            exercise_name: row.get("exercise_name")?,
            category: row.get("category")?,
            body_part: row.get("body_part")?,
            position: row.get("position")?,
            sets: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkoutDetail {
    #[serde(flatten)]
    pub workout: Workout,
    pub exercises: Vec<WorkoutExerciseDetail>,
}

#[derive(Debug, Deserialize)]
pub struct WorkoutInput {
    pub name: String,
}

impl WorkoutInput {
    pub fn normalized_name(&self) -> Result<String, String> {
        validate_workout_name(&self.name)
    }
}

pub fn validate_workout_name(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Workout name is required".to_string());
    }
    if name.chars().count() > MAX_WORKOUT_NAME_LEN {
        return Err(format!(
            "Workout name must be at most {} characters",
            MAX_WORKOUT_NAME_LEN
        ));
    }
    Ok(name.to_string())
}

#[derive(Debug, Deserialize)]
pub struct AttachExercises {
    pub exercise_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceExercise {
    pub exercise_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderExercises {
    pub workout_exercise_ids: Vec<String>,
}
