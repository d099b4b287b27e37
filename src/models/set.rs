use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::FromSqliteRow;

pub const MAX_REPS: i32 = 1000;
pub const MAX_WEIGHT: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetType {
    #[default]
    Default,
    Warmup,
    Drop,
    Failure,
}

impl SetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetType::Default => "default",
            SetType::Warmup => "warmup",
            SetType::Drop => "drop",
            SetType::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "warmup" => SetType::Warmup,
            "drop" => SetType::Drop,
            "failure" => SetType::Failure,
            _ => SetType::Default,
        }
    }

    /// Warmups do not count toward volume or records.
    pub fn counts_toward_stats(&self) -> bool {
        !matches!(self, SetType::Warmup)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Set {
    pub id: String,
    pub workout_exercise_id: String,
    pub set_number: i32,
    pub reps: i32,
    pub weight: f64,
    pub set_type: SetType,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl FromSqliteRow for Set {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let set_type: String = row.get("set_type")?;
        Ok(Self {
            id: row.get("id")?,
            workout_exercise_id: row.get("workout_exercise_id")?,
            set_number: row.get("set_number")?,
            reps: row.get("reps")?,
            weight: row.get("weight")?,
            set_type: SetType::parse(&set_type),
            completed: row.get("completed")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSet {
    pub reps: i32,
    pub weight: f64,
    #[serde(default)]
    pub set_type: SetType,
    #[serde(default)]
    pub completed: bool,
}

/// Full-row replacement; every mutable column must be sent.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceSet {
    pub reps: i32,
    pub weight: f64,
    pub set_type: SetType,
    pub completed: bool,
}

impl From<CreateSet> for ReplaceSet {
    fn from(input: CreateSet) -> Self {
        Self {
            reps: input.reps,
            weight: input.weight,
            set_type: input.set_type,
            completed: input.completed,
        }
    }
}

impl ReplaceSet {
    pub fn validate(&self) -> Result<(), String> {
        if !(0..=MAX_REPS).contains(&self.reps) {
            return Err(format!("Reps must be between 0 and {}", MAX_REPS));
        }
        if !self.weight.is_finite() || !(0.0..=MAX_WEIGHT).contains(&self.weight) {
            return Err(format!("Weight must be between 0 and {}", MAX_WEIGHT));
        }
        Ok(())
    }
}
