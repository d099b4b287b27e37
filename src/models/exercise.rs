use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::FromSqliteRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub category: String,
    pub body_part: String,
    pub instructions: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromSqliteRow for Exercise {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            category: row.get("category")?,
            body_part: row.get("body_part")?,
            instructions: row.get("instructions")?,
            user_id: row.get("user_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl Exercise {
    pub fn is_builtin(&self) -> bool {
        self.user_id.is_none()
    }
}

/// Body of both create and full-replace requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ExerciseInput {
    pub name: String,
    pub category: String,
    pub body_part: String,
    pub instructions: Option<String>,
}

impl ExerciseInput {
    /// Trim fields and reject unknown categories or body parts.
    pub fn normalized(self) -> Result<Self, String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("Exercise name is required".to_string());
        }
        if name.chars().count() > 100 {
            return Err("Exercise name must be at most 100 characters".to_string());
        }

        let category = self.category.trim().to_lowercase();
        if !is_known(CATEGORIES, &category) {
            return Err(format!("Unknown category: {}", category));
        }

        let body_part = self.body_part.trim().to_lowercase();
        if !is_known(BODY_PARTS, &body_part) {
            return Err(format!("Unknown body part: {}", body_part));
        }

        let instructions = self
            .instructions
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            name,
            category,
            body_part,
            instructions,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExerciseFilter {
    pub category: Option<String>,
    pub body_part: Option<String>,
    pub search: Option<String>,
}

impl ExerciseFilter {
    /// Empty query-string values mean "no filter".
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        }

        Self {
            category: clean(self.category).map(|s| s.to_lowercase()),
            body_part: clean(self.body_part).map(|s| s.to_lowercase()),
            search: clean(self.search),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExerciseCategory {
    pub name: &'static str,
    pub display_name: &'static str,
}

pub const CATEGORIES: &[ExerciseCategory] = &[
    ExerciseCategory { name: "barbell", display_name: "Barbell" },
    ExerciseCategory { name: "dumbbell", display_name: "Dumbbell" },
    ExerciseCategory { name: "machine", display_name: "Machine" },
    ExerciseCategory { name: "cable", display_name: "Cable" },
    ExerciseCategory { name: "bodyweight", display_name: "Bodyweight" },
    ExerciseCategory { name: "cardio", display_name: "Cardio" },
    ExerciseCategory { name: "other", display_name: "Other" },
];

pub const BODY_PARTS: &[ExerciseCategory] = &[
    ExerciseCategory { name: "chest", display_name: "Chest" },
    ExerciseCategory { name: "back", display_name: "Back" },
    ExerciseCategory { name: "legs", display_name: "Legs" },
    ExerciseCategory { name: "shoulders", display_name: "Shoulders" },
    ExerciseCategory { name: "arms", display_name: "Arms" },
    ExerciseCategory { name: "core", display_name: "Core" },
    ExerciseCategory { name: "full_body", display_name: "Full Body" },
    ExerciseCategory { name: "other", display_name: "Other" },
];

fn is_known(list: &[ExerciseCategory], name: &str) -> bool {
    list.iter().any(|c| c.name == name)
}
