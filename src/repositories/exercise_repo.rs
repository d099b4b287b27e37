use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::db::{with_conn, DbPool};
use crate::error::Result;
use crate::models::{Exercise, ExerciseFilter, ExerciseInput, FromSqliteRow};

#[derive(Clone)]
pub struct ExerciseRepository {
    pool: DbPool,
}

impl ExerciseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Exercise>> {
        let id = id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM exercises WHERE id = ?")?;
            let result = stmt.query_row([&id], Exercise::from_row).optional()?;
            Ok(result)
        })
        .await
    }

    /// An exercise the user may use: built-in or their own.
    pub async fn find_visible(&self, id: &str, user_id: &str) -> Result<Option<Exercise>> {
        let id = id.to_string();
        let user_id = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM exercises WHERE id = ? AND (user_id IS NULL OR user_id = ?)",
            )?;
            let result = stmt
                .query_row([&id, &user_id], Exercise::from_row)
                .optional()?;
            Ok(result)
        })
        .await
    }

    pub async fn find_available_for_user(
        &self,
        user_id: &str,
        filter: ExerciseFilter,
    ) -> Result<Vec<Exercise>> {
        let user_id = user_id.to_string();
        let filter = filter.normalized();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM exercises
                 WHERE (user_id IS NULL OR user_id = ?1)
                   AND (?2 IS NULL OR category = ?2)
                   AND (?3 IS NULL OR body_part = ?3)
                   AND (?4 IS NULL OR instr(lower(name), lower(?4)) > 0)
                 ORDER BY name COLLATE NOCASE, id",
            )?;
            let exercises = Exercise::query_all(
                &mut stmt,
                rusqlite::params![user_id, filter.category, filter.body_part, filter.search],
            )?;
            Ok(exercises)
        })
        .await
    }

    pub async fn create(&self, user_id: &str, input: ExerciseInput) -> Result<Exercise> {
        let exercise = Exercise {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            category: input.category,
            body_part: input.body_part,
            instructions: input.instructions,
            user_id: Some(user_id.to_string()),
            created_at: Utc::now(),
        };
        let exercise_clone = exercise.clone();

        with_conn(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO exercises (id, name, category, body_part, instructions, user_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    exercise_clone.id,
                    exercise_clone.name,
                    exercise_clone.category,
                    exercise_clone.body_part,
                    exercise_clone.instructions,
                    exercise_clone.user_id,
                    exercise_clone.created_at
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(exercise)
    }

    /// Full replace of a custom exercise. Built-ins are never editable.
    pub async fn update(&self, id: &str, user_id: &str, input: ExerciseInput) -> Result<bool> {
        match self.find_by_id(id).await? {
            Some(e) if !e.is_builtin() => {}
            _ => return Ok(false),
        }

        let id = id.to_string();
        let user_id = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            let rows = conn.execute(
                "UPDATE exercises SET name = ?, category = ?, body_part = ?, instructions = ?
                 WHERE id = ? AND user_id = ?",
                rusqlite::params![
                    input.name,
                    input.category,
                    input.body_part,
                    input.instructions,
                    id,
                    user_id
                ],
            )?;
            Ok(rows > 0)
        })
        .await
    }

    /// Delete a custom exercise together with every workout entry using it.
    pub async fn delete(&self, id: &str, user_id: &str) -> Result<bool> {
        let id = id.to_string();
        let user_id = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;

            let owned: bool = tx.query_row(
                "SELECT COUNT(*) > 0 FROM exercises WHERE id = ? AND user_id = ?",
                [&id, &user_id],
                |row| row.get(0),
            )?;
            if !owned {
                return Ok(false);
            }

            tx.execute(
                "DELETE FROM sets WHERE workout_exercise_id IN (
                    SELECT id FROM workout_exercises WHERE exercise_id = ?
                 )",
                [&id],
            )?;
            let removed = {
                let mut stmt = tx.prepare(
                    "DELETE FROM workout_exercises WHERE exercise_id = ? RETURNING workout_id",
                )?;
                let workout_ids = stmt
                    .query_map([&id], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                workout_ids
            };
            for workout_id in &removed {
                super::workout_repo::compact_positions(&tx, workout_id)?;
            }
            tx.execute("DELETE FROM exercises WHERE id = ?", [&id])?;

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    /// `(id, name)` of every exercise visible to the user.
    pub async fn library_for_user(&self, user_id: &str) -> Result<Vec<(String, String)>> {
        let exercises = self
            .find_available_for_user(user_id, ExerciseFilter::default())
            .await?;
        Ok(exercises.into_iter().map(|e| (e.id, e.name)).collect())
    }
}
