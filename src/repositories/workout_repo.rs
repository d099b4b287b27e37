use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{with_conn, DbPool};
use crate::error::{AppError, Result};
use crate::models::{
    FromSqliteRow, ReplaceSet, Set, Workout, WorkoutDetail, WorkoutExercise,
    WorkoutExerciseDetail, WorkoutSummary,
};

#[derive(Clone)]
pub struct WorkoutRepository {
    pool: DbPool,
}

impl WorkoutRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    // Workouts
    pub async fn create(&self, user_id: &str, name: &str) -> Result<Workout> {
        let now = Utc::now();
        let workout = Workout {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        let workout_clone = workout.clone();

        // A still-valid access token can outlive its account.
        with_conn(&self.pool, move |conn| {
            let rows = conn.execute(
                "INSERT INTO workouts (id, user_id, name, created_at, updated_at)
                 SELECT ?1, ?2, ?3, ?4, ?5 WHERE EXISTS (SELECT 1 FROM users WHERE id = ?2)",
                rusqlite::params![
                    workout_clone.id,
                    workout_clone.user_id,
                    workout_clone.name,
                    workout_clone.created_at,
                    workout_clone.updated_at
                ],
            )?;
            if rows == 0 {
                return Err(AppError::Unauthorized);
            }
            Ok(())
        })
        .await?;

        Ok(workout)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Workout>> {
        let id = id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM workouts WHERE id = ?")?;
            let result = stmt.query_row([&id], Workout::from_row).optional()?;
            Ok(result)
        })
        .await
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<WorkoutSummary>> {
        let user_id = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT w.id, w.name, w.created_at, w.updated_at,
                        (SELECT COUNT(*) FROM workout_exercises we
                          WHERE we.workout_id = w.id) AS exercise_count,
                        (SELECT COUNT(*) FROM sets s
                          JOIN workout_exercises we ON we.id = s.workout_exercise_id
                          WHERE we.workout_id = w.id) AS set_count
                 FROM workouts w
                 WHERE w.user_id = ?
                 ORDER BY w.updated_at DESC, w.id",
            )?;
            let workouts = WorkoutSummary::query_all(&mut stmt, rusqlite::params![user_id])?;
            Ok(workouts)
        })
        .await
    }

    /// Workout with its exercises (by position) and their sets (by set number).
    pub async fn find_detail(&self, id: &str) -> Result<Option<WorkoutDetail>> {
        let id = id.to_string();
        with_conn(&self.pool, move |conn| load_detail(conn, &id)).await
    }

    pub async fn rename(&self, id: &str, user_id: &str, name: &str) -> Result<bool> {
        let id = id.to_string();
        let user_id = user_id.to_string();
        let name = name.to_string();
        with_conn(&self.pool, move |conn| {
            let rows = conn.execute(
                "UPDATE workouts SET name = ?, updated_at = ? WHERE id = ? AND user_id = ?",
                rusqlite::params![name, Utc::now(), id, user_id],
            )?;
            Ok(rows > 0)
        })
        .await
    }

    /// Delete sets, workout exercises and the workout in one transaction.
    pub async fn delete_cascade(&self, id: &str, user_id: &str) -> Result<bool> {
        let id = id.to_string();
        let user_id = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;

            let owned: bool = tx.query_row(
                "SELECT COUNT(*) > 0 FROM workouts WHERE id = ? AND user_id = ?",
                [&id, &user_id],
                |row| row.get(0),
            )?;
            if !owned {
                return Ok(false);
            }

            delete_sets_of_workout(&tx, &id)?;
            tx.execute("DELETE FROM workout_exercises WHERE workout_id = ?", [&id])?;
            tx.execute("DELETE FROM workouts WHERE id = ?", [&id])?;

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    /// Remove every set of the workout. Returns the number removed.
    pub async fn delete_all_sets(&self, workout_id: &str) -> Result<usize> {
        let workout_id = workout_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            let removed = delete_sets_of_workout(&tx, &workout_id)?;
            touch(&tx, &workout_id)?;
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    /// Remove every exercise of the workout, sets included.
    pub async fn delete_all_exercises(&self, workout_id: &str) -> Result<usize> {
        let workout_id = workout_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            delete_sets_of_workout(&tx, &workout_id)?;
            let removed = tx.execute(
                "DELETE FROM workout_exercises WHERE workout_id = ?",
                [&workout_id],
            )?;
            touch(&tx, &workout_id)?;
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    // Workout exercises
    pub async fn find_workout_exercise(
        &self,
        id: &str,
        workout_id: &str,
    ) -> Result<Option<WorkoutExercise>> {
        let id = id.to_string();
        let workout_id = workout_id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM workout_exercises WHERE id = ? AND workout_id = ?")?;
            let result = stmt
                .query_row([&id, &workout_id], WorkoutExercise::from_row)
                .optional()?;
            Ok(result)
        })
        .await
    }

    /// Append exercises after the current last position, in the given order.
    pub async fn attach_exercises(
        &self,
        workout_id: &str,
        exercise_ids: Vec<String>,
    ) -> Result<Vec<WorkoutExercise>> {
        let workout_id = workout_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;

            let next: i32 = tx.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM workout_exercises WHERE workout_id = ?",
                [&workout_id],
                |row| row.get(0),
            )?;

            let now = Utc::now();
            let mut attached = Vec::with_capacity(exercise_ids.len());
            for (offset, exercise_id) in exercise_ids.into_iter().enumerate() {
                let workout_exercise = WorkoutExercise {
                    id: Uuid::new_v4().to_string(),
                    workout_id: workout_id.clone(),
                    exercise_id,
                    position: next + offset as i32,
                    created_at: now,
                };
                tx.execute(
                    "INSERT INTO workout_exercises (id, workout_id, exercise_id, position, created_at)
                     VALUES (?, ?, ?, ?, ?)",
                    rusqlite::params![
                        workout_exercise.id,
                        workout_exercise.workout_id,
                        workout_exercise.exercise_id,
                        workout_exercise.position,
                        workout_exercise.created_at
                    ],
                )?;
                attached.push(workout_exercise);
            }

            touch(&tx, &workout_id)?;
            tx.commit()?;
            Ok(attached)
        })
        .await
    }

    /// Point a workout exercise at a different exercise, keeping its position.
    /// Sets logged against the old exercise no longer apply and are dropped.
    pub async fn replace_exercise(
        &self,
        id: &str,
        workout_id: &str,
        exercise_id: &str,
    ) -> Result<bool> {
        let id = id.to_string();
        let workout_id = workout_id.to_string();
        let exercise_id = exercise_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;

            let rows = tx.execute(
                "UPDATE workout_exercises SET exercise_id = ? WHERE id = ? AND workout_id = ?",
                rusqlite::params![exercise_id, id, workout_id],
            )?;
            if rows == 0 {
                return Ok(false);
            }
            tx.execute("DELETE FROM sets WHERE workout_exercise_id = ?", [&id])?;
            touch(&tx, &workout_id)?;

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    /// `ordered_ids` must be a permutation of the workout's exercise ids.
    pub async fn reorder_exercises(&self, workout_id: &str, ordered_ids: Vec<String>) -> Result<()> {
        let workout_id = workout_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;

            let current: HashSet<String> = {
                let mut stmt =
                    tx.prepare("SELECT id FROM workout_exercises WHERE workout_id = ?")?;
                let ids = stmt
                    .query_map([&workout_id], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<HashSet<_>>>()?;
                ids
            };
            let requested: HashSet<String> = ordered_ids.iter().cloned().collect();
            if requested.len() != ordered_ids.len() || requested != current {
                return Err(AppError::Validation(
                    "Order must list every exercise of the workout exactly once".to_string(),
                ));
            }

            for (position, id) in ordered_ids.iter().enumerate() {
                tx.execute(
                    "UPDATE workout_exercises SET position = ? WHERE id = ?",
                    rusqlite::params![position as i32, id],
                )?;
            }
            touch(&tx, &workout_id)?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Remove one workout exercise with its sets and close the position gap.
    pub async fn remove_exercise(&self, id: &str, workout_id: &str) -> Result<bool> {
        let id = id.to_string();
        let workout_id = workout_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "DELETE FROM sets WHERE workout_exercise_id IN (
                    SELECT id FROM workout_exercises WHERE id = ? AND workout_id = ?
                 )",
                [&id, &workout_id],
            )?;
            let rows = tx.execute(
                "DELETE FROM workout_exercises WHERE id = ? AND workout_id = ?",
                [&id, &workout_id],
            )?;
            if rows == 0 {
                return Ok(false);
            }
            compact_positions(&tx, &workout_id)?;
            touch(&tx, &workout_id)?;

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    // Sets
    pub async fn add_set(
        &self,
        workout_id: &str,
        workout_exercise_id: &str,
        input: ReplaceSet,
    ) -> Result<Set> {
        let workout_id = workout_id.to_string();
        let workout_exercise_id = workout_exercise_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;

            let set_number: i32 = tx.query_row(
                "SELECT COALESCE(MAX(set_number), 0) + 1 FROM sets WHERE workout_exercise_id = ?",
                [&workout_exercise_id],
                |row| row.get(0),
            )?;
            let set = Set {
                id: Uuid::new_v4().to_string(),
                workout_exercise_id,
                set_number,
                reps: input.reps,
                weight: input.weight,
                set_type: input.set_type,
                completed: input.completed,
                created_at: Utc::now(),
            };
            tx.execute(
                "INSERT INTO sets (id, workout_exercise_id, set_number, reps, weight, set_type, completed, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    set.id,
                    set.workout_exercise_id,
                    set.set_number,
                    set.reps,
                    set.weight,
                    set.set_type.as_str(),
                    set.completed,
                    set.created_at
                ],
            )?;
            touch(&tx, &workout_id)?;

            tx.commit()?;
            Ok(set)
        })
        .await
    }

    /// A set, provided it belongs to the given workout.
    pub async fn find_set(&self, id: &str, workout_id: &str) -> Result<Option<Set>> {
        let id = id.to_string();
        let workout_id = workout_id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.* FROM sets s
                 JOIN workout_exercises we ON we.id = s.workout_exercise_id
                 WHERE s.id = ? AND we.workout_id = ?",
            )?;
            let result = stmt.query_row([&id, &workout_id], Set::from_row).optional()?;
            Ok(result)
        })
        .await
    }

    pub async fn replace_set(&self, id: &str, workout_id: &str, input: ReplaceSet) -> Result<bool> {
        let id = id.to_string();
        let workout_id = workout_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            let rows = tx.execute(
                "UPDATE sets SET reps = ?, weight = ?, set_type = ?, completed = ?
                 WHERE id = ? AND workout_exercise_id IN (
                    SELECT id FROM workout_exercises WHERE workout_id = ?
                 )",
                rusqlite::params![
                    input.reps,
                    input.weight,
                    input.set_type.as_str(),
                    input.completed,
                    id,
                    workout_id
                ],
            )?;
            if rows > 0 {
                touch(&tx, &workout_id)?;
            }
            tx.commit()?;
            Ok(rows > 0)
        })
        .await
    }

    /// Delete a set and renumber the later sets of the same exercise.
    pub async fn delete_set(&self, id: &str, workout_id: &str) -> Result<bool> {
        let id = id.to_string();
        let workout_id = workout_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;

            let target: Option<(String, i32)> = tx
                .query_row(
                    "SELECT s.workout_exercise_id, s.set_number FROM sets s
                     JOIN workout_exercises we ON we.id = s.workout_exercise_id
                     WHERE s.id = ? AND we.workout_id = ?",
                    [&id, &workout_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((workout_exercise_id, set_number)) = target else {
                return Ok(false);
            };

            tx.execute("DELETE FROM sets WHERE id = ?", [&id])?;
            tx.execute(
                "UPDATE sets SET set_number = set_number - 1
                 WHERE workout_exercise_id = ? AND set_number > ?",
                rusqlite::params![workout_exercise_id, set_number],
            )?;
            touch(&tx, &workout_id)?;

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    /// Create a workout with its exercises and planned sets in one step.
    pub async fn create_with_plan(
        &self,
        user_id: &str,
        name: &str,
        plan: Vec<(String, Vec<ReplaceSet>)>,
    ) -> Result<WorkoutDetail> {
        let user_id = user_id.to_string();
        let name = name.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            let now = Utc::now();
            let workout_id = Uuid::new_v4().to_string();

            tx.execute(
                "INSERT INTO workouts (id, user_id, name, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)",
                rusqlite::params![workout_id, user_id, name, now, now],
            )?;

            for (position, (exercise_id, sets)) in plan.into_iter().enumerate() {
                let workout_exercise_id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO workout_exercises (id, workout_id, exercise_id, position, created_at)
                     VALUES (?, ?, ?, ?, ?)",
                    rusqlite::params![
                        workout_exercise_id,
                        workout_id,
                        exercise_id,
                        position as i32,
                        now
                    ],
                )?;
                for (index, set) in sets.into_iter().enumerate() {
                    tx.execute(
                        "INSERT INTO sets (id, workout_exercise_id, set_number, reps, weight, set_type, completed, created_at)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                        rusqlite::params![
                            Uuid::new_v4().to_string(),
                            workout_exercise_id,
                            index as i32 + 1,
                            set.reps,
                            set.weight,
                            set.set_type.as_str(),
                            set.completed,
                            now
                        ],
                    )?;
                }
            }

            let detail = load_detail(&tx, &workout_id)?
                .ok_or_else(|| AppError::Internal("Created workout vanished".to_string()))?;
            tx.commit()?;
            Ok(detail)
        })
        .await
    }
}

pub(crate) fn load_detail(conn: &Connection, id: &str) -> Result<Option<WorkoutDetail>> {
    let workout = conn
        .query_row("SELECT * FROM workouts WHERE id = ?", [id], Workout::from_row)
        .optional()?;
    let Some(workout) = workout else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT we.id, we.exercise_id, we.position,
                e.name AS exercise_name, e.category, e.body_part
         FROM workout_exercises we
         JOIN exercises e ON e.id = we.exercise_id
         WHERE we.workout_id = ?
         ORDER BY we.position, we.created_at",
    )?;
    let mut exercises = WorkoutExerciseDetail::query_all(&mut stmt, rusqlite::params![id])?;

    let mut stmt = conn.prepare(
        "SELECT s.* FROM sets s
         JOIN workout_exercises we ON we.id = s.workout_exercise_id
         WHERE we.workout_id = ?
         ORDER BY s.set_number",
    )?;
    let sets = Set::query_all(&mut stmt, rusqlite::params![id])?;

    let mut by_exercise: HashMap<String, Vec<Set>> = HashMap::new();
    for set in sets {
        by_exercise
            .entry(set.workout_exercise_id.clone())
            .or_default()
            .push(set);
    }
    for exercise in &mut exercises {
        exercise.sets = by_exercise.remove(&exercise.id).unwrap_or_default();
    }

    Ok(Some(WorkoutDetail { workout, exercises }))
}

/// Renumber positions 0..n in current order.
pub(crate) fn compact_positions(conn: &Connection, workout_id: &str) -> rusqlite::Result<()> {
    let ids = {
        let mut stmt = conn.prepare(
            "SELECT id FROM workout_exercises WHERE workout_id = ? ORDER BY position, created_at",
        )?;
        let ids = stmt
            .query_map([workout_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids
    };
    for (position, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE workout_exercises SET position = ? WHERE id = ?",
            rusqlite::params![position as i32, id],
        )?;
    }
    Ok(())
}

fn delete_sets_of_workout(conn: &Connection, workout_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sets WHERE workout_exercise_id IN (
            SELECT id FROM workout_exercises WHERE workout_id = ?
         )",
        [workout_id],
    )
}

fn touch(conn: &Connection, workout_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE workouts SET updated_at = ? WHERE id = ?",
        rusqlite::params![Utc::now(), workout_id],
    )?;
    Ok(())
}
