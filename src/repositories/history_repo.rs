use chrono::Utc;
use uuid::Uuid;

use crate::db::{with_conn, DbPool};
use crate::error::Result;
use crate::models::{FromSqliteRow, SetHistory, WorkoutHistoryEntry};

const SESSION_AGGREGATE: &str = "
    SELECT session_id, workout_id, workout_name,
           MIN(performed_at) AS performed_at,
           COUNT(DISTINCT exercise_id) AS exercise_count,
           COUNT(*) AS set_count,
           COALESCE(SUM(reps), 0) AS total_reps,
           COALESCE(SUM(CASE WHEN set_type != 'warmup' THEN reps * weight ELSE 0.0 END), 0.0)
               AS total_volume
    FROM set_history";

#[derive(Clone)]
pub struct HistoryRepository {
    pool: DbPool,
}

impl HistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Copy the workout's completed sets into history under a new session and
    /// clear their `completed` flags. `None` when nothing was completed.
    pub async fn record_completion(
        &self,
        workout_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkoutHistoryEntry>> {
        let workout_id = workout_id.to_string();
        let user_id = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            let session_id = Uuid::new_v4().to_string();

            let inserted = {
                let mut stmt = tx.prepare(
                    "SELECT s.id, s.set_number, s.reps, s.weight, s.set_type,
                            we.exercise_id, e.name AS exercise_name, w.name AS workout_name
                     FROM sets s
                     JOIN workout_exercises we ON we.id = s.workout_exercise_id
                     JOIN exercises e ON e.id = we.exercise_id
                     JOIN workouts w ON w.id = we.workout_id
                     WHERE we.workout_id = ? AND w.user_id = ? AND s.completed = 1
                     ORDER BY we.position, s.set_number",
                )?;
                let rows = stmt
                    .query_map([&workout_id, &user_id], |row| {
                        Ok((
                            row.get::<_, i32>("set_number")?,
                            row.get::<_, i32>("reps")?,
                            row.get::<_, f64>("weight")?,
                            row.get::<_, String>("set_type")?,
                            row.get::<_, String>("exercise_id")?,
                            row.get::<_, String>("exercise_name")?,
                            row.get::<_, String>("workout_name")?,
                        ))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                let performed_at = Utc::now();
                for (set_number, reps, weight, set_type, exercise_id, exercise_name, workout_name) in
                    &rows
                {
                    tx.execute(
                        "INSERT INTO set_history (id, user_id, session_id, workout_id, workout_name,
                                                  exercise_id, exercise_name, set_number, reps,
                                                  weight, set_type, performed_at)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                        rusqlite::params![
                            Uuid::new_v4().to_string(),
                            user_id,
                            session_id,
                            workout_id,
                            workout_name,
                            exercise_id,
                            exercise_name,
                            set_number,
                            reps,
                            weight,
                            set_type,
                            performed_at
                        ],
                    )?;
                }
                rows.len()
            };

            if inserted == 0 {
                return Ok(None);
            }

            tx.execute(
                "UPDATE sets SET completed = 0 WHERE workout_exercise_id IN (
                    SELECT id FROM workout_exercises WHERE workout_id = ?
                 )",
                [&workout_id],
            )?;

            let entry = tx.query_row(
                &format!("{} WHERE user_id = ? AND session_id = ? GROUP BY session_id", SESSION_AGGREGATE),
                [&user_id, &session_id],
                WorkoutHistoryEntry::from_row,
            )?;

            tx.commit()?;
            Ok(Some(entry))
        })
        .await
    }

    pub async fn find_sessions_paginated(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkoutHistoryEntry>> {
        let user_id = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE user_id = ? GROUP BY session_id
                 ORDER BY performed_at DESC, session_id
                 LIMIT ? OFFSET ?",
                SESSION_AGGREGATE
            ))?;
            let entries =
                WorkoutHistoryEntry::query_all(&mut stmt, rusqlite::params![user_id, limit, offset])?;
            Ok(entries)
        })
        .await
    }

    pub async fn count_sessions(&self, user_id: &str) -> Result<i64> {
        let user_id = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(DISTINCT session_id) FROM set_history WHERE user_id = ?",
                [&user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    pub async fn find_session(&self, user_id: &str, session_id: &str) -> Result<Vec<SetHistory>> {
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM set_history WHERE user_id = ? AND session_id = ?
                 ORDER BY rowid",
            )?;
            let rows = SetHistory::query_all(&mut stmt, rusqlite::params![user_id, session_id])?;
            Ok(rows)
        })
        .await
    }

    /// Most recent history rows for one exercise.
    pub async fn find_by_exercise(
        &self,
        user_id: &str,
        exercise_id: &str,
        limit: i64,
    ) -> Result<Vec<SetHistory>> {
        let user_id = user_id.to_string();
        let exercise_id = exercise_id.to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM set_history WHERE user_id = ? AND exercise_id = ?
                 ORDER BY performed_at DESC, set_number
                 LIMIT ?",
            )?;
            let rows =
                SetHistory::query_all(&mut stmt, rusqlite::params![user_id, exercise_id, limit])?;
            Ok(rows)
        })
        .await
    }
}
