pub mod exercise;
pub mod from_row;
pub mod history;
pub mod set;
pub mod user;
pub mod workout;

pub use exercise::{Exercise, ExerciseFilter, ExerciseInput};
pub use from_row::FromSqliteRow;
pub use history::{ExerciseProgress, SetHistory, WorkoutHistoryEntry};
pub use set::{CreateSet, ReplaceSet, Set, SetType};
pub use user::{LoginCredentials, RegisterUser, User};
pub use workout::{
    AttachExercises, ReorderExercises, ReplaceExercise, Workout, WorkoutDetail, WorkoutExercise,
    WorkoutExerciseDetail, WorkoutInput, WorkoutSummary,
};
