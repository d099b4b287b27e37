pub mod ai;
pub mod auth;
pub mod exercises;
pub mod health;
pub mod history;
pub mod payments;
pub mod sets;
pub mod uploads;
pub mod users;
pub mod workouts;
