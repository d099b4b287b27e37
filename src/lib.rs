pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod session;
pub mod version;
