pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod progress;
pub mod quiz;
pub mod routes;
pub mod state;
pub mod store;
