// Library root: re-exports all modules so integration tests and external
// consumers can access the crate's public API.

pub mod boxscore;
pub mod catalog;
pub mod config;
pub mod db;
pub mod draft;
pub mod idempotency;
pub mod league;
pub mod model;
pub mod periods;
pub mod pricing;
pub mod roster;
pub mod schedule;
pub mod scoring;
pub mod season;
pub mod standings;
