// Core domain for civicfeed: bills, engagement records, ranking, config and
// the SQLite-backed repository.

pub mod config;
pub mod db;
pub mod model;
pub mod repository;
pub mod scoring;
pub mod status;
