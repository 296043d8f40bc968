// Library exports for CampusPool
// The binary and the integration tests both build on these modules.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod scoring;
pub mod state;
pub mod views;
