pub mod config;
pub mod db;
pub mod errors;
pub mod ingestion;
pub mod models;
pub mod symbols;
pub mod venues;
