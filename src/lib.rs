pub mod cli;
pub mod complexity;
pub mod config;
pub mod coverage;
pub mod db;
pub mod error;
pub mod ingest;
pub mod model;
pub mod report;
pub mod session;
