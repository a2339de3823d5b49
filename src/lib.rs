pub mod config;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod services;
pub mod sources;
pub mod streaming;
pub mod utils;
