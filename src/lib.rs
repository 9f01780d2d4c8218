pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod rules;
pub mod sources;
pub mod storage;
pub mod utils;
