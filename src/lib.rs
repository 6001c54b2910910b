pub mod analyzers;
pub mod config;
pub mod error;
pub mod output;
pub mod parser;
pub mod sources;
pub mod summary;
