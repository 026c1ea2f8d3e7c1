pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod sources;
pub mod types;
