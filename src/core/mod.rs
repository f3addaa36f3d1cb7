pub mod config;
pub mod formatter;
pub mod models;
pub mod usage;
