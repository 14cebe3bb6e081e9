// Public API - session engine, data types and export functions
pub mod config;
pub mod export;
pub mod state;
pub mod trace;
