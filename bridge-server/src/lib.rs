// Library interface for mt5-bridge-server
// Exposes modules for integration testing

pub mod adapters;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod domain;
pub mod history;
pub mod instances;
pub mod log_buffer;
pub mod logging;
pub mod models;
pub mod ports;
pub mod services;
