pub mod api;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod provider;
pub mod yahoo;
