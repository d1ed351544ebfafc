pub mod api;
pub mod config;
pub mod error;
pub mod estimation;
pub mod route;
pub mod service;
pub mod signal;
pub mod state;
pub mod upstream;
