pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod fes;
pub mod services;
pub mod wfs;
