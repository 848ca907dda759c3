//! Visitgate Facility Visitor Check-in Server
//!
//! Tracks visitor check-in and check-out across multi-day visit windows, exposing a
//! REST JSON API for desk kiosks and operators plus an overdue-checkout sweep.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod qr;
pub mod repository;
pub mod services;
pub mod tracker;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
