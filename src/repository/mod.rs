//! Repository layer for database operations

pub mod visits;

use sqlx::{Pool, Postgres};

pub use visits::{SlotWrite, VisitStore, VisitsRepository};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub visits: visits::VisitsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            visits: visits::VisitsRepository::new(pool.clone()),
            pool,
        }
    }
}
