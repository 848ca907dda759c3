//! Business logic services

pub mod email;
pub mod sweep;
pub mod visits;

use std::sync::Arc;

use crate::{
    config::{EmailConfig, FacilityConfig},
    repository::{Repository, VisitStore},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub visits: visits::VisitsService,
    pub sweep: sweep::SweepService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, email_config: EmailConfig, facility: FacilityConfig) -> Self {
        let store: Arc<dyn VisitStore> = Arc::new(repository.visits);
        let mailer: Arc<dyn email::Mailer> = Arc::new(email::EmailService::new(email_config));

        Self {
            visits: visits::VisitsService::new(store.clone(), mailer.clone(), facility.clone()),
            sweep: sweep::SweepService::new(store, mailer, facility),
        }
    }
}
