//! Visitor model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Registered visitor, shared by all of their visits
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Visitor {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub company: String,
    /// e.g. "Passport", "Driver's License"
    pub id_proof_type: String,
    pub id_proof_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Visitor fields carried along with a visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VisitorSummary {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub company: String,
}

impl VisitorSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Name as printed on cards and alerts: `Jane Doe (Acme)`
    pub fn display_name(&self) -> String {
        format!("{} {} ({})", self.first_name, self.last_name, self.company)
    }
}

impl From<Visitor> for VisitorSummary {
    fn from(v: Visitor) -> Self {
        Self {
            id: v.id,
            first_name: v.first_name,
            last_name: v.last_name,
            email: v.email,
            company: v.company,
        }
    }
}
