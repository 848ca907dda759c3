//! Visitor card model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Printed badge handed to a visitor, one per visit
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct VisitorCard {
    pub id: i32,
    pub visit_id: i32,
    pub card_number: String,
    pub issued_at: DateTime<Utc>,
    /// Set once the desk confirms the badge came out of the printer
    pub printed: bool,
}

/// Card issuance response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedCard {
    pub visit_id: i32,
    pub card_number: String,
    /// Text to encode in the card's QR code
    pub qr_payload: String,
    pub issued_at: DateTime<Utc>,
}

/// Print confirmation response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrintedCard {
    pub visit_id: i32,
    pub card_number: String,
    /// Day slot checked in when the card was handed over, if the window is active
    pub checked_in_day: Option<u8>,
}
