//! Visit model and related types

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    postgres::{PgRow, Postgres},
    Decode, Encode, FromRow, Row,
};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::visitor::VisitorSummary;
use crate::tracker::{SlotState, VisitWindow};

/// Approval state of a visit request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum VisitStatus {
    Pending,
    Approved,
    Rejected,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Pending => "PENDING",
            VisitStatus::Approved => "APPROVED",
            VisitStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VisitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(VisitStatus::Pending),
            "APPROVED" => Ok(VisitStatus::Approved),
            "REJECTED" => Ok(VisitStatus::Rejected),
            _ => Err(format!("Invalid visit status: {}", s)),
        }
    }
}

// Stored as VARCHAR
impl sqlx::Type<Postgres> for VisitStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for VisitStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for VisitStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Authorized visit with its multi-day check-in window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub id: i32,
    pub visitor: VisitorSummary,
    pub host_name: String,
    pub host_email: Option<String>,
    pub created_by_email: Option<String>,
    pub purpose: String,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: VisitStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    /// Last checkout was forced by an HR operator
    pub checkout_by_hr: bool,
    pub overdue_notification_sent: bool,
    pub card_number: Option<String>,
    pub card_printed: bool,
    pub window: VisitWindow,
    pub created_at: DateTime<Utc>,
}

// Rows carry the slots flattened as day_1_checkin .. day_10_checkout
impl<'r> FromRow<'r, PgRow> for Visit {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let mut window = VisitWindow::new(row.try_get("visit_date")?, row.try_get("valid_upto")?);
        for (day, slot) in (1..).zip(window.day_slots.iter_mut()) {
            slot.checkin_at = row.try_get(format!("day_{}_checkin", day).as_str())?;
            slot.checkout_at = row.try_get(format!("day_{}_checkout", day).as_str())?;
        }

        Ok(Self {
            id: row.try_get("id")?,
            visitor: VisitorSummary {
                id: row.try_get("visitor_id")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                email: row.try_get("visitor_email")?,
                company: row.try_get("company")?,
            },
            host_name: row.try_get("host_name")?,
            host_email: row.try_get("host_email")?,
            created_by_email: row.try_get("created_by_email")?,
            purpose: row.try_get("purpose")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            status: row.try_get("status")?,
            approved_at: row.try_get("approved_at")?,
            rejected_at: row.try_get("rejected_at")?,
            checkout_by_hr: row.try_get("checkout_by_hr")?,
            overdue_notification_sent: row.try_get("overdue_notification_sent")?,
            card_number: row.try_get("card_number")?,
            card_printed: row.try_get("card_printed")?,
            window,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Register a visitor and authorize a visit
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_visit_dates"))]
pub struct CreateVisit {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 20, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, max = 200, message = "Company is required"))]
    pub company: String,
    #[validate(length(min = 1, max = 50))]
    pub id_proof_type: String,
    #[validate(length(min = 1, max = 100))]
    pub id_proof_number: String,
    #[validate(length(min = 1, max = 200, message = "Host is required"))]
    pub host_name: String,
    #[validate(email(message = "Invalid host email format"))]
    pub host_email: Option<String>,
    #[validate(length(min = 1, message = "Purpose is required"))]
    pub purpose: String,
    /// First day of the visit (YYYY-MM-DD)
    pub visit_date: NaiveDate,
    /// Last authorized day; omit for a single-day visit
    pub valid_upto: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    /// Expected daily end time, used by the overdue sweep
    pub end_time: Option<NaiveTime>,
}

fn validate_visit_dates(visit: &CreateVisit) -> Result<(), ValidationError> {
    match visit.valid_upto {
        Some(end) if end < visit.visit_date => {
            let mut err = ValidationError::new("valid_upto");
            err.message = Some("valid_upto must not be before visit_date".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

/// One day of a visit as shown to operators
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DaySlotView {
    pub day: u8,
    pub state: SlotState,
    pub checkin_at: Option<DateTime<Utc>>,
    pub checkout_at: Option<DateTime<Utc>>,
}

/// Where today falls in a visit window and what the desk may do
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WindowStatus {
    /// before_window, active or after_window
    pub position: String,
    pub current_day: Option<u8>,
    pub can_check_in: bool,
    pub can_check_out: bool,
    /// Day currently checked in on, whatever the date
    pub open_day: Option<u8>,
    pub slots: Vec<DaySlotView>,
}

impl WindowStatus {
    pub fn at(window: &VisitWindow, today: NaiveDate) -> Self {
        let current = window.current_day_slot(today);
        Self {
            position: current.as_str().to_string(),
            current_day: current.active_day(),
            can_check_in: window.can_check_in(today),
            can_check_out: window.can_check_out(today),
            open_day: window.find_open_slot().map(|open| open.day),
            slots: (1..)
                .zip(window.day_slots.iter())
                .map(|(day, slot)| DaySlotView {
                    day,
                    state: slot.state(),
                    checkin_at: slot.checkin_at,
                    checkout_at: slot.checkout_at,
                })
                .collect(),
        }
    }
}

/// Visit with computed window status
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VisitDetails {
    pub id: i32,
    pub visitor: VisitorSummary,
    pub host_name: String,
    pub purpose: String,
    pub visit_date: NaiveDate,
    pub valid_upto: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub approval: VisitStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub card_number: Option<String>,
    pub card_printed: bool,
    pub checkout_by_hr: bool,
    pub overdue_notification_sent: bool,
    pub status: WindowStatus,
}

impl VisitDetails {
    pub fn new(visit: Visit, today: NaiveDate) -> Self {
        let status = WindowStatus::at(&visit.window, today);
        Self {
            id: visit.id,
            visitor: visit.visitor,
            host_name: visit.host_name,
            purpose: visit.purpose,
            visit_date: visit.window.start_date,
            valid_upto: visit.window.valid_until_date,
            start_time: visit.start_time,
            end_time: visit.end_time,
            approval: visit.status,
            approved_at: visit.approved_at,
            rejected_at: visit.rejected_at,
            card_number: visit.card_number,
            card_printed: visit.card_printed,
            checkout_by_hr: visit.checkout_by_hr,
            overdue_notification_sent: visit.overdue_notification_sent,
            status,
        }
    }
}

/// Scanned QR card
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Raw QR text: `cardNumber|visitorDisplayName|visitDate`
    pub qr_data: String,
}

/// Outcome of a check-in or check-out
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanResponse {
    pub visit_id: i32,
    pub visitor_name: String,
    pub day: u8,
    pub message: String,
    /// Recorded time, in facility-local time
    pub recorded_at: DateTime<FixedOffset>,
}

/// Visitor currently inside the facility
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckedInVisitor {
    pub id: i32,
    pub name: String,
    pub company: String,
    pub purpose: String,
    pub day_num: u8,
    pub checkin_time: DateTime<FixedOffset>,
}

/// Approve or reject a pending visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitDecision {
    Approve,
    Reject,
}

impl VisitDecision {
    pub fn status(self) -> VisitStatus {
        match self {
            VisitDecision::Approve => VisitStatus::Approved,
            VisitDecision::Reject => VisitStatus::Rejected,
        }
    }
}
