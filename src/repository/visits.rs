//! Visits repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        card::VisitorCard,
        visit::{CreateVisit, Visit, VisitStatus},
        visitor::Visitor,
    },
    tracker::{SlotField, SlotUpdate, MAX_DAY_SLOTS},
};

const VISIT_SELECT: &str = r#"
    SELECT v.*,
           vi.first_name, vi.last_name, vi.email AS visitor_email, vi.company,
           c.card_number, COALESCE(c.printed, FALSE) AS card_printed
    FROM visits v
    JOIN visitors vi ON vi.id = v.visitor_id
    LEFT JOIN visitor_cards c ON c.visit_id = v.id
"#;

/// Outcome of a guarded slot write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWrite {
    Applied,
    /// Another write changed the slot between read and update
    Stale,
}

/// Record store the desk services work against
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitStore: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    async fn get_by_id(&self, id: i32) -> AppResult<Visit>;

    async fn find_by_card_number(&self, card_number: &str) -> AppResult<Option<Visit>>;

    /// Write one slot timestamp, only if the slot is still in the state the update expects
    async fn apply_slot_update(
        &self,
        visit_id: i32,
        update: SlotUpdate,
        by_operator: bool,
    ) -> AppResult<SlotWrite>;

    /// Visits with at least one day checked in and not checked out
    async fn list_checked_in(&self) -> AppResult<Vec<Visit>>;

    /// Visits holding an open slot and not yet flagged by the overdue sweep
    async fn list_unnotified(&self) -> AppResult<Vec<Visit>>;

    async fn mark_overdue_notified(&self, visit_id: i32) -> AppResult<()>;

    async fn create(&self, data: &CreateVisit, created_by_email: Option<String>) -> AppResult<Visit>;

    async fn insert_card(
        &self,
        visit_id: i32,
        card_number: &str,
        issued_at: DateTime<Utc>,
    ) -> AppResult<Option<VisitorCard>>;

    /// Decide a pending visit; false if it was no longer pending
    async fn set_status(
        &self,
        visit_id: i32,
        status: VisitStatus,
        decided_by_email: Option<String>,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Approved visits whose card is not printed yet
    async fn list_print_queue(&self) -> AppResult<Vec<Visit>>;

    /// Flag the visit's card as printed; false if it has no unprinted card
    async fn mark_card_printed(&self, visit_id: i32) -> AppResult<bool>;

    /// Delete a visit unless its card was printed; false if nothing was deleted
    async fn delete_unprinted(&self, visit_id: i32) -> AppResult<bool>;
}

/// Map a unique-constraint violation to a conflict, anything else to a database error
fn conflict_on_unique(err: sqlx::Error, message: impl FnOnce() -> String) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(message()),
        other => AppError::Database(other),
    }
}

#[derive(Clone)]
pub struct VisitsRepository {
    pool: Pool<Postgres>,
}

impl VisitsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn open_slot_condition() -> String {
        (1..=MAX_DAY_SLOTS)
            .map(|day| format!("(v.day_{day}_checkin IS NOT NULL AND v.day_{day}_checkout IS NULL)"))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    fn unnotified_query() -> String {
        format!(
            "{VISIT_SELECT} WHERE v.overdue_notification_sent = FALSE AND ({}) ORDER BY v.id",
            Self::open_slot_condition()
        )
    }
}

#[async_trait]
impl VisitStore for VisitsRepository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Visit> {
        sqlx::query_as::<_, Visit>(&format!("{VISIT_SELECT} WHERE v.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Visit with id {} not found", id)))
    }

    async fn find_by_card_number(&self, card_number: &str) -> AppResult<Option<Visit>> {
        let visit = sqlx::query_as::<_, Visit>(&format!("{VISIT_SELECT} WHERE c.card_number = $1"))
            .bind(card_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(visit)
    }

    async fn apply_slot_update(
        &self,
        visit_id: i32,
        update: SlotUpdate,
        by_operator: bool,
    ) -> AppResult<SlotWrite> {
        if update.day == 0 || update.day as usize > MAX_DAY_SLOTS {
            return Err(AppError::Internal(format!("Invalid day slot {}", update.day)));
        }
        let day = update.day;

        // Compare-and-swap on the single column keeps duplicate scans from racing
        let guard = match update.field {
            SlotField::Checkin => format!("day_{day}_checkin IS NULL"),
            SlotField::Checkout => {
                format!("day_{day}_checkin IS NOT NULL AND day_{day}_checkout IS NULL")
            }
        };
        let query = format!(
            r#"
            UPDATE visits
            SET {column} = $1,
                checkout_by_hr = CASE WHEN $3 THEN TRUE ELSE checkout_by_hr END,
                updated_at = NOW()
            WHERE id = $2 AND {guard}
            "#,
            column = update.field_name(),
        );

        let result = sqlx::query(&query)
            .bind(update.at)
            .bind(visit_id)
            .bind(by_operator)
            .execute(&self.pool)
            .await?;

        Ok(if result.rows_affected() == 0 {
            SlotWrite::Stale
        } else {
            SlotWrite::Applied
        })
    }

    async fn list_checked_in(&self) -> AppResult<Vec<Visit>> {
        let query = format!(
            "{VISIT_SELECT} WHERE {} ORDER BY v.id",
            Self::open_slot_condition()
        );
        let rows = sqlx::query_as::<_, Visit>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_unnotified(&self) -> AppResult<Vec<Visit>> {
        let rows = sqlx::query_as::<_, Visit>(&Self::unnotified_query())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn mark_overdue_notified(&self, visit_id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE visits SET overdue_notification_sent = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(visit_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Visit with id {} not found",
                visit_id
            )));
        }
        Ok(())
    }

    async fn create(&self, data: &CreateVisit, created_by_email: Option<String>) -> AppResult<Visit> {
        let mut tx = self.pool.begin().await?;

        // Same person from the same company is registered once
        let visitor = sqlx::query_as::<_, Visitor>(
            r#"
            INSERT INTO visitors (first_name, last_name, email, phone, company, id_proof_type, id_proof_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (first_name, last_name, phone, company) DO UPDATE
            SET email = COALESCE(EXCLUDED.email, visitors.email),
                id_proof_type = EXCLUDED.id_proof_type,
                id_proof_number = EXCLUDED.id_proof_number,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.company)
        .bind(&data.id_proof_type)
        .bind(&data.id_proof_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || "A visitor with this email already exists".to_string())
        })?;

        let visit_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO visits (visitor_id, host_name, host_email, created_by_email, purpose,
                                visit_date, valid_upto, start_time, end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(visitor.id)
        .bind(&data.host_name)
        .bind(&data.host_email)
        .bind(created_by_email)
        .bind(&data.purpose)
        .bind(data.visit_date)
        .bind(data.valid_upto)
        .bind(data.start_time)
        .bind(data.end_time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_by_id(visit_id).await
    }

    async fn insert_card(
        &self,
        visit_id: i32,
        card_number: &str,
        issued_at: DateTime<Utc>,
    ) -> AppResult<Option<VisitorCard>> {
        let existing: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM visitor_cards WHERE visit_id = $1)",
        )
        .bind(visit_id)
        .fetch_one(&self.pool)
        .await?;

        if existing {
            return Err(AppError::Conflict(format!(
                "Visit {} already has a card",
                visit_id
            )));
        }

        // None when the generated number is already taken; a concurrent issuance
        // for the same visit trips the visit_id constraint instead
        let card = sqlx::query_as::<_, VisitorCard>(
            r#"
            INSERT INTO visitor_cards (visit_id, card_number, issued_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (card_number) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(visit_id)
        .bind(card_number)
        .bind(issued_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("Visit {} already has a card", visit_id)))?;

        Ok(card)
    }

    async fn set_status(
        &self,
        visit_id: i32,
        status: VisitStatus,
        decided_by_email: Option<String>,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE visits
            SET status = $1,
                approved_at = CASE WHEN $1 = 'APPROVED' THEN $2 ELSE approved_at END,
                rejected_at = CASE WHEN $1 = 'REJECTED' THEN $2 ELSE rejected_at END,
                decided_by_email = $3,
                updated_at = NOW()
            WHERE id = $4 AND status = 'PENDING'
            "#,
        )
        .bind(status)
        .bind(at)
        .bind(decided_by_email)
        .bind(visit_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_print_queue(&self) -> AppResult<Vec<Visit>> {
        let rows = sqlx::query_as::<_, Visit>(&format!(
            "{VISIT_SELECT} WHERE v.status = 'APPROVED' AND COALESCE(c.printed, FALSE) = FALSE \
             ORDER BY v.created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_card_printed(&self, visit_id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE visitor_cards SET printed = TRUE WHERE visit_id = $1 AND printed = FALSE",
        )
        .bind(visit_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_unprinted(&self, visit_id: i32) -> AppResult<bool> {
        // Cards go with the visit (ON DELETE CASCADE)
        let result = sqlx::query(
            r#"
            DELETE FROM visits
            WHERE id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM visitor_cards WHERE visit_id = $1 AND printed = TRUE
              )
            "#,
        )
        .bind(visit_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
