//! Visitor desk service: QR check-in/out, operator checkout, registration, approval and cards

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use validator::Validate;

use crate::{
    config::FacilityConfig,
    error::{AppError, AppResult},
    models::{
        card::{IssuedCard, PrintedCard},
        visit::{
            CheckedInVisitor, CreateVisit, ScanRequest, ScanResponse, Visit, VisitDecision,
            VisitDetails, VisitStatus,
        },
    },
    qr,
    repository::{SlotWrite, VisitStore},
    tracker::{CheckInError, CheckOutError},
};

use super::email::Mailer;

const CARD_NUMBER_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct VisitsService {
    store: Arc<dyn VisitStore>,
    mailer: Arc<dyn Mailer>,
    facility: FacilityConfig,
}

impl VisitsService {
    pub fn new(store: Arc<dyn VisitStore>, mailer: Arc<dyn Mailer>, facility: FacilityConfig) -> Self {
        Self {
            store,
            mailer,
            facility,
        }
    }

    fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.facility.offset())
    }

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date_naive()
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }

    async fn visit_for_scan(&self, scan: &ScanRequest) -> AppResult<Visit> {
        let card_number = qr::card_number(scan.qr_data.trim());
        if card_number.is_empty() {
            return Err(AppError::BadRequest("No QR data provided".to_string()));
        }

        self.store
            .find_by_card_number(card_number)
            .await?
            .ok_or_else(|| AppError::NotFound("Card not found".to_string()))
    }

    /// Check a visitor in on today's slot
    pub async fn check_in(&self, scan: &ScanRequest, now: DateTime<Utc>) -> AppResult<ScanResponse> {
        let visit = self.visit_for_scan(scan).await?;
        let today = self.today(now);

        let update = visit
            .window
            .check_in_action(today, now)
            .map_err(|e| match e {
                CheckInError::WindowNotActive if visit.window.has_ended(today) => AppError::VisitEnded,
                other => other.into(),
            })?;

        if self.store.apply_slot_update(visit.id, update, false).await? == SlotWrite::Stale {
            return Err(CheckInError::AlreadyCheckedIn.into());
        }

        tracing::info!(visit_id = visit.id, day = update.day, "Visitor checked in");

        Ok(ScanResponse {
            visit_id: visit.id,
            visitor_name: visit.visitor.full_name(),
            day: update.day,
            message: "Checked in!".to_string(),
            recorded_at: self.local(update.at),
        })
    }

    /// Check a visitor out of today's slot
    pub async fn check_out(&self, scan: &ScanRequest, now: DateTime<Utc>) -> AppResult<ScanResponse> {
        let visit = self.visit_for_scan(scan).await?;
        let update = visit.window.check_out_action(self.today(now), now)?;

        if self.store.apply_slot_update(visit.id, update, false).await? == SlotWrite::Stale {
            return Err(CheckOutError::NotCheckedInOrAlreadyCheckedOut.into());
        }

        tracing::info!(visit_id = visit.id, day = update.day, "Visitor checked out");

        Ok(ScanResponse {
            visit_id: visit.id,
            visitor_name: visit.visitor.full_name(),
            day: update.day,
            message: "Checked out!".to_string(),
            recorded_at: self.local(update.at),
        })
    }

    /// Close a visit's open slot on behalf of the visitor
    pub async fn manual_checkout(&self, visit_id: i32, now: DateTime<Utc>) -> AppResult<ScanResponse> {
        let visit = self.store.get_by_id(visit_id).await?;
        let update = visit.window.operator_checkout_action(now)?;

        if self.store.apply_slot_update(visit.id, update, true).await? == SlotWrite::Stale {
            return Err(CheckOutError::NotCheckedInOrAlreadyCheckedOut.into());
        }

        tracing::info!(visit_id = visit.id, day = update.day, "Visitor checked out by HR");

        Ok(ScanResponse {
            visit_id: visit.id,
            visitor_name: visit.visitor.full_name(),
            day: update.day,
            message: "Checked out by HR".to_string(),
            recorded_at: self.local(update.at),
        })
    }

    /// Everyone currently inside, one entry per visit
    pub async fn checked_in(&self) -> AppResult<Vec<CheckedInVisitor>> {
        let visits = self.store.list_checked_in().await?;

        Ok(visits
            .into_iter()
            .filter_map(|visit| {
                let open = visit.window.find_open_slot()?;
                Some(CheckedInVisitor {
                    id: visit.id,
                    name: visit.visitor.full_name(),
                    company: visit.visitor.company,
                    purpose: visit.purpose,
                    day_num: open.day,
                    checkin_time: self.local(open.checkin_at),
                })
            })
            .collect())
    }

    pub async fn get(&self, visit_id: i32, now: DateTime<Utc>) -> AppResult<VisitDetails> {
        let visit = self.store.get_by_id(visit_id).await?;
        Ok(VisitDetails::new(visit, self.today(now)))
    }

    /// Register the visitor (or reuse the existing record) and authorize the visit
    pub async fn create(
        &self,
        data: &CreateVisit,
        created_by_email: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<VisitDetails> {
        data.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let visit = self.store.create(data, created_by_email).await?;
        tracing::info!(
            visit_id = visit.id,
            visitor_id = visit.visitor.id,
            visit_date = %visit.window.start_date,
            "Visit registered"
        );

        Ok(VisitDetails::new(visit, self.today(now)))
    }

    /// Approve or reject a pending visit and tell the visitor
    pub async fn decide(
        &self,
        visit_id: i32,
        decision: VisitDecision,
        decided_by_email: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<VisitDetails> {
        let mut visit = self.store.get_by_id(visit_id).await?;
        if visit.status != VisitStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Visit {} is already {}",
                visit_id, visit.status
            )));
        }

        let status = decision.status();
        if !self
            .store
            .set_status(visit.id, status, decided_by_email, now)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Visit {} was decided concurrently",
                visit_id
            )));
        }

        visit.status = status;
        match status {
            VisitStatus::Approved => visit.approved_at = Some(now),
            VisitStatus::Rejected => visit.rejected_at = Some(now),
            VisitStatus::Pending => {}
        }
        tracing::info!(visit_id = visit.id, status = %status, "Visit decided");

        self.notify_decision(&visit, decision).await;

        Ok(VisitDetails::new(visit, self.today(now)))
    }

    /// Decision e-mail to the visitor; a failed send does not undo the decision
    async fn notify_decision(&self, visit: &Visit, decision: VisitDecision) {
        let Some(email) = visit.visitor.email.as_deref().filter(|e| !e.trim().is_empty()) else {
            return;
        };

        let (subject, body) = decision_message(&self.facility.name, visit, decision);
        if let Err(e) = self.mailer.send(&[email.to_string()], &subject, &body).await {
            tracing::error!(visit_id = visit.id, error = %e, "Failed to send decision e-mail");
        }
    }

    /// Approved visits waiting for their card to be printed, newest first
    pub async fn print_queue(&self, now: DateTime<Utc>) -> AppResult<Vec<VisitDetails>> {
        let today = self.today(now);
        let visits = self.store.list_print_queue().await?;
        Ok(visits
            .into_iter()
            .map(|visit| VisitDetails::new(visit, today))
            .collect())
    }

    /// Confirm the card is printed and check the visitor in if today is in the window
    pub async fn mark_printed(&self, visit_id: i32, now: DateTime<Utc>) -> AppResult<PrintedCard> {
        let visit = self.store.get_by_id(visit_id).await?;
        if visit.status != VisitStatus::Approved {
            return Err(AppError::Conflict(format!("Visit {} is not approved", visit_id)));
        }
        let Some(card_number) = visit.card_number.clone() else {
            return Err(AppError::Conflict(format!("Visit {} has no card", visit_id)));
        };
        if visit.card_printed || !self.store.mark_card_printed(visit.id).await? {
            return Err(AppError::Conflict(format!(
                "Card {} is already printed",
                card_number
            )));
        }

        // Handing over the card counts as the first check-in of the day
        let mut checked_in_day = None;
        if let Ok(update) = visit.window.check_in_action(self.today(now), now) {
            if self.store.apply_slot_update(visit.id, update, false).await? == SlotWrite::Applied {
                checked_in_day = Some(update.day);
            }
        }

        tracing::info!(
            visit_id = visit.id,
            card_number = %card_number,
            checked_in_day = ?checked_in_day,
            "Card printed"
        );

        Ok(PrintedCard {
            visit_id: visit.id,
            card_number,
            checked_in_day,
        })
    }

    /// Remove a visit registered by mistake, as long as no card was printed for it
    pub async fn delete_unprinted(&self, visit_id: i32) -> AppResult<()> {
        let visit = self.store.get_by_id(visit_id).await?;
        if visit.card_printed || !self.store.delete_unprinted(visit.id).await? {
            return Err(AppError::Conflict(
                "Card already printed for this visitor.".to_string(),
            ));
        }

        tracing::info!(visit_id = visit.id, "Unprinted visit deleted");
        Ok(())
    }

    /// Issue the visit's card with a fresh card number
    pub async fn issue_card(&self, visit_id: i32, now: DateTime<Utc>) -> AppResult<IssuedCard> {
        let visit = self.store.get_by_id(visit_id).await?;
        if visit.status != VisitStatus::Approved {
            return Err(AppError::Conflict(format!("Visit {} is not approved", visit_id)));
        }
        if let Some(existing) = &visit.card_number {
            return Err(AppError::Conflict(format!(
                "Visit {} already has card {}",
                visit_id, existing
            )));
        }

        for _ in 0..CARD_NUMBER_ATTEMPTS {
            let card_number = qr::generate_card_number();
            if let Some(card) = self.store.insert_card(visit.id, &card_number, now).await? {
                tracing::info!(visit_id = visit.id, card_number = %card.card_number, "Card issued");
                return Ok(IssuedCard {
                    visit_id: visit.id,
                    qr_payload: qr::encode(
                        &card.card_number,
                        &visit.visitor.display_name(),
                        visit.window.start_date,
                    ),
                    card_number: card.card_number,
                    issued_at: card.issued_at,
                });
            }
            tracing::debug!(card_number = %card_number, "Card number taken, retrying");
        }

        Err(AppError::Internal(
            "Could not allocate a unique card number".to_string(),
        ))
    }
}

fn decision_message(facility: &str, visit: &Visit, decision: VisitDecision) -> (String, String) {
    let name = visit.visitor.full_name();
    match decision {
        VisitDecision::Approve => (
            format!("Your visit to {} has been approved", facility),
            format!(
                "Dear {}, your visit request has been approved. \
                 Please carry your ID and visit as per your appointment.",
                name
            ),
        ),
        VisitDecision::Reject => (
            format!("Your visit to {} has been rejected", facility),
            format!(
                "Dear {}, unfortunately your visit request has been rejected. \
                 Please contact HR for more details.",
                name
            ),
        ),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        models::{card::VisitorCard, visitor::VisitorSummary},
        repository::visits::MockVisitStore,
        services::email::MockMailer,
        tracker::{SlotField, VisitWindow},
    };
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn sample_visit(start: NaiveDate, end: Option<NaiveDate>) -> Visit {
        Visit {
            id: 1,
            visitor: VisitorSummary {
                id: 10,
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                email: Some("jane@example.com".to_string()),
                company: "Acme".to_string(),
            },
            host_name: "Sam Host".to_string(),
            host_email: Some("host@example.com".to_string()),
            created_by_email: Some("desk@example.com".to_string()),
            purpose: "Audit".to_string(),
            start_time: None,
            end_time: None,
            status: VisitStatus::Approved,
            approved_at: Some(Utc.with_ymd_and_hms(2023, 12, 21, 8, 0, 0).unwrap()),
            rejected_at: None,
            checkout_by_hr: false,
            overdue_notification_sent: false,
            card_number: Some("VC-1234".to_string()),
            card_printed: false,
            window: VisitWindow::new(start, end),
            created_at: Utc.with_ymd_and_hms(2023, 12, 20, 8, 0, 0).unwrap(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// 09:30 facility time on 2024-01-03
    fn morning_of_day_three() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 3, 4, 0, 0).unwrap()
    }

    fn scan() -> ScanRequest {
        ScanRequest {
            qr_data: "VC-1234|Jane Doe (Acme)|2024-01-01".to_string(),
        }
    }

    fn service(store: MockVisitStore) -> VisitsService {
        service_with_mailer(store, MockMailer::new())
    }

    fn service_with_mailer(store: MockVisitStore, mailer: MockMailer) -> VisitsService {
        VisitsService::new(Arc::new(store), Arc::new(mailer), FacilityConfig::default())
    }

    fn pending_visit() -> Visit {
        let mut visit = sample_visit(date(2024, 1, 1), Some(date(2024, 1, 5)));
        visit.status = VisitStatus::Pending;
        visit.approved_at = None;
        visit.card_number = None;
        visit
    }

    #[tokio::test]
    async fn test_check_in_writes_todays_slot() {
        let visit = sample_visit(date(2024, 1, 1), Some(date(2024, 1, 5)));
        let mut store = MockVisitStore::new();
        store
            .expect_find_by_card_number()
            .withf(|card| card == "VC-1234")
            .returning(move |_| Ok(Some(visit.clone())));
        store
            .expect_apply_slot_update()
            .withf(|id, update, by_operator| {
                *id == 1 && update.day == 3 && update.field == SlotField::Checkin && !*by_operator
            })
            .times(1)
            .returning(|_, _, _| Ok(SlotWrite::Applied));

        let response = service(store)
            .check_in(&scan(), morning_of_day_three())
            .await
            .unwrap();

        assert_eq!(response.day, 3);
        assert_eq!(response.visitor_name, "Jane Doe");
        assert_eq!(response.recorded_at.to_rfc3339(), "2024-01-03T09:30:00+05:30");
    }

    #[tokio::test]
    async fn test_check_in_twice_is_rejected() {
        let mut visit = sample_visit(date(2024, 1, 1), Some(date(2024, 1, 5)));
        visit.window.day_slots[2].checkin_at = Some(morning_of_day_three());
        let mut store = MockVisitStore::new();
        store
            .expect_find_by_card_number()
            .returning(move |_| Ok(Some(visit.clone())));
        store.expect_apply_slot_update().never();

        let err = service(store)
            .check_in(&scan(), morning_of_day_three())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CheckIn(CheckInError::AlreadyCheckedIn)));
    }

    #[tokio::test]
    async fn test_check_in_lost_race() {
        let visit = sample_visit(date(2024, 1, 1), Some(date(2024, 1, 5)));
        let mut store = MockVisitStore::new();
        store
            .expect_find_by_card_number()
            .returning(move |_| Ok(Some(visit.clone())));
        store
            .expect_apply_slot_update()
            .returning(|_, _, _| Ok(SlotWrite::Stale));

        let result = service(store).check_in(&scan(), morning_of_day_three()).await;
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, AppError::CheckIn(CheckInError::AlreadyCheckedIn)));
    }

    #[tokio::test]
    async fn test_check_in_outside_window() {
        let ended = sample_visit(date(2023, 12, 1), Some(date(2023, 12, 2)));
        let upcoming = sample_visit(date(2024, 2, 1), None);
        let mut store = MockVisitStore::new();
        let mut calls = vec![upcoming, ended];
        store
            .expect_find_by_card_number()
            .times(2)
            .returning(move |_| Ok(calls.pop()));

        let service = service(store);
        let err = service.check_in(&scan(), morning_of_day_three()).await.unwrap_err();
        assert!(matches!(err, AppError::VisitEnded));

        let err = service.check_in(&scan(), morning_of_day_three()).await.unwrap_err();
        assert!(matches!(err, AppError::CheckIn(CheckInError::WindowNotActive)));
    }

    #[tokio::test]
    async fn test_unknown_card() {
        let mut store = MockVisitStore::new();
        store.expect_find_by_card_number().returning(|_| Ok(None));

        let err = service(store)
            .check_out(&scan(), morning_of_day_three())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_qr_payload() {
        let mut store = MockVisitStore::new();
        store.expect_find_by_card_number().never();

        let scan = ScanRequest {
            qr_data: "  ".to_string(),
        };
        let err = service(store)
            .check_in(&scan, morning_of_day_three())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_check_out_requires_open_slot_today() {
        let mut visit = sample_visit(date(2024, 1, 1), Some(date(2024, 1, 5)));
        // Open since day 2, nothing on day 3
        visit.window.day_slots[1].checkin_at = Some(Utc.with_ymd_and_hms(2024, 1, 2, 4, 0, 0).unwrap());
        let mut store = MockVisitStore::new();
        store
            .expect_find_by_card_number()
            .returning(move |_| Ok(Some(visit.clone())));

        let err = service(store)
            .check_out(&scan(), morning_of_day_three())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::CheckOut(CheckOutError::NotCheckedInOrAlreadyCheckedOut)
        ));
    }

    #[tokio::test]
    async fn test_check_out() {
        let mut visit = sample_visit(date(2024, 1, 1), Some(date(2024, 1, 5)));
        visit.window.day_slots[2].checkin_at = Some(morning_of_day_three());
        let mut store = MockVisitStore::new();
        store
            .expect_find_by_card_number()
            .returning(move |_| Ok(Some(visit.clone())));
        store
            .expect_apply_slot_update()
            .withf(|_, update, _| update.field_name() == "day_3_checkout")
            .returning(|_, _, _| Ok(SlotWrite::Applied));

        let later = Utc.with_ymd_and_hms(2024, 1, 3, 11, 0, 0).unwrap();
        let response = service(store).check_out(&scan(), later).await.unwrap();
        assert_eq!(response.day, 3);
        assert_eq!(response.message, "Checked out!");
    }

    #[tokio::test]
    async fn test_manual_checkout_closes_old_slot() {
        let mut visit = sample_visit(date(2024, 1, 1), Some(date(2024, 1, 5)));
        visit.window.day_slots[0].checkin_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap());
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .withf(|id| *id == 1)
            .returning(move |_| Ok(visit.clone()));
        store
            .expect_apply_slot_update()
            .withf(|_, update, by_operator| update.day == 1 && *by_operator)
            .times(1)
            .returning(|_, _, _| Ok(SlotWrite::Applied));

        let response = service(store)
            .manual_checkout(1, morning_of_day_three())
            .await
            .unwrap();
        assert_eq!(response.day, 1);
    }

    #[tokio::test]
    async fn test_checked_in_listing() {
        let mut inside = sample_visit(date(2024, 1, 1), Some(date(2024, 1, 5)));
        inside.window.day_slots[2].checkin_at = Some(morning_of_day_three());
        let mut store = MockVisitStore::new();
        store
            .expect_list_checked_in()
            .returning(move || Ok(vec![inside.clone()]));

        let listing = service(store).checked_in().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].day_num, 3);
        assert_eq!(listing[0].company, "Acme");
    }

    #[tokio::test]
    async fn test_issue_card_retries_taken_numbers() {
        let mut visit = sample_visit(date(2024, 1, 1), None);
        visit.card_number = None;
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));

        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        store
            .expect_insert_card()
            .times(2)
            .returning(move |visit_id, number, issued_at| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Ok(None);
                }
                Ok(Some(VisitorCard {
                    id: 5,
                    visit_id,
                    card_number: number.to_string(),
                    issued_at,
                    printed: false,
                }))
            });

        let card = service(store).issue_card(1, morning_of_day_three()).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(card.card_number.starts_with("VC-"));
        assert_eq!(
            card.qr_payload,
            format!("{}|Jane Doe (Acme)|2024-01-01", card.card_number)
        );
    }

    #[tokio::test]
    async fn test_issue_card_once() {
        let visit = sample_visit(date(2024, 1, 1), None);
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store.expect_insert_card().never();

        let err = service(store)
            .issue_card(1, morning_of_day_three())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_approve_notifies_visitor() {
        let visit = pending_visit();
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store
            .expect_set_status()
            .withf(|id, status, by, _| {
                *id == 1 && *status == VisitStatus::Approved && by.as_deref() == Some("hr@example.com")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|to, subject, body| {
                to.len() == 1
                    && to[0] == "jane@example.com"
                    && subject == "Your visit to Visitgate has been approved"
                    && body.starts_with("Dear Jane Doe, your visit request has been approved.")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let details = service_with_mailer(store, mailer)
            .decide(
                1,
                VisitDecision::Approve,
                Some("hr@example.com".to_string()),
                morning_of_day_three(),
            )
            .await
            .unwrap();
        assert_eq!(details.approval, VisitStatus::Approved);
        assert_eq!(details.approved_at, Some(morning_of_day_three()));
        assert_eq!(details.rejected_at, None);
    }

    #[tokio::test]
    async fn test_reject_survives_mail_failure() {
        let visit = pending_visit();
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store
            .expect_set_status()
            .withf(|_, status, _, _| *status == VisitStatus::Rejected)
            .returning(|_, _, _, _| Ok(true));

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|_, subject, _| subject == "Your visit to Visitgate has been rejected")
            .returning(|_, _, _| Err(AppError::Internal("relay down".to_string())));

        let details = service_with_mailer(store, mailer)
            .decide(1, VisitDecision::Reject, None, morning_of_day_three())
            .await
            .unwrap();
        assert_eq!(details.approval, VisitStatus::Rejected);
        assert_eq!(details.rejected_at, Some(morning_of_day_three()));
    }

    #[tokio::test]
    async fn test_decision_without_visitor_email_sends_nothing() {
        let mut visit = pending_visit();
        visit.visitor.email = None;
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store.expect_set_status().returning(|_, _, _, _| Ok(true));
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();

        let details = service_with_mailer(store, mailer)
            .decide(1, VisitDecision::Approve, None, morning_of_day_three())
            .await
            .unwrap();
        assert_eq!(details.approval, VisitStatus::Approved);
    }

    #[tokio::test]
    async fn test_decided_visit_is_final() {
        let visit = sample_visit(date(2024, 1, 1), None);
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store.expect_set_status().never();

        let err = service(store)
            .decide(1, VisitDecision::Reject, None, morning_of_day_three())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_decision_lost_race() {
        let visit = pending_visit();
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store.expect_set_status().returning(|_, _, _, _| Ok(false));
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();

        let result = service_with_mailer(store, mailer)
            .decide(1, VisitDecision::Approve, None, morning_of_day_three())
            .await;
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_issue_card_requires_approval() {
        let visit = pending_visit();
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store.expect_insert_card().never();

        let err = service(store)
            .issue_card(1, morning_of_day_three())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "Visit 1 is not approved"));
    }

    #[tokio::test]
    async fn test_mark_printed_checks_in_today() {
        let visit = sample_visit(date(2024, 1, 1), Some(date(2024, 1, 5)));
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store
            .expect_mark_card_printed()
            .withf(|id| *id == 1)
            .times(1)
            .returning(|_| Ok(true));
        store
            .expect_apply_slot_update()
            .withf(|_, update, by_operator| {
                update.field_name() == "day_3_checkin" && !*by_operator
            })
            .times(1)
            .returning(|_, _, _| Ok(SlotWrite::Applied));

        let printed = service(store)
            .mark_printed(1, morning_of_day_three())
            .await
            .unwrap();
        assert_eq!(printed.card_number, "VC-1234");
        assert_eq!(printed.checked_in_day, Some(3));
    }

    #[tokio::test]
    async fn test_mark_printed_ahead_of_visit() {
        let visit = sample_visit(date(2024, 2, 1), None);
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store.expect_mark_card_printed().returning(|_| Ok(true));
        store.expect_apply_slot_update().never();

        let printed = service(store)
            .mark_printed(1, morning_of_day_three())
            .await
            .unwrap();
        assert_eq!(printed.checked_in_day, None);
    }

    #[tokio::test]
    async fn test_mark_printed_once() {
        let mut visit = sample_visit(date(2024, 1, 1), None);
        visit.card_printed = true;
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store.expect_mark_card_printed().never();
        store.expect_apply_slot_update().never();

        let err = service(store)
            .mark_printed(1, morning_of_day_three())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_mark_printed_needs_card() {
        let mut visit = sample_visit(date(2024, 1, 1), None);
        visit.card_number = None;
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store.expect_mark_card_printed().never();

        let err = service(store)
            .mark_printed(1, morning_of_day_three())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "Visit 1 has no card"));
    }

    #[tokio::test]
    async fn test_delete_unprinted_visit() {
        let visit = sample_visit(date(2024, 1, 1), None);
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store
            .expect_delete_unprinted()
            .withf(|id| *id == 1)
            .times(1)
            .returning(|_| Ok(true));

        service(store).delete_unprinted(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_printed_visit_is_kept() {
        let mut visit = sample_visit(date(2024, 1, 1), None);
        visit.card_printed = true;
        let mut store = MockVisitStore::new();
        store
            .expect_get_by_id()
            .returning(move |_| Ok(visit.clone()));
        store.expect_delete_unprinted().never();

        let err = service(store).delete_unprinted(1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_print_queue() {
        let visit = sample_visit(date(2024, 1, 1), Some(date(2024, 1, 5)));
        let mut store = MockVisitStore::new();
        store
            .expect_list_print_queue()
            .returning(move || Ok(vec![visit.clone()]));

        let queue = service(store).print_queue(morning_of_day_three()).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].approval, VisitStatus::Approved);
        assert!(!queue[0].card_printed);
        assert_eq!(queue[0].status.current_day, Some(3));
    }
}
