//! Overdue checkout sweep
//!
//! Run periodically: every visit still holding an open slot after its expected daily
//! end time gets one alert to the host, the registering operator and the visitor.

use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};

use crate::{
    config::FacilityConfig,
    error::AppResult,
    models::visit::Visit,
    repository::VisitStore,
    tracker::OpenSlot,
};

use super::email::Mailer;

/// What a sweep did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub overdue: usize,
    pub notified: usize,
    pub without_recipients: usize,
    pub failed: usize,
    /// Alert sent but the visit could not be flagged; it will be alerted again
    pub unflagged: usize,
}

#[derive(Clone)]
pub struct SweepService {
    store: Arc<dyn VisitStore>,
    mailer: Arc<dyn Mailer>,
    facility: FacilityConfig,
}

impl SweepService {
    pub fn new(store: Arc<dyn VisitStore>, mailer: Arc<dyn Mailer>, facility: FacilityConfig) -> Self {
        Self {
            store,
            mailer,
            facility,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let now_local = now.with_timezone(&self.facility.offset());
        let visits = self.store.list_unnotified().await?;
        let mut report = SweepReport {
            scanned: visits.len(),
            ..SweepReport::default()
        };

        for visit in visits {
            let Some(open) = visit.window.find_open_slot() else {
                continue;
            };
            let expected_end = visit.end_time.unwrap_or(self.facility.default_end_time);
            if !visit
                .window
                .is_overdue(&open, expected_end, now_local.naive_local())
            {
                continue;
            }
            report.overdue += 1;

            let recipients = recipients(&visit);
            if recipients.is_empty() {
                tracing::warn!(visit_id = visit.id, "Overdue visit has no one to notify");
                report.without_recipients += 1;
                continue;
            }

            let (subject, body) = overdue_alert(&visit, &open, expected_end, now_local);
            if let Err(e) = self.mailer.send(&recipients, &subject, &body).await {
                // Flag stays unset so the next sweep retries
                tracing::error!(visit_id = visit.id, error = %e, "Failed to send overdue alert");
                report.failed += 1;
                continue;
            }

            if let Err(e) = self.store.mark_overdue_notified(visit.id).await {
                tracing::error!(visit_id = visit.id, error = %e, "Alert sent but visit not flagged");
                report.unflagged += 1;
                continue;
            }
            tracing::info!(
                visit_id = visit.id,
                day = open.day,
                recipients = %recipients.join(", "),
                "Sent overdue checkout alert"
            );
            report.notified += 1;
        }

        Ok(report)
    }
}

/// Host, registering operator and visitor, deduplicated
fn recipients(visit: &Visit) -> Vec<String> {
    [
        visit.host_email.as_deref(),
        visit.created_by_email.as_deref(),
        visit.visitor.email.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|email| !email.is_empty())
    .map(str::to_string)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

fn overdue_alert(
    visit: &Visit,
    open: &OpenSlot,
    expected_end: NaiveTime,
    now_local: DateTime<FixedOffset>,
) -> (String, String) {
    let offset = now_local.offset();
    let subject = format!(
        "Visitor Overdue Checkout Alert: {}",
        visit.visitor.display_name()
    );
    let body = format!(
        "Visitor {visitor} (Company: {company})\n\
         Visit Date: {visit_date}\n\
         Purpose: {purpose}\n\
         Expected End Time: {end}\n\
         Checked in at: {checkin}\n\
         \n\
         This visitor has not checked out as of {now} (UTC{offset}).\n\
         Please take necessary action.",
        visitor = visit.visitor.display_name(),
        company = visit.visitor.company,
        visit_date = visit.window.start_date.format("%Y-%m-%d"),
        purpose = visit.purpose,
        end = expected_end.format("%H:%M:%S"),
        checkin = open
            .checkin_at
            .with_timezone(offset)
            .format("%Y-%m-%d %H:%M:%S"),
        now = now_local.format("%Y-%m-%d %H:%M:%S"),
    );
    (subject, body)
}
