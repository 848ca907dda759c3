//! Multi-day visit window tracking
//!
//! A visit is authorized for a span of calendar days starting at its start date.
//! Each day of the span owns a [`DaySlot`] holding that day's check-in and check-out
//! timestamps. The window is capped at [`MAX_DAY_SLOTS`] days: later days have no slot,
//! even when the authorized end date reaches further.
//!
//! Everything here is pure. Callers supply the facility-local date (and time where
//! needed) and persist the [`SlotUpdate`] they get back.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Number of day slots a visit window can hold
pub const MAX_DAY_SLOTS: usize = 10;

/// Check-in / check-out pair for one day of a visit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DaySlot {
    pub checkin_at: Option<DateTime<Utc>>,
    pub checkout_at: Option<DateTime<Utc>>,
}

/// Lifecycle of a single slot: `Empty -> CheckedIn -> CheckedOut`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Empty,
    CheckedIn,
    CheckedOut,
}

impl DaySlot {
    pub fn state(&self) -> SlotState {
        match (self.checkin_at, self.checkout_at) {
            (Some(_), None) => SlotState::CheckedIn,
            (Some(_), Some(_)) => SlotState::CheckedOut,
            // A stored checkout without a checkin is never produced here
            (None, _) => SlotState::Empty,
        }
    }

    /// Checked in and not yet checked out
    pub fn is_open(&self) -> bool {
        self.state() == SlotState::CheckedIn
    }
}

/// Where a date falls relative to a visit window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotResult {
    BeforeWindow,
    AfterWindow,
    /// 1-based day number, always within `1..=MAX_DAY_SLOTS`
    ActiveSlot(u8),
}

impl SlotResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotResult::BeforeWindow => "before_window",
            SlotResult::AfterWindow => "after_window",
            SlotResult::ActiveSlot(_) => "active",
        }
    }

    pub fn active_day(&self) -> Option<u8> {
        match self {
            SlotResult::ActiveSlot(day) => Some(*day),
            _ => None,
        }
    }
}

/// Which timestamp of a slot an update writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotField {
    Checkin,
    Checkout,
}

impl SlotField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotField::Checkin => "checkin",
            SlotField::Checkout => "checkout",
        }
    }
}

/// A single timestamp to persist on one day slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotUpdate {
    pub day: u8,
    pub field: SlotField,
    pub at: DateTime<Utc>,
}

impl SlotUpdate {
    /// Flat field name used by record stores (`day_3_checkin`, `day_10_checkout`, ...)
    pub fn field_name(&self) -> String {
        format!("day_{}_{}", self.day, self.field.as_str())
    }

    /// Apply the update to an in-memory window
    pub fn apply(&self, window: &mut VisitWindow) {
        if let Some(slot) = window.slot_mut(self.day) {
            match self.field {
                SlotField::Checkin => slot.checkin_at = Some(self.at),
                SlotField::Checkout => slot.checkout_at = Some(self.at),
            }
        }
    }
}

/// The slot a visitor is currently checked in on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenSlot {
    pub day: u8,
    pub checkin_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckInError {
    #[error("Cannot check in. Visit period is not valid for today.")]
    WindowNotActive,

    #[error("Already checked in today.")]
    AlreadyCheckedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckOutError {
    #[error("Cannot check out. Either not checked in today or already checked out.")]
    NotCheckedInOrAlreadyCheckedOut,
}

/// Authorized visit span with its per-day slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitWindow {
    pub start_date: NaiveDate,
    /// Last authorized day. `None` means the visit lasts `start_date` only.
    pub valid_until_date: Option<NaiveDate>,
    pub day_slots: [DaySlot; MAX_DAY_SLOTS],
}

impl VisitWindow {
    pub fn new(start_date: NaiveDate, valid_until_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            valid_until_date,
            day_slots: [DaySlot::default(); MAX_DAY_SLOTS],
        }
    }

    /// Last authorized calendar day
    pub fn end_date(&self) -> NaiveDate {
        self.valid_until_date.unwrap_or(self.start_date)
    }

    /// True once `today` is past the authorized end date
    pub fn has_ended(&self, today: NaiveDate) -> bool {
        today > self.end_date()
    }

    /// Slot for a 1-based day number
    pub fn slot(&self, day: u8) -> Option<&DaySlot> {
        (day as usize)
            .checked_sub(1)
            .and_then(|idx| self.day_slots.get(idx))
    }

    fn slot_mut(&mut self, day: u8) -> Option<&mut DaySlot> {
        (day as usize)
            .checked_sub(1)
            .and_then(move |idx| self.day_slots.get_mut(idx))
    }

    /// Map a calendar date onto the window
    pub fn current_day_slot(&self, today: NaiveDate) -> SlotResult {
        if today < self.start_date {
            return SlotResult::BeforeWindow;
        }
        if self.has_ended(today) {
            return SlotResult::AfterWindow;
        }

        let offset = (today - self.start_date).num_days();
        if offset >= MAX_DAY_SLOTS as i64 {
            return SlotResult::AfterWindow;
        }

        SlotResult::ActiveSlot(offset as u8 + 1)
    }

    /// Whether `today` has a slot at all. Does not look at existing check-ins.
    pub fn can_check_in(&self, today: NaiveDate) -> bool {
        matches!(self.current_day_slot(today), SlotResult::ActiveSlot(_))
    }

    /// Whether today's slot is open
    pub fn can_check_out(&self, today: NaiveDate) -> bool {
        self.current_day_slot(today)
            .active_day()
            .and_then(|day| self.slot(day))
            .is_some_and(DaySlot::is_open)
    }

    pub fn check_in_action(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<SlotUpdate, CheckInError> {
        let day = self
            .current_day_slot(today)
            .active_day()
            .ok_or(CheckInError::WindowNotActive)?;
        let slot = self.slot(day).ok_or(CheckInError::WindowNotActive)?;

        if slot.checkin_at.is_some() {
            return Err(CheckInError::AlreadyCheckedIn);
        }

        Ok(SlotUpdate {
            day,
            field: SlotField::Checkin,
            at: now,
        })
    }

    pub fn check_out_action(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<SlotUpdate, CheckOutError> {
        let day = self
            .current_day_slot(today)
            .active_day()
            .ok_or(CheckOutError::NotCheckedInOrAlreadyCheckedOut)?;

        match self.slot(day) {
            Some(DaySlot {
                checkin_at: Some(checkin_at),
                checkout_at: None,
            }) => Ok(Self::checkout_update(day, *checkin_at, now)),
            _ => Err(CheckOutError::NotCheckedInOrAlreadyCheckedOut),
        }
    }

    /// Close whichever slot is open, regardless of the calendar day
    pub fn operator_checkout_action(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SlotUpdate, CheckOutError> {
        self.find_open_slot()
            .map(|open| Self::checkout_update(open.day, open.checkin_at, now))
            .ok_or(CheckOutError::NotCheckedInOrAlreadyCheckedOut)
    }

    /// First slot, in day order, that is checked in but not checked out
    pub fn find_open_slot(&self) -> Option<OpenSlot> {
        self.day_slots
            .iter()
            .zip(1u8..)
            .find_map(|(slot, day)| match (slot.checkin_at, slot.checkout_at) {
                (Some(checkin_at), None) => Some(OpenSlot { day, checkin_at }),
                _ => None,
            })
    }

    /// Whether an open slot has run past the daily end time.
    ///
    /// The cutoff is `expected_end` on the date of `now`, not on the slot's own day,
    /// so a slot left open for several days is judged against each new day's cutoff.
    /// `now` is facility-local wall-clock time.
    pub fn is_overdue(&self, open: &OpenSlot, expected_end: NaiveTime, now: NaiveDateTime) -> bool {
        let still_open = self.slot(open.day).is_some_and(DaySlot::is_open);
        still_open && now > now.date().and_time(expected_end)
    }

    fn checkout_update(day: u8, checkin_at: DateTime<Utc>, now: DateTime<Utc>) -> SlotUpdate {
        // Kiosk clocks may disagree; never record a checkout before its checkin
        SlotUpdate {
            day,
            field: SlotField::Checkout,
            at: now.max(checkin_at),
        }
    }
}
