//! Visitor card QR payload
//!
//! Printed cards carry `cardNumber|visitorDisplayName|visitDate`. Scanners only rely on
//! the first segment, which is the card number used to look the visit up.

use chrono::NaiveDate;
use rand::Rng;

pub const SEPARATOR: char = '|';
pub const CARD_PREFIX: &str = "VC-";
const CARD_DIGITS: usize = 8;

/// Extract the lookup key (card number) from a scanned payload
pub fn card_number(payload: &str) -> &str {
    payload.split(SEPARATOR).next().unwrap_or(payload)
}

/// Build the payload printed on a visitor card
pub fn encode(card_number: &str, visitor_display_name: &str, visit_date: NaiveDate) -> String {
    format!(
        "{card_number}{SEPARATOR}{visitor_display_name}{SEPARATOR}{}",
        visit_date.format("%Y-%m-%d")
    )
}

/// Random card number such as `VC-04918273`. Uniqueness is checked by the caller.
pub fn generate_card_number() -> String {
    let mut rng = rand::thread_rng();
    let digits: String = (0..CARD_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    format!("{CARD_PREFIX}{digits}")
}
