use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Card material as held in `TempCardBundle`. Never serialized into a job
/// payload; only ever passed directly between the workflow engine and the
/// gateway within one process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub pan: String,
    pub cvv: String,
    pub expiry_month: u32,
    pub expiry_year: u32,
    pub cardholder_name: String,
}

impl Card {
    /// Local, pre-flight validation. Never makes a network call; any failure
    /// here short-circuits straight to `CardInvalid` (see SPEC_FULL.md §4.B).
    pub fn validate(&self) -> Result<(), GatewayError> {
        let digits: &str = self.pan.trim();
        if !(13..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(GatewayError::CardInvalid(
                "PAN must be 13-19 digits".to_string(),
            ));
        }
        if !luhn_checksum_valid(digits) {
            return Err(GatewayError::CardInvalid("PAN fails Luhn check".to_string()));
        }

        if !(3..=4).contains(&self.cvv.len()) || !self.cvv.chars().all(|c| c.is_ascii_digit()) {
            return Err(GatewayError::CardInvalid("CVV must be 3-4 digits".to_string()));
        }

        if !(1..=12).contains(&self.expiry_month) {
            return Err(GatewayError::CardInvalid("expiry month out of range".to_string()));
        }

        if !expiry_in_future(self.expiry_month, self.expiry_year) {
            return Err(GatewayError::CardInvalid("card has expired".to_string()));
        }

        if self.cardholder_name.trim().len() < 3 {
            return Err(GatewayError::CardInvalid(
                "cardholder name too short".to_string(),
            ));
        }

        Ok(())
    }
}

fn luhn_checksum_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    let mut double = false;
    for c in digits.chars().rev() {
        let mut d = c.to_digit(10).unwrap();
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }
    sum % 10 == 0
}

/// True when the last second of the referenced month is strictly in the
/// future relative to now.
fn expiry_in_future(month: u32, year: u32) -> bool {
    let now = Utc::now();
    let (next_month, next_month_year) = if month == 12 {
        (1, year + 1)
    } else {
        (month + 1, year)
    };

    let Some(first_of_next_month) =
        chrono::NaiveDate::from_ymd_opt(next_month_year as i32, next_month, 1)
    else {
        return false;
    };
    let expiry_boundary = first_of_next_month
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();

    expiry_boundary > now || (now.year() as u32, now.month()) < (year, month + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_card() -> Card {
        Card {
            pan: "4111111111111111".to_string(),
            cvv: "123".to_string(),
            expiry_month: 12,
            expiry_year: 2099,
            cardholder_name: "A Buyer".to_string(),
        }
    }

    #[test]
    fn accepts_a_well_formed_test_card() {
        assert!(valid_card().validate().is_ok());
    }

    #[test]
    fn rejects_pan_failing_luhn() {
        let mut card = valid_card();
        card.pan = "4111111111111112".to_string();
        assert!(card.validate().is_err());
    }

    #[test]
    fn rejects_short_cvv() {
        let mut card = valid_card();
        card.cvv = "1".to_string();
        assert!(card.validate().is_err());
    }

    #[test]
    fn rejects_expired_card() {
        let mut card = valid_card();
        card.expiry_year = 2000;
        assert!(card.validate().is_err());
    }

    #[test]
    fn rejects_short_cardholder_name() {
        let mut card = valid_card();
        card.cardholder_name = "Al".to_string();
        assert!(card.validate().is_err());
    }

    proptest::proptest! {
        #[test]
        fn any_pan_perturbation_usually_fails_luhn(n in 0u64..10_000_000_000_000_000u64) {
            let base = format!("{:016}", n);
            if !luhn_checksum_valid(&base) {
                return Ok(());
            }
            // Flip one digit and expect Luhn to (almost always) catch it.
            let mut bytes = base.into_bytes();
            let idx = 5;
            let original = bytes[idx];
            bytes[idx] = if original == b'0' { b'1' } else { b'0' };
            let perturbed = String::from_utf8(bytes).unwrap();
            prop_assert!(!luhn_checksum_valid(&perturbed));
        }
    }
}
