use serde::Deserialize;

use crate::payout::PayoutOutcome;

/// The submission form. Lives for one request.
#[derive(Debug, Deserialize)]
pub struct GuessForm {
    pub name: String,
    pub number: String,
    pub guess: i64,
}

/// Terminal state of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    Win { name: String, amount: u64 },
    Loss { name: String },
    InvalidPhone,
    UnsupportedCountry,
    PayoutRefused { outcome: PayoutOutcome },
}
