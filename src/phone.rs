use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("invalid phone number")]
    InvalidPhoneNumber,
}

/// A phone number reduced to its canonical E.164 text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPhone {
    pub e164: String,
    pub country_code: u16,
}

struct DialingPlan {
    code: u16,
    national_len: usize,
    /// Required first digit of the national number, where the plan pins one.
    /// Payouts only reach mobile wallets, so the payout countries reject
    /// landline-shaped numbers outright.
    leading: Option<char>,
}

// Longest codes first so prefix matching never has to backtrack.
const DIALING_PLANS: &[DialingPlan] = &[
    DialingPlan { code: 212, national_len: 9, leading: None },
    DialingPlan { code: 220, national_len: 7, leading: None },
    DialingPlan { code: 221, national_len: 9, leading: Some('7') },
    DialingPlan { code: 223, national_len: 8, leading: None },
    DialingPlan { code: 224, national_len: 9, leading: None },
    DialingPlan { code: 225, national_len: 10, leading: Some('0') },
    DialingPlan { code: 226, national_len: 8, leading: None },
    DialingPlan { code: 227, national_len: 8, leading: None },
    DialingPlan { code: 228, national_len: 8, leading: None },
    DialingPlan { code: 229, national_len: 8, leading: None },
    DialingPlan { code: 33, national_len: 9, leading: None },
    DialingPlan { code: 1, national_len: 10, leading: None },
];

/// Normalizes free-form input ("+221 77 123-45-67", "00221771234567", ...)
/// into E.164. Numbers must carry an international prefix; the form has no
/// default region to resolve a bare national number against.
pub fn normalize(raw: &str) -> Result<NormalizedPhone, PhoneError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-' | '(' | ')'))
        .collect();

    let digits = if let Some(rest) = cleaned.strip_prefix('+') {
        rest
    } else if let Some(rest) = cleaned.strip_prefix("00") {
        rest
    } else {
        return Err(PhoneError::InvalidPhoneNumber);
    };

    if digits.len() < 8 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(PhoneError::InvalidPhoneNumber);
    }

    for plan in DIALING_PLANS {
        let code = plan.code.to_string();
        let Some(national) = digits.strip_prefix(code.as_str()) else {
            continue;
        };
        if national.len() != plan.national_len {
            return Err(PhoneError::InvalidPhoneNumber);
        }
        if let Some(required) = plan.leading {
            if !national.starts_with(required) {
                return Err(PhoneError::InvalidPhoneNumber);
            }
        }
        return Ok(NormalizedPhone {
            e164: format!("+{digits}"),
            country_code: plan.code,
        });
    }

    Err(PhoneError::InvalidPhoneNumber)
}
