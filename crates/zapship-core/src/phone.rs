//! Brazilian mobile number canonicalization.
//!
//! Every phone stored or looked up by the system goes through
//! [`normalize_phone`] so that one contact always maps to one row. Canonical
//! form is `55` + two-digit area code + nine-digit mobile (`55DDD9XXXXXXXX`).

/// Normalizes a raw phone string to the canonical `55DDD9XXXXXXXX` form.
///
/// Returns `None` when the input cannot be a valid Brazilian mobile number.
/// Eight-digit locals with a mobile prefix (6-9) get the ninth digit inserted.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    if let Some(rest) = digits.strip_prefix("55") {
        digits = rest.to_string();
    }

    // A local number is area code (2) + 8 or 9 digits.
    if digits.len() < 10 || digits.len() > 11 {
        return None;
    }

    let (area, local) = digits.split_at(2);
    let mut local = local.to_string();

    if local.len() == 8 && matches!(local.as_bytes()[0], b'6'..=b'9') {
        local.insert(0, '9');
    }

    if local.len() != 9 {
        return None;
    }

    Some(format!("55{}{}", area, local))
}
