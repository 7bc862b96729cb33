use chrono::NaiveDate;
use validator::{Validate, ValidateEmail};

pub fn validate<T: Validate>(val: &T) -> Result<(), validator::ValidationErrors> {
    val.validate()
}

pub fn is_valid_email(email: &str) -> bool {
    email.validate_email()
}

/// Lower-cases and trims an email so lookups and uniqueness are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalizes a Swedish-style personal number to `yyyyMMdd-xxxx`.
///
/// Accepts the twelve digits with or without the hyphen; the first eight must
/// form a real calendar date.
pub fn normalize_personal_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = match trimmed.len() {
        12 => trimmed.to_string(),
        13 if trimmed.as_bytes().get(8) == Some(&b'-') => trimmed.replacen('-', "", 1),
        _ => return None,
    };
    if digits.len() != 12 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (date, serial) = digits.split_at(8);
    NaiveDate::parse_from_str(date, "%Y%m%d").ok()?;
    Some(format!("{}-{}", date, serial))
}

/// Returns the trimmed value, or `None` when absent or blank.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
