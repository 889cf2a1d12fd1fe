//! Mobile number normalisation and OTP code shape checks.

use std::sync::LazyLock;

use regex::Regex;

use super::AuthError;

/// Number of digits in an OTP code.
pub const OTP_LENGTH: usize = 6;

/// Canonical mobile number: ten digits, leading 6–9.
static MOBILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[6-9][0-9]{9}$").expect("valid mobile regex"));

/// Reduce user input to the canonical 10-digit form.
///
/// Separators are dropped, as is a `91` country prefix on 12-digit input and
/// a trunk `0` on 11-digit input.
pub fn normalize_phone(raw: &str) -> Result<String, AuthError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let canonical = match digits.len() {
        12 if digits.starts_with("91") => &digits[2..],
        11 if digits.starts_with('0') => &digits[1..],
        _ => digits.as_str(),
    };
    if MOBILE_PATTERN.is_match(canonical) {
        Ok(canonical.to_string())
    } else {
        Err(AuthError::Validation(
            "Please provide a valid 10-digit mobile number".into(),
        ))
    }
}

/// Reject anything that is not exactly `OTP_LENGTH` ASCII digits.
pub fn validate_otp_format(code: &str) -> Result<(), AuthError> {
    if code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AuthError::Validation(format!(
            "OTP must be a {OTP_LENGTH}-digit number"
        )))
    }
}

/// Mask all but the last four digits for logging.
pub fn mask_phone(phone: &str) -> String {
    let keep = phone.len().saturating_sub(4);
    format!("{}{}", "*".repeat(keep), &phone[keep..])
}

/// Default display name for an auto-provisioned client.
pub fn default_client_name(phone: &str) -> String {
    let keep = phone.len().saturating_sub(4);
    format!("Client {}", &phone[keep..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ten_digits_pass_through() {
        assert_eq!(normalize_phone("9876543210").unwrap(), "9876543210");
    }

    #[test]
    fn separators_and_prefixes_are_stripped() {
        assert_eq!(normalize_phone("+91 98765-43210").unwrap(), "9876543210");
        assert_eq!(normalize_phone("09876543210").unwrap(), "9876543210");
        assert_eq!(normalize_phone("(987) 654 3210").unwrap(), "9876543210");
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        for bad in ["", "12345", "1234567890", "98765432101234", "abcdefghij"] {
            assert!(
                matches!(normalize_phone(bad), Err(AuthError::Validation(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn otp_format_requires_six_digits() {
        assert!(validate_otp_format("123456").is_ok());
        assert!(validate_otp_format("12345").is_err());
        assert!(validate_otp_format("1234567").is_err());
        assert!(validate_otp_format("12a456").is_err());
        assert!(validate_otp_format("１２３４５６").is_err());
    }

    #[test]
    fn masking_keeps_last_four() {
        assert_eq!(mask_phone("9876543210"), "******3210");
        assert_eq!(mask_phone("12"), "12");
    }

    #[test]
    fn default_name_uses_last_four() {
        assert_eq!(default_client_name("9876543210"), "Client 3210");
    }
}
