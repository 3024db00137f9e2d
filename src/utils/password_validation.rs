use crate::utils::error::CustomError;

/// bcrypt silently truncates anything past 72 bytes.
const MAX_PASSWORD_BYTES: usize = 72;
const MIN_PASSWORD_LEN: usize = 8;

pub fn validate_password(password: &str) -> Result<(), CustomError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CustomError::BadRequestError(format!(
            "Password must be at least {} characters long.",
            MIN_PASSWORD_LEN
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(CustomError::BadRequestError(format!(
            "Password must not exceed {} bytes.",
            MAX_PASSWORD_BYTES
        )));
    }

    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_lowercase || !has_uppercase || !has_digit {
        return Err(CustomError::BadRequestError("Password must include at least one uppercase letter, one lowercase letter, and one number.".into()));
    }

    Ok(())
}

/// Deliberately loose: an `@` and a `.com` somewhere in the address.
pub fn is_valid_email(email: &str) -> bool {
    email.contains('@') && email.contains(".com")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_mixed_password() {
        assert!(validate_password("Passw0rdOk").is_ok());
    }

    #[test]
    fn length_counts_characters_but_caps_bytes() {
        let err = validate_password("Ab1").unwrap_err();
        assert!(err.to_string().contains("at least 8 characters"));

        // three ASCII plus 23 three-byte characters is exactly 72 bytes
        let wide = format!("Ab1{}", "€".repeat(23));
        assert_eq!(wide.len(), 72);
        assert!(validate_password(&wide).is_ok());

        let too_wide = format!("{}€", wide);
        let err = validate_password(&too_wide).unwrap_err();
        assert!(err.to_string().contains("72 bytes"));
    }

    #[test]
    fn rejects_short_or_uniform_passwords() {
        assert!(validate_password("Ab1").is_err());
        assert!(validate_password("alllowercase1").is_err());
        assert!(validate_password("ALLUPPERCASE1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
        assert!(validate_password(&format!("Aa1{}", "x".repeat(80))).is_err());
    }

    #[test]
    fn email_shape_is_naive() {
        assert!(is_valid_email("jane@example.com"));
        assert!(!is_valid_email("jane.example.com"));
        assert!(!is_valid_email("jane@example.org"));
    }
}
