use bcrypt::{hash, verify};

/// Work factor for stored credentials.
pub const HASH_COST: u32 = 10;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, HASH_COST)
}

pub fn verify_password(password: &str, hashed: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hashed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_never_contains_plaintext() {
        let hashed = hash_password("Secret123").unwrap();
        assert!(!hashed.contains("Secret123"));
        assert!(verify_password("Secret123", &hashed).unwrap());
        assert!(!verify_password("Secret124", &hashed).unwrap());
    }
}
