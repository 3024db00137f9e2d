use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use chrono::{SecondsFormat, Utc};
use mongodb::bson::oid::ObjectId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::utils::error::CustomError;

/// Generate a 6-digit OTP code
pub fn generate_otp_code() -> String {
    let mut rng = rand::rng();
    let code: u32 = rng.random_range(100000..=999999);
    code.to_string()
}

/// Password reset token lifetime in minutes
pub const RESET_TOKEN_EXPIRATION_MINUTES: i64 = 10;

/// Hex-encoded SHA-256 of a token; only this form is ever persisted.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub fn service_name() -> String {
    std::env::var("SERVICE_NAME").unwrap_or_else(|_| "Unknown".to_string())
}

pub fn is_production() -> bool {
    std::env::var("APP_ENV")
        .map(|env| env.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

/// RFC 3339 timestamp in the same shape chrono's serde impl writes.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, CustomError> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| CustomError::BadRequestError(format!("Invalid {} ID", what)))
}

/// Wrap a payload in the success envelope.
pub fn api_response<T: Serialize>(status: StatusCode, data: T, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "success": true,
        "message": message,
        "httpStatusCode": status.as_u16(),
        "data": data,
    }))
}

pub const DEFAULT_PAGE_LIMIT: u64 = 10;
pub const MAX_PAGE_LIMIT: u64 = 100;
/// Keeps `skip()` within the store's signed 64-bit range.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_LIMIT;

#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1) * self.limit
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }

    pub fn has_next_page(&self, total: u64) -> bool {
        self.page.saturating_mul(self.limit) < total
    }

    pub fn has_prev_page(&self) -> bool {
        self.page > 1
    }
}

impl From<&PageQuery> for Pagination {
    fn from(query: &PageQuery) -> Self {
        Pagination::new(query.page, query.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..50 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn token_hash_is_stable_and_not_plaintext() {
        let hashed = hash_token("123456");
        assert_eq!(hashed.len(), 64);
        assert_eq!(hashed, hash_token("123456"));
        assert_ne!(hashed, hash_token("123457"));
        assert!(!hashed.contains("123456"));
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(Pagination::new(None, None), Pagination { page: 1, limit: 10 });
        assert_eq!(Pagination::new(Some(0), Some(0)), Pagination { page: 1, limit: 1 });
        assert_eq!(Pagination::new(Some(3), Some(500)).limit, MAX_PAGE_LIMIT);
    }

    #[test]
    fn pagination_math() {
        let p = Pagination::new(Some(2), Some(10));
        assert_eq!(p.skip(), 10);
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(21), 3);
        assert!(p.has_next_page(21));
        assert!(!p.has_next_page(20));
        assert!(p.has_prev_page());
        assert!(!Pagination::new(None, None).has_prev_page());
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let p = Pagination::new(Some(u64::MAX), Some(100));
        assert_eq!(p.page, MAX_PAGE);
        assert!(p.skip() <= i64::MAX as u64);
        assert!(!p.has_next_page(5));
        assert!(p.has_prev_page());
    }

    #[test]
    fn rejects_malformed_object_ids() {
        assert!(parse_object_id("nope", "post").is_err());
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "post").unwrap(), id);
    }
}
