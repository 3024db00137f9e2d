use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::utils::helpers::{is_production, service_name};

#[derive(Debug, Error)]
pub enum CustomError {
    #[error("Unauthorized: {0}")]
    UnauthorizedError(String),

    #[error("Bad Request: {0}")]
    BadRequestError(String),

    #[error("Conflict: {0}")]
    ConflictError(String),

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Unauthenticated: {0}")]
    UnauthenticatedError(String),

    #[error("Forbidden: {0}")]
    ForbiddenError(String),

    #[error("Not Found: {0}")]
    NotFoundError(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),
}

impl CustomError {
    pub fn kind(&self) -> &'static str {
        match self {
            CustomError::UnauthorizedError(..) => "UNAUTHORIZED_ERROR",
            CustomError::BadRequestError(..) => "BAD_REQUEST_ERROR",
            CustomError::ConflictError(..) => "CONFLICT_ERROR",
            CustomError::InternalServerError(..) => "INTERNAL_SERVER_ERROR",
            CustomError::UnauthenticatedError(..) => "UNAUTHENTICATED_ERROR",
            CustomError::ForbiddenError(..) => "FORBIDDEN_ERROR",
            CustomError::NotFoundError(..) => "NOT_FOUND_ERROR",
            CustomError::ValidationError(..) => "VALIDATION_ERROR",
        }
    }
}

impl From<mongodb::error::Error> for CustomError {
    fn from(e: mongodb::error::Error) -> Self {
        CustomError::InternalServerError(format!("Database error: {}", e))
    }
}

impl From<bcrypt::BcryptError> for CustomError {
    fn from(e: bcrypt::BcryptError) -> Self {
        CustomError::InternalServerError(format!("Password hashing failed: {}", e))
    }
}

impl From<jsonwebtoken::errors::Error> for CustomError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        CustomError::UnauthorizedError(format!("Invalid token: {}", e))
    }
}

impl ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match *self {
            CustomError::UnauthorizedError(..) => StatusCode::UNAUTHORIZED,
            CustomError::BadRequestError(..) => StatusCode::BAD_REQUEST,
            CustomError::ConflictError(..) => StatusCode::CONFLICT,
            CustomError::InternalServerError(..) => StatusCode::INTERNAL_SERVER_ERROR,
            CustomError::UnauthenticatedError(..) => StatusCode::UNAUTHORIZED,
            CustomError::ForbiddenError(..) => StatusCode::FORBIDDEN,
            CustomError::NotFoundError(..) => StatusCode::NOT_FOUND,
            CustomError::ValidationError(..) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let CustomError::InternalServerError(msg) = self {
            log::error!("{}", msg);
        }

        let mut body = json!({
            "success": false,
            "message": self.to_string(),
            "httpStatusCode": self.status_code().as_u16(),
            "error": self.kind(),
            "service": service_name(),
        });

        if !is_production() {
            body["stack"] = json!(format!("{:?}", self));
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}
