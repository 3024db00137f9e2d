use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::uploader::form::FormInput;
use crate::utils::error::CustomError;
use crate::utils::password_validation::{is_valid_email, validate_password};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh account; `password` must already be hashed.
    pub fn new(
        full_name: String,
        username: String,
        email: String,
        password: String,
        avatar: String,
        cover_image: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            username,
            email,
            full_name,
            avatar,
            cover_image,
            password,
            refresh_token: None,
            password_reset_token: None,
            password_reset_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    /// Whether a stored reset token is still usable at `now`.
    pub fn reset_window_open(&self, now: DateTime<Utc>) -> bool {
        self.password_reset_token.is_some()
            && self.password_reset_expires.is_some_and(|expires| expires > now)
    }
}

/// Account as returned to clients: no credential or token fields.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar: user.avatar,
            cover_image: user.cover_image.unwrap_or_default(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// The slice of an account embedded in posts and comments.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: user.username.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// Validated registration fields; files are handled by the controller.
#[derive(Debug)]
pub struct RegisterInput {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn from_form(form: &FormInput) -> Result<Self, CustomError> {
        let (Some(full_name), Some(username), Some(email), Some(password)) = (
            form.non_empty("fullName"),
            form.non_empty("username"),
            form.non_empty("email"),
            form.text("password").filter(|p| !p.trim().is_empty()),
        ) else {
            return Err(CustomError::ValidationError(
                "All fields are required".to_string(),
            ));
        };

        if !is_valid_email(&email) {
            return Err(CustomError::ValidationError(
                "Please enter a valid email".to_string(),
            ));
        }
        validate_password(password)?;

        Ok(Self {
            full_name,
            username: username.to_lowercase(),
            email: email.to_lowercase(),
            password: password.to_string(),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccountRequest {
    pub full_name: String,
    pub email: String,
}

impl UpdateAccountRequest {
    /// Trimmed `(full_name, email)` once both are present and the email looks valid.
    pub fn validate(&self) -> Result<(String, String), CustomError> {
        let full_name = self.full_name.trim();
        let email = self.email.trim().to_lowercase();
        if full_name.is_empty() || email.is_empty() {
            return Err(CustomError::ValidationError(
                "Full name and email are required".to_string(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(CustomError::ValidationError(
                "Please enter a valid email".to_string(),
            ));
        }
        Ok((full_name.to_string(), email))
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetPasswordRequest {
    pub new_password: String,
    pub confirm_password: String,
}

/// Shared by change-password and reset-password.
pub fn validate_new_password(new_password: &str, confirm_password: &str) -> Result<(), CustomError> {
    if new_password.is_empty() || confirm_password.is_empty() {
        return Err(CustomError::ValidationError(
            "New password and confirmation are required".to_string(),
        ));
    }
    if new_password != confirm_password {
        return Err(CustomError::ValidationError(
            "New password and confirm password do not match".to_string(),
        ));
    }
    validate_password(new_password)
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DeleteAccountRequest {
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn stored_user() -> User {
        let mut user = User::new(
            "Jane Doe".into(),
            "jane".into(),
            "jane@example.com".into(),
            "$2b$10$abcdefghijklmnopqrstuv".into(),
            "https://cdn/a.png".into(),
            None,
        )
        .with_id(ObjectId::new());
        user.refresh_token = Some("refresh".into());
        user.password_reset_token = Some("deadbeef".into());
        user
    }

    #[test]
    fn response_never_carries_credentials() {
        let json = serde_json::to_value(UserResponse::from(stored_user())).unwrap();
        let obj = json.as_object().unwrap();
        for key in ["password", "refreshToken", "passwordResetToken", "passwordResetExpires"] {
            assert!(!obj.contains_key(key), "{} leaked", key);
        }
        assert_eq!(obj["fullName"], "Jane Doe");
        assert_eq!(obj["coverImage"], "");
        assert_eq!(obj["_id"].as_str().unwrap().len(), 24);
    }

    #[test]
    fn stored_document_uses_camel_case() {
        let doc = mongodb::bson::to_document(&stored_user()).unwrap();
        assert!(doc.contains_key("fullName"));
        assert!(doc.contains_key("refreshToken"));
        assert!(!doc.contains_key("coverImage"));
    }

    #[test]
    fn reset_window_respects_expiry() {
        let mut user = stored_user();
        let now = Utc::now();
        user.password_reset_expires = Some(now + Duration::minutes(10));
        assert!(user.reset_window_open(now));

        user.password_reset_expires = Some(now - Duration::seconds(1));
        assert!(!user.reset_window_open(now));

        user.password_reset_token = None;
        user.password_reset_expires = Some(now + Duration::minutes(10));
        assert!(!user.reset_window_open(now));
    }

    #[test]
    fn new_password_must_match_and_follow_policy() {
        assert!(validate_new_password("Passw0rdOk", "Passw0rdOk").is_ok());
        assert!(validate_new_password("Passw0rdOk", "Passw0rdNo").is_err());
        assert!(validate_new_password("", "").is_err());
        assert!(validate_new_password("short", "short").is_err());
    }

    fn registration_form() -> FormInput {
        FormInput::default()
            .with_field("fullName", " Jane Doe ")
            .with_field("username", "JaneD")
            .with_field("email", "Jane@Example.com")
            .with_field("password", "Passw0rdOk")
    }

    #[test]
    fn registration_normalises_identity_fields() {
        let input = RegisterInput::from_form(&registration_form()).unwrap();
        assert_eq!(input.full_name, "Jane Doe");
        assert_eq!(input.username, "janed");
        assert_eq!(input.email, "jane@example.com");
        assert_eq!(input.password, "Passw0rdOk");
    }

    #[test]
    fn registration_rejects_blank_fields_and_bad_email() {
        let blank = registration_form().with_field("username", "   ");
        assert!(matches!(
            RegisterInput::from_form(&blank),
            Err(CustomError::ValidationError(_))
        ));

        let bad_email = registration_form().with_field("email", "jane@example.org");
        let err = RegisterInput::from_form(&bad_email).unwrap_err();
        assert!(err.to_string().contains("valid email"));
    }

    #[test]
    fn account_update_requires_both_fields() {
        let req = UpdateAccountRequest {
            full_name: "  Jane  ".into(),
            email: "Jane@Example.com".into(),
        };
        assert_eq!(
            req.validate().unwrap(),
            ("Jane".to_string(), "jane@example.com".to_string())
        );

        let missing = UpdateAccountRequest {
            full_name: "".into(),
            email: "jane@example.com".into(),
        };
        assert!(missing.validate().is_err());
    }
}
