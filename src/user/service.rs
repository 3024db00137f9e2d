use std::collections::HashMap;

use chrono::{Duration, Utc};
use futures_util::TryStreamExt;
use log::{info, warn};
use mongodb::bson::{Document, doc, oid::ObjectId, to_bson};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::config::AuthConfig;
use crate::middleware::auth::{TokenPair, create_token_pair, decode_refresh_token};
use crate::user::model::{AuthorSummary, ChangePasswordRequest, User, validate_new_password};
use crate::utils::email::EmailService;
use crate::utils::error::CustomError;
use crate::utils::hashing;
use crate::utils::helpers::{
    RESET_TOKEN_EXPIRATION_MINUTES, generate_otp_code, hash_token, timestamp,
};
use crate::utils::model::LoginRequests;

pub const USERS_COLLECTION: &str = "users";

/// MongoDB's duplicate key error code.
const DUPLICATE_KEY: i32 = 11000;

pub fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY
    )
}

/// Same message for unknown, used, and expired reset tokens.
pub const INVALID_RESET_TOKEN: &str = "Token is invalid or has expired";

/// Filter matching any of the supplied login identifiers.
pub fn identity_filter(username: Option<&str>, email: Option<&str>) -> Option<Document> {
    let mut clauses = Vec::new();
    if let Some(username) = username {
        clauses.push(doc! { "username": username });
    }
    if let Some(email) = email {
        clauses.push(doc! { "email": email });
    }
    if clauses.is_empty() {
        None
    } else {
        Some(doc! { "$or": clauses })
    }
}

/// Look up the author summaries for a set of account ids.
pub async fn load_authors(
    users: &Collection<User>,
    ids: &[ObjectId],
) -> Result<HashMap<ObjectId, AuthorSummary>, CustomError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let found: Vec<User> = users
        .find(doc! { "_id": { "$in": ids.to_vec() } })
        .await?
        .try_collect()
        .await?;

    Ok(found
        .iter()
        .filter_map(|u| u.id.map(|id| (id, AuthorSummary::from(u))))
        .collect())
}

pub struct UserService {
    collection: Collection<User>,
}

impl UserService {
    pub fn new(db: &Database) -> Self {
        UserService {
            collection: db.collection::<User>(USERS_COLLECTION),
        }
    }

    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>, CustomError> {
        Ok(self.collection.find_one(doc! { "_id": *id }).await?)
    }

    pub async fn get_by_id(&self, id: &ObjectId) -> Result<User, CustomError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))
    }

    /// Reject the registration if the username or email is taken.
    pub async fn ensure_available(&self, username: &str, email: &str) -> Result<(), CustomError> {
        let filter = identity_filter(Some(username), Some(email)).unwrap_or_default();
        if self.collection.count_documents(filter).await? > 0 {
            return Err(CustomError::ConflictError(
                "User with this username or email already exists".to_string(),
            ));
        }
        Ok(())
    }

    /// Hash the password and persist a new account.
    pub async fn create_user(&self, mut user: User) -> Result<User, CustomError> {
        user.password = hashing::hash_password(&user.password)?;

        let result = self.collection.insert_one(&user).await.map_err(|e| {
            if is_duplicate_key(&e) {
                CustomError::ConflictError(
                    "User with this username or email already exists".to_string(),
                )
            } else {
                e.into()
            }
        })?;

        let user_id = result.inserted_id.as_object_id().ok_or_else(|| {
            CustomError::InternalServerError("Failed to get inserted ID".to_string())
        })?;

        info!("Registered user {} ({})", user.username, user_id);
        Ok(user.with_id(user_id))
    }

    pub async fn authenticate_user(&self, login: &LoginRequests) -> Result<User, CustomError> {
        let (username, email) = login.identifiers();
        let filter = identity_filter(username.as_deref(), email.as_deref()).ok_or_else(|| {
            CustomError::ValidationError("Username or email is required".to_string())
        })?;
        if login.password.is_empty() {
            return Err(CustomError::ValidationError(
                "Password is required".to_string(),
            ));
        }

        let user = self
            .collection
            .find_one(filter)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("User does not exist".to_string()))?;

        if !hashing::verify_password(&login.password, &user.password)? {
            return Err(CustomError::UnauthorizedError(
                "Invalid user credentials".to_string(),
            ));
        }

        Ok(user)
    }

    async fn issue_tokens(&self, user: &User, config: &AuthConfig) -> Result<TokenPair, CustomError> {
        let pair = create_token_pair(user, config)?;
        self.collection
            .update_one(
                doc! { "_id": user.id },
                doc! { "$set": { "refreshToken": pair.refresh_token.clone(), "updatedAt": timestamp() } },
            )
            .await?;
        Ok(pair)
    }

    pub async fn login_fn(
        &self,
        login_data: &LoginRequests,
        config: &AuthConfig,
    ) -> Result<(User, TokenPair), CustomError> {
        let user = self.authenticate_user(login_data).await?;
        let pair = self.issue_tokens(&user, config).await?;
        Ok((user, pair))
    }

    /// Rotate the token pair; the presented refresh token must be the stored one.
    pub async fn refresh_tokens(
        &self,
        incoming: &str,
        config: &AuthConfig,
    ) -> Result<(User, TokenPair), CustomError> {
        let claims = decode_refresh_token(incoming, config)?;
        let user_id = ObjectId::parse_str(&claims.id)
            .map_err(|_| CustomError::UnauthorizedError("Invalid refresh token".to_string()))?;

        let user = self
            .find_by_id(&user_id)
            .await?
            .ok_or_else(|| CustomError::UnauthorizedError("Invalid refresh token".to_string()))?;

        if user.refresh_token.as_deref() != Some(incoming) {
            return Err(CustomError::UnauthorizedError(
                "Refresh token is expired or used".to_string(),
            ));
        }

        let pair = self.issue_tokens(&user, config).await?;
        Ok((user, pair))
    }

    pub async fn logout(&self, user_id: &ObjectId) -> Result<(), CustomError> {
        self.collection
            .update_one(
                doc! { "_id": *user_id },
                doc! { "$unset": { "refreshToken": 1 }, "$set": { "updatedAt": timestamp() } },
            )
            .await?;
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: &ObjectId,
        req: &ChangePasswordRequest,
    ) -> Result<(), CustomError> {
        if req.old_password.is_empty() {
            return Err(CustomError::ValidationError(
                "Old password is required".to_string(),
            ));
        }
        validate_new_password(&req.new_password, &req.confirm_password)?;

        let user = self.get_by_id(user_id).await?;
        if !hashing::verify_password(&req.old_password, &user.password)? {
            return Err(CustomError::BadRequestError(
                "Invalid old password".to_string(),
            ));
        }

        self.set_password(user_id, &req.new_password).await
    }

    async fn set_password(&self, user_id: &ObjectId, password: &str) -> Result<(), CustomError> {
        let hashed = hashing::hash_password(password)?;
        self.collection
            .update_one(
                doc! { "_id": *user_id },
                doc! {
                    "$set": { "password": hashed, "updatedAt": timestamp() },
                    "$unset": { "passwordResetToken": 1, "passwordResetExpires": 1 },
                },
            )
            .await?;
        Ok(())
    }

    pub async fn update_account_details(
        &self,
        user_id: &ObjectId,
        full_name: String,
        email: String,
    ) -> Result<User, CustomError> {
        let taken = self
            .collection
            .count_documents(doc! { "email": email.as_str(), "_id": { "$ne": *user_id } })
            .await?;
        if taken > 0 {
            return Err(CustomError::ConflictError(
                "Email is already in use".to_string(),
            ));
        }

        self.update_fields(user_id, doc! { "fullName": full_name, "email": email })
            .await
    }

    /// Replace an image field, returning the updated account and the previous URL.
    pub async fn replace_image(
        &self,
        user_id: &ObjectId,
        field: ImageField,
        url: String,
    ) -> Result<(User, Option<String>), CustomError> {
        let previous = self.get_by_id(user_id).await?;
        let old_url = match field {
            ImageField::Avatar => Some(previous.avatar),
            ImageField::CoverImage => previous.cover_image,
        };
        let mut set = Document::new();
        set.insert(field.key(), url);
        let updated = self.update_fields(user_id, set).await?;
        Ok((updated, old_url))
    }

    async fn update_fields(&self, user_id: &ObjectId, mut set: Document) -> Result<User, CustomError> {
        set.insert("updatedAt", timestamp());
        self.collection
            .find_one_and_update(doc! { "_id": *user_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    CustomError::ConflictError("Email is already in use".to_string())
                } else {
                    e.into()
                }
            })?
            .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User, CustomError> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(CustomError::ValidationError(
                "Username is required".to_string(),
            ));
        }
        self.collection
            .find_one(doc! { "username": username })
            .await?
            .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))
    }

    /// Remove the account after re-checking its password.
    pub async fn delete_account(&self, user_id: &ObjectId, password: &str) -> Result<User, CustomError> {
        if password.is_empty() {
            return Err(CustomError::ValidationError(
                "Password is required to delete the account".to_string(),
            ));
        }
        let user = self.get_by_id(user_id).await?;
        if !hashing::verify_password(password, &user.password)? {
            return Err(CustomError::UnauthorizedError(
                "Incorrect password".to_string(),
            ));
        }

        self.collection.delete_one(doc! { "_id": *user_id }).await?;
        info!("Deleted account {}", user.username);
        Ok(user)
    }

    pub async fn list_all(&self) -> Result<Vec<User>, CustomError> {
        let users = self
            .collection
            .find(doc! {})
            .sort(doc! { "_id": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(users)
    }

    /// Store a hashed 6-digit code and mail the plaintext; roll back if mail fails.
    pub async fn forgot_password(&self, email: &str, mailer: &EmailService) -> Result<(), CustomError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(CustomError::ValidationError("Email is required".to_string()));
        }

        let user = self
            .collection
            .find_one(doc! { "email": email.as_str() })
            .await?
            .ok_or_else(|| {
                CustomError::NotFoundError("No account found with that email".to_string())
            })?;

        let code = generate_otp_code();
        let expires = Utc::now() + Duration::minutes(RESET_TOKEN_EXPIRATION_MINUTES);
        let expires = to_bson(&expires)
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        self.collection
            .update_one(
                doc! { "_id": user.id },
                doc! { "$set": {
                    "passwordResetToken": hash_token(&code),
                    "passwordResetExpires": expires,
                } },
            )
            .await?;

        if let Err(e) = mailer.send_password_reset_email(&user.email, &code).await {
            self.collection
                .update_one(
                    doc! { "_id": user.id },
                    doc! { "$unset": { "passwordResetToken": 1, "passwordResetExpires": 1 } },
                )
                .await?;
            return Err(CustomError::InternalServerError(format!(
                "There was an error sending the email: {}",
                e
            )));
        }

        Ok(())
    }

    /// Consume a reset code; the fields are cleared so it cannot be replayed.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
        mailer: &EmailService,
    ) -> Result<(), CustomError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CustomError::BadRequestError(INVALID_RESET_TOKEN.to_string()));
        }
        validate_new_password(new_password, confirm_password)?;

        // codes are short, so several accounts may hold the same hash
        let now = Utc::now();
        let candidates: Vec<User> = self
            .collection
            .find(doc! { "passwordResetToken": hash_token(token) })
            .await?
            .try_collect()
            .await?;
        let user = candidates
            .into_iter()
            .find(|u| u.reset_window_open(now))
            .ok_or_else(|| CustomError::BadRequestError(INVALID_RESET_TOKEN.to_string()))?;

        let user_id = user
            .id
            .ok_or_else(|| CustomError::InternalServerError("User ID missing".to_string()))?;
        self.set_password(&user_id, new_password).await?;

        if let Err(e) = mailer
            .send_password_changed_email(&user.email, &user.full_name)
            .await
        {
            warn!("Password reset confirmation for {} not sent: {}", user.email, e);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ImageField {
    Avatar,
    CoverImage,
}

impl ImageField {
    pub fn key(self) -> &'static str {
        match self {
            ImageField::Avatar => "avatar",
            ImageField::CoverImage => "coverImage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_access_token;
    use crate::test_support::{test_auth_config, test_database, test_email_config};

    #[test]
    fn identity_filter_uses_supplied_identifiers() {
        assert_eq!(identity_filter(None, None), None);
        assert_eq!(
            identity_filter(Some("jane"), None).unwrap(),
            doc! { "$or": [ { "username": "jane" } ] }
        );
        assert_eq!(
            identity_filter(Some("jane"), Some("jane@example.com")).unwrap(),
            doc! { "$or": [ { "username": "jane" }, { "email": "jane@example.com" } ] }
        );
    }

    #[test]
    fn image_fields_map_to_stored_keys() {
        assert_eq!(ImageField::Avatar.key(), "avatar");
        assert_eq!(ImageField::CoverImage.key(), "coverImage");
    }

    async fn registered(service: &UserService) -> User {
        service
            .create_user(User::new(
                "Jane Doe".into(),
                format!("jane{}", ObjectId::new().to_hex()),
                format!("jane{}@example.com", ObjectId::new().to_hex()),
                "Passw0rdOk".into(),
                "https://cdn/a.png".into(),
                None,
            ))
            .await
            .unwrap()
    }

    #[actix_web::test]
    #[ignore = "needs TEST_MONGODB_URI"]
    async fn stored_password_is_hashed_and_wrong_password_issues_nothing() {
        let service = UserService::new(&test_database().await);
        let user = registered(&service).await;
        let stored = service.get_by_id(&user.id.unwrap()).await.unwrap();
        assert_ne!(stored.password, "Passw0rdOk");
        assert!(hashing::verify_password("Passw0rdOk", &stored.password).unwrap());

        let login = LoginRequests {
            username: Some(user.username.clone()),
            email: None,
            password: "WrongPass1".into(),
        };
        let err = service
            .login_fn(&login, &test_auth_config())
            .await
            .unwrap_err();
        assert!(matches!(err, CustomError::UnauthorizedError(_)));
        let stored = service.get_by_id(&user.id.unwrap()).await.unwrap();
        assert!(stored.refresh_token.is_none());
    }

    #[actix_web::test]
    #[ignore = "needs TEST_MONGODB_URI"]
    async fn login_issues_a_pair_and_stores_the_refresh_token() {
        let service = UserService::new(&test_database().await);
        let config = test_auth_config();
        let user = registered(&service).await;
        let id = user.id.unwrap();

        let login = LoginRequests {
            username: None,
            email: Some(user.email.clone()),
            password: "Passw0rdOk".into(),
        };
        let (logged_in, pair) = service.login_fn(&login, &config).await.unwrap();
        assert_eq!(logged_in.id, Some(id));

        let access = decode_access_token(&pair.access_token, &config).unwrap();
        assert_eq!(access.id, id.to_hex());
        let lifetime = access.exp as i64 - Utc::now().timestamp();
        assert!(lifetime > 0 && lifetime <= config.access_token_expiry_secs);

        let refresh = decode_refresh_token(&pair.refresh_token, &config).unwrap();
        assert_eq!(refresh.id, id.to_hex());

        let stored = service.get_by_id(&id).await.unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(pair.refresh_token.as_str()));
    }

    #[actix_web::test]
    #[ignore = "needs TEST_MONGODB_URI"]
    async fn shared_code_resets_the_account_whose_window_is_open() {
        let service = UserService::new(&test_database().await);
        let mailer = EmailService::with_config(test_email_config());
        let stale = registered(&service).await;
        let fresh = registered(&service).await;

        for (user, expires) in [
            (&stale, Utc::now() - Duration::minutes(1)),
            (&fresh, Utc::now() + Duration::minutes(10)),
        ] {
            service
                .collection
                .update_one(
                    doc! { "_id": user.id.unwrap() },
                    doc! { "$set": { "passwordResetToken": hash_token("424242"), "passwordResetExpires": to_bson(&expires).unwrap() } },
                )
                .await
                .unwrap();
        }

        service
            .reset_password("424242", "NewPassw0rd", "NewPassw0rd", &mailer)
            .await
            .unwrap();

        let fresh = service.get_by_id(&fresh.id.unwrap()).await.unwrap();
        assert!(hashing::verify_password("NewPassw0rd", &fresh.password).unwrap());
        let stale = service.get_by_id(&stale.id.unwrap()).await.unwrap();
        assert!(hashing::verify_password("Passw0rdOk", &stale.password).unwrap());
    }

    #[actix_web::test]
    #[ignore = "needs TEST_MONGODB_URI"]
    async fn reset_code_works_exactly_once() {
        let service = UserService::new(&test_database().await);
        let mailer = EmailService::with_config(test_email_config());
        let user = registered(&service).await;
        let id = user.id.unwrap();

        let expires = to_bson(&(Utc::now() + Duration::minutes(10))).unwrap();
        service
            .collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "passwordResetToken": hash_token("123456"), "passwordResetExpires": expires } },
            )
            .await
            .unwrap();

        service
            .reset_password("123456", "NewPassw0rd", "NewPassw0rd", &mailer)
            .await
            .unwrap();
        let reused = service
            .reset_password("123456", "OtherPassw0rd", "OtherPassw0rd", &mailer)
            .await
            .unwrap_err();
        assert_eq!(reused.to_string(), format!("Bad Request: {}", INVALID_RESET_TOKEN));

        let stored = service.get_by_id(&id).await.unwrap();
        assert!(hashing::verify_password("NewPassw0rd", &stored.password).unwrap());
        assert!(stored.password_reset_token.is_none());
    }

    #[actix_web::test]
    #[ignore = "needs TEST_MONGODB_URI"]
    async fn expired_code_gives_the_same_error() {
        let service = UserService::new(&test_database().await);
        let mailer = EmailService::with_config(test_email_config());
        let user = registered(&service).await;

        let expired = to_bson(&(Utc::now() - Duration::minutes(1))).unwrap();
        service
            .collection
            .update_one(
                doc! { "_id": user.id.unwrap() },
                doc! { "$set": { "passwordResetToken": hash_token("654321"), "passwordResetExpires": expired } },
            )
            .await
            .unwrap();

        let err = service
            .reset_password("654321", "NewPassw0rd", "NewPassw0rd", &mailer)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), format!("Bad Request: {}", INVALID_RESET_TOKEN));
    }
}
