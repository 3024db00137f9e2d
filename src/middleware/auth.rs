use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use actix_web::{Error, HttpMessage, HttpRequest, dev::ServiceRequest, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::user::model::User;
use crate::utils::error::CustomError;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Access-token payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub exp: usize,
}

/// Refresh tokens only carry the account id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub id: String,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn expiry(seconds: i64) -> Result<usize, CustomError> {
    chrono::Utc::now()
        .checked_add_signed(chrono::Duration::seconds(seconds))
        .map(|t| t.timestamp() as usize)
        .ok_or_else(|| CustomError::InternalServerError("Token expiry overflow".to_string()))
}

pub fn create_access_token(user: &User, config: &AuthConfig) -> Result<String, CustomError> {
    let id = user
        .id
        .ok_or_else(|| CustomError::InternalServerError("User ID missing".to_string()))?;
    let claims = Claims {
        id: id.to_hex(),
        email: user.email.clone(),
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        exp: expiry(config.access_token_expiry_secs)?,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_token_secret.as_bytes()),
    )
    .map_err(|_| CustomError::InternalServerError("Token generation failed".to_string()))
}

pub fn create_refresh_token(user_id: &ObjectId, config: &AuthConfig) -> Result<String, CustomError> {
    let claims = RefreshClaims {
        id: user_id.to_hex(),
        exp: expiry(config.refresh_token_expiry_secs)?,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
    )
    .map_err(|_| CustomError::InternalServerError("Token generation failed".to_string()))
}

pub fn create_token_pair(user: &User, config: &AuthConfig) -> Result<TokenPair, CustomError> {
    let id = user
        .id
        .ok_or_else(|| CustomError::InternalServerError("User ID missing".to_string()))?;
    Ok(TokenPair {
        access_token: create_access_token(user, config)?,
        refresh_token: create_refresh_token(&id, config)?,
    })
}

pub fn decode_access_token(token: &str, config: &AuthConfig) -> Result<Claims, CustomError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.access_token_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| CustomError::UnauthorizedError("Invalid access token".to_string()))?;
    Ok(data.claims)
}

pub fn decode_refresh_token(token: &str, config: &AuthConfig) -> Result<RefreshClaims, CustomError> {
    let data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| CustomError::UnauthorizedError("Invalid refresh token".to_string()))?;
    Ok(data.claims)
}

/// Route guard: accepts `Authorization: Bearer` or the `accessToken` cookie.
pub async fn verify_token(
    req: ServiceRequest,
    credentials: Option<BearerAuth>,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let token = credentials
        .map(|c| c.token().to_string())
        .or_else(|| req.cookie(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string()))
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return Err((
            CustomError::UnauthorizedError("Unauthorized request".to_string()).into(),
            req,
        ));
    };

    let Some(config) = req.app_data::<web::Data<AuthConfig>>().cloned() else {
        return Err((
            CustomError::InternalServerError("Auth configuration missing".to_string()).into(),
            req,
        ));
    };

    match decode_access_token(&token, &config) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Err(e) => Err((e.into(), req)),
    }
}

/// Get user ID from request extensions (use after auth middleware)
pub fn get_user_id_from_request(req: &HttpRequest) -> Option<String> {
    req.extensions()
        .get::<Claims>()
        .map(|claims| claims.id.clone())
}

pub fn authenticated_user_id(req: &HttpRequest) -> Result<ObjectId, CustomError> {
    let raw = get_user_id_from_request(req)
        .ok_or_else(|| CustomError::UnauthenticatedError("Not authenticated".to_string()))?;
    ObjectId::parse_str(&raw)
        .map_err(|_| CustomError::UnauthorizedError("Invalid user id in token".to_string()))
}

pub fn auth_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(if secure { SameSite::None } else { SameSite::Lax })
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}

pub fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = auth_cookie(name, String::new(), 0, secure);
    cookie.make_removal();
    cookie
}
