use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

use crate::config::AuthConfig;
use crate::middleware::auth::{
    ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, TokenPair, auth_cookie, authenticated_user_id,
    removal_cookie,
};
use crate::post::post_service::PostService;
use crate::uploader::form::FormInput;
use crate::user::model::{
    ChangePasswordRequest, DeleteAccountRequest, ForgotPasswordRequest, RefreshTokenRequest,
    RegisterInput, ResetPasswordRequest, UpdateAccountRequest, User, UserResponse,
};
use crate::user::service::{ImageField, UserService};
use crate::utils::email::EmailService;
use crate::utils::error::CustomError;
use crate::utils::helpers::api_response;
use crate::utils::model::LoginRequests;
use crate::utils::uploads::{AVATAR_FOLDER, COVER_FOLDER, UploadService};

fn set_auth_cookies(
    res: &mut HttpResponse,
    pair: &TokenPair,
    config: &AuthConfig,
) -> Result<(), CustomError> {
    let cookies = [
        auth_cookie(
            ACCESS_TOKEN_COOKIE,
            pair.access_token.clone(),
            config.access_token_expiry_secs,
            config.secure_cookies,
        ),
        auth_cookie(
            REFRESH_TOKEN_COOKIE,
            pair.refresh_token.clone(),
            config.refresh_token_expiry_secs,
            config.secure_cookies,
        ),
    ];
    for cookie in &cookies {
        res.add_cookie(cookie)
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
    }
    Ok(())
}

fn clear_auth_cookies(res: &mut HttpResponse, config: &AuthConfig) -> Result<(), CustomError> {
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        res.add_cookie(&removal_cookie(name, config.secure_cookies))
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
    }
    Ok(())
}

/// POST /users/register (multipart: fullName, username, email, password, avatar, coverImage)
pub async fn register_user(
    req: HttpRequest,
    payload: web::Payload,
    user_service: web::Data<UserService>,
    upload_service: web::Data<UploadService>,
) -> Result<HttpResponse, CustomError> {
    let mut form = FormInput::from_request(&req, payload).await?;
    let input = RegisterInput::from_form(&form)?;

    user_service
        .ensure_available(&input.username, &input.email)
        .await?;

    let avatar_file = form
        .take_file("avatar")
        .ok_or_else(|| CustomError::ValidationError("Avatar file is required".to_string()))?;
    let avatar = upload_service
        .upload_image(avatar_file, AVATAR_FOLDER)
        .await
        .map_err(|e| CustomError::BadRequestError(format!("Avatar upload failed: {}", e)))?;

    let cover_image = match form.take_file("coverImage") {
        Some(file) => {
            let uploaded = upload_service
                .upload_image(file, COVER_FOLDER)
                .await
                .map_err(|e| {
                    CustomError::BadRequestError(format!("Cover image upload failed: {}", e))
                });
            Some(
                upload_service
                    .discard_on_error(uploaded, &[Some(avatar.as_str())])
                    .await?,
            )
        }
        None => None,
    };

    let created = user_service
        .create_user(User::new(
            input.full_name,
            input.username,
            input.email,
            input.password,
            avatar.clone(),
            cover_image.clone(),
        ))
        .await;
    let user = upload_service
        .discard_on_error(created, &[Some(avatar.as_str()), cover_image.as_deref()])
        .await?;

    Ok(api_response(
        StatusCode::OK,
        UserResponse::from(user),
        "User registered successfully",
    ))
}

/// POST /users/login
pub async fn login_user(
    user_service: web::Data<UserService>,
    auth_config: web::Data<AuthConfig>,
    login_info: web::Json<LoginRequests>,
) -> Result<HttpResponse, CustomError> {
    let (user, pair) = user_service.login_fn(&login_info, &auth_config).await?;

    let mut res = api_response(
        StatusCode::OK,
        json!({
            "user": UserResponse::from(user),
            "accessToken": pair.access_token,
            "refreshToken": pair.refresh_token,
        }),
        "User logged in successfully",
    );
    set_auth_cookies(&mut res, &pair, &auth_config)?;
    Ok(res)
}

/// POST /users/logout
pub async fn logout_user(
    req: HttpRequest,
    user_service: web::Data<UserService>,
    auth_config: web::Data<AuthConfig>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    user_service.logout(&user_id).await?;

    let mut res = api_response(StatusCode::OK, json!({}), "User logged out");
    clear_auth_cookies(&mut res, &auth_config)?;
    Ok(res)
}

/// POST /users/refresh-token (cookie or body `refreshToken`)
pub async fn refresh_access_token(
    req: HttpRequest,
    user_service: web::Data<UserService>,
    auth_config: web::Data<AuthConfig>,
    body: Option<web::Json<RefreshTokenRequest>>,
) -> Result<HttpResponse, CustomError> {
    let incoming = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CustomError::UnauthorizedError("Unauthorized request".to_string()))?;

    let (_, pair) = user_service.refresh_tokens(&incoming, &auth_config).await?;

    let mut res = api_response(
        StatusCode::OK,
        json!({
            "accessToken": pair.access_token,
            "refreshToken": pair.refresh_token,
        }),
        "Access token refreshed",
    );
    set_auth_cookies(&mut res, &pair, &auth_config)?;
    Ok(res)
}

/// POST /users/forgot-password
pub async fn forgot_password(
    user_service: web::Data<UserService>,
    email_service: web::Data<EmailService>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, CustomError> {
    user_service
        .forgot_password(&body.email, &email_service)
        .await?;

    Ok(api_response(
        StatusCode::OK,
        json!({}),
        "Password reset code sent to your email",
    ))
}

/// POST /users/reset-password/{token}
pub async fn reset_password(
    path: web::Path<String>,
    user_service: web::Data<UserService>,
    email_service: web::Data<EmailService>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, CustomError> {
    user_service
        .reset_password(
            &path,
            &body.new_password,
            &body.confirm_password,
            &email_service,
        )
        .await?;

    Ok(api_response(
        StatusCode::OK,
        json!({}),
        "Password has been reset successfully",
    ))
}

/// POST /users/change-password
pub async fn change_password(
    req: HttpRequest,
    user_service: web::Data<UserService>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    user_service.change_password(&user_id, &body).await?;

    Ok(api_response(
        StatusCode::OK,
        json!({}),
        "Password changed successfully",
    ))
}

/// GET /users/current-user
pub async fn get_current_user(
    req: HttpRequest,
    user_service: web::Data<UserService>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    let user = user_service.get_by_id(&user_id).await?;

    Ok(api_response(
        StatusCode::OK,
        UserResponse::from(user),
        "Current user fetched successfully",
    ))
}

/// PATCH /users/update-account-detail
pub async fn update_account_details(
    req: HttpRequest,
    user_service: web::Data<UserService>,
    body: web::Json<UpdateAccountRequest>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    let (full_name, email) = body.validate()?;
    let user = user_service
        .update_account_details(&user_id, full_name, email)
        .await?;

    Ok(api_response(
        StatusCode::OK,
        UserResponse::from(user),
        "Account details updated successfully",
    ))
}

async fn replace_user_image(
    req: HttpRequest,
    payload: web::Payload,
    user_service: web::Data<UserService>,
    upload_service: web::Data<UploadService>,
    field: ImageField,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    let mut form = FormInput::from_request(&req, payload).await?;

    let (folder, label) = match field {
        ImageField::Avatar => (AVATAR_FOLDER, "Avatar"),
        ImageField::CoverImage => (COVER_FOLDER, "Cover image"),
    };
    let file = form
        .take_file(field.key())
        .ok_or_else(|| CustomError::ValidationError(format!("{} file is missing", label)))?;

    let url = upload_service
        .upload_image(file, folder)
        .await
        .map_err(|e| CustomError::BadRequestError(format!("{} upload failed: {}", label, e)))?;

    let (user, previous) = user_service.replace_image(&user_id, field, url).await?;
    upload_service.discard_image(previous.as_deref()).await;

    Ok(api_response(
        StatusCode::OK,
        UserResponse::from(user),
        &format!("{} updated successfully", label),
    ))
}

/// PATCH /users/update-avatar (multipart: avatar)
pub async fn update_avatar(
    req: HttpRequest,
    payload: web::Payload,
    user_service: web::Data<UserService>,
    upload_service: web::Data<UploadService>,
) -> Result<HttpResponse, CustomError> {
    replace_user_image(req, payload, user_service, upload_service, ImageField::Avatar).await
}

/// PATCH /users/update-cover (multipart: coverImage)
pub async fn update_cover_image(
    req: HttpRequest,
    payload: web::Payload,
    user_service: web::Data<UserService>,
    upload_service: web::Data<UploadService>,
) -> Result<HttpResponse, CustomError> {
    replace_user_image(
        req,
        payload,
        user_service,
        upload_service,
        ImageField::CoverImage,
    )
    .await
}

/// GET /users/username-profile/{username}
pub async fn get_user_profile(
    path: web::Path<String>,
    user_service: web::Data<UserService>,
    post_service: web::Data<PostService>,
) -> Result<HttpResponse, CustomError> {
    let user = user_service.find_by_username(&path).await?;
    let posts_count = match user.id {
        Some(id) => post_service.count_by_author(&id).await?,
        None => 0,
    };

    let mut profile = serde_json::to_value(UserResponse::from(user))
        .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
    profile["postsCount"] = json!(posts_count);

    Ok(api_response(
        StatusCode::OK,
        profile,
        "User profile fetched successfully",
    ))
}

/// DELETE /users/delete-account
pub async fn delete_account(
    req: HttpRequest,
    user_service: web::Data<UserService>,
    auth_config: web::Data<AuthConfig>,
    body: web::Json<DeleteAccountRequest>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    user_service.delete_account(&user_id, &body.password).await?;

    let mut res = api_response(StatusCode::OK, json!({}), "Account deleted successfully");
    clear_auth_cookies(&mut res, &auth_config)?;
    Ok(res)
}

/// GET /users/all-users
pub async fn get_all_users(
    user_service: web::Data<UserService>,
) -> Result<HttpResponse, CustomError> {
    let users: Vec<UserResponse> = user_service
        .list_all()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(api_response(
        StatusCode::OK,
        users,
        "Users fetched successfully",
    ))
}
