use super::controller::{
    change_password, delete_account, forgot_password, get_all_users, get_current_user,
    get_user_profile, login_user, logout_user, refresh_access_token, register_user,
    reset_password, update_account_details, update_avatar, update_cover_image,
};
use crate::middleware::auth::verify_token;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    let auth = || HttpAuthentication::with_fn(verify_token);

    cfg.service(
        web::scope("/users")
            .route("/register", web::post().to(register_user))
            .route("/login", web::post().to(login_user))
            .route("/refresh-token", web::post().to(refresh_access_token))
            .route("/forgot-password", web::post().to(forgot_password))
            .route("/reset-password/{token}", web::post().to(reset_password))
            .route("/logout", web::post().to(logout_user).wrap(auth()))
            .route("/change-password", web::post().to(change_password).wrap(auth()))
            .route("/current-user", web::get().to(get_current_user).wrap(auth()))
            .route(
                "/update-account-detail",
                web::patch().to(update_account_details).wrap(auth()),
            )
            .route("/update-avatar", web::patch().to(update_avatar).wrap(auth()))
            .route("/update-cover", web::patch().to(update_cover_image).wrap(auth()))
            .route(
                "/username-profile/{username}",
                web::get().to(get_user_profile).wrap(auth()),
            )
            .route("/delete-account", web::delete().to(delete_account).wrap(auth()))
            .route("/all-users", web::get().to(get_all_users).wrap(auth())),
    );
}
