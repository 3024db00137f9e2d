use std::time::Duration;

use actix_web::body::{MessageBody, to_bytes};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::middleware::ErrorHandlers;
use actix_web::{App, test, web};
use mongodb::bson::oid::ObjectId;
use mongodb::options::{ClientOptions, ServerAddress};
use mongodb::{Client, Database};
use serde_json::Value;

use crate::comment::service::CommentService;
use crate::config::AuthConfig;
use crate::middleware::auth::create_access_token;
use crate::middleware::error_handler::handle_error;
use crate::middleware::not_found::not_found;
use crate::post::post_service::PostService;
use crate::router::index::routes;
use crate::user::model::User;
use crate::user::service::UserService;
use crate::utils::email::{EmailConfig, EmailService};
use crate::utils::uploads::{CloudinaryConfig, UploadService};

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        access_token_secret: "access-secret-for-tests".to_string(),
        access_token_expiry_secs: 900,
        refresh_token_secret: "refresh-secret-for-tests".to_string(),
        refresh_token_expiry_secs: 10 * 24 * 3600,
        secure_cookies: false,
    }
}

pub fn test_email_config() -> EmailConfig {
    EmailConfig {
        smtp_host: "127.0.0.1".to_string(),
        smtp_port: 2525,
        smtp_username: "mailer".to_string(),
        smtp_password: "secret".to_string(),
        from_email: "no-reply@example.com".to_string(),
        from_name: "Blog Website".to_string(),
    }
}

fn test_cloudinary_config() -> CloudinaryConfig {
    CloudinaryConfig {
        cloud_name: "demo".to_string(),
        api_key: "key".to_string(),
        api_secret: "secret".to_string(),
        upload_preset: None,
    }
}

/// A client that never connects unless a query is actually issued.
fn offline_database() -> Database {
    let options = ClientOptions::builder()
        .hosts(vec![ServerAddress::Tcp {
            host: "127.0.0.1".to_string(),
            port: Some(27017),
        }])
        .server_selection_timeout(Duration::from_millis(200))
        .build();
    Client::with_options(options)
        .expect("client options are valid")
        .database("blog_api_offline")
}

/// Fresh database for store-backed tests (`TEST_MONGODB_URI`).
pub async fn test_database() -> Database {
    let uri = std::env::var("TEST_MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string());
    Client::with_uri_str(&uri)
        .await
        .expect("TEST_MONGODB_URI must be reachable")
        .database(&format!("blog_api_test_{}", ObjectId::new().to_hex()))
}

/// The full application against an offline store. Only paths that fail
/// before touching the database are meaningful here.
pub fn test_app() -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    app_with_database(offline_database())
}

pub fn app_with_database(db: Database) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(UserService::new(&db)))
        .app_data(web::Data::new(PostService::new(&db)))
        .app_data(web::Data::new(CommentService::new(&db)))
        .app_data(web::Data::new(UploadService::with_config(
            test_cloudinary_config(),
        )))
        .app_data(web::Data::new(EmailService::with_config(test_email_config())))
        .app_data(web::Data::new(test_auth_config()))
        .configure(crate::extractor_config)
        .configure(routes)
        .wrap(
            ErrorHandlers::new()
                .handler(StatusCode::NOT_FOUND, not_found)
                .default_handler(handle_error),
        )
        .service(crate::default)
        .service(crate::health)
}

pub fn bearer_token(user_id: ObjectId) -> String {
    let user = User::new(
        "Test User".into(),
        "tester".into(),
        "tester@example.com".into(),
        "$2b$10$hash".into(),
        "https://cdn/avatar.png".into(),
        None,
    )
    .with_id(user_id);
    let token = create_access_token(&user, &test_auth_config()).expect("token");
    format!("Bearer {}", token)
}

/// Status and JSON body of a call, whether the service answered or errored.
pub async fn json_response<B: MessageBody>(
    result: Result<ServiceResponse<B>, actix_web::Error>,
) -> (StatusCode, Value) {
    match result {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
        Err(err) => {
            let res = err.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.ok().unwrap_or_default();
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
    }
}
