use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Responder, error, get, web};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use serde_json::json;
use std::io;

mod comment;
mod config;
mod database;
mod middleware;
mod post;
mod router;
#[cfg(test)]
mod test_support;
mod uploader;
mod user;
mod utils;

use comment::service::CommentService;
use config::AppConfig;
use middleware::error_handler::handle_error;
use middleware::not_found::not_found;
use post::post_service::PostService;
use router::index::routes;
use user::service::UserService;
use utils::email::EmailService;
use utils::error::CustomError;
use utils::helpers::{api_response, service_name, timestamp};
use utils::uploads::UploadService;

#[get("/")]
async fn default() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Welcome to the Blog API",
        "httpStatusCode": StatusCode::OK.as_u16(),
        "service": service_name(),
    }))
}

#[get("/health")]
async fn health() -> impl Responder {
    api_response(
        StatusCode::OK,
        json!({ "status": "ok", "timestamp": timestamp() }),
        "Service is healthy",
    )
}

fn extractor_error(err: impl std::fmt::Display, _req: &HttpRequest) -> error::Error {
    CustomError::ValidationError(err.to_string()).into()
}

/// Malformed JSON bodies and query strings render as validation errors.
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, req| extractor_error(err, req)))
        .app_data(web::QueryConfig::default().error_handler(|err, req| extractor_error(err, req)))
        .app_data(web::PathConfig::default().error_handler(|err, req| extractor_error(err, req)));
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger with environment variable support
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let db = database::connect_to_mongo(&config.database)
        .await
        .map_err(|e| io::Error::other(format!("Failed to connect to MongoDB: {}", e)))?;

    let upload_service = web::Data::new(UploadService::new().map_err(|e| {
        error!("Cloudinary is not configured: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?);
    let email_service = web::Data::new(EmailService::new().map_err(|e| {
        error!("SMTP is not configured: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?);

    let user_service = web::Data::new(UserService::new(&db));
    let post_service = web::Data::new(PostService::new(&db));
    let comment_service = web::Data::new(CommentService::new(&db));
    let auth_config = web::Data::new(config.auth.clone());

    let (host, port) = (config.server.host.clone(), config.server.port);
    info!("Starting server on http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(user_service.clone())
            .app_data(post_service.clone())
            .app_data(comment_service.clone())
            .app_data(upload_service.clone())
            .app_data(email_service.clone())
            .app_data(auth_config.clone())
            .configure(extractor_config)
            .configure(routes)
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::NOT_FOUND, not_found)
                    .default_handler(handle_error),
            )
            .service(default)
            .service(health)
    })
    .bind((host, port))?
    .run()
    .await?;

    // Log after server has started (this line will only be reached when the server shuts down)
    info!("Server has stopped");

    Ok(())
}
