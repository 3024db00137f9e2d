use super::controller::{
    create_comment, delete_comment, get_comment, get_post_comments, toggle_comment_like,
    update_comment,
};
use crate::middleware::auth::verify_token;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn comment_routes(cfg: &mut web::ServiceConfig) {
    let auth = || HttpAuthentication::with_fn(verify_token);

    cfg.service(
        web::scope("/comments")
            .route("/post/{postId}", web::get().to(get_post_comments))
            .route("/post/{postId}", web::post().to(create_comment).wrap(auth()))
            .route("/{commentId}", web::get().to(get_comment))
            .route("/{commentId}", web::patch().to(update_comment).wrap(auth()))
            .route("/{commentId}", web::delete().to(delete_comment).wrap(auth()))
            .route("/{commentId}/like", web::post().to(toggle_comment_like).wrap(auth()))
            .route("/{commentId}/like", web::patch().to(toggle_comment_like).wrap(auth())),
    );
}
