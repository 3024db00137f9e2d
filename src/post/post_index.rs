use super::post_controller::{
    create_post, delete_post, get_all_posts, get_my_posts, get_post, get_posts_by_author,
    toggle_post_like, update_post,
};
use crate::middleware::auth::verify_token;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn post_routes(cfg: &mut web::ServiceConfig) {
    let auth = || HttpAuthentication::with_fn(verify_token);

    // literal segments are registered before `/{postId}`
    cfg.service(
        web::scope("/posts")
            .route("", web::get().to(get_all_posts))
            .route("/", web::get().to(get_all_posts))
            .route("/create", web::post().to(create_post).wrap(auth()))
            .route("/my-posts", web::get().to(get_my_posts).wrap(auth()))
            .route("/author/{authorId}", web::get().to(get_posts_by_author))
            .route("/{postId}", web::get().to(get_post))
            .route("/{postId}/update", web::patch().to(update_post).wrap(auth()))
            .route("/{postId}/delete", web::delete().to(delete_post).wrap(auth()))
            .route("/{postId}/like", web::patch().to(toggle_post_like).wrap(auth())),
    );
}
