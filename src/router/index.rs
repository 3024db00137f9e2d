use crate::comment::index::comment_routes;
use crate::post::post_index::post_routes;
use crate::user::index::user_routes;
use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(user_routes)
            .configure(post_routes)
            .configure(comment_routes),
    );
}
