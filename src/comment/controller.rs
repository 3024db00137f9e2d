use crate::comment::model::{CreateCommentRequest, UpdateCommentRequest};
use crate::comment::service::CommentService;
use crate::middleware::auth::authenticated_user_id;
use crate::utils::error::CustomError;
use crate::utils::helpers::{PageQuery, Pagination, api_response, parse_object_id};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

/// Create a comment or a reply on a post
/// POST /comments/post/{postId}
pub async fn create_comment(
    req: HttpRequest,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, CustomError> {
    let author_id = authenticated_user_id(&req)?;
    let post_id = parse_object_id(&path, "post")?;
    let parent_id = body
        .parent_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| parse_object_id(id, "parent comment"))
        .transpose()?;

    let comment = comment_service
        .add_comment(&post_id, &author_id, &body.content, parent_id)
        .await?;

    Ok(api_response(
        StatusCode::CREATED,
        comment,
        "Comment created successfully",
    ))
}

/// Get the comments for a post, paginated
/// GET /comments/post/{postId}
pub async fn get_post_comments(
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, CustomError> {
    let post_id = parse_object_id(&path, "post")?;

    let page = comment_service
        .get_comments_for_post(&post_id, Pagination::from(&*query))
        .await?;

    Ok(api_response(
        StatusCode::OK,
        page,
        "Comments retrieved successfully",
    ))
}

/// GET /comments/{commentId}
pub async fn get_comment(
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let comment_id = parse_object_id(&path, "comment")?;
    let comment = comment_service.get_comment_by_id(&comment_id).await?;

    Ok(api_response(
        StatusCode::OK,
        comment,
        "Comment retrieved successfully",
    ))
}

/// PATCH /comments/{commentId}
pub async fn update_comment(
    req: HttpRequest,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
    body: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    let comment_id = parse_object_id(&path, "comment")?;

    let comment = comment_service
        .update_comment(&comment_id, &user_id, &body.content)
        .await?;

    Ok(api_response(
        StatusCode::OK,
        comment,
        "Comment updated successfully",
    ))
}

/// DELETE /comments/{commentId}
pub async fn delete_comment(
    req: HttpRequest,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    let comment_id = parse_object_id(&path, "comment")?;

    let deleted = comment_service
        .delete_comment(&comment_id, &user_id)
        .await?;

    Ok(api_response(
        StatusCode::OK,
        json!({ "deletedCount": deleted }),
        "Comment deleted successfully",
    ))
}

/// POST|PATCH /comments/{commentId}/like
pub async fn toggle_comment_like(
    req: HttpRequest,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    let comment_id = parse_object_id(&path, "comment")?;

    let toggle = comment_service.toggle_like(&comment_id, &user_id).await?;
    let message = if toggle.is_liked {
        "Comment liked"
    } else {
        "Comment unliked"
    };

    Ok(api_response(StatusCode::OK, toggle, message))
}
