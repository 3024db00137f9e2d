use crate::middleware::auth::authenticated_user_id;
use crate::post::post_model::{PostChanges, PostDraft, PostListQuery};
use crate::post::post_service::PostService;
use crate::uploader::form::FormInput;
use crate::utils::error::CustomError;
use crate::utils::helpers::{PageQuery, Pagination, api_response, parse_object_id};
use crate::utils::uploads::{POST_IMAGE_FOLDER, UploadService};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

async fn upload_featured_image(
    form: &mut FormInput,
    upload_service: &UploadService,
) -> Result<Option<String>, CustomError> {
    match form.take_file("featuredImage") {
        Some(file) => upload_service
            .upload_image(file, POST_IMAGE_FOLDER)
            .await
            .map(Some)
            .map_err(|e| CustomError::BadRequestError(format!("Image upload failed: {}", e))),
        None => Ok(None),
    }
}

/// POST /posts/create
pub async fn create_post(
    req: HttpRequest,
    payload: web::Payload,
    post_service: web::Data<PostService>,
    upload_service: web::Data<UploadService>,
) -> Result<HttpResponse, CustomError> {
    let author_id = authenticated_user_id(&req)?;
    let mut form = FormInput::from_request(&req, payload).await?;

    let mut draft = PostDraft::from_form(&form)?;
    draft.featured_image = upload_featured_image(&mut form, &upload_service).await?;
    let uploaded = draft.featured_image.clone();

    let created = post_service.create_post(author_id, draft).await;
    let post = upload_service
        .discard_on_error(created, &[uploaded.as_deref()])
        .await?;

    Ok(api_response(StatusCode::OK, post, "Post created successfully"))
}

/// GET /posts?page&limit&search&tags
pub async fn get_all_posts(
    post_service: web::Data<PostService>,
    query: web::Query<PostListQuery>,
) -> Result<HttpResponse, CustomError> {
    let page = post_service.list_posts(&query).await?;
    Ok(api_response(StatusCode::OK, page, "Posts fetched successfully"))
}

/// GET /posts/{postId}
pub async fn get_post(
    path: web::Path<String>,
    post_service: web::Data<PostService>,
) -> Result<HttpResponse, CustomError> {
    let post_id = parse_object_id(&path, "post")?;
    let post = post_service.view_post(&post_id).await?;

    Ok(api_response(StatusCode::OK, post, "Post fetched successfully"))
}

/// GET /posts/author/{authorId}
pub async fn get_posts_by_author(
    path: web::Path<String>,
    post_service: web::Data<PostService>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, CustomError> {
    let author_id = parse_object_id(&path, "author")?;
    let page = post_service
        .list_by_author(&author_id, Pagination::from(&*query))
        .await?;

    Ok(api_response(StatusCode::OK, page, "Author posts fetched successfully"))
}

/// GET /posts/my-posts
pub async fn get_my_posts(
    req: HttpRequest,
    post_service: web::Data<PostService>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    let page = post_service
        .list_by_author(&user_id, Pagination::from(&*query))
        .await?;

    Ok(api_response(StatusCode::OK, page, "Your posts fetched successfully"))
}

/// PATCH /posts/{postId}/update
pub async fn update_post(
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Payload,
    post_service: web::Data<PostService>,
    upload_service: web::Data<UploadService>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    let post_id = parse_object_id(&path, "post")?;
    let mut form = FormInput::from_request(&req, payload).await?;

    let mut changes = PostChanges::from_form(&form)?;
    changes.featured_image = upload_featured_image(&mut form, &upload_service).await?;
    let uploaded = changes.featured_image.clone();

    // the new upload is orphaned when the update is refused
    let updated = post_service.update_post(&post_id, &user_id, changes).await;
    let (post, replaced) = upload_service
        .discard_on_error(updated, &[uploaded.as_deref()])
        .await?;
    upload_service.discard_image(replaced.as_deref()).await;

    Ok(api_response(StatusCode::OK, post, "Post updated successfully"))
}

/// DELETE /posts/{postId}/delete
pub async fn delete_post(
    req: HttpRequest,
    path: web::Path<String>,
    post_service: web::Data<PostService>,
    upload_service: web::Data<UploadService>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    let post_id = parse_object_id(&path, "post")?;

    let post = post_service.delete_post(&post_id, &user_id).await?;
    upload_service
        .discard_image(post.featured_image.as_deref())
        .await;

    Ok(api_response(
        StatusCode::OK,
        json!({ "_id": post_id.to_hex() }),
        "Post deleted successfully",
    ))
}

/// PATCH /posts/{postId}/like
pub async fn toggle_post_like(
    req: HttpRequest,
    path: web::Path<String>,
    post_service: web::Data<PostService>,
) -> Result<HttpResponse, CustomError> {
    let user_id = authenticated_user_id(&req)?;
    let post_id = parse_object_id(&path, "post")?;

    let toggle = post_service.toggle_like(&post_id, &user_id).await?;
    let message = if toggle.is_liked {
        "Post liked"
    } else {
        "Post unliked"
    };

    Ok(api_response(StatusCode::OK, toggle, message))
}
