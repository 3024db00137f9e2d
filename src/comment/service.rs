use std::collections::HashMap;

use crate::comment::model::{
    Comment, CommentPage, CommentPagination, CommentResponse, Thread, cascade_filter,
    validate_content,
};
use crate::post::post_model::Post;
use crate::post::post_service::POSTS_COLLECTION;
use crate::user::model::{AuthorSummary, User};
use crate::user::service::{USERS_COLLECTION, load_authors};
use crate::utils::error::CustomError;
use crate::utils::helpers::{Pagination, timestamp};
use crate::utils::model::{LikeToggle, like_update};
use futures_util::TryStreamExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

pub const COMMENTS_COLLECTION: &str = "comments";

/// Delete every comment on a post, replies included.
pub async fn delete_for_post(
    comments: &Collection<Comment>,
    post_id: &ObjectId,
) -> Result<u64, CustomError> {
    let result = comments.delete_many(doc! { "post": *post_id }).await?;
    Ok(result.deleted_count)
}

/// Nest `replies` under their top-level comments, keeping reply order.
fn attach_replies(
    top_level: Vec<Comment>,
    replies: Vec<Comment>,
    authors: &HashMap<ObjectId, AuthorSummary>,
) -> Vec<CommentResponse> {
    let mut by_parent: HashMap<ObjectId, Vec<CommentResponse>> = HashMap::new();
    for reply in replies {
        if let Some(parent) = reply.parent {
            let author = authors.get(&reply.author).cloned();
            by_parent
                .entry(parent)
                .or_default()
                .push(CommentResponse::new(reply, author));
        }
    }

    top_level
        .into_iter()
        .map(|comment| {
            let replies = comment
                .id
                .and_then(|id| by_parent.remove(&id))
                .unwrap_or_default();
            let author = authors.get(&comment.author).cloned();
            CommentResponse::new(comment, author).with_replies(replies)
        })
        .collect()
}

pub struct CommentService {
    collection: Collection<Comment>,
    posts: Collection<Post>,
    users: Collection<User>,
}

impl CommentService {
    pub fn new(db: &Database) -> Self {
        CommentService {
            collection: db.collection::<Comment>(COMMENTS_COLLECTION),
            posts: db.collection::<Post>(POSTS_COLLECTION),
            users: db.collection::<User>(USERS_COLLECTION),
        }
    }

    async fn get_by_id(&self, comment_id: &ObjectId) -> Result<Comment, CustomError> {
        self.collection
            .find_one(doc! { "_id": *comment_id })
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Comment not found".to_string()))
    }

    async fn get_owned(
        &self,
        comment_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Comment, CustomError> {
        let comment = self.get_by_id(comment_id).await?;
        if !comment.is_authored_by(user_id) {
            return Err(CustomError::ForbiddenError(
                "You are not authorized to modify this comment".to_string(),
            ));
        }
        Ok(comment)
    }

    async fn authors_for(
        &self,
        comments: &[&Comment],
    ) -> Result<HashMap<ObjectId, AuthorSummary>, CustomError> {
        let mut ids: Vec<ObjectId> = comments.iter().map(|c| c.author).collect();
        ids.sort();
        ids.dedup();
        load_authors(&self.users, &ids).await
    }

    async fn replies_to(&self, parents: &[ObjectId]) -> Result<Vec<Comment>, CustomError> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }
        let replies = self
            .collection
            .find(doc! { "parent": { "$in": parents.to_vec() } })
            .sort(doc! { "_id": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(replies)
    }

    /// Add a top-level comment, or a reply when `parent_id` is given.
    pub async fn add_comment(
        &self,
        post_id: &ObjectId,
        author_id: &ObjectId,
        content: &str,
        parent_id: Option<ObjectId>,
    ) -> Result<CommentResponse, CustomError> {
        let content = validate_content(content)?;

        if self.posts.count_documents(doc! { "_id": *post_id }).await? == 0 {
            return Err(CustomError::NotFoundError("Post not found".to_string()));
        }

        let thread = match parent_id {
            Some(parent_id) => {
                let parent = self
                    .collection
                    .find_one(doc! { "_id": parent_id })
                    .await?
                    .ok_or_else(|| {
                        CustomError::NotFoundError("Parent comment not found".to_string())
                    })?;
                parent.reply_thread(post_id)?
            }
            None => Thread::TopLevel,
        };

        let mut comment = Comment::new(*post_id, *author_id, content, thread);
        let result = self.collection.insert_one(&comment).await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to add comment: {}", e))
        })?;
        comment.id = result.inserted_id.as_object_id();

        let authors = self.authors_for(&[&comment]).await?;
        let author = authors.get(author_id).cloned();
        Ok(CommentResponse::new(comment, author))
    }

    /// Top-level comments newest first, each with its replies oldest first.
    pub async fn get_comments_for_post(
        &self,
        post_id: &ObjectId,
        pagination: Pagination,
    ) -> Result<CommentPage, CustomError> {
        let filter = doc! { "post": *post_id, "parent": null };
        let total_comments = self.collection.count_documents(filter.clone()).await?;

        let top_level: Vec<Comment> = self
            .collection
            .find(filter)
            .sort(doc! { "_id": -1 })
            .skip(pagination.skip())
            .limit(pagination.limit as i64)
            .await?
            .try_collect()
            .await?;

        let parent_ids: Vec<ObjectId> = top_level.iter().filter_map(|c| c.id).collect();
        let replies = self.replies_to(&parent_ids).await?;

        let everyone: Vec<&Comment> = top_level.iter().chain(replies.iter()).collect();
        let authors = self.authors_for(&everyone).await?;

        Ok(CommentPage {
            comments: attach_replies(top_level, replies, &authors),
            pagination: CommentPagination {
                current_page: pagination.page,
                total_pages: pagination.total_pages(total_comments),
                total_comments,
                has_next_page: pagination.has_next_page(total_comments),
                has_prev_page: pagination.has_prev_page(),
            },
        })
    }

    /// A single comment; top-level comments come with their replies.
    pub async fn get_comment_by_id(
        &self,
        comment_id: &ObjectId,
    ) -> Result<CommentResponse, CustomError> {
        let comment = self.get_by_id(comment_id).await?;
        let post_title = self
            .posts
            .find_one(doc! { "_id": comment.post })
            .await?
            .map(|post| post.title);

        let response = match comment.thread() {
            Thread::TopLevel => {
                let replies = self.replies_to(&[*comment_id]).await?;
                let everyone: Vec<&Comment> =
                    std::iter::once(&comment).chain(replies.iter()).collect();
                let authors = self.authors_for(&everyone).await?;
                attach_replies(vec![comment], replies, &authors)
                    .pop()
                    .ok_or_else(|| {
                        CustomError::InternalServerError("Failed to load comment".to_string())
                    })?
            }
            Thread::ReplyTo(_) => {
                let authors = self.authors_for(&[&comment]).await?;
                let author = authors.get(&comment.author).cloned();
                CommentResponse::new(comment, author)
            }
        };

        Ok(match post_title {
            Some(title) => response.with_post_title(title),
            None => response,
        })
    }

    /// Update a comment (only author can update)
    pub async fn update_comment(
        &self,
        comment_id: &ObjectId,
        user_id: &ObjectId,
        content: &str,
    ) -> Result<CommentResponse, CustomError> {
        let content = validate_content(content)?;
        self.get_owned(comment_id, user_id).await?;

        let updated = self
            .collection
            .find_one_and_update(
                doc! { "_id": *comment_id },
                doc! {
                    "$set": {
                        "content": content,
                        "isEdited": true,
                        "updatedAt": timestamp(),
                    }
                },
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Comment not found".to_string()))?;

        let authors = self.authors_for(&[&updated]).await?;
        let author = authors.get(&updated.author).cloned();
        Ok(CommentResponse::new(updated, author))
    }

    /// Delete a comment and, for a top-level comment, its replies.
    /// Returns how many documents were removed.
    pub async fn delete_comment(
        &self,
        comment_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<u64, CustomError> {
        self.get_owned(comment_id, user_id).await?;

        let result = self
            .collection
            .delete_many(cascade_filter(comment_id))
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to delete comment: {}", e))
            })?;

        info!(
            "Deleted comment {} ({} document(s))",
            comment_id, result.deleted_count
        );
        Ok(result.deleted_count)
    }

    pub async fn toggle_like(
        &self,
        comment_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<LikeToggle, CustomError> {
        let comment = self.get_by_id(comment_id).await?;

        let updated = self
            .collection
            .find_one_and_update(
                doc! { "_id": *comment_id },
                like_update(&comment.likes, user_id),
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Comment not found".to_string()))?;

        Ok(LikeToggle::from_likes(&updated.likes, user_id))
    }
}
