use chrono::{DateTime, Utc};
use mongodb::bson::{Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::user::model::AuthorSummary;
use crate::utils::error::CustomError;

pub const MAX_COMMENT_CHARS: usize = 500;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub content: String,
    pub post: ObjectId,
    pub author: ObjectId,
    #[serde(default)]
    pub parent: Option<ObjectId>,
    #[serde(default)]
    pub likes: Vec<ObjectId>,
    #[serde(default)]
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a comment sits: directly under the post, or under a top-level comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thread {
    TopLevel,
    ReplyTo(ObjectId),
}

impl Comment {
    pub fn new(post: ObjectId, author: ObjectId, content: String, thread: Thread) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            content,
            post,
            author,
            parent: match thread {
                Thread::TopLevel => None,
                Thread::ReplyTo(parent) => Some(parent),
            },
            likes: Vec::new(),
            is_edited: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn thread(&self) -> Thread {
        match self.parent {
            Some(parent) => Thread::ReplyTo(parent),
            None => Thread::TopLevel,
        }
    }

    pub fn is_authored_by(&self, user_id: &ObjectId) -> bool {
        &self.author == user_id
    }

    /// Thread for a new reply to `self`. Replies to replies are attached to
    /// the top-level comment so threads stay one level deep.
    pub fn reply_thread(&self, post_id: &ObjectId) -> Result<Thread, CustomError> {
        if &self.post != post_id {
            return Err(CustomError::BadRequestError(
                "Parent comment belongs to a different post".to_string(),
            ));
        }
        match self.thread() {
            Thread::ReplyTo(top) => Ok(Thread::ReplyTo(top)),
            Thread::TopLevel => self.id.map(Thread::ReplyTo).ok_or_else(|| {
                CustomError::InternalServerError("Parent comment has no ID".to_string())
            }),
        }
    }
}

/// Matches a comment and its direct replies.
pub fn cascade_filter(comment_id: &ObjectId) -> Document {
    doc! { "$or": [ { "_id": *comment_id }, { "parent": *comment_id } ] }
}

/// Trimmed content, 1 to 500 characters.
pub fn validate_content(raw: &str) -> Result<String, CustomError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(CustomError::ValidationError(
            "Comment content is required".to_string(),
        ));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(CustomError::ValidationError(format!(
            "Comment cannot exceed {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(content.to_string())
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// The commented post: a bare id, or `{_id, title}` when populated.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum CommentPost {
    Id(String),
    Summary {
        #[serde(rename = "_id")]
        id: String,
        title: String,
    },
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub post: CommentPost,
    pub author: Option<AuthorSummary>,
    pub parent: Option<String>,
    pub likes: Vec<String>,
    pub likes_count: usize,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<CommentResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies_count: Option<usize>,
}

impl CommentResponse {
    pub fn new(comment: Comment, author: Option<AuthorSummary>) -> Self {
        Self {
            id: comment.id.map(|id| id.to_hex()).unwrap_or_default(),
            content: comment.content,
            post: CommentPost::Id(comment.post.to_hex()),
            author,
            parent: comment.parent.map(|id| id.to_hex()),
            likes_count: comment.likes.len(),
            likes: comment.likes.iter().map(|id| id.to_hex()).collect(),
            is_edited: comment.is_edited,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            replies: None,
            replies_count: None,
        }
    }

    pub fn with_post_title(mut self, title: String) -> Self {
        if let CommentPost::Id(id) = self.post {
            self.post = CommentPost::Summary { id, title };
        }
        self
    }

    pub fn with_replies(mut self, replies: Vec<CommentResponse>) -> Self {
        self.replies_count = Some(replies.len());
        self.replies = Some(replies);
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_comments: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Serialize)]
pub struct CommentPage {
    pub comments: Vec<CommentResponse>,
    pub pagination: CommentPagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top_level(post: ObjectId) -> Comment {
        let mut c = Comment::new(post, ObjectId::new(), "hi".into(), Thread::TopLevel);
        c.id = Some(ObjectId::new());
        c
    }

    #[test]
    fn reply_to_top_level_points_at_it() {
        let post = ObjectId::new();
        let parent = top_level(post);
        assert_eq!(
            parent.reply_thread(&post).unwrap(),
            Thread::ReplyTo(parent.id.unwrap())
        );
    }

    #[test]
    fn reply_to_reply_is_flattened() {
        let post = ObjectId::new();
        let top = top_level(post);
        let mut reply = Comment::new(
            post,
            ObjectId::new(),
            "re".into(),
            Thread::ReplyTo(top.id.unwrap()),
        );
        reply.id = Some(ObjectId::new());

        assert_eq!(
            reply.reply_thread(&post).unwrap(),
            Thread::ReplyTo(top.id.unwrap())
        );
    }

    #[test]
    fn parent_on_another_post_is_rejected() {
        let parent = top_level(ObjectId::new());
        let err = parent.reply_thread(&ObjectId::new()).unwrap_err();
        assert!(matches!(err, CustomError::BadRequestError(_)));
    }

    #[test]
    fn cascade_filter_covers_comment_and_replies() {
        let id = ObjectId::new();
        let filter = cascade_filter(&id);
        let or = filter.get_array("$or").unwrap();
        assert_eq!(or.len(), 2);
        assert_eq!(
            or[0].as_document().unwrap().get_object_id("_id").unwrap(),
            id
        );
        assert_eq!(
            or[1].as_document().unwrap().get_object_id("parent").unwrap(),
            id
        );
    }

    #[test]
    fn content_is_trimmed_and_bounded() {
        assert_eq!(validate_content("  nice  ").unwrap(), "nice");
        assert!(validate_content("   ").is_err());
        assert!(validate_content(&"a".repeat(500)).is_ok());
        assert!(validate_content(&"a".repeat(501)).is_err());
    }

    #[test]
    fn top_level_is_stored_with_null_parent() {
        let doc = mongodb::bson::to_document(&top_level(ObjectId::new())).unwrap();
        assert!(doc.get("parent").unwrap().as_null().is_some());
        assert!(doc.contains_key("isEdited"));
    }

    #[test]
    fn response_lists_replies_only_when_attached() {
        let comment = top_level(ObjectId::new());
        let bare = serde_json::to_value(CommentResponse::new(comment.clone(), None)).unwrap();
        assert!(bare.get("replies").is_none());

        let reply = CommentResponse::new(comment.clone(), None);
        let threaded =
            serde_json::to_value(CommentResponse::new(comment, None).with_replies(vec![reply]))
                .unwrap();
        assert_eq!(threaded["repliesCount"], 1);
        assert_eq!(threaded["replies"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn post_is_an_id_until_its_title_is_attached() {
        let post = ObjectId::new();
        let comment = top_level(post);

        let bare = serde_json::to_value(CommentResponse::new(comment.clone(), None)).unwrap();
        assert_eq!(bare["post"], post.to_hex());

        let populated = serde_json::to_value(
            CommentResponse::new(comment, None).with_post_title("Hello".into()),
        )
        .unwrap();
        assert_eq!(populated["post"]["_id"], post.to_hex());
        assert_eq!(populated["post"]["title"], "Hello");
    }
}
