use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::uploader::form::FormInput;
use crate::user::model::AuthorSummary;
use crate::utils::error::CustomError;
use crate::utils::helpers::Pagination;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_EXCERPT_CHARS: usize = 300;
pub const MAX_SLUG_CHARS: usize = 100;
pub const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    pub fn parse(raw: &str) -> Result<Self, CustomError> {
        match raw.trim().to_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            "archived" => Ok(PostStatus::Archived),
            other => Err(CustomError::ValidationError(format!(
                "Invalid status '{}': expected draft, published or archived",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    pub slug: String,
    #[serde(default)]
    pub read_time: i32,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub author: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub likes: Vec<ObjectId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn new(author: ObjectId, draft: PostDraft, slug: String) -> Self {
        let now = Utc::now();
        let mut post = Self {
            id: None,
            title: draft.title,
            content: String::new(),
            excerpt: String::new(),
            slug,
            read_time: 0,
            status: PostStatus::Draft,
            is_published: false,
            published_at: None,
            author,
            featured_image: draft.featured_image,
            tags: draft.tags,
            views: 0,
            likes: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        post.set_content(draft.content);
        post.set_status(draft.status, now);
        post
    }

    /// Replaces the body and recomputes excerpt and read time.
    pub fn set_content(&mut self, content: String) {
        self.excerpt = excerpt(&content);
        self.read_time = read_time(&content);
        self.content = content;
    }

    /// `publishedAt` is stamped the first time the post is published and kept afterwards.
    pub fn set_status(&mut self, status: PostStatus, now: DateTime<Utc>) {
        self.status = status;
        self.is_published = status == PostStatus::Published;
        if self.is_published && self.published_at.is_none() {
            self.published_at = Some(now);
        }
    }

    pub fn is_authored_by(&self, user_id: &ObjectId) -> bool {
        &self.author == user_id
    }
}

/// Lowercase ASCII letters and digits joined by single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_CHARS {
            break;
        }
    }
    slug.truncate(MAX_SLUG_CHARS);
    let slug = slug.trim_end_matches('-').to_string();

    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

/// Plain-text preview of the body with markup removed.
pub fn excerpt(content: &str) -> String {
    let mut text = String::with_capacity(content.len().min(MAX_EXCERPT_CHARS * 4));
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.chars()
        .take(MAX_EXCERPT_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Minutes to read at 200 words per minute, rounded up.
pub fn read_time(content: &str) -> i32 {
    let words = content.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE) as i32
}

/// Comma separated tags, trimmed and lowercased; blanks dropped.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(|t| t.trim().to_lowercase()) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

fn validate_title(title: &str) -> Result<(), CustomError> {
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(CustomError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

/// Validated fields for a new post.
#[derive(Debug)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub featured_image: Option<String>,
}

impl PostDraft {
    pub fn from_form(form: &FormInput) -> Result<Self, CustomError> {
        let (Some(title), Some(content)) = (form.non_empty("title"), form.non_empty("content"))
        else {
            return Err(CustomError::ValidationError(
                "Title and Content are required".to_string(),
            ));
        };
        validate_title(&title)?;

        let status = match form.non_empty("status") {
            Some(raw) => PostStatus::parse(&raw)?,
            None => PostStatus::default(),
        };

        Ok(Self {
            title,
            content,
            tags: form.text("tags").map(parse_tags).unwrap_or_default(),
            status,
            featured_image: None,
        })
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    pub featured_image: Option<String>,
}

impl PostChanges {
    pub fn from_form(form: &FormInput) -> Result<Self, CustomError> {
        let title = form.non_empty("title");
        if let Some(title) = &title {
            validate_title(title)?;
        }
        let status = form
            .non_empty("status")
            .map(|raw| PostStatus::parse(&raw))
            .transpose()?;

        Ok(Self {
            title,
            content: form.non_empty("content"),
            tags: form.non_empty("tags").map(|raw| parse_tags(&raw)),
            status,
            featured_image: None,
        })
    }

    /// Applies the changes; returns true when the title changed.
    pub fn apply(self, post: &mut Post, now: DateTime<Utc>) -> bool {
        let mut title_changed = false;
        if let Some(title) = self.title {
            title_changed = title != post.title;
            post.title = title;
        }
        if let Some(content) = self.content {
            post.set_content(content);
        }
        if let Some(tags) = self.tags {
            post.tags = tags;
        }
        if let Some(status) = self.status {
            post.set_status(status, now);
        }
        if let Some(image) = self.featured_image {
            post.featured_image = Some(image);
        }
        post.updated_at = now;
        title_changed
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct PostListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub tags: Option<String>,
}

impl PostListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

/// A post as returned to clients, with its author populated.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub slug: String,
    pub read_time: i32,
    pub status: PostStatus,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<AuthorSummary>,
    pub featured_image: String,
    pub tags: Vec<String>,
    pub views: i64,
    pub likes: Vec<String>,
    pub likes_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostResponse {
    pub fn new(post: Post, author: Option<AuthorSummary>) -> Self {
        Self {
            id: post.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: post.title,
            content: post.content,
            excerpt: post.excerpt,
            slug: post.slug,
            read_time: post.read_time,
            status: post.status,
            is_published: post.is_published,
            published_at: post.published_at,
            author,
            featured_image: post.featured_image.unwrap_or_default(),
            tags: post.tags,
            views: post.views,
            likes_count: post.likes.len(),
            likes: post.likes.iter().map(|id| id.to_hex()).collect(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<PostResponse>,
    pub total_posts: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(content: &str, status: PostStatus) -> PostDraft {
        PostDraft {
            title: "Hello".into(),
            content: content.into(),
            tags: vec![],
            status,
            featured_image: None,
        }
    }

    #[test]
    fn slug_is_lowercase_and_hyphenated() {
        assert_eq!(slugify("Hello, World!  Rust 2024"), "hello-world-rust-2024");
        assert_eq!(slugify("  --Já  --  "), "j");
        assert_eq!(slugify("!!!"), "post");
        assert_eq!(slugify(&"a ".repeat(200)).len(), MAX_SLUG_CHARS - 1);
    }

    #[test]
    fn read_time_rounds_up_per_200_words() {
        assert_eq!(read_time(""), 0);
        assert_eq!(read_time("one"), 1);
        assert_eq!(read_time(&"w ".repeat(200)), 1);
        assert_eq!(read_time(&"w ".repeat(201)), 2);
    }

    #[test]
    fn excerpt_strips_markup_and_truncates() {
        assert_eq!(excerpt("<p>Hi <b>there</b></p>"), "Hi there");
        assert_eq!(excerpt(&"x".repeat(400)).chars().count(), MAX_EXCERPT_CHARS);
    }

    #[test]
    fn tags_are_normalised() {
        assert_eq!(parse_tags(" Rust, web ,,RUST, "), vec!["rust", "web"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn published_at_is_set_once() {
        let author = ObjectId::new();
        let mut post = Post::new(author, draft("body", PostStatus::Draft), "hello".into());
        assert!(post.published_at.is_none());
        assert!(!post.is_published);

        let first = Utc::now();
        post.set_status(PostStatus::Published, first);
        assert_eq!(post.published_at, Some(first));

        post.set_status(PostStatus::Archived, Utc::now());
        assert!(!post.is_published);

        post.set_status(PostStatus::Published, first + chrono::Duration::hours(1));
        assert_eq!(post.published_at, Some(first));
    }

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!(PostStatus::parse(" Published ").unwrap(), PostStatus::Published);
        assert!(PostStatus::parse("deleted").is_err());
    }

    #[test]
    fn draft_requires_title_and_content() {
        let form = FormInput::default().with_field("title", "A");
        assert!(PostDraft::from_form(&form).is_err());

        let form = form
            .with_field("content", "B")
            .with_field("tags", "Rust,Web");
        let draft = PostDraft::from_form(&form).unwrap();
        assert_eq!(draft.title, "A");
        assert_eq!(draft.tags, vec!["rust", "web"]);
        assert_eq!(draft.status, PostStatus::Draft);

        let long = FormInput::default()
            .with_field("title", &"t".repeat(201))
            .with_field("content", "B");
        assert!(PostDraft::from_form(&long).is_err());
    }

    #[test]
    fn empty_changes_keep_stored_values() {
        let mut post = Post::new(
            ObjectId::new(),
            draft("one two three", PostStatus::Draft),
            "hello".into(),
        );
        let form = FormInput::default().with_field("title", "  ");
        let changed = PostChanges::from_form(&form)
            .unwrap()
            .apply(&mut post, Utc::now());

        assert!(!changed);
        assert_eq!(post.title, "Hello");
        assert_eq!(post.content, "one two three");
    }

    #[test]
    fn changes_recompute_derived_fields() {
        let mut post = Post::new(ObjectId::new(), draft("x", PostStatus::Draft), "hello".into());
        let form = FormInput::default()
            .with_field("title", "New title")
            .with_field("content", "<p>fresh body</p>")
            .with_field("status", "published");
        let changed = PostChanges::from_form(&form)
            .unwrap()
            .apply(&mut post, Utc::now());

        assert!(changed);
        assert_eq!(post.excerpt, "fresh body");
        assert!(post.is_published);
        assert!(post.published_at.is_some());
    }

    #[test]
    fn response_counts_likes_and_hides_nothing_unexpected() {
        let mut post = Post::new(ObjectId::new(), draft("x", PostStatus::Draft), "hello".into());
        post.id = Some(ObjectId::new());
        post.likes = vec![ObjectId::new(), ObjectId::new()];

        let json = serde_json::to_value(PostResponse::new(post, None)).unwrap();
        assert_eq!(json["likesCount"], 2);
        assert_eq!(json["status"], "draft");
        assert_eq!(json["featuredImage"], "");
        assert!(json["author"].is_null());
    }
}
