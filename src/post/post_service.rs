use chrono::Utc;
use futures_util::TryStreamExt;
use log::info;
use mongodb::bson::{Document, doc, oid::ObjectId, to_document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use uuid::Uuid;

use crate::comment::model::Comment;
use crate::comment::service::{COMMENTS_COLLECTION, delete_for_post};
use crate::post::post_model::{
    Post, PostChanges, PostDraft, PostListQuery, PostPage, PostResponse, parse_tags, slugify,
};
use crate::user::model::User;
use crate::user::service::{USERS_COLLECTION, load_authors};
use crate::utils::error::CustomError;
use crate::utils::helpers::Pagination;
use crate::utils::model::{LikeToggle, like_update};

pub const POSTS_COLLECTION: &str = "posts";

/// Case-insensitive substring match on title or content, plus an optional tag filter.
pub fn list_filter(search: Option<&str>, tags: Option<&str>) -> Document {
    let mut filter = Document::new();

    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = regex::escape(search);
        filter.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": pattern.as_str(), "$options": "i" } },
                doc! { "content": { "$regex": pattern.as_str(), "$options": "i" } },
            ],
        );
    }

    if let Some(tags) = tags {
        let tags = parse_tags(tags);
        if !tags.is_empty() {
            filter.insert("tags", doc! { "$in": tags });
        }
    }

    filter
}

/// Suffix used when a slug is already taken.
fn slug_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub struct PostService {
    collection: Collection<Post>,
    users: Collection<User>,
    comments: Collection<Comment>,
}

impl PostService {
    pub fn new(db: &Database) -> Self {
        PostService {
            collection: db.collection::<Post>(POSTS_COLLECTION),
            users: db.collection::<User>(USERS_COLLECTION),
            comments: db.collection::<Comment>(COMMENTS_COLLECTION),
        }
    }

    pub async fn find_by_id(&self, post_id: &ObjectId) -> Result<Option<Post>, CustomError> {
        Ok(self.collection.find_one(doc! { "_id": *post_id }).await?)
    }

    async fn get_by_id(&self, post_id: &ObjectId) -> Result<Post, CustomError> {
        self.find_by_id(post_id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Post not found".to_string()))
    }

    /// Loads the post and checks that `user_id` wrote it.
    async fn get_owned(&self, post_id: &ObjectId, user_id: &ObjectId) -> Result<Post, CustomError> {
        let post = self.get_by_id(post_id).await?;
        if !post.is_authored_by(user_id) {
            return Err(CustomError::ForbiddenError(
                "You are not authorized to modify this post".to_string(),
            ));
        }
        Ok(post)
    }

    async fn slug_taken(&self, slug: &str, except: Option<ObjectId>) -> Result<bool, CustomError> {
        let mut filter = doc! { "slug": slug };
        if let Some(id) = except {
            filter.insert("_id", doc! { "$ne": id });
        }
        Ok(self.collection.count_documents(filter).await? > 0)
    }

    async fn unique_slug(&self, title: &str, except: Option<ObjectId>) -> Result<String, CustomError> {
        let base = slugify(title);
        if !self.slug_taken(&base, except).await? {
            return Ok(base);
        }
        Ok(format!("{}-{}", base, slug_suffix()))
    }

    async fn populate(&self, posts: Vec<Post>) -> Result<Vec<PostResponse>, CustomError> {
        let mut author_ids: Vec<ObjectId> = posts.iter().map(|p| p.author).collect();
        author_ids.sort();
        author_ids.dedup();
        let authors = load_authors(&self.users, &author_ids).await?;

        Ok(posts
            .into_iter()
            .map(|post| {
                let author = authors.get(&post.author).cloned();
                PostResponse::new(post, author)
            })
            .collect())
    }

    async fn populate_one(&self, post: Post) -> Result<PostResponse, CustomError> {
        let mut responses = self.populate(vec![post]).await?;
        responses
            .pop()
            .ok_or_else(|| CustomError::InternalServerError("Failed to load post".to_string()))
    }

    async fn page(&self, filter: Document, pagination: Pagination) -> Result<PostPage, CustomError> {
        let total_posts = self.collection.count_documents(filter.clone()).await?;
        let posts: Vec<Post> = self
            .collection
            .find(filter)
            .sort(doc! { "_id": -1 })
            .skip(pagination.skip())
            .limit(pagination.limit as i64)
            .await?
            .try_collect()
            .await?;

        Ok(PostPage {
            posts: self.populate(posts).await?,
            total_posts,
            total_pages: pagination.total_pages(total_posts),
            current_page: pagination.page,
        })
    }

    pub async fn create_post(
        &self,
        author_id: ObjectId,
        draft: PostDraft,
    ) -> Result<PostResponse, CustomError> {
        let slug = self.unique_slug(&draft.title, None).await?;
        let mut post = Post::new(author_id, draft, slug);

        let result = self.collection.insert_one(&post).await?;
        post.id = result.inserted_id.as_object_id();
        info!("Created post {}", post.slug);

        self.populate_one(post).await
    }

    pub async fn list_posts(&self, query: &PostListQuery) -> Result<PostPage, CustomError> {
        let filter = list_filter(query.search.as_deref(), query.tags.as_deref());
        self.page(filter, query.pagination()).await
    }

    pub async fn list_by_author(
        &self,
        author_id: &ObjectId,
        pagination: Pagination,
    ) -> Result<PostPage, CustomError> {
        self.page(doc! { "author": *author_id }, pagination).await
    }

    pub async fn count_by_author(&self, author_id: &ObjectId) -> Result<u64, CustomError> {
        Ok(self
            .collection
            .count_documents(doc! { "author": *author_id })
            .await?)
    }

    /// Fetch for display; every read counts as a view.
    pub async fn view_post(&self, post_id: &ObjectId) -> Result<PostResponse, CustomError> {
        let post = self
            .collection
            .find_one_and_update(doc! { "_id": *post_id }, doc! { "$inc": { "views": 1 } })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Post not found".to_string()))?;

        self.populate_one(post).await
    }

    /// Returns the updated post and the image URL it replaced, if any.
    pub async fn update_post(
        &self,
        post_id: &ObjectId,
        user_id: &ObjectId,
        changes: PostChanges,
    ) -> Result<(PostResponse, Option<String>), CustomError> {
        let mut post = self.get_owned(post_id, user_id).await?;
        let previous_image = post.featured_image.clone();
        let image_replaced = changes.featured_image.is_some();

        if changes.apply(&mut post, Utc::now()) {
            let base = slugify(&post.title);
            if base != post.slug {
                post.slug = self.unique_slug(&post.title, Some(*post_id)).await?;
            }
        }

        // likes, views and createdAt are left to their own writers
        let mut set = to_document(&post)
            .map_err(|e| CustomError::InternalServerError(format!("Failed to encode post: {}", e)))?;
        for key in ["_id", "likes", "views", "createdAt", "author"] {
            set.remove(key);
        }

        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": *post_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Post not found".to_string()))?;

        let replaced = if image_replaced { previous_image } else { None };
        Ok((self.populate_one(updated).await?, replaced))
    }

    /// Removes the post and its comments. Returns the post so its image can be discarded.
    pub async fn delete_post(&self, post_id: &ObjectId, user_id: &ObjectId) -> Result<Post, CustomError> {
        let post = self.get_owned(post_id, user_id).await?;

        self.collection.delete_one(doc! { "_id": *post_id }).await?;
        let removed = delete_for_post(&self.comments, post_id).await?;
        info!("Deleted post {} and {} comment(s)", post.slug, removed);

        Ok(post)
    }

    pub async fn toggle_like(&self, post_id: &ObjectId, user_id: &ObjectId) -> Result<LikeToggle, CustomError> {
        let post = self.get_by_id(post_id).await?;

        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": *post_id }, like_update(&post.likes, user_id))
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Post not found".to_string()))?;

        Ok(LikeToggle::from_likes(&updated.likes, user_id))
    }
}
