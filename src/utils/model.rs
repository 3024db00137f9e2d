use mongodb::bson::{Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
pub struct LoginRequests {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

impl LoginRequests {
    /// The non-empty identifiers the caller supplied, lowercased.
    pub fn identifiers(&self) -> (Option<String>, Option<String>) {
        let clean = |v: &Option<String>| {
            v.as_ref()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
        };
        (clean(&self.username), clean(&self.email))
    }
}

/// Result of a like toggle on a post or comment.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub is_liked: bool,
    pub likes_count: usize,
}

impl LikeToggle {
    pub fn from_likes(likes: &[ObjectId], user_id: &ObjectId) -> Self {
        Self {
            is_liked: likes.contains(user_id),
            likes_count: likes.len(),
        }
    }
}

/// `$pull` when `user_id` already likes the document, `$addToSet` otherwise.
pub fn like_update(likes: &[ObjectId], user_id: &ObjectId) -> Document {
    if likes.contains(user_id) {
        doc! { "$pull": { "likes": *user_id } }
    } else {
        doc! { "$addToSet": { "likes": *user_id } }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_identifiers_are_normalised() {
        let login = LoginRequests {
            username: Some("  ".into()),
            email: Some(" Jane@Example.com ".into()),
            password: "x".into(),
        };
        assert_eq!(
            login.identifiers(),
            (None, Some("jane@example.com".to_string()))
        );
    }

    #[test]
    fn like_update_flips_membership() {
        let me = ObjectId::new();
        let other = ObjectId::new();

        let add = like_update(&[other], &me);
        assert!(add.contains_key("$addToSet"));

        let remove = like_update(&[other, me], &me);
        assert!(remove.contains_key("$pull"));
    }

    #[test]
    fn toggling_twice_restores_state() {
        let me = ObjectId::new();
        let mut likes = vec![ObjectId::new()];
        let before = LikeToggle::from_likes(&likes, &me);

        likes.push(me);
        let liked = LikeToggle::from_likes(&likes, &me);
        assert!(liked.is_liked);
        assert_eq!(liked.likes_count, before.likes_count + 1);

        likes.retain(|id| id != &me);
        assert_eq!(LikeToggle::from_likes(&likes, &me), before);
    }

    #[test]
    fn toggle_serialises_camel_case() {
        let json = serde_json::to_value(LikeToggle {
            is_liked: true,
            likes_count: 3,
        })
        .unwrap();
        assert_eq!(json["isLiked"], true);
        assert_eq!(json["likesCount"], 3);
    }
}
