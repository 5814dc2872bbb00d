//! Comments on posts

use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use super::Area;
use super::Post;
use super::PostKey;
use super::User;
use super::document::CommentDocument;
use crate::WildFyreClient;
use crate::error::Error;

/// A comment on a post.
///
/// Comments aren't cached on their own: they are built when their post is
/// refreshed and replaced on the next refresh. The author, post and area are
/// kept as keys and resolved through the client caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    id: u64,
    post: PostKey,
    author: Option<u64>,
    created: DateTime<Utc>,
    text: String,
    image: Option<String>,
}

impl Comment {
    pub(crate) fn from_document(post: PostKey, doc: CommentDocument) -> Self {
        Self {
            id: doc.id,
            post,
            author: doc.author.map(|a| a.user),
            created: doc.created,
            text: doc.text.unwrap_or_default(),
            image: doc.image,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// The ID of the author, `None` if the author deleted their account.
    pub fn author_id(&self) -> Option<u64> {
        self.author
    }

    /// The post this comment belongs to.
    pub fn post_key(&self) -> &PostKey {
        &self.post
    }

    /// Resolves the author through the user cache.
    pub async fn author(&self, client: &WildFyreClient) -> Result<Option<Arc<User>>, Error> {
        match self.author {
            Some(id) => client.user(id).await,
            None => Ok(None),
        }
    }

    /// Resolves the post through the post cache.
    pub async fn post(&self, client: &WildFyreClient) -> Result<Option<Arc<Post>>, Error> {
        client.post(&self.post.area, self.post.id).await
    }

    /// Resolves the area through the area cache.
    pub async fn area(&self, client: &WildFyreClient) -> Result<Option<Arc<Area>>, Error> {
        client.area(&self.post.area).await
    }
}
