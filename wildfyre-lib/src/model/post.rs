//! Published posts

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use parking_lot::RwLock;

use super::Area;
use super::Comment;
use super::User;
use super::document::CommentDocument;
use super::document::ImageDocument;
use super::document::PostDocument;
use super::document::decode;
use crate::WildFyreClient;
use crate::cache::Entity;
use crate::cache::ExpirationPolicy;
use crate::cache::Freshness;
use crate::cache::Store;
use crate::cache::refresh::evict_if_missing;
use crate::error::EntityKey;
use crate::error::Error;
use crate::transport::Document;
use crate::transport::Method;

/// Identifies a post or a draft: the area it lives in and its ID there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostKey {
    pub area: String,
    pub id: u64,
}

impl PostKey {
    pub fn new(area: impl Into<String>, id: u64) -> Self {
        Self { area: area.into(), id }
    }

    /// `/areas/{area}/`
    pub(crate) fn area_path(area: &str) -> String {
        format!("/areas/{}/", urlencoding::encode(area))
    }
}

impl fmt::Display for PostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.area, self.id)
    }
}

/// The fields shared by posts and drafts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PostContent {
    pub author: Option<u64>,
    pub anonymous: bool,
    pub subscribed: bool,
    pub created: Option<DateTime<Utc>>,
    pub active: bool,
    pub text: String,
    pub image: Option<String>,
    pub additional_images: Vec<String>,
}

impl Default for PostContent {
    fn default() -> Self {
        Self {
            author: None,
            anonymous: false,
            subscribed: true,
            created: None,
            active: true,
            text: String::new(),
            image: None,
            additional_images: Vec::new(),
        }
    }
}

impl PostContent {
    /// Splits a document into its ID, its content and its comments.
    pub(crate) fn from_document(doc: PostDocument) -> (u64, Self, Vec<CommentDocument>) {
        let content = Self {
            author: doc.author.map(|a| a.user),
            anonymous: doc.anonym,
            subscribed: doc.subscribed,
            created: Some(doc.created),
            active: doc.active,
            text: doc.text.unwrap_or_default(),
            image: doc.image,
            additional_images: doc
                .additional_images
                .into_iter()
                .filter_map(ImageDocument::into_url)
                .collect(),
        };
        (doc.id, content, doc.comments)
    }
}

#[derive(Debug, Default)]
struct PostData {
    content: PostContent,
    comments: Vec<Comment>,
}

/// A published post.
///
/// Posts can't be modified by the client. The comments are replaced as a
/// whole every time the post is refreshed.
#[derive(Debug)]
pub struct Post {
    key: PostKey,
    data: RwLock<PostData>,
    freshness: Freshness,
}

impl Post {
    pub(crate) fn new(key: PostKey, policy: Arc<ExpirationPolicy>) -> Self {
        Self {
            key,
            data: RwLock::new(PostData::default()),
            freshness: Freshness::new(policy),
        }
    }

    /// Builds an already populated post from a document the server sent.
    pub(crate) fn from_document(
        area: &str,
        document: Document,
        policy: Arc<ExpirationPolicy>,
    ) -> Result<Self, Error> {
        let doc: PostDocument = decode("post", document)?;
        let post = Self::new(PostKey::new(area, doc.id), policy);
        post.apply(doc)?;
        post.touch();
        Ok(post)
    }

    fn apply(&self, doc: PostDocument) -> Result<(), Error> {
        let (id, content, comments) = PostContent::from_document(doc);
        if id != self.key.id {
            return Err(Error::InvalidArgument(format!(
                "the server answered for post {} when asked for post {}",
                id, self.key
            )));
        }
        let comments = comments
            .into_iter()
            .map(|c| Comment::from_document(self.key.clone(), c))
            .collect();

        let mut data = self.data.write();
        data.content = content;
        data.comments = comments;
        Ok(())
    }

    /// The ID of this post in its area.
    pub fn id(&self) -> u64 {
        self.touch();
        self.key.id
    }

    /// The area and ID of this post.
    pub fn post_key(&self) -> PostKey {
        self.touch();
        self.key.clone()
    }

    /// The ID of the author, `None` when anonymous or when the author deleted their account.
    pub fn author_id(&self) -> Option<u64> {
        self.touch();
        let data = self.data.read();
        if data.content.anonymous {
            None
        } else {
            data.content.author
        }
    }

    /// Resolves the author through the user cache.
    pub async fn author(&self, client: &WildFyreClient) -> Result<Option<Arc<User>>, Error> {
        match self.author_id() {
            Some(id) => client.user(id).await,
            None => Ok(None),
        }
    }

    /// `true` if the post isn't anonymous but has no author anymore.
    pub fn is_author_deleted(&self) -> bool {
        self.touch();
        let data = self.data.read();
        !data.content.anonymous && data.content.author.is_none()
    }

    /// Resolves the area through the area cache.
    pub async fn area(&self, client: &WildFyreClient) -> Result<Option<Arc<Area>>, Error> {
        self.touch();
        client.area(&self.key.area).await
    }

    /// The ID of the area this post lives in.
    pub fn area_id(&self) -> &str {
        self.touch();
        &self.key.area
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.touch();
        self.data.read().content.created
    }

    pub fn text(&self) -> String {
        self.touch();
        self.data.read().content.text.clone()
    }

    pub fn image(&self) -> Option<String> {
        self.touch();
        self.data.read().content.image.clone()
    }

    pub fn additional_images(&self) -> Vec<String> {
        self.touch();
        self.data.read().content.additional_images.clone()
    }

    /// A snapshot of the comments, oldest first.
    pub fn comments(&self) -> Vec<Comment> {
        self.touch();
        self.data.read().comments.clone()
    }

    /// Whether the post is still spreading.
    pub fn is_active(&self) -> bool {
        self.touch();
        self.data.read().content.active
    }

    pub fn is_anonymous(&self) -> bool {
        self.touch();
        self.data.read().content.anonymous
    }

    /// Whether the logged-in user receives notifications for this post.
    pub fn has_subscribed(&self) -> bool {
        self.touch();
        self.data.read().content.subscribed
    }
}

#[async_trait]
impl Entity for Post {
    type Key = PostKey;

    fn key(&self) -> PostKey {
        self.key.clone()
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::Post(self.key.clone())
    }

    fn store(client: &WildFyreClient) -> &Store<PostKey, Self> {
        client.posts()
    }

    fn freshness(&self) -> &Freshness {
        &self.freshness
    }

    async fn update(&self, client: &WildFyreClient) -> Result<(), Error> {
        let path = format!("{}{}/", PostKey::area_path(&self.key.area), self.key.id);
        let document = client
            .send(client.request(Method::Get, path))
            .await
            .map_err(|e| evict_if_missing(client, self, e))?;

        self.apply(decode("post", document)?)?;
        self.touch();
        Ok(())
    }
}
