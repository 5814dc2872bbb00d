//! Drafts of posts

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::json;
use tokio::sync::Mutex;

use super::Post;
use super::PostContent;
use super::PostKey;
use super::document::PostDocument;
use super::document::decode;
use crate::WildFyreClient;
use crate::cache::Entity;
use crate::cache::ExpirationPolicy;
use crate::cache::Freshness;
use crate::cache::Store;
use crate::cache::refresh::evict_if_missing;
use crate::error::EntityKey;
use crate::error::EntityKind;
use crate::error::Error;
use crate::transport::Document;
use crate::transport::Method;

/// Where a draft is in its lifecycle.
///
/// ```text
/// LocalOnly --save--> ServerBacked
/// LocalOnly | ServerBacked --publish--> Published
/// LocalOnly | ServerBacked --delete--> Deleted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    /// Never saved, only exists in this process.
    LocalOnly,
    /// Saved on the server under this ID.
    ServerBacked(u64),
    /// Published as the post with this ID.
    Published(u64),
    /// Deleted.
    Deleted,
}

impl DraftState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalOnly => "local-only",
            Self::ServerBacked(_) => "server-backed",
            Self::Published(_) => "published",
            Self::Deleted => "deleted",
        }
    }

    /// `true` once the draft was published or deleted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published(_) | Self::Deleted)
    }

    fn closed(&self) -> Error {
        Error::DraftClosed { state: self.as_str() }
    }
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A post being written.
///
/// Create one with [`Area::draft`](super::Area::draft), fill it with the
/// setters, then [`save`](Draft::save) or [`publish`](Draft::publish) it.
/// Server-backed drafts are cached in [`WildFyreClient::drafts`]; local-only
/// drafts are owned by the caller.
#[derive(Debug)]
pub struct Draft {
    area: String,
    state: RwLock<DraftState>,
    content: RwLock<PostContent>,
    /// Serializes save, publish and delete.
    ops: Mutex<()>,
    freshness: Freshness,
}

impl Draft {
    /// A new local-only draft.
    pub(crate) fn new(area: impl Into<String>, author: u64, policy: Arc<ExpirationPolicy>) -> Self {
        let draft = Self {
            area: area.into(),
            state: RwLock::new(DraftState::LocalOnly),
            content: RwLock::new(PostContent {
                author: Some(author),
                ..PostContent::default()
            }),
            ops: Mutex::new(()),
            freshness: Freshness::new(policy),
        };
        draft.touch();
        draft
    }

    /// An unpopulated server-backed draft, filled by its first update.
    pub(crate) fn with_id(key: PostKey, policy: Arc<ExpirationPolicy>) -> Self {
        Self {
            area: key.area,
            state: RwLock::new(DraftState::ServerBacked(key.id)),
            content: RwLock::new(PostContent::default()),
            ops: Mutex::new(()),
            freshness: Freshness::new(policy),
        }
    }

    /// A populated server-backed draft.
    pub(crate) fn from_document(area: impl Into<String>, doc: PostDocument, policy: Arc<ExpirationPolicy>) -> Self {
        let (id, content, _) = PostContent::from_document(doc);
        let draft = Self {
            area: area.into(),
            state: RwLock::new(DraftState::ServerBacked(id)),
            content: RwLock::new(content),
            ops: Mutex::new(()),
            freshness: Freshness::new(policy),
        };
        draft.touch();
        draft
    }

    pub fn state(&self) -> DraftState {
        self.touch();
        *self.state.read()
    }

    /// The server ID, `None` while local-only and once terminal.
    pub fn id(&self) -> Option<u64> {
        match self.state() {
            DraftState::ServerBacked(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_local_only(&self) -> bool {
        self.state() == DraftState::LocalOnly
    }

    /// The ID of the area the draft will be published in.
    pub fn area_id(&self) -> &str {
        self.touch();
        &self.area
    }

    pub fn author_id(&self) -> Option<u64> {
        self.touch();
        self.content.read().author
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.touch();
        self.content.read().created
    }

    pub fn text(&self) -> String {
        self.touch();
        self.content.read().text.clone()
    }

    pub fn image(&self) -> Option<String> {
        self.touch();
        self.content.read().image.clone()
    }

    pub fn is_anonymous(&self) -> bool {
        self.touch();
        self.content.read().anonymous
    }

    pub fn has_subscribed(&self) -> bool {
        self.touch();
        self.content.read().subscribed
    }

    /// Replaces the text. Local until the next save or publish.
    pub fn set_text(&self, text: impl Into<String>) -> &Self {
        self.touch();
        self.content.write().text = text.into();
        self
    }

    /// Whether the post hides its author. Local until the next save or publish.
    pub fn set_anonymous(&self, anonymous: bool) -> &Self {
        self.touch();
        self.content.write().anonymous = anonymous;
        self
    }

    /// Receive notifications for the published post.
    pub fn subscribe(&self) -> &Self {
        self.touch();
        self.content.write().subscribed = true;
        self
    }

    pub fn unsubscribe(&self) -> &Self {
        self.touch();
        self.content.write().subscribed = false;
        self
    }

    fn body(&self) -> Document {
        let content = self.content.read();
        json!({
            "anonym": content.anonymous,
            "subscribed": content.subscribed,
            "text": content.text,
        })
    }

    fn drafts_path(&self) -> String {
        format!("{}drafts/", PostKey::area_path(&self.area))
    }

    fn apply(&self, doc: PostDocument) -> u64 {
        let (id, content, _) = PostContent::from_document(doc);
        *self.content.write() = content;
        id
    }

    /// Saves the draft on the server.
    ///
    /// The first save of a local-only draft creates it server-side, after
    /// which the draft is cached; later saves edit it.
    pub async fn save(self: &Arc<Self>, client: &WildFyreClient) -> Result<(), Error> {
        let _guard = self.ops.lock().await;

        let state = *self.state.read();
        match state {
            DraftState::LocalOnly => {
                let request = client.request(Method::Post, self.drafts_path()).json(self.body());
                let document = client.send(request).await?;
                let id = self.apply(decode("draft", document)?);

                *self.state.write() = DraftState::ServerBacked(id);
                self.touch();
                client.drafts().put(self.key(), Arc::clone(self));
                tracing::debug!(area = %self.area, id, "created draft");
            }
            DraftState::ServerBacked(id) => {
                let path = format!("{}{}/", self.drafts_path(), id);
                let request = client.request(Method::Patch, path).json(self.body());
                let document = client
                    .send(request)
                    .await
                    .map_err(|e| evict_if_missing(client, self.as_ref(), e))?;
                self.apply(decode("draft", document)?);
                self.touch();
            }
            state => return Err(state.closed()),
        }
        Ok(())
    }

    /// Publishes the draft, which becomes a post.
    ///
    /// A local-only draft is created and published in one request. The new
    /// post is cached and added to the own posts of its area if that area is
    /// cached.
    pub async fn publish(self: &Arc<Self>, client: &WildFyreClient) -> Result<Arc<Post>, Error> {
        let _guard = self.ops.lock().await;

        let state = *self.state.read();
        let key = self.key();
        let document = match state {
            DraftState::LocalOnly => {
                let request = client
                    .request(Method::Post, PostKey::area_path(&self.area))
                    .json(self.body());
                client.send(request).await?
            }
            DraftState::ServerBacked(id) => {
                let path = format!("{}{}/publish/", self.drafts_path(), id);
                client
                    .send(client.request(Method::Post, path))
                    .await
                    .map_err(|e| evict_if_missing(client, self.as_ref(), e))?
            }
            state => return Err(state.closed()),
        };

        let post = Arc::new(Post::from_document(
            &self.area,
            document,
            client.policy(EntityKind::Post),
        )?);
        let post_id = post.key().id;
        client.posts().put(post.key(), Arc::clone(&post));
        self.retire(client, &key, DraftState::Published(post_id));
        if let Some(area) = client.areas().get_cached(&self.area) {
            area.record_own_post(post_id);
        }
        tracing::debug!(area = %self.area, post = post_id, "published draft");
        Ok(post)
    }

    /// Deletes the draft.
    ///
    /// A local-only draft only changes state. A server-backed draft is
    /// removed from the cache first, then deleted server-side; a draft the
    /// server no longer knows counts as deleted.
    pub async fn delete(self: &Arc<Self>, client: &WildFyreClient) -> Result<(), Error> {
        let _guard = self.ops.lock().await;

        let state = *self.state.read();
        let key = self.key();
        match state {
            DraftState::LocalOnly => {}
            DraftState::ServerBacked(id) => {
                client.drafts().remove_entity(&key, self);
                let path = format!("{}{}/", self.drafts_path(), id);
                match client.send(client.request(Method::Delete, path)).await {
                    Ok(_) => {}
                    Err(err) if err.as_transfer().is_some_and(|e| e.is_not_found()) => {
                        tracing::debug!(area = %self.area, id, "draft was already deleted server-side");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            state => return Err(state.closed()),
        }

        self.retire(client, &key, DraftState::Deleted);
        Ok(())
    }

    /// Moves to a terminal state and leaves the cache.
    ///
    /// Done under the state lock, so a refresh finishing concurrently can't
    /// put the draft back, see [`Entity::restore`].
    fn retire(&self, client: &WildFyreClient, key: &PostKey, terminal: DraftState) {
        let mut state = self.state.write();
        *state = terminal;
        client.drafts().remove_entity(key, self);
    }
}

#[async_trait]
impl Entity for Draft {
    type Key = PostKey;

    /// Local-only and terminal drafts use ID 0, they are never stored.
    fn key(&self) -> PostKey {
        let id = match *self.state.read() {
            DraftState::ServerBacked(id) => id,
            _ => 0,
        };
        PostKey::new(self.area.clone(), id)
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::Draft(self.key())
    }

    fn store(client: &WildFyreClient) -> &Store<PostKey, Self> {
        client.drafts()
    }

    fn freshness(&self) -> &Freshness {
        &self.freshness
    }

    /// Published and deleted drafts are never put back.
    fn restore(self: Arc<Self>, client: &WildFyreClient, key: PostKey) {
        let state = self.state.read();
        if state.is_terminal() {
            tracing::debug!(%key, state = %*state, "not restoring a closed draft");
            return;
        }
        client.drafts().put(key, Arc::clone(&self));
    }

    async fn update(&self, client: &WildFyreClient) -> Result<(), Error> {
        let state = *self.state.read();
        match state {
            DraftState::ServerBacked(id) => {
                let path = format!("{}{}/", self.drafts_path(), id);
                let document = client
                    .send(client.request(Method::Get, path))
                    .await
                    .map_err(|e| evict_if_missing(client, self, e))?;
                self.apply(decode("draft", document)?);
                self.touch();
            }
            DraftState::LocalOnly => self.touch(),
            DraftState::Published(_) | DraftState::Deleted => {}
        }
        Ok(())
    }
}
