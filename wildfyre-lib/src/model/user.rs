//! Users and the logged-in user

use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use url::Url;

use super::Post;
use super::document::UserDocument;
use super::document::decode;
use crate::WildFyreClient;
use crate::cache::Entity;
use crate::cache::ExpirationPolicy;
use crate::cache::Freshness;
use crate::cache::Store;
use crate::cache::refresh::evict_if_missing;
use crate::cache::refresh::spawn_reporting;
use crate::error::EntityKey;
use crate::error::Error;
use crate::transport::Method;

/// A WildFyre user.
///
/// Obtained with [`WildFyreClient::user`]. Every getter counts as a use of the
/// cached entity.
#[derive(Debug)]
pub struct User {
    id: u64,
    editable: bool,
    data: RwLock<UserData>,
    freshness: Freshness,
}

#[derive(Debug, Clone, Default)]
struct UserData {
    name: String,
    avatar: Option<String>,
    bio: String,
    banned: bool,
}

impl User {
    pub(crate) fn new(id: u64, editable: bool, policy: Arc<ExpirationPolicy>) -> Self {
        Self {
            id,
            editable,
            data: RwLock::new(UserData::default()),
            freshness: Freshness::new(policy),
        }
    }

    /// The ID of this user.
    pub fn id(&self) -> u64 {
        self.touch();
        self.id
    }

    /// The username.
    pub fn name(&self) -> String {
        self.touch();
        self.data.read().name.clone()
    }

    /// The URL of the avatar, as sent by the server.
    pub fn avatar(&self) -> Option<String> {
        self.touch();
        self.data.read().avatar.clone()
    }

    /// The avatar as a parsed URL. `None` if there is no avatar or it isn't a valid URL.
    pub fn avatar_url(&self) -> Option<Url> {
        let avatar = self.avatar()?;
        match Url::parse(&avatar) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(user = self.id, %avatar, error = %e, "the server sent an invalid avatar URL");
                None
            }
        }
    }

    /// The biography.
    pub fn bio(&self) -> String {
        self.touch();
        self.data.read().bio.clone()
    }

    /// Whether the user is banned.
    pub fn is_banned(&self) -> bool {
        self.touch();
        self.data.read().banned
    }

    /// Whether this user can be edited, i.e. is the logged-in user.
    pub fn can_edit(&self) -> bool {
        self.touch();
        self.editable
    }

    /// Returns this user as the logged-in user, or `None` if it is someone else.
    pub fn as_logged(self: &Arc<Self>) -> Option<LoggedUser> {
        self.touch();
        self.editable.then(|| LoggedUser {
            user: Arc::clone(self),
        })
    }

    fn apply(&self, doc: UserDocument) -> Result<(), Error> {
        if doc.user != self.id {
            return Err(Error::InvalidArgument(format!(
                "the server answered for user {} when asked for user {}",
                doc.user, self.id
            )));
        }

        // Fields missing from the document keep their previous value. The
        // avatar is nullable, so it is always replaced.
        let mut data = self.data.write();
        if let Some(name) = doc.name {
            data.name = name;
        }
        data.avatar = doc.avatar;
        if let Some(bio) = doc.bio {
            data.bio = bio;
        }
        if let Some(banned) = doc.banned {
            data.banned = banned;
        }
        Ok(())
    }

    fn apply_patch(&self, patch: &UserPatch) {
        let mut data = self.data.write();
        if let Some(name) = &patch.name {
            data.name = name.clone();
        }
        if let Some(bio) = &patch.bio {
            data.bio = bio.clone();
        }
        if let Some(avatar) = &patch.avatar {
            data.avatar = Some(avatar.clone());
        }
    }
}

#[async_trait]
impl Entity for User {
    type Key = u64;

    fn key(&self) -> u64 {
        self.id
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::User(self.id)
    }

    fn store(client: &WildFyreClient) -> &Store<u64, Self> {
        client.users()
    }

    fn freshness(&self) -> &Freshness {
        &self.freshness
    }

    async fn update(&self, client: &WildFyreClient) -> Result<(), Error> {
        let request = client.request(Method::Get, format!("/users/{}/", self.id));
        let document = client
            .send(request)
            .await
            .map_err(|e| evict_if_missing(client, self, e))?;

        self.apply(decode("user", document)?)?;
        self.touch();
        Ok(())
    }
}

/// Changes to the logged-in user's profile. Unset fields are left untouched.
///
/// # Example
///
/// ```
/// use wildfyre_lib::model::UserPatch;
///
/// let patch = UserPatch::new().name("newname").bio("Hello!");
/// assert!(!patch.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the new username.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the new biography.
    pub fn bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    /// Sets the new avatar URL.
    pub fn avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Returns `true` if nothing would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.bio.is_none() && self.avatar.is_none()
    }
}

/// The logged-in user, which can edit its own profile.
///
/// Dereferences to [`User`] for the getters.
#[derive(Debug, Clone)]
pub struct LoggedUser {
    user: Arc<User>,
}

impl Deref for LoggedUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.user
    }
}

impl LoggedUser {
    /// The underlying cached user.
    pub fn user(&self) -> &Arc<User> {
        &self.user
    }

    /// Changes the username. See [`LoggedUser::set`].
    pub fn set_name(&self, client: &WildFyreClient, name: impl Into<String>) -> Result<(), Error> {
        self.set(client, UserPatch::new().name(name))
    }

    /// Changes the biography. See [`LoggedUser::set`].
    pub fn set_bio(&self, client: &WildFyreClient, bio: impl Into<String>) -> Result<(), Error> {
        self.set(client, UserPatch::new().bio(bio))
    }

    /// Changes the avatar. See [`LoggedUser::set`].
    pub fn set_avatar(&self, client: &WildFyreClient, avatar: impl Into<String>) -> Result<(), Error> {
        self.set(client, UserPatch::new().avatar(avatar))
    }

    /// Edits the profile.
    ///
    /// The local fields change immediately; the patch is sent in the
    /// background, after which the user is refreshed from the server. If
    /// sending fails the failure goes to the registered handlers and the
    /// local fields keep the new values.
    pub fn set(&self, client: &WildFyreClient, patch: UserPatch) -> Result<(), Error> {
        if patch.is_empty() {
            return Err(Error::InvalidArgument("the patch doesn't change anything".into()));
        }
        let body = serde_json::to_value(&patch).map_err(|e| Error::malformed("user patch", e))?;

        self.user.apply_patch(&patch);
        self.user.touch();

        let user = Arc::clone(&self.user);
        let task_client = client.clone();
        spawn_reporting(client, async move {
            let request = task_client.request(Method::Patch, "/users/").json(body);
            task_client.send(request).await?;
            user.update(&task_client).await
        });
        Ok(())
    }

    /// Every post of this user, over all the cached areas.
    ///
    /// Only the areas whose own posts were loaded contribute, see
    /// [`Area::load_own_posts`](super::Area::load_own_posts).
    pub async fn posts(&self, client: &WildFyreClient) -> Result<Vec<Arc<Post>>, Error> {
        self.user.touch();
        let mut posts = Vec::new();
        for area in client.areas().values() {
            posts.extend(area.own_posts(client).await?);
        }
        Ok(posts)
    }
}
