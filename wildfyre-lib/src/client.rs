//! Main WildFyreClient

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use reqwest::Client;
use tokio::time::Instant;

use crate::auth;
use crate::auth::Credentials;
use crate::cache::CacheConfig;
use crate::cache::Entity;
use crate::cache::ExpirationPolicy;
use crate::cache::Store;
use crate::cache::refresh::Refresher;
use crate::cache::refresh::lookup;
use crate::error::AuthError;
use crate::error::ConnectivityError;
use crate::error::EntityKey;
use crate::error::EntityKind;
use crate::error::Error;
use crate::error::TransportError;
use crate::model::Area;
use crate::model::Draft;
use crate::model::LoggedUser;
use crate::model::Post;
use crate::model::PostKey;
use crate::model::User;
use crate::model::document::AreaListingDocument;
use crate::model::document::decode;
use crate::session::Session;
use crate::transport::DEFAULT_URL;
use crate::transport::Document;
use crate::transport::HttpTransport;
use crate::transport::Method;
use crate::transport::Request;
use crate::transport::Transport;
use crate::transport::parse_base_url;

/// The main client for interacting with the WildFyre API.
///
/// The client owns the session and one cache per entity kind. It is cheap to
/// clone (uses `Arc` internally); clones share the session and the caches.
///
/// # Example
///
/// ```no_run
/// use wildfyre_lib::WildFyreClient;
///
/// # async fn run() -> Result<(), wildfyre_lib::error::Error> {
/// let client = WildFyreClient::builder()
///     .url("http://localhost:8000")
///     .build()?;
///
/// let me = client.connect("user", "password").await?;
/// println!("Logged in as {}", me.name());
///
/// for area in client.load_areas().await? {
///     println!("{}", area.name());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WildFyreClient {
    inner: Arc<WildFyreClientInner>,
}

struct WildFyreClientInner {
    transport: Arc<dyn Transport>,
    session: RwLock<Session>,
    /// Bumped by every session change.
    generation: AtomicU64,
    users: Store<u64, User>,
    areas: Store<String, Area>,
    posts: Store<PostKey, Post>,
    drafts: Store<PostKey, Draft>,
    user_policy: Arc<ExpirationPolicy>,
    area_policy: Arc<ExpirationPolicy>,
    post_policy: Arc<ExpirationPolicy>,
    draft_policy: Arc<ExpirationPolicy>,
    refresher: Refresher,
}

impl WildFyreClient {
    /// Creates a new builder for constructing a client.
    pub fn builder() -> WildFyreClientBuilder<Missing> {
        WildFyreClientBuilder::new()
    }

    /// Creates a client for the public WildFyre server with the default cache settings.
    pub fn new() -> Result<Self, Error> {
        Self::builder().url(DEFAULT_URL).build()
    }

    fn from_parts(transport: Arc<dyn Transport>, config: &CacheConfig) -> Self {
        let policy = |kind| Arc::new(ExpirationPolicy::new(config.ttl(kind)));
        Self {
            inner: Arc::new(WildFyreClientInner {
                transport,
                session: RwLock::new(Session::default()),
                generation: AtomicU64::new(0),
                users: Store::new(),
                areas: Store::new(),
                posts: Store::new(),
                drafts: Store::new(),
                user_policy: policy(EntityKind::User),
                area_policy: policy(EntityKind::Area),
                post_policy: policy(EntityKind::Post),
                draft_policy: policy(EntityKind::Draft),
                refresher: Refresher::new(),
            }),
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Logs in with a username and a password.
    ///
    /// Fails with [`AuthError::InvalidCredentials`] if the server rejects them.
    /// Every cache is cleared.
    pub async fn connect(&self, username: impl Into<String>, password: impl Into<String>) -> Result<LoggedUser, Error> {
        let credentials = Credentials::new(username, password);
        let token = auth::request_token(self.transport(), &credentials).await?;
        tracing::info!(username = credentials.username(), "obtained a token");
        self.connect_with_token(token).await
    }

    /// Logs in with a token obtained earlier.
    ///
    /// Every cache is cleared. If the token can't be resolved to a user, the
    /// client is left disconnected.
    pub async fn connect_with_token(&self, token: impl Into<String>) -> Result<LoggedUser, Error> {
        let token = token.into();
        self.set_token(token.clone())?;

        let id = match auth::common::fetch_identity(self.transport(), &token).await {
            Ok(id) => id,
            Err(err) => {
                self.disconnect();
                return Err(err);
            }
        };
        self.mutate_session(|session| session.set_user_id(Some(id)));
        tracing::info!(user = id, "connected");

        self.me().await
    }

    /// Replaces the token, forgetting the logged-in user and every cached entity.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), Error> {
        let token = token.into();
        if token.is_empty() {
            return Err(AuthError::EmptyToken.into());
        }
        self.mutate_session(|session| *session = Session::with_token(token));
        Ok(())
    }

    /// Forgets the token, the logged-in user and every cached entity.
    pub fn disconnect(&self) {
        self.mutate_session(|session| *session = Session::default());
        tracing::info!("disconnected");
    }

    /// Same as [`WildFyreClient::disconnect`].
    pub fn reset(&self) {
        self.disconnect();
    }

    /// Applies `change` to the session and clears the caches, whatever changed.
    ///
    /// The session stays locked until the caches are empty, so background
    /// work of the previous session can't slip entities into the new one.
    fn mutate_session(&self, change: impl FnOnce(&mut Session)) {
        let mut session = self.inner.session.write();
        change(&mut *session);
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.clear();
        drop(session);
        tracing::info!("session changed, caches cleared");
    }

    /// Identifies the current session, see [`WildFyreClient::within_session`].
    pub(crate) fn session_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Runs `f` if the session is still the one identified by `generation`.
    ///
    /// The session can't change while `f` runs. Returns `false` if it had
    /// changed and `f` was dropped.
    pub(crate) fn within_session(&self, generation: u64, f: impl FnOnce()) -> bool {
        let _session = self.inner.session.read();
        if self.session_generation() != generation {
            return false;
        }
        f();
        true
    }

    /// Returns `true` if the client holds a token.
    pub fn is_connected(&self) -> bool {
        self.inner.session.read().is_connected()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.session.read().token().map(str::to_string)
    }

    /// The ID of the logged-in user.
    pub fn my_id(&self) -> Option<u64> {
        self.inner.session.read().user_id()
    }

    /// Returns `true` if `id` is the logged-in user.
    pub fn is_my_id(&self, id: u64) -> bool {
        self.my_id() == Some(id)
    }

    /// A snapshot of the session.
    pub fn session(&self) -> Session {
        self.inner.session.read().clone()
    }

    /// The logged-in user.
    pub async fn me(&self) -> Result<LoggedUser, Error> {
        let id = self.my_id().ok_or(Error::NotConnected)?;

        let user = self.user(id).await?.ok_or_else(|| Error::not_found(EntityKey::User(id)))?;
        if let Some(logged) = user.as_logged() {
            return Ok(logged);
        }

        // Cached before the identity was known: build it again as editable.
        self.users().remove_entity(&id, &user);
        self.user(id)
            .await?
            .and_then(|user| user.as_logged())
            .ok_or(Error::NotConnected)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Looks up a user.
    ///
    /// Returns `None` if the user doesn't exist, or if the server can't be
    /// reached and the connectivity handler was notified.
    pub async fn user(&self, id: u64) -> Result<Option<Arc<User>>, Error> {
        let editable = self.is_my_id(id);
        let policy = self.policy(EntityKind::User);
        lookup(self, id, move || User::new(id, editable, policy)).await
    }

    /// Looks up an area, see [`WildFyreClient::user`].
    pub async fn area(&self, id: &str) -> Result<Option<Arc<Area>>, Error> {
        let policy = self.policy(EntityKind::Area);
        lookup(self, id.to_string(), || Area::new(id, policy)).await
    }

    /// Looks up a post, see [`WildFyreClient::user`].
    pub async fn post(&self, area: &str, id: u64) -> Result<Option<Arc<Post>>, Error> {
        let key = PostKey::new(area, id);
        let policy = self.policy(EntityKind::Post);
        let placeholder = key.clone();
        lookup(self, key, move || Post::new(placeholder, policy)).await
    }

    /// Looks up a saved draft, see [`WildFyreClient::user`].
    pub async fn draft(&self, area: &str, id: u64) -> Result<Option<Arc<Draft>>, Error> {
        let key = PostKey::new(area, id);
        let policy = self.policy(EntityKind::Draft);
        let placeholder = key.clone();
        lookup(self, key, move || Draft::with_id(placeholder, policy)).await
    }

    /// Fetches the list of areas.
    ///
    /// Areas already cached are kept (with their display name updated), new
    /// ones are added and fetched, and the ones the server doesn't list
    /// anymore are removed. Areas are returned in the server's order, minus
    /// the ones that disappeared before they could be fetched.
    pub async fn load_areas(&self) -> Result<Vec<Arc<Area>>, Error> {
        let document = self.send(self.request(Method::Get, "/areas/")).await?;
        let listing: Vec<AreaListingDocument> = decode("areas", document)?;

        let store = self.areas();
        let areas: Vec<Arc<Area>> = listing
            .into_iter()
            .map(|doc| {
                let policy = self.policy(EntityKind::Area);
                let area = store.get_or_create(doc.name.clone(), || Area::new(doc.name.clone(), policy));
                area.set_display_name(doc.displayname);
                area
            })
            .collect();

        let removed = store.remove_if(|id, _| !areas.iter().any(|area| area.key() == *id));

        // The listing has no reputation, new areas are populated before being handed out.
        let updates = join_all(areas.iter().map(|area| async move {
            if area.is_new() {
                area.update(self).await
            } else {
                Ok(())
            }
        }))
        .await;

        let mut loaded = Vec::with_capacity(areas.len());
        for (area, result) in areas.into_iter().zip(updates) {
            match result {
                Ok(()) => loaded.push(area),
                Err(Error::EntityNotFound { key }) => {
                    tracing::debug!(%key, "listed area disappeared before it was fetched");
                }
                Err(err) => return Err(err),
            }
        }
        tracing::debug!(count = loaded.len(), removed, "loaded areas");
        Ok(loaded)
    }

    /// Loads the areas, then the drafts and own posts of every area.
    pub async fn init_areas(&self) -> Result<Vec<Arc<Area>>, Error> {
        let areas = self.load_areas().await?;

        let results = join_all(areas.iter().map(|area| async move {
            area.load_drafts(self).await?;
            area.load_own_posts(self).await?;
            Ok::<_, Error>(())
        }))
        .await;
        for result in results {
            result?;
        }
        Ok(areas)
    }

    // =========================================================================
    // Caches
    // =========================================================================

    pub fn users(&self) -> &Store<u64, User> {
        &self.inner.users
    }

    pub fn areas(&self) -> &Store<String, Area> {
        &self.inner.areas
    }

    pub fn posts(&self) -> &Store<PostKey, Post> {
        &self.inner.posts
    }

    /// The server-backed drafts.
    pub fn drafts(&self) -> &Store<PostKey, Draft> {
        &self.inner.drafts
    }

    /// The expiration policy of a kind. Changing its TTL affects every cached
    /// entity of that kind immediately.
    pub fn policy(&self, kind: EntityKind) -> Arc<ExpirationPolicy> {
        let policy = match kind {
            EntityKind::User => &self.inner.user_policy,
            EntityKind::Area => &self.inner.area_policy,
            EntityKind::Post => &self.inner.post_policy,
            EntityKind::Draft => &self.inner.draft_policy,
        };
        Arc::clone(policy)
    }

    /// Empties every cache. The session is kept.
    pub fn clear(&self) {
        for kind in EntityKind::ALL {
            self.clear_kind(kind);
        }
    }

    /// Empties the cache of one kind.
    pub fn clear_kind(&self, kind: EntityKind) {
        match kind {
            EntityKind::User => self.inner.users.clear(),
            EntityKind::Area => self.inner.areas.clear(),
            EntityKind::Post => self.inner.posts.clear(),
            EntityKind::Draft => self.inner.drafts.clear(),
        }
    }

    /// Removes the expired entities of every cache, judged at a single instant.
    ///
    /// Returns the number of removed entities.
    pub fn clean(&self) -> usize {
        let now = Instant::now();
        let removed: usize = EntityKind::ALL
            .into_iter()
            .map(|kind| match kind {
                EntityKind::User => self.inner.users.clean_at(now),
                EntityKind::Area => self.inner.areas.clean_at(now),
                EntityKind::Post => self.inner.posts.clean_at(now),
                EntityKind::Draft => self.inner.drafts.clean_at(now),
            })
            .sum();
        tracing::debug!(removed, "cleaned caches");
        removed
    }

    // =========================================================================
    // Background work
    // =========================================================================

    /// Registers the handler for connectivity failures of background work.
    ///
    /// Only the first registration counts; later ones are ignored with a
    /// warning and `false` is returned. Background work that loses
    /// connectivity while no handler is registered panics.
    pub fn set_connectivity_error_handler<F>(&self, handler: F) -> bool
    where
        F: Fn(ConnectivityError) + Send + Sync + 'static,
    {
        self.inner.refresher.set_connectivity_error_handler(Box::new(handler))
    }

    /// Registers the handler for entities that background refreshes found
    /// missing server-side. Same rules as
    /// [`WildFyreClient::set_connectivity_error_handler`].
    pub fn set_entity_not_found_handler<F>(&self, handler: F) -> bool
    where
        F: Fn(EntityKey) + Send + Sync + 'static,
    {
        self.inner.refresher.set_entity_not_found_handler(Box::new(handler))
    }

    /// Number of background tasks (refreshes, profile edits) still running.
    pub fn pending_tasks(&self) -> usize {
        self.inner.refresher.pending()
    }

    /// Waits until the background tasks spawned so far are done.
    ///
    /// Once [`WildFyreClient::shutdown`] was called, this only waits.
    pub async fn wait_idle(&self) {
        self.inner.refresher.wait_idle().await;
    }

    /// Waits until no background task is left, including tasks spawned while waiting.
    pub async fn shutdown(&self) {
        self.inner.refresher.shutdown().await;
        tracing::info!("client shut down");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(crate) fn refresher(&self) -> &Refresher {
        &self.inner.refresher
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    /// A request carrying the current token.
    pub(crate) fn request(&self, method: Method, path: impl Into<String>) -> Request {
        Request::new(method, path).token(self.token())
    }

    pub(crate) async fn send(&self, request: Request) -> Result<Document, TransportError> {
        self.inner.transport.request(request).await
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Where a client sends its requests.
pub enum Endpoint {
    /// The WildFyre server at this URL, over HTTP.
    Url(String),
    /// Any [`Transport`].
    Transport(Arc<dyn Transport>),
}

/// Builder for constructing a [`WildFyreClient`].
///
/// Uses the typestate pattern to ensure the endpoint is set at compile time.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wildfyre_lib::WildFyreClient;
/// use wildfyre_lib::cache::CacheConfig;
///
/// let client = WildFyreClient::builder()
///     .url("http://localhost:8000")
///     .cache_config(CacheConfig::new().with_post_ttl(Duration::from_secs(60)))
///     .timeout(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// assert!(!client.is_connected());
/// ```
pub struct WildFyreClientBuilder<E> {
    endpoint: E,
    cache_config: CacheConfig,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    http_client: Option<Client>,
}

impl WildFyreClientBuilder<Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            endpoint: Missing,
            cache_config: CacheConfig::default(),
            timeout: None,
            connect_timeout: None,
            http_client: None,
        }
    }

    /// Sets the URL of the WildFyre server.
    pub fn url(self, url: impl Into<String>) -> WildFyreClientBuilder<Set<Endpoint>> {
        self.endpoint(Endpoint::Url(url.into()))
    }

    /// Sends the requests through `transport` instead of HTTP.
    ///
    /// The timeouts and HTTP client of this builder are then ignored.
    pub fn transport<T: Transport + 'static>(self, transport: T) -> WildFyreClientBuilder<Set<Endpoint>> {
        self.endpoint(Endpoint::Transport(Arc::new(transport)))
    }

    fn endpoint(self, endpoint: Endpoint) -> WildFyreClientBuilder<Set<Endpoint>> {
        WildFyreClientBuilder {
            endpoint: Set(endpoint),
            cache_config: self.cache_config,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            http_client: self.http_client,
        }
    }
}

impl Default for WildFyreClientBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> WildFyreClientBuilder<E> {
    /// Sets the TTL of each entity kind.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    ///
    /// This is applied when building the HTTP client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets a custom HTTP client.
    ///
    /// If not set, a default client will be created.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl WildFyreClientBuilder<Set<Endpoint>> {
    /// Builds the [`WildFyreClient`].
    ///
    /// Fails if the URL is invalid or the HTTP client can't be created.
    pub fn build(self) -> Result<WildFyreClient, Error> {
        let transport: Arc<dyn Transport> = match self.endpoint.0 {
            Endpoint::Transport(transport) => transport,
            Endpoint::Url(url) => {
                let http_client = match self.http_client {
                    Some(client) => client,
                    None => {
                        let mut builder = Client::builder();
                        if let Some(timeout) = self.connect_timeout {
                            builder = builder.connect_timeout(timeout);
                        }
                        builder.build().map_err(ConnectivityError::from)?
                    }
                };
                let mut transport = HttpTransport::with_client(parse_base_url(&url)?, http_client);
                if let Some(timeout) = self.timeout {
                    transport = transport.with_timeout(timeout);
                }
                Arc::new(transport)
            }
        };

        Ok(WildFyreClient::from_parts(transport, &self.cache_config))
    }
}
