//! Areas, the boards posts are published in

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;

use super::Draft;
use super::Post;
use super::PostKey;
use super::document::OwnPostDocument;
use super::document::PostDocument;
use super::document::ReputationDocument;
use super::document::ResultsDocument;
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
use crate::transport::Method;

/// An area.
///
/// The reputation and spread are those of the logged-in user in this area.
/// Posts and drafts are not held by the area, they are looked up in the client
/// caches by area ID.
#[derive(Debug)]
pub struct Area {
    id: String,
    data: RwLock<AreaData>,
    freshness: Freshness,
}

#[derive(Debug, Default)]
struct AreaData {
    display_name: Option<String>,
    reputation: Option<i64>,
    spread: Option<i64>,
    own_post_ids: Vec<u64>,
}

impl Area {
    pub(crate) fn new(id: impl Into<String>, policy: Arc<ExpirationPolicy>) -> Self {
        Self {
            id: id.into(),
            data: RwLock::new(AreaData::default()),
            freshness: Freshness::new(policy),
        }
    }

    pub(crate) fn set_display_name(&self, display_name: Option<String>) {
        self.data.write().display_name = display_name;
    }

    /// The ID of this area, its name in lowercase.
    pub fn id(&self) -> &str {
        self.touch();
        &self.id
    }

    /// The display name, or the capitalized ID if the server didn't send one.
    pub fn name(&self) -> String {
        self.touch();
        match &self.data.read().display_name {
            Some(name) => name.clone(),
            None => title_case(&self.id),
        }
    }

    /// The reputation of the logged-in user here, if the server sent it.
    pub fn reputation(&self) -> Option<i64> {
        self.touch();
        self.data.read().reputation
    }

    /// The spread of the logged-in user here, if the server sent it.
    pub fn spread(&self) -> Option<i64> {
        self.touch();
        self.data.read().spread
    }

    /// Looks up a post of this area, see [`WildFyreClient::post`].
    pub async fn post(&self, client: &WildFyreClient, id: u64) -> Result<Option<Arc<Post>>, Error> {
        self.touch();
        client.post(&self.id, id).await
    }

    /// Returns the post if it is cached, without any request.
    pub fn cached_post(&self, client: &WildFyreClient, id: u64) -> Option<Arc<Post>> {
        self.touch();
        client.posts().get_cached(&PostKey::new(self.id.clone(), id))
    }

    /// The cached posts of this area.
    pub fn cached_posts(&self, client: &WildFyreClient) -> Vec<Arc<Post>> {
        self.touch();
        client
            .posts()
            .values()
            .into_iter()
            .filter(|post| post.key().area == self.id)
            .collect()
    }

    /// Fetches the drafts of the logged-in user in this area.
    ///
    /// The cached drafts of this area are replaced by the fetched ones.
    pub async fn load_drafts(&self, client: &WildFyreClient) -> Result<Vec<Arc<Draft>>, Error> {
        self.touch();
        let path = format!("{}drafts/", PostKey::area_path(&self.id));
        let document = client.send(client.request(Method::Get, path)).await?;
        let results: ResultsDocument<PostDocument> = decode("drafts", document)?;

        let policy = client.policy(EntityKind::Draft);
        let drafts: Vec<_> = results
            .results
            .into_iter()
            .map(|doc| Arc::new(Draft::from_document(self.id.clone(), doc, Arc::clone(&policy))))
            .collect();

        let store = client.drafts();
        store.remove_if(|key, _| key.area == self.id);
        for draft in &drafts {
            store.put(draft.key(), Arc::clone(draft));
        }
        tracing::debug!(area = %self.id, count = drafts.len(), "loaded drafts");
        Ok(drafts)
    }

    /// The cached drafts of this area.
    pub fn drafts(&self, client: &WildFyreClient) -> Vec<Arc<Draft>> {
        self.touch();
        client
            .drafts()
            .values()
            .into_iter()
            .filter(|draft| draft.key().area == self.id)
            .collect()
    }

    /// Starts a new local-only draft in this area.
    pub fn draft(&self, client: &WildFyreClient) -> Result<Arc<Draft>, Error> {
        self.touch();
        let author = client.my_id().ok_or(Error::NotConnected)?;
        Ok(Arc::new(Draft::new(
            self.id.clone(),
            author,
            client.policy(EntityKind::Draft),
        )))
    }

    /// Fetches the IDs of the posts of the logged-in user in this area.
    ///
    /// Only the IDs are loaded; see [`Area::own_posts`].
    pub async fn load_own_posts(&self, client: &WildFyreClient) -> Result<Vec<u64>, Error> {
        self.touch();
        let path = format!("{}own/", PostKey::area_path(&self.id));
        let document = client.send(client.request(Method::Get, path)).await?;
        let results: ResultsDocument<OwnPostDocument> = decode("own posts", document)?;

        let ids: Vec<u64> = results.results.into_iter().filter_map(|p| p.id).collect();
        self.data.write().own_post_ids = ids.clone();
        Ok(ids)
    }

    /// The IDs loaded by [`Area::load_own_posts`], empty until then.
    pub fn own_post_ids(&self) -> Vec<u64> {
        self.touch();
        self.data.read().own_post_ids.clone()
    }

    /// Resolves the own post IDs through the post cache, skipping the posts
    /// that don't exist anymore.
    pub async fn own_posts(&self, client: &WildFyreClient) -> Result<Vec<Arc<Post>>, Error> {
        let ids = self.own_post_ids();
        let posts = join_all(ids.into_iter().map(|id| client.post(&self.id, id))).await;

        let mut found = Vec::with_capacity(posts.len());
        for post in posts {
            if let Some(post) = post? {
                found.push(post);
            }
        }
        Ok(found)
    }

    pub(crate) fn record_own_post(&self, id: u64) {
        let mut data = self.data.write();
        if !data.own_post_ids.contains(&id) {
            data.own_post_ids.push(id);
        }
    }
}

#[async_trait]
impl Entity for Area {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::Area(self.id.clone())
    }

    fn store(client: &WildFyreClient) -> &Store<String, Self> {
        client.areas()
    }

    fn freshness(&self) -> &Freshness {
        &self.freshness
    }

    async fn update(&self, client: &WildFyreClient) -> Result<(), Error> {
        let path = format!("{}rep/", PostKey::area_path(&self.id));
        let document = client
            .send(client.request(Method::Get, path))
            .await
            .map_err(|e| evict_if_missing(client, self, e))?;
        let rep: ReputationDocument = decode("area reputation", document)?;

        {
            let mut data = self.data.write();
            data.reputation = rep.reputation;
            data.spread = rep.spread;
        }
        self.touch();
        Ok(())
    }
}

fn title_case(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn area(id: &str) -> Area {
        Area::new(id, Arc::new(ExpirationPolicy::new(Duration::from_secs(60))))
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("fun"), "Fun");
        assert_eq!(title_case("éte"), "Éte");
        assert_eq!(title_case(""), "");
    }

    #[tokio::test]
    async fn test_name_falls_back_to_id() {
        let area = area("sample");
        assert_eq!(area.name(), "Sample");

        area.set_display_name(Some("Sample Area".into()));
        assert_eq!(area.name(), "Sample Area");
    }

    #[tokio::test]
    async fn test_record_own_post_once() {
        let area = area("fun");
        area.record_own_post(3);
        area.record_own_post(3);
        area.record_own_post(5);
        assert_eq!(area.own_post_ids(), vec![3, 5]);
    }
}
