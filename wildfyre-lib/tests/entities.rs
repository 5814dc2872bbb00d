//! Users, areas, posts and comments against a scripted server.

mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use common::MY_ID;
use common::ScriptedTransport;
use common::post_doc;
use common::user_doc;
use serde_json::json;
use wildfyre_lib::WildFyreClient;
use wildfyre_lib::cache::CacheConfig;
use wildfyre_lib::cache::Entity;
use wildfyre_lib::error::Error;
use wildfyre_lib::model::PostKey;
use wildfyre_lib::model::UserPatch;
use wildfyre_lib::transport::Method;

async fn connected() -> (ScriptedTransport, WildFyreClient) {
    let transport = ScriptedTransport::new();
    let client = common::connected(&transport, CacheConfig::default()).await;
    (transport, client)
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_profile_edit_is_optimistic() {
    let (transport, client) = connected().await;
    transport.on(Method::Patch, "/users/", json!({}));
    transport.on_get("/users/1/", user_doc(MY_ID, "renamed"));
    let me = client.me().await.unwrap();

    me.set_name(&client, "renamed").unwrap();

    assert_eq!(me.name(), "renamed");
    assert!(transport.calls().is_empty());
    assert_eq!(client.pending_tasks(), 1);

    client.wait_idle().await;
    let calls = transport.calls();
    assert_eq!(calls[0].method, Method::Patch);
    assert_eq!(calls[0].body, Some(json!({ "name": "renamed" })));
    assert_eq!(calls[1].path, "/users/1/");
    assert_eq!(me.name(), "renamed");
}

#[tokio::test(start_paused = true)]
async fn test_failed_profile_edit_is_not_rolled_back() {
    let (transport, client) = connected().await;
    transport.offline(Method::Patch, "/users/");
    let reported = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reported);
    client.set_connectivity_error_handler(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let me = client.me().await.unwrap();

    me.set_bio(&client, "New bio").unwrap();
    client.wait_idle().await;

    assert_eq!(reported.load(Ordering::SeqCst), 1);
    assert_eq!(me.bio(), "New bio");
}

#[tokio::test(start_paused = true)]
async fn test_empty_patch_is_rejected() {
    let (transport, client) = connected().await;
    let me = client.me().await.unwrap();

    assert!(matches!(me.set(&client, UserPatch::new()), Err(Error::InvalidArgument(_))));
    assert_eq!(client.pending_tasks(), 0);
    assert!(transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_fields_keep_previous_values() {
    let (transport, client) = connected().await;
    transport.on_get("/users/42/", user_doc(42, "alice"));
    let alice = client.user(42).await.unwrap().unwrap();

    transport.on_get("/users/42/", json!({ "user": 42, "name": "alice", "avatar": "https://img/a.png" }));
    alice.update(&client).await.unwrap();

    assert_eq!(alice.bio(), "Bio of alice");
    assert_eq!(alice.avatar_url().map(|url| url.to_string()), Some("https://img/a.png".to_string()));
    assert!(!alice.is_banned());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_avatar_url() {
    let (transport, client) = connected().await;
    transport.on_get("/users/42/", json!({ "user": 42, "name": "alice", "avatar": "not a url" }));

    let alice = client.user(42).await.unwrap().unwrap();

    assert_eq!(alice.avatar().as_deref(), Some("not a url"));
    assert!(alice.avatar_url().is_none());
}

// =============================================================================
// Areas
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_load_areas_keeps_cached_instances() {
    let (transport, client) = connected().await;
    transport.on_get(
        "/areas/",
        json!([
            { "name": "fun", "displayname": "Fun" },
            { "name": "information", "displayname": null }
        ]),
    );
    transport.on_get("/areas/fun/rep/", json!({ "reputation": 12, "spread": 4 }));
    transport.on_get("/areas/information/rep/", json!({ "reputation": 0, "spread": 1 }));

    let areas = client.load_areas().await.unwrap();
    assert_eq!(areas.len(), 2);
    assert_eq!(areas[0].name(), "Fun");
    assert_eq!(areas[1].name(), "Information");

    transport.on_get("/areas/", json!([{ "name": "fun", "displayname": "Fun stuff" }]));
    let reloaded = client.load_areas().await.unwrap();

    assert_eq!(reloaded.len(), 1);
    assert!(Arc::ptr_eq(&areas[0], &reloaded[0]));
    assert_eq!(reloaded[0].name(), "Fun stuff");
    assert!(client.areas().get_cached(&"information".to_string()).is_none());
    assert_eq!(transport.count(Method::Get, "/areas/fun/rep/"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_listed_areas_are_populated() {
    let (transport, client) = connected().await;
    transport.on_get("/areas/", json!([{ "name": "fun", "displayname": "Fun" }]));
    transport.on_get("/areas/fun/rep/", json!({ "reputation": 12, "spread": 4 }));

    let areas = client.load_areas().await.unwrap();
    assert_eq!(areas[0].name(), "Fun");
    assert_eq!(areas[0].reputation(), Some(12));

    let area = client.area("fun").await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&areas[0], &area));
    assert_eq!(area.reputation(), Some(12));
    assert_eq!(area.spread(), Some(4));
    assert_eq!(transport.count(Method::Get, "/areas/fun/rep/"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_listed_area_missing_on_fetch_is_skipped() {
    let (transport, client) = connected().await;
    transport.on_get(
        "/areas/",
        json!([{ "name": "fun", "displayname": "Fun" }, { "name": "gone", "displayname": "Gone" }]),
    );
    transport.on_get("/areas/fun/rep/", json!({ "reputation": 12, "spread": 4 }));
    transport.not_found(Method::Get, "/areas/gone/rep/");

    let areas = client.load_areas().await.unwrap();

    assert_eq!(areas.len(), 1);
    assert_eq!(areas[0].key(), "fun");
    assert!(client.areas().get_cached(&"gone".to_string()).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_area_reputation() {
    let (transport, client) = connected().await;
    transport.on_get("/areas/fun/rep/", json!({ "reputation": 12, "spread": 4 }));

    let area = client.area("fun").await.unwrap().unwrap();

    assert_eq!(area.reputation(), Some(12));
    assert_eq!(area.spread(), Some(4));
}

#[tokio::test(start_paused = true)]
async fn test_missing_area_is_absent() {
    let (transport, client) = connected().await;
    transport.not_found(Method::Get, "/areas/gone/rep/");

    assert!(client.area("gone").await.unwrap().is_none());
    assert!(client.areas().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_own_posts_skip_missing_posts() {
    let (transport, client) = connected().await;
    transport.on_get("/areas/fun/rep/", json!({ "reputation": 1, "spread": 4 }));
    transport.on_get("/areas/fun/own/", json!({ "results": [{ "id": 3 }, { "id": "4" }] }));
    transport.on_get("/areas/fun/3/", post_doc(3, Some(MY_ID), "Mine"));
    transport.not_found(Method::Get, "/areas/fun/4/");
    let area = client.area("fun").await.unwrap().unwrap();

    assert!(area.own_post_ids().is_empty());
    assert_eq!(area.load_own_posts(&client).await.unwrap(), vec![3, 4]);

    let posts = area.own_posts(&client).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text(), "Mine");

    let me = client.me().await.unwrap();
    assert_eq!(me.posts(&client).await.unwrap().len(), 1);
    assert_eq!(area.cached_posts(&client).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_init_areas_loads_drafts_and_own_posts() {
    let (transport, client) = connected().await;
    transport.on_get("/areas/", json!([{ "name": "fun", "displayname": "Fun" }]));
    transport.on_get("/areas/fun/rep/", json!({ "reputation": 1, "spread": 4 }));
    transport.on_get("/areas/fun/drafts/", json!({ "results": [common::draft_doc(7, "Draft")] }));
    transport.on_get("/areas/fun/own/", json!({ "results": [{ "id": 3 }] }));

    let areas = client.init_areas().await.unwrap();

    assert_eq!(areas[0].own_post_ids(), vec![3]);
    assert_eq!(areas[0].drafts(&client).len(), 1);
    assert!(client.drafts().get_cached(&PostKey::new("fun", 7)).is_some());
}

// =============================================================================
// Posts and comments
// =============================================================================

fn post_with_comments() -> serde_json::Value {
    json!({
        "id": 3,
        "author": { "user": 42 },
        "anonym": false,
        "subscribed": true,
        "created": "2018-06-01T12:00:00Z",
        "active": true,
        "text": "Hello",
        "image": null,
        "additional_images": [],
        "comments": [
            { "id": 1, "author": { "user": 42 }, "created": "2018-06-01T12:10:00Z", "text": "First" },
            { "id": 2, "author": null, "created": "2018-06-01T12:20:00Z", "text": "Second" }
        ]
    })
}

#[tokio::test(start_paused = true)]
async fn test_relations_resolve_through_caches() {
    let (transport, client) = connected().await;
    transport.on_get("/areas/fun/3/", post_with_comments());
    transport.on_get("/users/42/", user_doc(42, "alice"));
    transport.on_get("/areas/fun/rep/", json!({ "reputation": 1, "spread": 4 }));

    let post = client.post("fun", 3).await.unwrap().unwrap();
    let author = post.author(&client).await.unwrap().unwrap();
    assert_eq!(author.name(), "alice");
    assert_eq!(post.area(&client).await.unwrap().unwrap().id(), "fun");

    let comments = post.comments();
    assert_eq!(comments.len(), 2);
    let commenter = comments[0].author(&client).await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&author, &commenter));
    assert!(comments[1].author(&client).await.unwrap().is_none());
    assert!(Arc::ptr_eq(&comments[0].post(&client).await.unwrap().unwrap(), &post));
    assert_eq!(transport.count(Method::Get, "/users/42/"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_comments_are_replaced_on_update() {
    let (transport, client) = connected().await;
    transport.on_get("/areas/fun/3/", post_with_comments());
    let post = client.post("fun", 3).await.unwrap().unwrap();
    assert_eq!(post.comments().len(), 2);

    transport.on_get("/areas/fun/3/", post_doc(3, Some(42), "Hello"));
    post.update(&client).await.unwrap();

    assert!(post.comments().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_anonymous_post_has_no_author() {
    let (transport, client) = connected().await;
    let mut doc = post_doc(5, Some(42), "Who?");
    doc["anonym"] = json!(true);
    transport.on_get("/areas/fun/5/", doc);

    let post = client.post("fun", 5).await.unwrap().unwrap();

    assert!(post.is_anonymous());
    assert!(post.author(&client).await.unwrap().is_none());
    assert_eq!(transport.count(Method::Get, "/users/42/"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_post_is_an_error() {
    let (transport, client) = connected().await;
    transport.on_get("/areas/fun/6/", json!({ "id": 6 }));

    assert!(matches!(
        client.post("fun", 6).await,
        Err(Error::MalformedDocument { .. })
    ));
}
