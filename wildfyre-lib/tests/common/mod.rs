//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use serde_json::json;
use wildfyre_lib::WildFyreClient;
use wildfyre_lib::cache::CacheConfig;
use wildfyre_lib::error::ConnectivityError;
use wildfyre_lib::error::TransferError;
use wildfyre_lib::error::TransportError;
use wildfyre_lib::transport::Document;
use wildfyre_lib::transport::Method;
use wildfyre_lib::transport::Request;
use wildfyre_lib::transport::Transport;

pub const TOKEN: &str = "7f3c2a";
pub const MY_ID: u64 = 1;

#[derive(Debug, Clone)]
enum Reply {
    Document(Document),
    Refused(TransferError),
    Offline,
}

#[derive(Default)]
struct Script {
    replies: HashMap<(Method, String), Reply>,
    calls: Vec<Request>,
}

/// Answers every request from a table of scripted replies and records it.
///
/// Replies stay in place until replaced. Unscripted requests are refused
/// with a 500.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, method: Method, path: &str, reply: Reply) {
        self.script.lock().replies.insert((method, path.to_string()), reply);
    }

    pub fn on(&self, method: Method, path: &str, document: Value) {
        self.set(method, path, Reply::Document(document));
    }

    pub fn on_get(&self, path: &str, document: Value) {
        self.on(Method::Get, path, document);
    }

    /// The server answers `{"detail": "Not found."}`.
    pub fn not_found(&self, method: Method, path: &str) {
        self.set(method, path, Reply::Refused(TransferError::not_found()));
    }

    pub fn refuse(&self, method: Method, path: &str, status: u16, body: Value) {
        self.set(method, path, Reply::Refused(TransferError::with_body(status, body)));
    }

    /// The server can't be reached for this request.
    pub fn offline(&self, method: Method, path: &str) {
        self.set(method, path, Reply::Offline);
    }

    pub fn calls(&self) -> Vec<Request> {
        self.script.lock().calls.clone()
    }

    /// Number of requests sent to `path` with `method`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    pub fn last_call(&self) -> Option<Request> {
        self.script.lock().calls.last().cloned()
    }

    pub fn forget_calls(&self) {
        self.script.lock().calls.clear();
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: Request) -> Result<Document, TransportError> {
        let mut script = self.script.lock();
        let reply = script.replies.get(&(request.method, request.path.clone())).cloned();
        script.calls.push(request);

        match reply {
            Some(Reply::Document(document)) => Ok(document),
            Some(Reply::Refused(err)) => Err(err.into()),
            Some(Reply::Offline) => Err(ConnectivityError::new("connection refused").into()),
            None => Err(TransferError::with_body(500, json!({ "detail": "unscripted request" })).into()),
        }
    }
}

pub fn client(transport: &ScriptedTransport) -> WildFyreClient {
    client_with(transport, CacheConfig::default())
}

pub fn client_with(transport: &ScriptedTransport, config: CacheConfig) -> WildFyreClient {
    WildFyreClient::builder()
        .transport(transport.clone())
        .cache_config(config)
        .build()
        .unwrap()
}

pub fn user_doc(id: u64, name: &str) -> Value {
    json!({
        "user": id,
        "name": name,
        "avatar": null,
        "bio": format!("Bio of {}", name),
        "banned": false
    })
}

pub fn post_doc(id: u64, author: Option<u64>, text: &str) -> Value {
    json!({
        "id": id,
        "author": author.map(|user| json!({ "user": user, "name": "someone" })),
        "anonym": false,
        "subscribed": true,
        "created": "2018-06-01T12:00:00Z",
        "active": true,
        "text": text,
        "image": null,
        "additional_images": [],
        "comments": []
    })
}

pub fn draft_doc(id: u64, text: &str) -> Value {
    json!({
        "id": id,
        "author": { "user": MY_ID },
        "anonym": false,
        "subscribed": true,
        "created": "2018-06-01T12:00:00Z",
        "text": text,
        "image": null,
        "additional_images": []
    })
}

/// Scripts the identity of [`MY_ID`] and logs in with [`TOKEN`].
pub async fn connected(transport: &ScriptedTransport, config: CacheConfig) -> WildFyreClient {
    transport.on_get("/users/", user_doc(MY_ID, "me"));
    transport.on_get(&format!("/users/{}/", MY_ID), user_doc(MY_ID, "me"));

    let client = client_with(transport, config);
    client.connect_with_token(TOKEN).await.unwrap();
    transport.forget_calls();
    client
}
