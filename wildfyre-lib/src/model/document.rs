//! Documents exchanged with the WildFyre API

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::transport::Document;

/// Decodes `document`, blaming `context` if it has the wrong shape.
pub(crate) fn decode<T: DeserializeOwned>(context: &str, document: Document) -> Result<T, Error> {
    serde_json::from_value(document).map_err(|e| Error::malformed(context, e))
}

/// Deserializes an ID which can be either a number or a string.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => Ok(n),
        StringOrNumber::String(s) => s
            .parse::<u64>()
            .map_err(|_| D::Error::custom(format!("invalid id value: {}", s))),
    }
}

/// Same as [`deserialize_id`], but accepts `null`.
pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Number(n)) => Ok(Some(n)),
        Some(StringOrNumber::String(s)) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid id value: {}", s))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

/// `GET /users/{id}/`
#[derive(Debug, Deserialize)]
pub(crate) struct UserDocument {
    #[serde(deserialize_with = "deserialize_id")]
    pub user: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub banned: Option<bool>,
}

/// One entry of `GET /areas/`.
#[derive(Debug, Deserialize)]
pub(crate) struct AreaListingDocument {
    pub name: String,
    #[serde(default)]
    pub displayname: Option<String>,
}

/// `GET /areas/{area}/rep/`
#[derive(Debug, Deserialize)]
pub(crate) struct ReputationDocument {
    #[serde(default)]
    pub reputation: Option<i64>,
    #[serde(default)]
    pub spread: Option<i64>,
}

/// Paginated listings: `{"results": [...]}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ResultsDocument<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// One entry of `GET /areas/{area}/own/`.
#[derive(Debug, Deserialize)]
pub(crate) struct OwnPostDocument {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<u64>,
}

/// The author of a post or comment.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthorDocument {
    #[serde(deserialize_with = "deserialize_id")]
    pub user: u64,
}

/// An image attached to a post, either a bare URL or an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ImageDocument {
    Url(String),
    Object {
        #[serde(default)]
        image: Option<String>,
    },
}

impl ImageDocument {
    pub fn into_url(self) -> Option<String> {
        match self {
            Self::Url(url) => Some(url),
            Self::Object { image } => image,
        }
    }
}

/// A post or a draft.
#[derive(Debug, Deserialize)]
pub(crate) struct PostDocument {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: u64,
    #[serde(default)]
    pub author: Option<AuthorDocument>,
    pub anonym: bool,
    pub subscribed: bool,
    pub created: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub additional_images: Vec<ImageDocument>,
    /// Absent for drafts.
    #[serde(default)]
    pub comments: Vec<CommentDocument>,
}

fn default_active() -> bool {
    true
}

/// A comment embedded in a post.
#[derive(Debug, Deserialize)]
pub(crate) struct CommentDocument {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: u64,
    #[serde(default)]
    pub author: Option<AuthorDocument>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ids_as_strings_or_numbers() {
        let doc: OwnPostDocument = decode("own post", json!({ "id": "12" })).unwrap();
        assert_eq!(doc.id, Some(12));
        let doc: OwnPostDocument = decode("own post", json!({ "id": 12 })).unwrap();
        assert_eq!(doc.id, Some(12));
        let doc: OwnPostDocument = decode("own post", json!({ "id": null })).unwrap();
        assert_eq!(doc.id, None);
    }

    #[test]
    fn test_invalid_id_is_malformed() {
        let result: Result<AuthorDocument, _> = decode("author", json!({ "user": "abc" }));
        assert!(matches!(result, Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn test_post_document() {
        let doc: PostDocument = decode(
            "post",
            json!({
                "id": "5",
                "author": { "user": 3, "name": "someone" },
                "anonym": false,
                "subscribed": true,
                "created": "2018-06-01T12:00:00.123456Z",
                "active": true,
                "text": "Hello",
                "image": null,
                "additional_images": ["https://img/1.png", { "image": "https://img/2.png" }],
                "comments": [{
                    "id": 1,
                    "author": { "user": 4 },
                    "created": "2018-06-01T13:00:00Z",
                    "text": "Hi!",
                    "image": null
                }]
            }),
        )
        .unwrap();

        assert_eq!(doc.id, 5);
        assert_eq!(doc.author.map(|a| a.user), Some(3));
        assert_eq!(doc.text.as_deref(), Some("Hello"));
        let images: Vec<_> = doc.additional_images.into_iter().filter_map(ImageDocument::into_url).collect();
        assert_eq!(images, vec!["https://img/1.png", "https://img/2.png"]);
        assert_eq!(doc.comments.len(), 1);
        assert_eq!(doc.comments[0].author.as_ref().map(|a| a.user), Some(4));
    }

    #[test]
    fn test_draft_document_has_no_comments() {
        let doc: PostDocument = decode(
            "draft",
            json!({
                "id": 9,
                "author": null,
                "anonym": true,
                "subscribed": false,
                "created": "2018-06-01T12:00:00Z",
                "text": "Draft"
            }),
        )
        .unwrap();
        assert!(doc.author.is_none());
        assert!(doc.comments.is_empty());
        assert!(doc.active);
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let result: Result<PostDocument, _> = decode("post", json!({ "id": 1 }));
        match result {
            Err(Error::MalformedDocument { context, .. }) => assert_eq!(context, "post"),
            other => panic!("unexpected result: {:?}", other.map(|d| d.id)),
        }
    }
}
