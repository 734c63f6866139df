//! Purpose: Shared wire-level data model for sessions and posts.
//! Exports: `UserInfo`, `Profile`, `Author`, `Post`, `PostDraft`, `PostPatch`.
//! Invariants: JSON field names are camelCase and stable across client/server.
//! Invariants: `Post.author` is assigned at creation and never changed by edit.

use serde::{Deserialize, Serialize};

/// Authenticated identity plus bearer token, as returned by login/register
/// and persisted in the session file. Fully present or fully absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub token: String,
}

/// Identity without the token, as returned by `GET /auth/profile`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// One blog article. `content` is free text and may embed the literal
/// two-character sequence `\n` which renderers treat as a line break.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub author: Author,
    pub published_at: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Payload for creating a post. The server assigns id, author and timestamps.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Partial update payload for editing a post. Fields left `None` retain
/// their prior value on the server.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::{Post, UserInfo};

    #[test]
    fn wire_fields_are_camel_case() {
        let user = UserInfo {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            is_admin: true,
            token: "tok".to_string(),
        };
        let value = serde_json::to_value(&user).expect("serialize");
        assert!(value.get("isAdmin").is_some());
        assert!(value.get("is_admin").is_none());
    }

    #[test]
    fn post_omits_absent_image_url() {
        let raw = r#"{
            "id": "p1",
            "title": "t",
            "content": "body",
            "author": {"id": "u1", "username": "alice", "email": "a@b.c"},
            "publishedAt": "2026-01-01T00:00:00Z",
            "tags": ["rust"],
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        }"#;
        let post: Post = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(post.image_url, None);
        let value = serde_json::to_value(&post).expect("serialize");
        assert!(value.get("imageUrl").is_none());
        assert_eq!(value["publishedAt"], "2026-01-01T00:00:00Z");
    }
}
