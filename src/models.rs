use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::tags::TagInput;

/// Store-assigned identifier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned identifier of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(i64);

impl NoteId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 账户记录，密码哈希从不序列化
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A stored note. Tags are always the output of [`crate::tags::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- 请求体 ---

#[derive(Deserialize, Debug, Default)]
pub struct SignupPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CreateNotePayload {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<TagInput>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateNotePayload {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some` whenever the key is present, even as `null`.
    #[serde(default, deserialize_with = "present")]
    pub tags: Option<TagInput>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ListNotesQuery {
    pub search: Option<String>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// --- 响应体 ---

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
    pub user: UserResponse,
}

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize, Debug)]
pub struct NoteMessageResponse {
    pub message: &'static str,
    pub note: Note,
}

#[derive(Serialize, Debug)]
pub struct NoteResponse {
    pub note: Note,
}

#[derive(Serialize, Debug)]
pub struct NoteListResponse {
    pub total: usize,
    pub notes: Vec<Note>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_raw_integers() {
        assert_eq!(serde_json::to_string(&NoteId::new(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&UserId::new(7)).unwrap(), "7");
    }

    #[test]
    fn note_serializes_in_camel_case() {
        let now = Utc::now();
        let note = Note {
            id: NoteId::new(1),
            title: "t".into(),
            content: "c".into(),
            tags: vec!["a".into()],
            owner_id: UserId::new(2),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["ownerId"], 2);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("owner_id").is_none());
    }

    #[test]
    fn update_payload_tells_absent_tags_from_null_tags() {
        let absent: UpdateNotePayload = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert!(absent.tags.is_none());

        let null: UpdateNotePayload = serde_json::from_str(r#"{"tags": null}"#).unwrap();
        assert_eq!(null.tags, Some(TagInput::Sequence(Vec::new())));

        let given: UpdateNotePayload = serde_json::from_str(r#"{"tags": "a,b"}"#).unwrap();
        assert_eq!(given.tags, Some(TagInput::Delimited("a,b".into())));
    }

    #[test]
    fn user_response_omits_the_password_hash() {
        let user = User {
            id: UserId::new(1),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&UserResponse::from(&user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("ada@example.com"));
    }
}
