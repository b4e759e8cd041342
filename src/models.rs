use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A persisted guestbook entry.
///
/// The JSON shape (`text`, `author`, `time`, `ip`, `ua`) is also the on-disk
/// NDJSON line format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[sqlx(rename = "content")]
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(rename = "time")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "ip", default)]
    pub source_ip: Option<String>,
    #[serde(rename = "ua", default)]
    pub user_agent: Option<String>,
}

/// Validated submission, before the store assigns a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub text: String,
    pub author: Option<String>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl NewMessage {
    pub fn into_message(self, created_at: DateTime<Utc>) -> Message {
        Message {
            id: None,
            text: self.text,
            author: self.author,
            created_at,
            source_ip: self.source_ip,
            user_agent: self.user_agent,
        }
    }
}

/// Raw submission body, accepted as JSON or form data.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MessageInput {
    #[serde(default, alias = "content", alias = "message")]
    pub text: Option<String>,
    #[serde(default, alias = "name")]
    pub author: Option<String>,
}

/// Redacted view served on the public listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PublicMessage {
    pub text: String,
    pub author: Option<String>,
    pub time: DateTime<Utc>,
}

impl From<Message> for PublicMessage {
    fn from(m: Message) -> Self {
        Self { text: m.text, author: m.author, time: m.created_at }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAccessLogEntry {
    pub path: String,
    pub remote_ip: String,
    pub user_agent: String,
    pub auth_user: Option<String>,
    pub status: u16,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AccessLogEntry {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub path: String,
    pub remote_ip: String,
    pub user_agent: String,
    pub auth_user: Option<String>,
    pub status: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_lines_written_without_author_or_id() {
        let line = r#"{"text":"hello","time":"2024-05-01T10:00:00.000Z","ip":"1.2.3.4","ua":null}"#;
        let m: Message = serde_json::from_str(line).unwrap();
        assert_eq!(m.text, "hello");
        assert_eq!(m.author, None);
        assert_eq!(m.id, None);
        assert_eq!(m.source_ip.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn public_view_has_no_metadata_keys() {
        let m = NewMessage {
            text: "hi".into(),
            author: None,
            source_ip: Some("10.0.0.1".into()),
            user_agent: Some("curl".into()),
        }
        .into_message(Utc::now());
        let v = serde_json::to_value(PublicMessage::from(m)).unwrap();
        let obj = v.as_object().unwrap();
        assert!(!obj.contains_key("ip"));
        assert!(!obj.contains_key("ua"));
        assert_eq!(obj["text"], "hi");
    }

    #[test]
    fn input_accepts_aliases() {
        let i: MessageInput = serde_json::from_str(r#"{"content":"x","name":"bob"}"#).unwrap();
        assert_eq!(i.text.as_deref(), Some("x"));
        assert_eq!(i.author.as_deref(), Some("bob"));
    }
}
