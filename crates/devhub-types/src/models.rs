use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Message,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::Comment => "COMMENT",
            Self::Follow => "FOLLOW",
            Self::Message => "MESSAGE",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIKE" => Ok(Self::Like),
            "COMMENT" => Ok(Self::Comment),
            "FOLLOW" => Ok(Self::Follow),
            "MESSAGE" => Ok(Self::Message),
            other => Err(format!("unknown notification kind '{}'", other)),
        }
    }
}

/// The slice of a user that gets embedded in messages, posts and notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub username: Option<String>,
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Issued by the identity provider, not by us.
    pub id: String,
    pub name: String,
    pub username: Option<String>,
    pub email: String,
    pub description: Option<String>,
    pub github_link: Option<String>,
    pub role: String,
    pub profile_pic: Option<String>,
    pub onboarded: bool,
    pub created_at: DateTime<Utc>,
}

/// Chat messages are immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub sender: UserSummary,
    pub receiver: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub user_id: String,
    pub actor_id: String,
    pub actor: UserSummary,
    pub post: Option<PostSummary>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: String,
    pub author: UserSummary,
    pub content: String,
    pub image_url: Option<String>,
    pub like_count: u32,
    pub liked_by_me: bool,
    pub comment_count: u32,
    pub bookmarked_by_me: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment hangs off either a post or a project, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub author: UserSummary,
    pub content: String,
    pub post_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub owner_id: String,
    pub owner: UserSummary,
    pub title: String,
    pub description: String,
    pub github_url: String,
    pub live_url: Option<String>,
    pub thumbnail: Option<String>,
    pub technologies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Long-form write-up. Authors own their blogs the same way owners own projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: Uuid,
    pub author_id: String,
    pub author: UserSummary,
    pub title: String,
    pub description: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub technologies: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_kind_round_trips_through_its_wire_name() {
        for kind in [
            NotificationKind::Like,
            NotificationKind::Comment,
            NotificationKind::Follow,
            NotificationKind::Message,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationKind>(), Ok(kind));
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::String(kind.to_string())
            );
        }
        assert!("POKE".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn notification_serializes_kind_as_type() {
        let n = Notification {
            id: Uuid::nil(),
            kind: NotificationKind::Follow,
            user_id: "u2".into(),
            actor_id: "u1".into(),
            actor: UserSummary {
                id: "u1".into(),
                name: "Ada".into(),
                username: Some("ada".into()),
                profile_pic: None,
            },
            post: None,
            read: false,
            created_at: Utc::now(),
        };
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "FOLLOW");
        assert_eq!(v["actorId"], "u1");
        assert_eq!(v["actor"]["profilePic"], serde_json::Value::Null);
    }
}
