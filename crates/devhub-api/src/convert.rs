//! DB rows -> API models.
//!
//! Rows carry ids and timestamps as strings. A value that fails to parse is
//! logged and replaced with a default rather than failing the whole response.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use devhub_db::models::{
    BlogRow, CommentRow, MessageRow, NotificationRow, PostRow, ProjectRow, UserBriefRow, UserRow,
};
use devhub_types::models::{
    Blog, Comment, Message, Notification, NotificationKind, Post, PostSummary, Project, User,
    UserSummary,
};

pub fn uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub fn timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; treat it as UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn user(row: UserRow) -> User {
    User {
        created_at: timestamp(&row.created_at),
        id: row.id,
        name: row.name,
        username: row.username,
        email: row.email,
        description: row.description,
        github_link: row.github_link,
        role: row.role,
        profile_pic: row.profile_pic,
        onboarded: row.onboarded,
    }
}

pub fn brief(row: UserBriefRow) -> UserSummary {
    UserSummary {
        id: row.id,
        name: row.name,
        username: row.username,
        profile_pic: row.profile_pic,
    }
}

pub fn message(row: MessageRow) -> Message {
    Message {
        id: uuid(&row.id, "message id"),
        conversation_id: uuid(&row.conversation_id, "conversation id"),
        created_at: timestamp(&row.created_at),
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        content: row.content,
        sender: brief(row.sender),
        receiver: brief(row.receiver),
    }
}

/// `None` if the stored kind is not one we know; the row is skipped.
pub fn notification(row: NotificationRow) -> Option<Notification> {
    let kind = match row.kind.parse::<NotificationKind>() {
        Ok(kind) => kind,
        Err(e) => {
            warn!("Skipping notification {}: {}", row.id, e);
            return None;
        }
    };

    let post = match (row.post_id, row.post_content) {
        (Some(id), Some(content)) => Some(PostSummary {
            id: uuid(&id, "post id"),
            content,
        }),
        _ => None,
    };

    Some(Notification {
        id: uuid(&row.id, "notification id"),
        kind,
        user_id: row.user_id,
        actor_id: row.actor_id,
        actor: brief(row.actor),
        post,
        read: row.read,
        created_at: timestamp(&row.created_at),
    })
}

pub fn post(row: PostRow) -> Post {
    Post {
        id: uuid(&row.id, "post id"),
        author_id: row.author.id.clone(),
        author: brief(row.author),
        content: row.content,
        image_url: row.image_url,
        like_count: row.like_count,
        liked_by_me: row.liked_by_me,
        comment_count: row.comment_count,
        bookmarked_by_me: row.bookmarked_by_me,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn comment(row: CommentRow) -> Comment {
    Comment {
        id: uuid(&row.id, "comment id"),
        author: brief(row.author),
        content: row.content,
        post_id: row.post_id.as_deref().map(|id| uuid(id, "post id")),
        project_id: row.project_id.as_deref().map(|id| uuid(id, "project id")),
        created_at: timestamp(&row.created_at),
    }
}

pub fn project(row: ProjectRow) -> Project {
    Project {
        id: uuid(&row.id, "project id"),
        owner_id: row.owner.id.clone(),
        owner: brief(row.owner),
        title: row.title,
        description: row.description,
        github_url: row.github_url,
        live_url: row.live_url,
        thumbnail: row.thumbnail,
        technologies: row.technologies,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn blog(row: BlogRow) -> Blog {
    Blog {
        id: uuid(&row.id, "blog id"),
        author_id: row.author.id.clone(),
        author: brief(row.author),
        title: row.title,
        description: row.description,
        content: row.content,
        thumbnail: row.thumbnail,
        technologies: row.technologies,
        published_at: timestamp(&row.published_at),
        updated_at: timestamp(&row.updated_at),
    }
}
