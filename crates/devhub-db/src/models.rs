/// Database row types. These map directly to SQLite rows.
/// Distinct from devhub-types API models to keep the DB layer independent.

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub username: Option<String>,
    pub email: String,
    pub description: Option<String>,
    pub github_link: Option<String>,
    pub role: String,
    pub profile_pic: Option<String>,
    pub onboarded: bool,
    pub created_at: String,
}

/// The columns of `users` that get embedded in other rows.
#[derive(Debug, Clone)]
pub struct UserBriefRow {
    pub id: String,
    pub name: String,
    pub username: Option<String>,
    pub profile_pic: Option<String>,
}

/// Profile fields as supplied by the client; `None` leaves a stored value alone.
#[derive(Debug, Default, Clone)]
pub struct ProfileFields {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub github_link: Option<String>,
    pub role: Option<String>,
    pub profile_pic: Option<String>,
}

pub struct ConversationRow {
    pub id: String,
    pub user_one_id: String,
    pub user_two_id: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: String,
    pub sender: UserBriefRow,
    pub receiver: UserBriefRow,
}

pub struct NotificationRow {
    pub id: String,
    pub kind: String,
    pub user_id: String,
    pub actor_id: String,
    pub actor: UserBriefRow,
    pub post_id: Option<String>,
    pub post_content: Option<String>,
    pub read: bool,
    pub created_at: String,
}

pub struct PostRow {
    pub id: String,
    pub author: UserBriefRow,
    pub content: String,
    pub image_url: Option<String>,
    pub like_count: u32,
    pub liked_by_me: bool,
    pub comment_count: u32,
    pub bookmarked_by_me: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub author: UserBriefRow,
    pub content: String,
    pub post_id: Option<String>,
    pub project_id: Option<String>,
    pub created_at: String,
}

/// Where a comment is attached.
#[derive(Debug, Clone, Copy)]
pub enum CommentTarget<'a> {
    Post(&'a str),
    Project(&'a str),
}

pub struct ProjectRow {
    pub id: String,
    pub owner: UserBriefRow,
    pub title: String,
    pub description: String,
    pub github_url: String,
    pub live_url: Option<String>,
    pub thumbnail: Option<String>,
    pub technologies: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ProjectFields {
    pub title: String,
    pub description: String,
    pub github_url: String,
    pub live_url: Option<String>,
    pub thumbnail: Option<String>,
    pub technologies: Vec<String>,
}

pub struct BlogRow {
    pub id: String,
    pub author: UserBriefRow,
    pub title: String,
    pub description: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub technologies: Vec<String>,
    pub published_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct BlogFields {
    pub title: String,
    pub description: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub technologies: Vec<String>,
}
