use anyhow::Result;
use rusqlite::{Connection, Row, TransactionBehavior};

use super::{OptionalExt, brief_at};
use crate::models::{CommentRow, CommentTarget, PostRow};
use crate::{Database, new_id, timestamp};

/// `?1` is always the viewer, for the liked/bookmarked flags.
const POST_SELECT: &str = "SELECT p.id, u.id, u.name, u.username, u.profile_pic,
        p.content, p.image_url,
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id),
        EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1),
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
        EXISTS(SELECT 1 FROM bookmarks b WHERE b.post_id = p.id AND b.user_id = ?1),
        p.created_at, p.updated_at
     FROM posts p
     JOIN users u ON u.id = p.author_id";

impl Database {
    // -- Posts --

    pub fn create_post(&self, author_id: &str, content: &str, image_url: Option<&str>) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            let id = new_id();
            let now = timestamp();
            conn.execute(
                "INSERT INTO posts (id, author_id, content, image_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id, author_id, content, image_url, now],
            )?;
            query_post(conn, author_id, &id)?.ok_or_else(|| anyhow::anyhow!("Post vanished after insert: {}", id))
        })
    }

    pub fn get_post(&self, viewer_id: &str, post_id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, viewer_id, post_id))
    }

    /// Author id of a post, `None` if the post does not exist.
    pub fn post_author(&self, post_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT author_id FROM posts WHERE id = ?1", [post_id], |row| row.get(0))
                .optional()
        })
    }

    /// Posts by the viewer or anyone the viewer follows, newest first.
    pub fn post_feed(&self, viewer_id: &str, offset: u32, limit: u32) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{POST_SELECT}
                 WHERE p.author_id = ?1
                    OR p.author_id IN (SELECT following_id FROM follows WHERE follower_id = ?1)
                 ORDER BY p.created_at DESC, p.rowid DESC
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![viewer_id, limit, offset], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Likes --

    /// Like if not liked, unlike otherwise. Returns the new state.
    pub fn toggle_like(&self, user_id: &str, post_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| toggle(conn, "likes", user_id, post_id))
    }

    // -- Bookmarks --

    pub fn toggle_bookmark(&self, user_id: &str, post_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| toggle(conn, "bookmarks", user_id, post_id))
    }

    /// Posts bookmarked by `user_id`, most recently bookmarked first.
    pub fn bookmarked_posts(&self, user_id: &str) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{POST_SELECT}
                 JOIN bookmarks bm ON bm.post_id = p.id AND bm.user_id = ?1
                 ORDER BY bm.created_at DESC, bm.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, author_id: &str, target: CommentTarget<'_>, content: &str) -> Result<CommentRow> {
        let (post_id, project_id) = match target {
            CommentTarget::Post(id) => (Some(id), None),
            CommentTarget::Project(id) => (None, Some(id)),
        };

        self.with_conn_mut(|conn| {
            let id = new_id();
            conn.execute(
                "INSERT INTO comments (id, author_id, content, post_id, project_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, author_id, content, post_id, project_id, timestamp()],
            )?;

            let row = conn.query_row(
                "SELECT c.id, u.id, u.name, u.username, u.profile_pic,
                        c.content, c.post_id, c.project_id, c.created_at
                 FROM comments c JOIN users u ON u.id = c.author_id
                 WHERE c.id = ?1",
                [&id],
                |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        author: brief_at(row, 1)?,
                        content: row.get(5)?,
                        post_id: row.get(6)?,
                        project_id: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                },
            )?;
            Ok(row)
        })
    }
}

/// Check-then-insert-or-delete on a (user_id, post_id) join table, inside
/// one write transaction.
fn toggle(conn: &mut Connection, table: &str, user_id: &str, post_id: &str) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing: Option<String> = tx
        .query_row(
            &format!("SELECT id FROM {table} WHERE user_id = ?1 AND post_id = ?2"),
            [user_id, post_id],
            |row| row.get(0),
        )
        .optional()?;

    let active = if let Some(existing_id) = existing {
        tx.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [&existing_id])?;
        false
    } else {
        tx.execute(
            &format!("INSERT INTO {table} (id, user_id, post_id, created_at) VALUES (?1, ?2, ?3, ?4)"),
            rusqlite::params![new_id(), user_id, post_id, timestamp()],
        )?;
        true
    };

    tx.commit()?;
    Ok(active)
}

fn query_post(conn: &Connection, viewer_id: &str, post_id: &str) -> Result<Option<PostRow>> {
    let sql = format!("{POST_SELECT} WHERE p.id = ?2");
    conn.query_row(&sql, [viewer_id, post_id], map_post).optional()
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author: brief_at(row, 1)?,
        content: row.get(5)?,
        image_url: row.get(6)?,
        like_count: row.get(7)?,
        liked_by_me: row.get(8)?,
        comment_count: row.get(9)?,
        bookmarked_by_me: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::db_with_users;

    #[test]
    fn like_toggle_flips_each_call() {
        let db = db_with_users(&["u1", "u2"]);
        let post = db.create_post("u2", "hello world", None).unwrap();

        assert!(db.toggle_like("u1", &post.id).unwrap());
        let seen = db.get_post("u1", &post.id).unwrap().unwrap();
        assert_eq!(seen.like_count, 1);
        assert!(seen.liked_by_me);

        assert!(!db.toggle_like("u1", &post.id).unwrap());
        let seen = db.get_post("u1", &post.id).unwrap().unwrap();
        assert_eq!(seen.like_count, 0);
        assert!(!seen.liked_by_me);
    }

    #[test]
    fn feed_covers_self_and_followed_only() {
        let db = db_with_users(&["me", "friend", "stranger"]);
        db.toggle_follow("me", "friend").unwrap();
        db.create_post("me", "mine", None).unwrap();
        db.create_post("friend", "theirs", None).unwrap();
        db.create_post("stranger", "hidden", None).unwrap();

        let feed: Vec<String> = db.post_feed("me", 0, 10).unwrap().into_iter().map(|p| p.content).collect();
        assert_eq!(feed, vec!["theirs".to_string(), "mine".to_string()]);

        let page2 = db.post_feed("me", 1, 1).unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].content, "mine");
    }

    #[test]
    fn bookmarks_toggle_and_list() {
        let db = db_with_users(&["u1", "u2"]);
        let a = db.create_post("u2", "a", None).unwrap();
        let b = db.create_post("u2", "b", None).unwrap();

        assert!(db.toggle_bookmark("u1", &a.id).unwrap());
        assert!(db.toggle_bookmark("u1", &b.id).unwrap());
        assert!(!db.toggle_bookmark("u1", &a.id).unwrap());

        let saved = db.bookmarked_posts("u1").unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, b.id);
        assert!(saved[0].bookmarked_by_me);
    }

    #[test]
    fn comments_attach_to_exactly_one_target() {
        let db = db_with_users(&["u1"]);
        let post = db.create_post("u1", "p", None).unwrap();

        let c = db.insert_comment("u1", CommentTarget::Post(&post.id), "nice").unwrap();
        assert_eq!(c.post_id.as_deref(), Some(post.id.as_str()));
        assert!(c.project_id.is_none());
        assert_eq!(db.get_post("u1", &post.id).unwrap().unwrap().comment_count, 1);
    }

    #[test]
    fn author_lookup() {
        let db = db_with_users(&["u1"]);
        let post = db.create_post("u1", "p", Some("https://img/1.png")).unwrap();
        assert_eq!(db.post_author(&post.id).unwrap().as_deref(), Some("u1"));
        assert!(db.post_author("missing").unwrap().is_none());
        assert_eq!(post.image_url.as_deref(), Some("https://img/1.png"));
    }
}
