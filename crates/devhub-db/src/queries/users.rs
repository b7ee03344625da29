use anyhow::Result;
use rusqlite::{Connection, Row, TransactionBehavior};

use super::OptionalExt;
use crate::models::{ProfileFields, UserRow};
use crate::{Database, new_id, timestamp};

pub(super) const USER_COLUMNS: &str = "u.id, u.name, u.username, u.email, u.description, u.github_link, \
     u.role, u.profile_pic, u.onboarded, u.created_at";

/// Result of a profile write. Usernames are unique across users.
#[derive(Debug)]
pub enum ProfileWrite {
    Saved(UserRow),
    UsernameTaken,
}

impl Database {
    // -- Profiles --

    /// Create the caller's row on first profile completion, or merge the
    /// supplied fields into it. Either way the user ends up onboarded.
    pub fn upsert_profile(&self, id: &str, fields: &ProfileFields) -> Result<ProfileWrite> {
        self.with_conn_mut(|conn| {
            if username_taken(conn, id, fields.username.as_deref())? {
                return Ok(ProfileWrite::UsernameTaken);
            }
            conn.execute(
                "INSERT INTO users
                    (id, name, username, email, description, github_link, role, profile_pic, onboarded, created_at)
                 VALUES (?1, COALESCE(?2, ''), ?3, COALESCE(?4, ''), ?5, ?6, COALESCE(?7, ''), ?8, 1, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    name        = COALESCE(?2, users.name),
                    username    = COALESCE(?3, users.username),
                    email       = COALESCE(?4, users.email),
                    description = COALESCE(?5, users.description),
                    github_link = COALESCE(?6, users.github_link),
                    role        = COALESCE(?7, users.role),
                    profile_pic = COALESCE(?8, users.profile_pic),
                    onboarded   = 1",
                rusqlite::params![
                    id,
                    fields.name,
                    fields.username,
                    fields.email,
                    fields.description,
                    fields.github_link,
                    fields.role,
                    fields.profile_pic,
                    timestamp(),
                ],
            )?;
            let row = query_user(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("User vanished after upsert: {}", id))?;
            Ok(ProfileWrite::Saved(row))
        })
    }

    /// Returns `None` if the user does not exist.
    pub fn update_profile(&self, id: &str, fields: &ProfileFields) -> Result<Option<ProfileWrite>> {
        self.with_conn_mut(|conn| {
            if username_taken(conn, id, fields.username.as_deref())? {
                return Ok(Some(ProfileWrite::UsernameTaken));
            }
            let changed = conn.execute(
                "UPDATE users SET
                    name        = COALESCE(?2, name),
                    username    = COALESCE(?3, username),
                    email       = COALESCE(?4, email),
                    description = COALESCE(?5, description),
                    github_link = COALESCE(?6, github_link),
                    role        = COALESCE(?7, role),
                    profile_pic = COALESCE(?8, profile_pic)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    fields.name,
                    fields.username,
                    fields.email,
                    fields.description,
                    fields.github_link,
                    fields.role,
                    fields.profile_pic,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            Ok(query_user(conn, id)?.map(ProfileWrite::Saved))
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    /// Onboarded users matching `query` on name, username or role, minus the
    /// caller and anyone the caller already follows. Newest first.
    pub fn search_users(&self, caller_id: &str, query: &str, limit: u32) -> Result<Vec<UserRow>> {
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u
                 WHERE u.onboarded = 1
                   AND u.id <> ?1
                   AND u.id NOT IN (SELECT following_id FROM follows WHERE follower_id = ?1)
                   AND (?2 = '%%'
                        OR lower(u.name) LIKE ?2 ESCAPE '\\'
                        OR lower(COALESCE(u.username, '')) LIKE ?2 ESCAPE '\\'
                        OR lower(u.role) LIKE ?2 ESCAPE '\\')
                 ORDER BY u.created_at DESC, u.rowid DESC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![caller_id, pattern, limit], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Follows --

    /// Follow if not following, unfollow otherwise. Returns the new state.
    pub fn toggle_follow(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                    [follower_id, following_id],
                    |row| row.get(0),
                )
                .optional()?;

            let following = if let Some(existing_id) = existing {
                tx.execute("DELETE FROM follows WHERE id = ?1", [&existing_id])?;
                false
            } else {
                tx.execute(
                    "INSERT INTO follows (id, follower_id, following_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![new_id(), follower_id, following_id, timestamp()],
                )?;
                true
            };

            tx.commit()?;
            Ok(following)
        })
    }

    pub fn is_following(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2)",
                [follower_id, following_id],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    /// Users following `user_id`.
    pub fn followers(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM follows f
                 JOIN users u ON u.id = f.follower_id
                 WHERE f.following_id = ?1
                 ORDER BY f.created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Users `user_id` follows.
    pub fn following(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM follows f
                 JOIN users u ON u.id = f.following_id
                 WHERE f.follower_id = ?1
                 ORDER BY f.created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// (followers, following)
    pub fn follow_counts(&self, user_id: &str) -> Result<(u32, u32)> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM follows WHERE following_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(counts)
        })
    }
}

/// Whether `username` already belongs to a user other than `id`.
fn username_taken(conn: &Connection, id: &str, username: Option<&str>) -> Result<bool> {
    let Some(username) = username else {
        return Ok(false);
    };
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id <> ?2)",
        [username, id],
        |row| row.get(0),
    )?;
    Ok(taken)
}

pub(super) fn query_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id], map_user).optional()?;
    Ok(row)
}

pub(super) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        description: row.get(4)?,
        github_link: row.get(5)?,
        role: row.get(6)?,
        profile_pic: row.get(7)?,
        onboarded: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::db_with_users;

    fn saved(write: ProfileWrite) -> UserRow {
        match write {
            ProfileWrite::Saved(row) => row,
            ProfileWrite::UsernameTaken => panic!("username unexpectedly taken"),
        }
    }

    #[test]
    fn upsert_creates_then_merges() {
        let db = Database::open_in_memory().unwrap();
        let created = saved(db
            .upsert_profile(
                "u1",
                &ProfileFields {
                    name: Some("Ada".into()),
                    role: Some("Backend".into()),
                    ..Default::default()
                },
            )
            .unwrap());
        assert!(created.onboarded);
        assert_eq!(created.name, "Ada");
        assert_eq!(created.description, None);

        let merged = saved(db
            .upsert_profile(
                "u1",
                &ProfileFields {
                    description: Some("rustacean".into()),
                    ..Default::default()
                },
            )
            .unwrap());
        assert_eq!(merged.name, "Ada");
        assert_eq!(merged.role, "Backend");
        assert_eq!(merged.description.as_deref(), Some("rustacean"));
    }

    #[test]
    fn update_missing_user_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.update_profile("ghost", &ProfileFields::default()).unwrap().is_none());
    }

    #[test]
    fn taken_username_is_refused_on_both_paths() {
        let db = db_with_users(&["u1", "u2"]);
        let steal = ProfileFields {
            username: Some("u1".into()),
            ..Default::default()
        };

        assert!(matches!(db.upsert_profile("u9", &steal).unwrap(), ProfileWrite::UsernameTaken));
        assert!(!db.user_exists("u9").unwrap());

        assert!(matches!(
            db.update_profile("u2", &steal).unwrap(),
            Some(ProfileWrite::UsernameTaken)
        ));
        assert_eq!(db.get_user("u2").unwrap().unwrap().username.as_deref(), Some("u2"));

        // Keeping your own username is not a conflict.
        assert!(matches!(db.update_profile("u1", &steal).unwrap(), Some(ProfileWrite::Saved(_))));
    }

    #[test]
    fn follow_toggle_twice_leaves_no_edge() {
        let db = db_with_users(&["u1", "u2"]);

        assert!(db.toggle_follow("u1", "u2").unwrap());
        assert!(db.is_following("u1", "u2").unwrap());
        assert_eq!(db.follow_counts("u2").unwrap(), (1, 0));

        assert!(!db.toggle_follow("u1", "u2").unwrap());
        assert!(!db.is_following("u1", "u2").unwrap());
        assert_eq!(db.follow_counts("u2").unwrap(), (0, 0));
    }

    #[test]
    fn self_follow_is_rejected_by_schema() {
        let db = db_with_users(&["u1"]);
        assert!(db.toggle_follow("u1", "u1").is_err());
        assert!(!db.is_following("u1", "u1").unwrap());
    }

    #[test]
    fn followers_and_following_are_directional() {
        let db = db_with_users(&["u1", "u2", "u3"]);
        db.toggle_follow("u1", "u2").unwrap();
        db.toggle_follow("u3", "u2").unwrap();

        let followers: Vec<String> = db.followers("u2").unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(followers.len(), 2);
        assert!(followers.contains(&"u1".to_string()));
        assert!(followers.contains(&"u3".to_string()));

        assert!(db.following("u2").unwrap().is_empty());
        assert_eq!(db.following("u1").unwrap()[0].id, "u2");
    }

    #[test]
    fn search_skips_self_and_followed() {
        let db = db_with_users(&["me", "alice", "albert", "bob"]);
        db.toggle_follow("me", "albert").unwrap();

        let found: Vec<String> = db
            .search_users("me", "AL", 10)
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(found, vec!["alice".to_string()]);

        let everyone = db.search_users("me", "", 10).unwrap();
        assert_eq!(everyone.len(), 2);
    }

    #[test]
    fn like_wildcards_are_literal() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
