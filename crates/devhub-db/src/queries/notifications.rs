use anyhow::Result;
use devhub_types::models::NotificationKind;

use super::brief_at;
use crate::models::NotificationRow;
use crate::{Database, new_id, timestamp};

impl Database {
    /// Returns the new notification id.
    pub fn insert_notification(
        &self,
        kind: NotificationKind,
        user_id: &str,
        actor_id: &str,
        post_id: Option<&str>,
    ) -> Result<String> {
        let id = new_id();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, kind, user_id, actor_id, post_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, kind.as_str(), user_id, actor_id, post_id, timestamp()],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    /// Newest first, optionally filtered on the read flag.
    pub fn list_notifications(
        &self,
        user_id: &str,
        read: Option<bool>,
        limit: u32,
    ) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT n.id, n.kind, n.user_id, n.actor_id,
                        a.id, a.name, a.username, a.profile_pic,
                        n.post_id, p.content, n.read, n.created_at
                 FROM notifications n
                 JOIN users a ON a.id = n.actor_id
                 LEFT JOIN posts p ON p.id = n.post_id
                 WHERE n.user_id = ?1 AND (?2 IS NULL OR n.read = ?2)
                 ORDER BY n.created_at DESC, n.rowid DESC
                 LIMIT ?3",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, read, limit], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        user_id: row.get(2)?,
                        actor_id: row.get(3)?,
                        actor: brief_at(row, 4)?,
                        post_id: row.get(8)?,
                        post_content: row.get(9)?,
                        read: row.get(10)?,
                        created_at: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn unread_count(&self, user_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Returns how many rows flipped to read.
    pub fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id],
            )?;
            Ok(n)
        })
    }

    /// Chat read receipts: clear the unread MESSAGE notifications that
    /// `actor_id` generated for `user_id`.
    pub fn mark_messages_read(&self, user_id: &str, actor_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET read = 1
                 WHERE user_id = ?1 AND actor_id = ?2 AND kind = 'MESSAGE' AND read = 0",
                [user_id, actor_id],
            )?;
            Ok(n)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::db_with_users;

    #[test]
    fn list_is_newest_first_and_filters_on_read() {
        let db = db_with_users(&["u1", "u2", "u3"]);
        db.insert_notification(NotificationKind::Follow, "u2", "u1", None).unwrap();
        db.insert_notification(NotificationKind::Message, "u2", "u3", None).unwrap();

        let all = db.list_notifications("u2", None, 50).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, "MESSAGE");
        assert_eq!(all[1].actor.id, "u1");
        assert_eq!(db.unread_count("u2").unwrap(), 2);

        db.mark_messages_read("u2", "u3").unwrap();
        let unread = db.list_notifications("u2", Some(false), 50).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].kind, "FOLLOW");
        let read = db.list_notifications("u2", Some(true), 50).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].actor_id, "u3");
    }

    #[test]
    fn mark_all_read_zeroes_unread_count() {
        let db = db_with_users(&["u1", "u2"]);
        for _ in 0..3 {
            db.insert_notification(NotificationKind::Message, "u2", "u1", None).unwrap();
        }
        db.insert_notification(NotificationKind::Follow, "u1", "u2", None).unwrap();

        assert_eq!(db.mark_all_read("u2").unwrap(), 3);
        assert_eq!(db.unread_count("u2").unwrap(), 0);
        assert_eq!(db.mark_all_read("u2").unwrap(), 0);
        // other users untouched
        assert_eq!(db.unread_count("u1").unwrap(), 1);
    }

    #[test]
    fn message_receipts_only_touch_that_sender() {
        let db = db_with_users(&["me", "a", "b"]);
        db.insert_notification(NotificationKind::Message, "me", "a", None).unwrap();
        db.insert_notification(NotificationKind::Message, "me", "a", None).unwrap();
        db.insert_notification(NotificationKind::Message, "me", "b", None).unwrap();
        db.insert_notification(NotificationKind::Follow, "me", "a", None).unwrap();

        assert_eq!(db.mark_messages_read("me", "a").unwrap(), 2);
        assert_eq!(db.unread_count("me").unwrap(), 2);
    }

    #[test]
    fn limit_caps_the_page() {
        let db = db_with_users(&["u1", "u2"]);
        for _ in 0..5 {
            db.insert_notification(NotificationKind::Like, "u2", "u1", None).unwrap();
        }
        assert_eq!(db.list_notifications("u2", None, 3).unwrap().len(), 3);
    }
}
