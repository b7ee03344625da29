use anyhow::Result;
use rusqlite::{Connection, Row, TransactionBehavior};

use super::users::{USER_COLUMNS, map_user};
use super::{OptionalExt, brief_at};
use crate::models::{ConversationRow, MessageRow, UserRow};
use crate::{Database, new_id, timestamp};

const MESSAGE_SELECT: &str = "SELECT m.id, m.conversation_id, m.sender_id, m.receiver_id, m.content, m.created_at,
        s.id, s.name, s.username, s.profile_pic,
        r.id, r.name, r.username, r.profile_pic
     FROM messages m
     JOIN users s ON s.id = m.sender_id
     JOIN users r ON r.id = m.receiver_id";

/// Result of a history fetch.
pub enum History {
    /// Oldest first.
    Messages(Vec<MessageRow>),
    /// The `before` cursor does not name a message of this conversation.
    UnknownCursor,
}

impl Database {
    // -- Conversations --

    pub fn find_conversation(&self, a: &str, b: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| query_conversation(conn, a, b))
    }

    // -- Messages --

    /// Resolve the pair's conversation, creating it on first use, and append
    /// a message to it atomically. Both orderings of the pair resolve to the
    /// same conversation.
    pub fn insert_message(&self, sender_id: &str, receiver_id: &str, content: &str) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let conversation = find_or_create_in(&tx, sender_id, receiver_id)?;

            let id = new_id();
            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, conversation.id, sender_id, receiver_id, content, timestamp()],
            )?;

            let row = tx.query_row(&format!("{MESSAGE_SELECT} WHERE m.id = ?1"), [&id], map_message)?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Messages of a conversation, oldest first.
    ///
    /// With `before`, only messages strictly older than that message are
    /// considered. With `limit`, only the newest `limit` of those are
    /// returned, still in ascending order.
    pub fn get_history(
        &self,
        conversation_id: &str,
        limit: Option<u32>,
        before: Option<&str>,
    ) -> Result<History> {
        self.with_conn(|conn| {
            let cursor: Option<(String, i64)> = match before {
                Some(message_id) => {
                    let found = conn
                        .query_row(
                            "SELECT created_at, rowid FROM messages WHERE id = ?1 AND conversation_id = ?2",
                            [message_id, conversation_id],
                            |row| Ok((row.get(0)?, row.get(1)?)),
                        )
                        .optional()?;
                    match found {
                        Some(c) => Some(c),
                        None => return Ok(History::UnknownCursor),
                    }
                }
                None => None,
            };

            let (cursor_at, cursor_rowid) = cursor.unzip();
            let limit = limit.map(i64::from).unwrap_or(-1);

            // Newest-first so LIMIT keeps the most recent slice, then flip.
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE m.conversation_id = ?1
                   AND (?2 IS NULL OR (m.created_at, m.rowid) < (?2, ?3))
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map(
                    rusqlite::params![conversation_id, cursor_at, cursor_rowid, limit],
                    map_message,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();

            Ok(History::Messages(rows))
        })
    }

    /// Followers and followed users of `user_id`, deduplicated, each paired
    /// with whether they have unread MESSAGE notifications for `user_id`.
    pub fn conversation_partners(&self, user_id: &str) -> Result<Vec<(UserRow, bool)>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS},
                    EXISTS(SELECT 1 FROM notifications n
                           WHERE n.user_id = ?1 AND n.actor_id = u.id
                             AND n.kind = 'MESSAGE' AND n.read = 0)
                 FROM users u
                 WHERE u.id IN (
                     SELECT following_id FROM follows WHERE follower_id = ?1
                     UNION
                     SELECT follower_id FROM follows WHERE following_id = ?1
                 )
                 ORDER BY u.name COLLATE NOCASE, u.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| Ok((map_user(row)?, row.get::<_, bool>(10)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

fn find_or_create_in(conn: &Connection, sender_id: &str, receiver_id: &str) -> Result<ConversationRow> {
    let (low, high) = canonical_pair(sender_id, receiver_id);

    // The UNIQUE(pair_low, pair_high) constraint turns a lost race into a no-op.
    conn.execute(
        "INSERT INTO conversations (id, user_one_id, user_two_id, pair_low, pair_high, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(pair_low, pair_high) DO NOTHING",
        rusqlite::params![new_id(), sender_id, receiver_id, low, high, timestamp()],
    )?;

    query_conversation(conn, sender_id, receiver_id)?
        .ok_or_else(|| anyhow::anyhow!("Conversation missing after insert: {} / {}", sender_id, receiver_id))
}

fn query_conversation(conn: &Connection, a: &str, b: &str) -> Result<Option<ConversationRow>> {
    let (low, high) = canonical_pair(a, b);
    let row = conn
        .query_row(
            "SELECT id, user_one_id, user_two_id, created_at FROM conversations
             WHERE pair_low = ?1 AND pair_high = ?2",
            [low, high],
            |row| {
                Ok(ConversationRow {
                    id: row.get(0)?,
                    user_one_id: row.get(1)?,
                    user_two_id: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        sender: brief_at(row, 6)?,
        receiver: brief_at(row, 10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::db_with_users;
    use devhub_types::models::NotificationKind;

    fn conversation_count(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))?))
            .unwrap()
    }

    fn contents(history: History) -> Vec<String> {
        match history {
            History::Messages(rows) => rows.into_iter().map(|m| m.content).collect(),
            History::UnknownCursor => panic!("unexpected unknown cursor"),
        }
    }

    #[test]
    fn both_directions_share_one_conversation() {
        let db = db_with_users(&["u1", "u2"]);

        let first = db.insert_message("u1", "u2", "hello").unwrap();
        let reply = db.insert_message("u2", "u1", "hi back").unwrap();

        assert_eq!(first.conversation_id, reply.conversation_id);
        assert_eq!(conversation_count(&db), 1);

        let conv = db.find_conversation("u2", "u1").unwrap().unwrap();
        assert_eq!(conv.id, first.conversation_id);
        assert_eq!(conv.user_one_id, "u1");
        assert_eq!(conv.user_two_id, "u2");
    }

    #[test]
    fn either_direction_reuses_the_conversation() {
        let db = db_with_users(&["a", "b"]);
        let one = db.insert_message("b", "a", "first").unwrap();
        let two = db.insert_message("a", "b", "second").unwrap();
        assert_eq!(one.conversation_id, two.conversation_id);
        assert_eq!(conversation_count(&db), 1);
    }

    #[test]
    fn inserted_message_carries_both_participants() {
        let db = db_with_users(&["u1", "u2"]);
        let msg = db.insert_message("u1", "u2", "hello").unwrap();
        assert_eq!(msg.sender.id, "u1");
        assert_eq!(msg.receiver.username.as_deref(), Some("u2"));
        assert_eq!(msg.sender.name, "User u1");
    }

    #[test]
    fn history_is_ascending_and_paginates_backwards() {
        let db = db_with_users(&["u1", "u2"]);
        let mut ids = Vec::new();
        for i in 0..5 {
            let (from, to) = if i % 2 == 0 { ("u1", "u2") } else { ("u2", "u1") };
            ids.push(db.insert_message(from, to, &format!("m{}", i)).unwrap().id);
        }
        let conv = db.find_conversation("u1", "u2").unwrap().unwrap();

        assert_eq!(
            contents(db.get_history(&conv.id, None, None).unwrap()),
            vec!["m0", "m1", "m2", "m3", "m4"]
        );
        assert_eq!(contents(db.get_history(&conv.id, Some(2), None).unwrap()), vec!["m3", "m4"]);
        assert_eq!(
            contents(db.get_history(&conv.id, Some(2), Some(&ids[3])).unwrap()),
            vec!["m1", "m2"]
        );
        assert_eq!(contents(db.get_history(&conv.id, Some(2), Some(&ids[1])).unwrap()), vec!["m0"]);
        assert!(matches!(
            db.get_history(&conv.id, Some(2), Some("nope")).unwrap(),
            History::UnknownCursor
        ));
    }

    #[test]
    fn partners_are_deduplicated_and_flag_unread() {
        let db = db_with_users(&["me", "mutual", "fan", "idol", "stranger"]);
        db.toggle_follow("me", "mutual").unwrap();
        db.toggle_follow("mutual", "me").unwrap();
        db.toggle_follow("fan", "me").unwrap();
        db.toggle_follow("me", "idol").unwrap();
        db.insert_notification(NotificationKind::Message, "me", "fan", None).unwrap();
        db.insert_notification(NotificationKind::Like, "me", "idol", None).unwrap();

        let partners = db.conversation_partners("me").unwrap();
        let summary: Vec<(String, bool)> = partners.into_iter().map(|(u, unread)| (u.id, unread)).collect();
        assert_eq!(
            summary,
            vec![
                ("fan".to_string(), true),
                ("idol".to_string(), false),
                ("mutual".to_string(), false),
            ]
        );
    }
}
